//! Document type declaration scanning.
//!
//! Entity declarations, element content models and attribute-list
//! declarations are kept; notation declarations are skipped. Parameter
//! entity references between declarations and conditional sections of the
//! external subset are expanded in place. Declarations in the external
//! subset that use parameter entities inside their own text are skipped.

use std::collections::{BTreeSet, HashMap};

use crate::chars::{is_name_char, is_valid_public_id, is_valid_system_literal};
use crate::error::ParseError;

use super::input::{parse_comment_content, parse_pi_content, ParserInput};
use super::xml::XmlParser;

/// A declared entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Entity {
    /// Replacement text with character references already expanded.
    Internal(String),
    /// Content fetched through the entity loader on first reference.
    External {
        public_id: Option<String>,
        system_id: String,
        /// Directory the system id is relative to.
        base: String,
    },
    /// An `NDATA` entity; referencing it in content is an error.
    Unparsed,
}

/// General and parameter entities declared so far.
///
/// The first declaration of a name is binding; later ones are ignored
/// (XML 1.0 §4.2).
#[derive(Debug, Default)]
pub(crate) struct EntityTable {
    general: HashMap<String, Entity>,
    parameter: HashMap<String, Entity>,
}

impl EntityTable {
    pub fn declare(&mut self, name: String, entity: Entity, parameter: bool) {
        let map = if parameter {
            &mut self.parameter
        } else {
            &mut self.general
        };
        map.entry(name).or_insert(entity);
    }

    pub fn general(&self, name: &str) -> Option<&Entity> {
        self.general.get(name)
    }

    pub fn parameter(&self, name: &str) -> Option<&Entity> {
        self.parameter.get(name)
    }
}

/// Declared type of an attribute (XML 1.0 §3.3.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttributeType {
    CData,
    Id,
    IdRef,
    IdRefs,
    Entity,
    Entities,
    NmToken,
    NmTokens,
    Notation(Vec<String>),
    Enumeration(Vec<String>),
}

impl AttributeType {
    /// Everything but CDATA is a list of space-separated tokens whose
    /// surrounding and repeated spaces are dropped.
    pub fn is_tokenized(&self) -> bool {
        !matches!(self, Self::CData)
    }
}

/// Default declaration of an attribute (XML 1.0 §3.3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttributeDefault {
    Required,
    Implied,
    Fixed(String),
    Value(String),
}

impl AttributeDefault {
    /// The value inserted when the attribute is missing from a start tag.
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Fixed(v) | Self::Value(v) => Some(v),
            Self::Required | Self::Implied => None,
        }
    }
}

/// One attribute definition of an `<!ATTLIST>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttributeDecl {
    pub name: String,
    pub kind: AttributeType,
    pub default: AttributeDefault,
}

/// How often a content particle may occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Repeat {
    Once,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Term {
    Name(String),
    Sequence(Vec<Particle>),
    Choice(Vec<Particle>),
}

/// A content particle of an element-content model (XML 1.0 §3.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Particle {
    pub term: Term,
    pub repeat: Repeat,
}

impl Particle {
    /// Returns `true` if the child element names in `names` form a sentence
    /// of this model.
    pub fn matches(&self, names: &[String]) -> bool {
        self.advance(names, &BTreeSet::from([0])).contains(&names.len())
    }

    /// Positions in `names` reachable by matching this particle once
    /// (honoring its repeat) from any position in `from`.
    fn advance(&self, names: &[String], from: &BTreeSet<usize>) -> BTreeSet<usize> {
        match self.repeat {
            Repeat::Once => self.advance_term(names, from),
            Repeat::Optional => {
                let mut reached = self.advance_term(names, from);
                reached.extend(from);
                reached
            }
            Repeat::ZeroOrMore => self.closure(names, from.clone()),
            Repeat::OneOrMore => {
                let once = self.advance_term(names, from);
                self.closure(names, once)
            }
        }
    }

    fn closure(&self, names: &[String], mut reached: BTreeSet<usize>) -> BTreeSet<usize> {
        loop {
            let before = reached.len();
            let next = self.advance_term(names, &reached);
            reached.extend(next);
            if reached.len() == before {
                return reached;
            }
        }
    }

    fn advance_term(&self, names: &[String], from: &BTreeSet<usize>) -> BTreeSet<usize> {
        match &self.term {
            Term::Name(name) => from
                .iter()
                .filter(|&&i| names.get(i) == Some(name))
                .map(|i| i + 1)
                .collect(),
            Term::Sequence(items) => items
                .iter()
                .fold(from.clone(), |reached, item| item.advance(names, &reached)),
            Term::Choice(items) => items.iter().flat_map(|item| item.advance(names, from)).collect(),
        }
    }
}

/// Content specification of an `<!ELEMENT>` (XML 1.0 §3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ContentSpec {
    Empty,
    Any,
    /// `(#PCDATA | a | b)*`: text mixed with the listed elements.
    Mixed(Vec<String>),
    Children(Particle),
}

/// Element and attribute-list declarations read so far. As with entities,
/// the first declaration of an element or of an attribute is binding.
#[derive(Debug, Default)]
pub(crate) struct Declarations {
    elements: HashMap<String, ContentSpec>,
    attributes: HashMap<String, Vec<AttributeDecl>>,
}

impl Declarations {
    pub fn declare_element(&mut self, name: String, content: ContentSpec) {
        self.elements.entry(name).or_insert(content);
    }

    pub fn declare_attribute(&mut self, element: &str, decl: AttributeDecl) {
        let list = self.attributes.entry(element.to_string()).or_default();
        if !list.iter().any(|d| d.name == decl.name) {
            list.push(decl);
        }
    }

    pub fn element(&self, name: &str) -> Option<&ContentSpec> {
        self.elements.get(name)
    }

    pub fn attributes(&self, element: &str) -> &[AttributeDecl] {
        self.attributes.get(element).map_or(&[], Vec::as_slice)
    }
}

/// Where a run of markup declarations stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubsetEnd {
    /// The `]` closing an internal subset (left unconsumed).
    Bracket,
    /// End of an external subset or parameter entity text.
    Eof,
    /// The `]]>` closing an INCLUDE section (consumed).
    Conditional,
}

/// Parses an optional `SYSTEM "uri"` or `PUBLIC "pubid" "uri"`, returning
/// `(public_id, system_id)`.
pub(crate) fn parse_external_id(
    input: &mut ParserInput<'_>,
) -> Result<Option<(Option<String>, String)>, ParseError> {
    let public_id = if input.looking_at(b"SYSTEM") {
        input.advance(6);
        None
    } else if input.looking_at(b"PUBLIC") {
        input.advance(6);
        input.skip_whitespace_required()?;
        let literal = input.parse_quoted_value()?;
        if !is_valid_public_id(&literal) {
            return Err(input.fatal(format!("invalid public id '{literal}'")));
        }
        Some(literal)
    } else {
        return Ok(None);
    };

    input.skip_whitespace_required()?;
    let system_id = input.parse_quoted_value()?;
    if !is_valid_system_literal(&system_id) {
        return Err(input.fatal(format!("invalid system literal '{system_id}'")));
    }
    Ok(Some((public_id, system_id)))
}

/// Directory that relative references inside `system_id` resolve against.
pub(crate) fn resolve_base(base: &str, system_id: &str) -> String {
    let dir = system_id.rfind('/').map_or("", |i| &system_id[..i]);
    if base.is_empty() || system_id.starts_with('/') || system_id.contains("://") {
        dir.to_string()
    } else if dir.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{dir}")
    }
}

impl XmlParser<'_> {
    /// Parses markup declarations until `end`.
    ///
    /// `internal` is set only for the literal internal subset, where
    /// parameter entity references may not occur inside declarations.
    pub(super) fn parse_subset(
        &mut self,
        input: &mut ParserInput<'_>,
        end: SubsetEnd,
        internal: bool,
        base: &str,
    ) -> Result<(), ParseError> {
        loop {
            input.skip_whitespace();
            match end {
                SubsetEnd::Bracket if input.peek() == Some(b']') => return Ok(()),
                SubsetEnd::Conditional if input.looking_at(b"]]>") => {
                    input.advance(3);
                    return Ok(());
                }
                _ => {}
            }
            if input.at_end() {
                return match end {
                    SubsetEnd::Eof => Ok(()),
                    _ => Err(input.fatal("unexpected end of input in document type declaration")),
                };
            }

            if input.looking_at(b"<!ENTITY") {
                self.parse_entity_decl(input, internal, base)?;
            } else if (input.looking_at(b"<!ELEMENT") || input.looking_at(b"<!ATTLIST"))
                && !internal
                && has_parameter_reference(input)
            {
                tracing::trace!("skipping declaration built from parameter entities");
                skip_declaration(input)?;
            } else if input.looking_at(b"<!ELEMENT") {
                self.parse_element_decl(input)?;
            } else if input.looking_at(b"<!ATTLIST") {
                self.parse_attlist_decl(input)?;
            } else if input.looking_at(b"<!NOTATION") {
                skip_declaration(input)?;
            } else if input.looking_at(b"<!--") {
                parse_comment_content(input)?;
            } else if input.looking_at(b"<?") {
                parse_pi_content(input)?;
            } else if input.looking_at(b"<![") && !internal {
                self.parse_conditional_section(input, base)?;
            } else if input.peek() == Some(b'%') {
                self.expand_parameter_entity(input, base)?;
            } else {
                return Err(input.fatal("unexpected content in document type declaration"));
            }
        }
    }

    fn parse_conditional_section(
        &mut self,
        input: &mut ParserInput<'_>,
        base: &str,
    ) -> Result<(), ParseError> {
        input.advance(3);
        input.skip_whitespace();
        if input.looking_at(b"INCLUDE") {
            input.advance(7);
            input.skip_whitespace();
            input.expect_byte(b'[')?;
            self.parse_subset(input, SubsetEnd::Conditional, false, base)
        } else if input.looking_at(b"IGNORE") {
            input.advance(6);
            input.skip_whitespace();
            input.expect_byte(b'[')?;
            let mut depth = 1u32;
            while depth > 0 {
                if input.at_end() {
                    return Err(input.fatal("unexpected end of input in IGNORE section"));
                }
                if input.looking_at(b"<![") {
                    input.advance(3);
                    depth += 1;
                } else if input.looking_at(b"]]>") {
                    input.advance(3);
                    depth -= 1;
                } else {
                    input.next_char()?;
                }
            }
            Ok(())
        } else {
            Err(input.fatal("expected INCLUDE or IGNORE"))
        }
    }

    /// Expands `%name;` between declarations by parsing its replacement
    /// text as further declarations.
    fn expand_parameter_entity(
        &mut self,
        input: &mut ParserInput<'_>,
        base: &str,
    ) -> Result<(), ParseError> {
        let location = input.location();
        input.advance(1);
        let name = input.parse_name()?;
        input.expect_byte(b';')?;
        self.count_expansion(location)?;

        let (text, text_base) = self.parameter_entity_text(&name, location, base)?;
        self.with_entity(format!("%{name};"), location, |parser| {
            let mut sub = ParserInput::new(&text);
            parser.parse_subset(&mut sub, SubsetEnd::Eof, false, &text_base)
        })
    }

    /// Returns the replacement text of a parameter entity and the base its
    /// own references resolve against.
    fn parameter_entity_text(
        &mut self,
        name: &str,
        location: crate::error::SourceLocation,
        base: &str,
    ) -> Result<(String, String), ParseError> {
        match self.entities.parameter(name).cloned() {
            Some(Entity::Internal(text)) => Ok((text, base.to_string())),
            Some(Entity::External {
                public_id,
                system_id,
                base: declared_base,
            }) => {
                let text = self
                    .load_external(&declared_base, public_id.as_deref(), &system_id)
                    .map_err(|reason| {
                        ParseError::new(
                            format!("unresolved external entity '%{name};': {reason}"),
                            location,
                        )
                    })?;
                Ok((text, resolve_base(&declared_base, &system_id)))
            }
            Some(Entity::Unparsed) | None => Err(ParseError::new(
                format!("undefined entity '%{name};'"),
                location,
            )),
        }
    }

    fn parse_entity_decl(
        &mut self,
        input: &mut ParserInput<'_>,
        internal: bool,
        base: &str,
    ) -> Result<(), ParseError> {
        input.expect_str(b"<!ENTITY")?;
        input.skip_whitespace_required()?;
        let parameter = input.peek() == Some(b'%');
        if parameter {
            input.advance(1);
            input.skip_whitespace_required()?;
        }
        let name = input.parse_name()?;
        if name.contains(':') {
            return Err(input.fatal(format!("entity name '{name}' must not contain a colon")));
        }
        input.skip_whitespace_required()?;

        let entity = if matches!(input.peek(), Some(b'"' | b'\'')) {
            Entity::Internal(self.parse_entity_value(input, internal, base)?)
        } else {
            let Some((public_id, system_id)) = parse_external_id(input)? else {
                return Err(input.fatal("expected entity value or external identifier"));
            };
            let had_ws = input.skip_whitespace();
            if input.looking_at(b"NDATA") {
                if parameter || !had_ws {
                    return Err(input.fatal("unexpected NDATA"));
                }
                input.advance(5);
                input.skip_whitespace_required()?;
                input.parse_name()?;
                Entity::Unparsed
            } else {
                Entity::External {
                    public_id,
                    system_id,
                    base: base.to_string(),
                }
            }
        };
        input.skip_whitespace();
        input.expect_byte(b'>')?;

        tracing::trace!(name = %name, parameter, "declared entity");
        self.entities.declare(name, entity, parameter);
        Ok(())
    }

    /// Parses an entity value literal: character references are expanded,
    /// general entity references are kept for expansion at use, parameter
    /// entity references are expanded (external subset only).
    fn parse_entity_value(
        &mut self,
        input: &mut ParserInput<'_>,
        internal: bool,
        base: &str,
    ) -> Result<String, ParseError> {
        let quote = input.next_byte()?;
        let mut value = String::new();
        loop {
            match input.peek() {
                None => return Err(input.fatal("unexpected end of input in entity value")),
                Some(b) if b == quote => {
                    input.advance(1);
                    return Ok(value);
                }
                Some(b'&') if input.peek_at(1) == Some(b'#') => {
                    input.advance(2);
                    value.push(input.parse_char_ref()?);
                }
                Some(b'&') => {
                    input.advance(1);
                    let name = input.parse_name()?;
                    input.expect_byte(b';')?;
                    value.push('&');
                    value.push_str(&name);
                    value.push(';');
                }
                Some(b'%') => {
                    if internal {
                        return Err(input.fatal(
                            "parameter entity reference not allowed within a declaration in the internal subset",
                        ));
                    }
                    let location = input.location();
                    input.advance(1);
                    let name = input.parse_name()?;
                    input.expect_byte(b';')?;
                    self.count_expansion(location)?;
                    let (text, _) = self.parameter_entity_text(&name, location, base)?;
                    value.push_str(&text);
                }
                Some(_) => value.push(input.next_char()?),
            }
        }
    }
}

impl XmlParser<'_> {
    /// `<!ELEMENT name contentspec>` (XML 1.0 §3.2 [45]).
    fn parse_element_decl(&mut self, input: &mut ParserInput<'_>) -> Result<(), ParseError> {
        input.expect_str(b"<!ELEMENT")?;
        input.skip_whitespace_required()?;
        let name = input.parse_name()?;
        input.skip_whitespace_required()?;
        let content = if input.looking_at(b"EMPTY") {
            input.advance(5);
            ContentSpec::Empty
        } else if input.looking_at(b"ANY") {
            input.advance(3);
            ContentSpec::Any
        } else if input.peek() == Some(b'(') {
            input.advance(1);
            parse_content_model(input, self.options.max_depth)?
        } else {
            return Err(input.fatal(format!("invalid content specification for <{name}>")));
        };
        input.skip_whitespace();
        input.expect_byte(b'>')?;

        tracing::trace!(name = %name, "declared element");
        self.declarations.declare_element(name, content);
        Ok(())
    }

    /// `<!ATTLIST element AttDef*>` (XML 1.0 §3.3 [52]).
    fn parse_attlist_decl(&mut self, input: &mut ParserInput<'_>) -> Result<(), ParseError> {
        input.expect_str(b"<!ATTLIST")?;
        input.skip_whitespace_required()?;
        let element = input.parse_name()?;
        loop {
            let had_ws = input.skip_whitespace();
            if input.peek() == Some(b'>') {
                input.advance(1);
                return Ok(());
            }
            if !had_ws {
                return Err(input.fatal("whitespace required in attribute-list declaration"));
            }
            let name = input.parse_name()?;
            input.skip_whitespace_required()?;
            let kind = parse_attribute_type(input)?;
            input.skip_whitespace_required()?;

            let default = if input.looking_at(b"#REQUIRED") {
                input.advance(9);
                AttributeDefault::Required
            } else if input.looking_at(b"#IMPLIED") {
                input.advance(8);
                AttributeDefault::Implied
            } else {
                let fixed = input.looking_at(b"#FIXED");
                if fixed {
                    input.advance(6);
                    input.skip_whitespace_required()?;
                }
                let mut value = self.parse_attribute_value(input)?;
                if kind.is_tokenized() {
                    value = collapse_spaces(&value);
                }
                if fixed {
                    AttributeDefault::Fixed(value)
                } else {
                    AttributeDefault::Value(value)
                }
            };

            tracing::trace!(element = %element, name = %name, "declared attribute");
            self.declarations
                .declare_attribute(&element, AttributeDecl { name, kind, default });
        }
    }
}

/// Drops leading, trailing and repeated spaces from a tokenized value.
pub(crate) fn collapse_spaces(value: &str) -> String {
    value
        .split(' ')
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `Nmtoken` (XML 1.0 §2.3 [7]).
fn parse_nmtoken(input: &mut ParserInput<'_>) -> Result<String, ParseError> {
    let start = input.pos();
    while let Some(c) = input.peek_char() {
        if !is_name_char(c as u32) {
            break;
        }
        input.advance_char(c);
    }
    if input.pos() == start {
        return Err(input.fatal("expected name token"));
    }
    Ok(input.slice_str(start, input.pos()).to_string())
}

/// `( tok | tok ... )`, with the opening parenthesis already consumed.
fn parse_token_list(
    input: &mut ParserInput<'_>,
    token: fn(&mut ParserInput<'_>) -> Result<String, ParseError>,
) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    loop {
        input.skip_whitespace();
        tokens.push(token(input)?);
        input.skip_whitespace();
        match input.next_byte()? {
            b'|' => {}
            b')' => return Ok(tokens),
            _ => return Err(input.fatal("expected '|' or ')' in enumeration")),
        }
    }
}

/// `AttType` (XML 1.0 §3.3.1 [54]).
fn parse_attribute_type(input: &mut ParserInput<'_>) -> Result<AttributeType, ParseError> {
    if input.peek() == Some(b'(') {
        input.advance(1);
        return Ok(AttributeType::Enumeration(parse_token_list(input, parse_nmtoken)?));
    }
    let keyword = input.parse_name()?;
    Ok(match keyword.as_str() {
        "CDATA" => AttributeType::CData,
        "ID" => AttributeType::Id,
        "IDREF" => AttributeType::IdRef,
        "IDREFS" => AttributeType::IdRefs,
        "ENTITY" => AttributeType::Entity,
        "ENTITIES" => AttributeType::Entities,
        "NMTOKEN" => AttributeType::NmToken,
        "NMTOKENS" => AttributeType::NmTokens,
        "NOTATION" => {
            input.skip_whitespace_required()?;
            input.expect_byte(b'(')?;
            AttributeType::Notation(parse_token_list(input, |input| input.parse_name())?)
        }
        other => return Err(input.fatal(format!("unknown attribute type '{other}'"))),
    })
}

fn parse_repeat(input: &mut ParserInput<'_>) -> Repeat {
    let repeat = match input.peek() {
        Some(b'?') => Repeat::Optional,
        Some(b'*') => Repeat::ZeroOrMore,
        Some(b'+') => Repeat::OneOrMore,
        _ => return Repeat::Once,
    };
    input.advance(1);
    repeat
}

/// A content model after its opening parenthesis: mixed content
/// (XML 1.0 §3.2.2 [51]) or a children model ([47]).
fn parse_content_model(input: &mut ParserInput<'_>, max_depth: u32) -> Result<ContentSpec, ParseError> {
    input.skip_whitespace();
    if !input.looking_at(b"#PCDATA") {
        return Ok(ContentSpec::Children(parse_group(input, 1, max_depth)?));
    }
    input.advance(7);
    let mut names = Vec::new();
    loop {
        input.skip_whitespace();
        match input.next_byte()? {
            b'|' => {
                input.skip_whitespace();
                names.push(input.parse_name()?);
            }
            b')' => break,
            _ => return Err(input.fatal("expected '|' or ')' in mixed content declaration")),
        }
    }
    if input.peek() == Some(b'*') {
        input.advance(1);
    } else if !names.is_empty() {
        return Err(input.fatal("mixed content with element names must end in ')*'"));
    }
    Ok(ContentSpec::Mixed(names))
}

/// A `choice` or `seq` group after its opening parenthesis, with its
/// repeat suffix.
fn parse_group(input: &mut ParserInput<'_>, depth: u32, max_depth: u32) -> Result<Particle, ParseError> {
    if depth > max_depth {
        return Err(input.fatal(format!("content model nested too deeply ({max_depth})")));
    }
    let mut items = Vec::new();
    let mut separator = None;
    loop {
        input.skip_whitespace();
        let item = if input.peek() == Some(b'(') {
            input.advance(1);
            parse_group(input, depth + 1, max_depth)?
        } else {
            let name = input.parse_name()?;
            Particle {
                term: Term::Name(name),
                repeat: parse_repeat(input),
            }
        };
        items.push(item);
        input.skip_whitespace();
        match input.next_byte()? {
            b')' => break,
            sep @ (b',' | b'|') => match separator {
                Some(seen) if seen != sep => {
                    return Err(input.fatal("cannot mix ',' and '|' in one content group"))
                }
                _ => separator = Some(sep),
            },
            _ => return Err(input.fatal("expected ',', '|' or ')' in content model")),
        }
    }
    let term = if separator == Some(b'|') {
        Term::Choice(items)
    } else {
        Term::Sequence(items)
    };
    Ok(Particle {
        term,
        repeat: parse_repeat(input),
    })
}

/// Looks ahead to the end of the declaration at `input` for a `%` outside
/// quoted literals.
fn has_parameter_reference(input: &ParserInput<'_>) -> bool {
    let mut quote = None;
    let mut offset = 0;
    while let Some(c) = input.peek_at(offset) {
        match (quote, c) {
            (None, b'>') => return false,
            (None, b'%') => return true,
            (None, b'"' | b'\'') => quote = Some(c),
            (Some(q), _) if q == c => quote = None,
            _ => {}
        }
        offset += 1;
    }
    false
}

/// Skips an ELEMENT, ATTLIST or NOTATION declaration.
fn skip_declaration(input: &mut ParserInput<'_>) -> Result<(), ParseError> {
    let mut quote = None;
    loop {
        let c = input
            .peek()
            .ok_or_else(|| input.fatal("unexpected end of input in markup declaration"))?;
        match (quote, c) {
            (None, b'>') => {
                input.advance(1);
                return Ok(());
            }
            (None, b'"' | b'\'') => quote = Some(c),
            (Some(q), _) if q == c => quote = None,
            _ => {}
        }
        input.next_char()?;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::ParseOptions;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_external_id() {
        let mut input = ParserInput::new("SYSTEM \"a.dtd\"");
        assert_eq!(
            parse_external_id(&mut input).unwrap(),
            Some((None, "a.dtd".to_string()))
        );

        let mut input = ParserInput::new("PUBLIC \"-//A//B\" 'b.dtd'");
        assert_eq!(
            parse_external_id(&mut input).unwrap(),
            Some((Some("-//A//B".to_string()), "b.dtd".to_string()))
        );

        let mut input = ParserInput::new("[");
        assert_eq!(parse_external_id(&mut input).unwrap(), None);
    }

    #[test]
    fn test_external_id_validation() {
        let mut input = ParserInput::new("PUBLIC \"caf\u{e9}\" \"a\"");
        assert!(parse_external_id(&mut input)
            .unwrap_err()
            .message
            .starts_with("invalid public id"));

        let mut input = ParserInput::new("SYSTEM \"a b\"");
        assert!(parse_external_id(&mut input)
            .unwrap_err()
            .message
            .starts_with("invalid system literal"));
    }

    #[test]
    fn test_resolve_base() {
        assert_eq!(resolve_base("", "dtd/a.dtd"), "dtd");
        assert_eq!(resolve_base("docs", "dtd/a.dtd"), "docs/dtd");
        assert_eq!(resolve_base("docs", "a.dtd"), "docs");
        assert_eq!(resolve_base("docs", "/abs/a.dtd"), "/abs");
        assert_eq!(resolve_base("docs", "http://x.org/a.dtd"), "http://x.org");
    }

    #[test]
    fn test_first_declaration_wins() {
        let mut table = EntityTable::default();
        table.declare("e".to_string(), Entity::Internal("one".to_string()), false);
        table.declare("e".to_string(), Entity::Internal("two".to_string()), false);
        assert_eq!(table.general("e"), Some(&Entity::Internal("one".to_string())));
        assert_eq!(table.parameter("e"), None);
    }

    fn model(text: &str) -> ContentSpec {
        let mut input = ParserInput::new(text);
        input.expect_byte(b'(').unwrap();
        parse_content_model(&mut input, 16).unwrap()
    }

    fn accepts(spec: &ContentSpec, children: &str) -> bool {
        let names: Vec<String> = children.split_whitespace().map(str::to_string).collect();
        match spec {
            ContentSpec::Children(particle) => particle.matches(&names),
            other => panic!("not a children model: {other:?}"),
        }
    }

    #[test]
    fn test_content_model_matching() {
        let spec = model("(head, (p | list)*, foot?)");
        assert!(accepts(&spec, "head"));
        assert!(accepts(&spec, "head p list p foot"));
        assert!(!accepts(&spec, "p head"));
        assert!(!accepts(&spec, "head foot foot"));

        let spec = model("((a, b)+ | c)");
        assert!(accepts(&spec, "a b a b"));
        assert!(accepts(&spec, "c"));
        assert!(!accepts(&spec, "a b c"));
        assert!(!accepts(&spec, ""));

        // Nullable items inside a starred group must not loop forever.
        let spec = model("(a?, b*)*");
        assert!(accepts(&spec, ""));
        assert!(accepts(&spec, "b a b b a"));
    }

    #[test]
    fn test_mixed_and_malformed_models() {
        assert_eq!(model("(#PCDATA)"), ContentSpec::Mixed(Vec::new()));
        assert_eq!(
            model("( #PCDATA | em | b )*"),
            ContentSpec::Mixed(vec!["em".to_string(), "b".to_string()])
        );
        for bad in ["(#PCDATA | em)", "(a, b | c)", "(a"] {
            let mut input = ParserInput::new(bad);
            input.advance(1);
            assert!(parse_content_model(&mut input, 16).is_err(), "accepted {bad:?}");
        }
        let mut input = ParserInput::new("((((a))))");
        input.advance(1);
        assert!(parse_content_model(&mut input, 3)
            .unwrap_err()
            .message
            .contains("nested too deeply"));
    }

    #[test]
    fn test_attlist_declarations() {
        let options = ParseOptions::default();
        let mut parser = XmlParser::new(&options);
        let mut input = ParserInput::new(
            "<!ATTLIST e a CDATA #IMPLIED b (x|y) 'x' c NMTOKENS #FIXED ' p  q '>\
             <!ATTLIST e a ID #REQUIRED n NOTATION (gif) #IMPLIED>",
        );
        parser.parse_subset(&mut input, SubsetEnd::Eof, true, "").unwrap();
        let decls = parser.declarations.attributes("e");
        let summary: Vec<_> = decls.iter().map(|d| (d.name.as_str(), &d.kind, &d.default)).collect();
        assert_eq!(
            summary,
            vec![
                ("a", &AttributeType::CData, &AttributeDefault::Implied),
                (
                    "b",
                    &AttributeType::Enumeration(vec!["x".into(), "y".into()]),
                    &AttributeDefault::Value("x".into())
                ),
                ("c", &AttributeType::NmTokens, &AttributeDefault::Fixed("p q".into())),
                (
                    "n",
                    &AttributeType::Notation(vec!["gif".into()]),
                    &AttributeDefault::Implied
                ),
            ]
        );
    }

    #[test]
    fn test_parameter_entities_inside_external_declarations_are_skipped() {
        let options = ParseOptions::default();
        let mut parser = XmlParser::new(&options);
        let mut input = ParserInput::new(
            "<!ENTITY % t 'CDATA'><!ATTLIST e a %t; 'v'><!ATTLIST e b CDATA '%'><!ELEMENT e ANY>",
        );
        parser.parse_subset(&mut input, SubsetEnd::Eof, false, "").unwrap();
        let names: Vec<_> = parser.declarations.attributes("e").iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["b"]);
        assert_eq!(parser.declarations.element("e"), Some(&ContentSpec::Any));
    }

    #[test]
    fn test_skip_declaration_honours_quotes() {
        let mut input = ParserInput::new("<!ATTLIST a b CDATA \"x>y\">rest");
        skip_declaration(&mut input).unwrap();
        assert!(input.looking_at(b"rest"));
    }
}
