//! DTD attribute defaults and validity checks.
//!
//! Attribute defaults from `<!ATTLIST>` are inserted into every start tag
//! and declared tokenized values are normalized, validating or not. With
//! [`ParseOptions::validate`](super::ParseOptions::validate) the parser
//! also enforces the validity constraints of XML 1.0: declared elements
//! and attributes, content models, `#REQUIRED` and `#FIXED` attributes,
//! attribute types and `ID`/`IDREF` integrity. The first violation fails
//! the parse.

use crate::chars::{is_name_char, is_valid_name, is_xml_space};
use crate::error::{ParseError, SourceLocation};
use crate::tree::{Attribute, NodeId, NodeKind};

use super::dtd::{collapse_spaces, AttributeDecl, AttributeDefault, AttributeType, ContentSpec, Entity};
use super::xml::XmlParser;

fn invalid(message: String, location: SourceLocation) -> ParseError {
    ParseError::new(format!("validity error: {message}"), location)
}

fn is_nmtoken(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| is_name_char(c as u32))
}

impl XmlParser<'_> {
    /// Normalizes declared attributes of `element` and adds the defaulted
    /// ones that are missing, then checks them when validating.
    pub(super) fn apply_attribute_declarations(
        &mut self,
        element: &str,
        attributes: &mut Vec<Attribute>,
        location: SourceLocation,
    ) -> Result<(), ParseError> {
        let decls = self.declarations.attributes(element);
        if decls.is_empty() && !self.options.validate {
            return Ok(());
        }

        for decl in decls {
            match attributes.iter_mut().find(|a| a.has_name(&decl.name)) {
                Some(attr) => {
                    if decl.kind.is_tokenized() {
                        attr.value = collapse_spaces(&attr.value);
                    }
                }
                None => match decl.default.value() {
                    Some(value) => attributes.push(Attribute::new(decl.name.as_str(), value)),
                    None if decl.default == AttributeDefault::Required => {
                        if self.options.validate {
                            return Err(invalid(
                                format!(
                                    "required attribute '{}' missing on element '{element}'",
                                    decl.name
                                ),
                                location,
                            ));
                        }
                        tracing::debug!(element, attribute = %decl.name, "required attribute missing");
                    }
                    None => {}
                },
            }
        }

        if !self.options.validate {
            return Ok(());
        }
        let decls = self.declarations.attributes(element).to_vec();
        for attr in attributes.iter().filter(|a| !a.is_namespace_decl()) {
            let name = attr.qualified_name();
            let Some(decl) = decls.iter().find(|d| d.name == name) else {
                return Err(invalid(
                    format!("attribute '{name}' on element '{element}' is not declared in the DTD"),
                    location,
                ));
            };
            self.check_attribute_value(element, decl, &attr.value, location)?;
        }
        Ok(())
    }

    fn check_attribute_value(
        &mut self,
        element: &str,
        decl: &AttributeDecl,
        value: &str,
        location: SourceLocation,
    ) -> Result<(), ParseError> {
        let bad_value = |kind: &str| {
            invalid(
                format!(
                    "attribute '{}' on element '{element}' is not a valid {kind}: '{value}'",
                    decl.name
                ),
                location,
            )
        };

        if let AttributeDefault::Fixed(fixed) = &decl.default {
            if value != fixed {
                return Err(invalid(
                    format!(
                        "attribute '{}' on element '{element}' must have fixed value '{fixed}', found '{value}'",
                        decl.name
                    ),
                    location,
                ));
            }
        }

        match &decl.kind {
            AttributeType::CData => {}
            AttributeType::Id => {
                if !is_valid_name(value) {
                    return Err(bad_value("ID"));
                }
                if !self.ids.insert(value.to_string()) {
                    return Err(invalid(format!("duplicate ID '{value}'"), location));
                }
            }
            AttributeType::IdRef => {
                if !is_valid_name(value) {
                    return Err(bad_value("IDREF"));
                }
                self.idrefs.push((value.to_string(), location));
            }
            AttributeType::IdRefs => {
                if value.is_empty() || !value.split(' ').all(is_valid_name) {
                    return Err(bad_value("IDREFS"));
                }
                self.idrefs
                    .extend(value.split(' ').map(|id| (id.to_string(), location)));
            }
            AttributeType::NmToken => {
                if !is_nmtoken(value) {
                    return Err(bad_value("NMTOKEN"));
                }
            }
            AttributeType::NmTokens => {
                if value.is_empty() || !value.split(' ').all(is_nmtoken) {
                    return Err(bad_value("NMTOKENS"));
                }
            }
            AttributeType::Entity | AttributeType::Entities => {
                let unparsed = |name: &str| matches!(self.entities.general(name), Some(Entity::Unparsed));
                if value.is_empty() || !value.split(' ').all(unparsed) {
                    return Err(bad_value("unparsed entity name"));
                }
            }
            AttributeType::Enumeration(allowed) | AttributeType::Notation(allowed) => {
                if !allowed.iter().any(|a| a == value) {
                    return Err(invalid(
                        format!(
                            "attribute '{}' on element '{element}' must be one of ({}), found '{value}'",
                            decl.name,
                            allowed.join("|")
                        ),
                        location,
                    ));
                }
            }
        }
        Ok(())
    }

    /// Checks that `qname` is declared and, for the root element, that it
    /// matches the DOCTYPE.
    pub(super) fn check_element_declared(
        &self,
        qname: &str,
        location: SourceLocation,
    ) -> Result<(), ParseError> {
        if !self.options.validate {
            return Ok(());
        }
        if self.at_root() {
            let Some(doctype) = self.doctype() else {
                return Err(invalid("no document type declaration to validate against".into(), location));
            };
            if doctype.root != qname {
                return Err(invalid(
                    format!("root element '{qname}' does not match DOCTYPE name '{}'", doctype.root),
                    location,
                ));
            }
        }
        if self.declarations.element(qname).is_none() {
            return Err(invalid(format!("element '{qname}' is not declared in the DTD"), location));
        }
        Ok(())
    }

    /// Checks the children of a just-closed element against its content
    /// model.
    pub(super) fn check_content(
        &self,
        id: NodeId,
        qname: &str,
        location: SourceLocation,
    ) -> Result<(), ParseError> {
        if !self.options.validate {
            return Ok(());
        }
        let Some(spec) = self.declarations.element(qname) else {
            return Ok(());
        };
        let doc = self.document();

        let mut names = Vec::new();
        let mut has_text = false;
        for child in doc.children(id) {
            match doc.kind(child) {
                NodeKind::Element { .. } => names.push(doc.qualified_name(child).unwrap_or_default()),
                NodeKind::Text { content } => has_text |= !content.chars().all(is_xml_space),
                NodeKind::CData { .. } => has_text = true,
                NodeKind::Comment { .. } | NodeKind::ProcessingInstruction { .. } | NodeKind::Document => {}
            }
        }

        match spec {
            ContentSpec::Any => Ok(()),
            ContentSpec::Empty if doc.first_child(id).is_none() => Ok(()),
            ContentSpec::Empty => Err(invalid(
                format!("element '{qname}' is declared EMPTY but has content"),
                location,
            )),
            ContentSpec::Mixed(allowed) => match names.iter().find(|n| !allowed.contains(n)) {
                None => Ok(()),
                Some(name) => Err(invalid(
                    format!("element '{name}' is not allowed in mixed content of '{qname}'"),
                    location,
                )),
            },
            ContentSpec::Children(_) if has_text => Err(invalid(
                format!("element '{qname}' has element-only content model but contains text"),
                location,
            )),
            ContentSpec::Children(model) if model.matches(&names) => Ok(()),
            ContentSpec::Children(_) => Err(invalid(
                format!(
                    "element '{qname}' content does not match its declaration; found children: [{}]",
                    names.join(", ")
                ),
                location,
            )),
        }
    }

    /// Every `IDREF` must name an `ID` somewhere in the document.
    pub(super) fn check_idrefs(&self) -> Result<(), ParseError> {
        match self.idrefs.iter().find(|(id, _)| !self.ids.contains(id)) {
            None => Ok(()),
            Some((id, location)) => Err(invalid(
                format!("IDREF '{id}' does not match any ID in the document"),
                *location,
            )),
        }
    }
}
