use serde::de::{self, DeserializeSeed, IntoDeserializer, Visitor};

use super::{parse_float, Error};
use crate::chars::is_xml_space;
use crate::tree::{Document, NodeId};

/// Where a value is read from.
enum Source {
    /// A single element.
    Element(NodeId),
    /// Repeated siblings of the same name, read as a sequence.
    Elements(Vec<NodeId>),
    /// An attribute value or the text content of an element. `owner` names
    /// the element or attribute for error messages.
    Text { owner: String, value: String },
}

pub(crate) struct ElementDeserializer<'d> {
    doc: &'d Document,
    source: Source,
}

impl<'d> ElementDeserializer<'d> {
    pub(crate) fn new(doc: &'d Document, element: NodeId) -> Self {
        Self {
            doc,
            source: Source::Element(element),
        }
    }

    fn with(doc: &'d Document, source: Source) -> Self {
        Self { doc, source }
    }

    fn owner(&self) -> String {
        match &self.source {
            Source::Element(id) => self.doc.qualified_name(*id).unwrap_or_default(),
            Source::Elements(ids) => ids
                .first()
                .and_then(|&id| self.doc.qualified_name(id))
                .unwrap_or_default(),
            Source::Text { owner, .. } => owner.clone(),
        }
    }

    fn text(&self) -> Result<String, Error> {
        match &self.source {
            Source::Element(id) => Ok(self.doc.text_content(*id)),
            Source::Elements(ids) => Err(Error::Shape(format!(
                "expected a single <{}>, found {}",
                self.owner(),
                ids.len()
            ))),
            Source::Text { value, .. } => Ok(value.clone()),
        }
    }

    fn parse<T: std::str::FromStr>(&self, expected: &'static str) -> Result<T, Error> {
        let text = self.text()?;
        text.trim_matches(is_xml_space)
            .parse()
            .map_err(|_| self.invalid(text.clone(), expected))
    }

    fn invalid(&self, text: String, expected: &'static str) -> Error {
        Error::InvalidValue {
            element: self.owner(),
            text,
            expected,
        }
    }

    fn items(self) -> SeqReader<'d> {
        let doc = self.doc;
        let items = match self.source {
            Source::Element(id) => vec![Source::Element(id)],
            Source::Elements(ids) => ids.into_iter().map(Source::Element).collect(),
            // Attribute lists such as `xs:IDREFS` are whitespace-separated.
            Source::Text { owner, value } => value
                .split(is_xml_space)
                .filter(|t| !t.is_empty())
                .map(|t| Source::Text {
                    owner: owner.clone(),
                    value: t.to_string(),
                })
                .collect(),
        };
        SeqReader {
            doc,
            items: items.into_iter(),
        }
    }
}

macro_rules! deserialize_parsed {
    ($($method:ident => $visit:ident($ty:ty),)*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
            visitor.$visit(self.parse::<$ty>(stringify!($ty))?)
        }
    )*};
}

impl<'de> de::Deserializer<'de> for ElementDeserializer<'_> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let element = match self.source {
            Source::Element(id) => id,
            Source::Elements(_) => return self.deserialize_seq(visitor),
            Source::Text { value, .. } => return visitor.visit_string(value),
        };
        let doc = self.doc;
        let has_structure = doc.child_elements(element).next().is_some()
            || doc.attributes(element).iter().any(|a| !a.is_namespace_decl());
        if has_structure {
            self.deserialize_map(visitor)
        } else {
            visitor.visit_string(doc.text_content(element))
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let text = self.text()?;
        match text.trim_matches(is_xml_space) {
            "true" | "1" => visitor.visit_bool(true),
            "false" | "0" => visitor.visit_bool(false),
            _ => Err(self.invalid(text, "bool")),
        }
    }

    deserialize_parsed! {
        deserialize_i8 => visit_i8(i8),
        deserialize_i16 => visit_i16(i16),
        deserialize_i32 => visit_i32(i32),
        deserialize_i64 => visit_i64(i64),
        deserialize_i128 => visit_i128(i128),
        deserialize_u8 => visit_u8(u8),
        deserialize_u16 => visit_u16(u16),
        deserialize_u32 => visit_u32(u32),
        deserialize_u64 => visit_u64(u64),
        deserialize_u128 => visit_u128(u128),
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let text = self.text()?;
        #[allow(clippy::cast_possible_truncation)]
        match parse_float(text.trim_matches(is_xml_space)) {
            Some(v) => visitor.visit_f32(v as f32),
            None => Err(self.invalid(text, "f32")),
        }
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let text = self.text()?;
        match parse_float(text.trim_matches(is_xml_space)) {
            Some(v) => visitor.visit_f64(v),
            None => Err(self.invalid(text, "f64")),
        }
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let text = self.text()?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(self.invalid(text, "char")),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_string(self.text()?)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_string(self.text()?)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_byte_buf(self.text()?.into_bytes())
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        // Absent fields never reach here; presence means `Some`.
        visitor.visit_some(self)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_seq(self.items())
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let Source::Element(id) = self.source else {
            return Err(Error::Shape(format!(
                "expected an element for a map, found {}",
                self.owner()
            )));
        };
        let doc = self.doc;
        let mut entries = Vec::new();
        for attr in doc.attributes(id).iter().filter(|a| !a.is_namespace_decl()) {
            let key = format!("@{}", attr.qualified_name());
            entries.push((
                key.clone(),
                Source::Text {
                    owner: key,
                    value: attr.value.clone(),
                },
            ));
        }
        for child in doc.child_elements(id) {
            let key = doc.local_name(child).unwrap_or_default().to_string();
            entries.push((key, Source::Element(child)));
        }
        visitor.visit_map(MapReader {
            doc,
            entries: entries.into_iter(),
            pending: None,
        })
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        let Source::Element(id) = self.source else {
            return Err(Error::Shape(format!(
                "expected a single <{}> element for a struct",
                self.owner()
            )));
        };
        let doc = self.doc;
        let mut entries = Vec::new();
        for &field in fields {
            if let Some(attr) = field.strip_prefix('@') {
                if let Some(value) = doc.get_attribute(id, attr) {
                    entries.push((
                        field.to_string(),
                        Source::Text {
                            owner: field.to_string(),
                            value: value.to_string(),
                        },
                    ));
                }
            } else if field == "$value" {
                entries.push((
                    field.to_string(),
                    Source::Text {
                        owner: doc.qualified_name(id).unwrap_or_default(),
                        value: doc.content(id),
                    },
                ));
            } else {
                let matching: Vec<NodeId> = doc
                    .child_elements(id)
                    .filter(|&c| doc.local_name(c) == Some(field))
                    .collect();
                match matching.len() {
                    0 => {}
                    1 => entries.push((field.to_string(), Source::Element(matching[0]))),
                    _ => entries.push((field.to_string(), Source::Elements(matching))),
                }
            }
        }
        visitor.visit_map(MapReader {
            doc,
            entries: entries.into_iter(),
            pending: None,
        })
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        let doc = self.doc;
        let (variant, content) = match &self.source {
            Source::Element(id) => match doc.child_elements(*id).next() {
                Some(child) => (
                    doc.local_name(child).unwrap_or_default().to_string(),
                    Some(*id),
                ),
                None => (doc.text_content(*id).trim_matches(is_xml_space).to_string(), None),
            },
            Source::Text { value, .. } => (value.trim_matches(is_xml_space).to_string(), None),
            Source::Elements(ids) => {
                return Err(Error::Shape(format!(
                    "expected a single <{}> for an enum, found {}",
                    self.owner(),
                    ids.len()
                )))
            }
        };
        visitor.visit_enum(EnumReader {
            doc,
            variant,
            container: content,
        })
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_unit()
    }
}

struct SeqReader<'d> {
    doc: &'d Document,
    items: std::vec::IntoIter<Source>,
}

impl<'de> de::SeqAccess<'de> for SeqReader<'_> {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Error> {
        match self.items.next() {
            Some(source) => seed
                .deserialize(ElementDeserializer::with(self.doc, source))
                .map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

struct MapReader<'d> {
    doc: &'d Document,
    entries: std::vec::IntoIter<(String, Source)>,
    pending: Option<Source>,
}

impl<'de> de::MapAccess<'de> for MapReader<'_> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, Error> {
        match self.entries.next() {
            Some((key, source)) => {
                self.pending = Some(source);
                seed.deserialize(key.into_deserializer()).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Error> {
        let source = self
            .pending
            .take()
            .ok_or_else(|| Error::Message("map value requested before its key".to_string()))?;
        seed.deserialize(ElementDeserializer::with(self.doc, source))
    }
}

/// A variant name plus, for non-unit variants, the element whose first
/// child element holds the variant content.
struct EnumReader<'d> {
    doc: &'d Document,
    variant: String,
    container: Option<NodeId>,
}

impl<'de, 'd> de::EnumAccess<'de> for EnumReader<'d> {
    type Error = Error;
    type Variant = VariantReader<'d>;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self::Variant), Error> {
        let key: de::value::StringDeserializer<Error> = self.variant.clone().into_deserializer();
        let value = seed.deserialize(key)?;
        Ok((
            value,
            VariantReader {
                doc: self.doc,
                variant: self.variant,
                container: self.container,
            },
        ))
    }
}

struct VariantReader<'d> {
    doc: &'d Document,
    variant: String,
    container: Option<NodeId>,
}

impl VariantReader<'_> {
    fn content(&self) -> Result<Vec<NodeId>, Error> {
        let container = self.container.ok_or_else(|| {
            Error::Shape(format!("variant '{}' needs element content", self.variant))
        })?;
        Ok(self
            .doc
            .child_elements(container)
            .filter(|&c| self.doc.local_name(c) == Some(self.variant.as_str()))
            .collect())
    }
}

impl<'de> de::VariantAccess<'de> for VariantReader<'_> {
    type Error = Error;

    fn unit_variant(self) -> Result<(), Error> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value, Error> {
        let element = self.content()?.first().copied().ok_or_else(|| {
            Error::Shape(format!("missing <{}> for newtype variant", self.variant))
        })?;
        seed.deserialize(ElementDeserializer::new(self.doc, element))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, Error> {
        let items = self.content()?;
        de::Deserializer::deserialize_seq(
            ElementDeserializer::with(self.doc, Source::Elements(items)),
            visitor,
        )
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        let element = self.content()?.first().copied().ok_or_else(|| {
            Error::Shape(format!("missing <{}> for struct variant", self.variant))
        })?;
        de::Deserializer::deserialize_struct(
            ElementDeserializer::new(self.doc, element),
            "",
            fields,
            visitor,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::bridge::from_element;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    fn read<T: serde::de::DeserializeOwned>(xml: &str) -> Result<T, Error> {
        let doc = Document::parse_str(xml).unwrap();
        from_element(&doc, doc.root_element().unwrap())
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Person {
        #[serde(rename = "@id")]
        id: u32,
        firstname: String,
        lastname: String,
        nickname: Option<String>,
        #[serde(default)]
        phone: Vec<String>,
    }

    #[test]
    fn test_struct() {
        let person: Person = read(
            "<person id=' 3 '><firstname>John</firstname><extra/>\
             <lastname>Doe</lastname><phone>1</phone><phone>2</phone></person>",
        )
        .unwrap();
        assert_eq!(
            person,
            Person {
                id: 3,
                firstname: "John".to_string(),
                lastname: "Doe".to_string(),
                nickname: None,
                phone: vec!["1".to_string(), "2".to_string()],
            }
        );
    }

    #[test]
    fn test_single_item_sequence() {
        let person: Person =
            read("<p id='1'><firstname>a</firstname><lastname>b</lastname><phone>9</phone></p>")
                .unwrap();
        assert_eq!(person.phone, vec!["9".to_string()]);
    }

    #[test]
    fn test_missing_field() {
        let err = read::<Person>("<p id='1'><firstname>a</firstname></p>").unwrap_err();
        assert_eq!(err, Error::Message("missing field `lastname`".to_string()));
    }

    #[test]
    fn test_invalid_leaf() {
        #[derive(Debug, Deserialize)]
        struct Age {
            #[allow(dead_code)]
            years: u8,
        }
        let err = read::<Age>("<age><years>old</years></age>").unwrap_err();
        assert_eq!(
            err,
            Error::InvalidValue {
                element: "years".to_string(),
                text: "old".to_string(),
                expected: "u8",
            }
        );
    }

    #[test]
    fn test_scalar_given_repeated_elements() {
        #[derive(Debug, Deserialize)]
        struct One {
            #[allow(dead_code)]
            name: String,
        }
        let err = read::<One>("<x><name>a</name><name>b</name></x>").unwrap_err();
        assert_eq!(err, Error::Shape("expected a single <name>, found 2".to_string()));
    }

    #[test]
    fn test_value_and_floats() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Reading {
            #[serde(rename = "@unit")]
            unit: String,
            #[serde(rename = "$value")]
            value: f64,
        }
        let r: Reading = read("<r unit='C'>-INF</r>").unwrap();
        assert_eq!(r.value, f64::NEG_INFINITY);
        assert_eq!(r.unit, "C");
    }

    #[test]
    fn test_enums() {
        #[derive(Debug, PartialEq, Deserialize)]
        enum Shape {
            Empty,
            Circle(f64),
            Rect { w: u32, h: u32 },
        }
        assert_eq!(read::<Shape>("<s>Empty</s>").unwrap(), Shape::Empty);
        assert_eq!(read::<Shape>("<s><Circle>1.5</Circle></s>").unwrap(), Shape::Circle(1.5));
        assert_eq!(
            read::<Shape>("<s><Rect><h>3</h><w>2</w></Rect></s>").unwrap(),
            Shape::Rect { w: 2, h: 3 }
        );
    }

    #[test]
    fn test_map() {
        let map: BTreeMap<String, String> = read("<m k='v'><a>1</a><b>2</b></m>").unwrap();
        let expected: BTreeMap<String, String> = [("@k", "v"), ("a", "1"), ("b", "2")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(map, expected);
    }

    #[test]
    fn test_attribute_list() {
        #[derive(Debug, Deserialize)]
        struct Refs {
            #[serde(rename = "@to")]
            to: Vec<u32>,
        }
        let refs: Refs = read("<r to='1 2  3'/>").unwrap();
        assert_eq!(refs.to, vec![1, 2, 3]);
    }

    #[test]
    fn test_bool_and_char() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Flags {
            on: bool,
            off: bool,
            letter: char,
        }
        let flags: Flags = read("<f><on>true</on><off>0</off><letter>é</letter></f>").unwrap();
        assert_eq!(
            flags,
            Flags {
                on: true,
                off: false,
                letter: 'é'
            }
        );
    }
}
