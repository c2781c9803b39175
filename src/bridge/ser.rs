use serde::ser::{self, Impossible, Serialize};

use super::{format_float, Error};
use crate::tree::{Document, NodeId};

/// Serializes one value as element(s) called `name` under `parent`.
///
/// `@name` targets an attribute of `parent` and `$value` the text of
/// `parent`; both only accept leaves.
pub(crate) struct ElementSerializer<'a, 'n> {
    doc: &'a mut Document,
    parent: NodeId,
    name: &'n str,
    top_level: bool,
}

impl<'a, 'n> ElementSerializer<'a, 'n> {
    pub(crate) fn new(doc: &'a mut Document, parent: NodeId, name: &'n str, top_level: bool) -> Self {
        Self {
            doc,
            parent,
            name,
            top_level,
        }
    }

    fn leaf(mut self, text: String) -> Result<(), Error> {
        if let Some(attr) = self.name.strip_prefix('@') {
            self.doc.set_attribute(self.parent, attr, text)?;
        } else if self.name == "$value" {
            if !text.is_empty() {
                let node = self.doc.create_text(text);
                self.doc.append_child(self.parent, node)?;
            }
        } else {
            let element = self.open()?;
            if !text.is_empty() {
                let node = self.doc.create_text(text);
                self.doc.append_child(element, node)?;
            }
        }
        Ok(())
    }

    /// Creates the element compound values are written into.
    fn open(&mut self) -> Result<NodeId, Error> {
        if self.name.starts_with('@') || self.name == "$value" {
            return Err(Error::Shape(format!(
                "'{}' can only hold a scalar value",
                self.name
            )));
        }
        let element = self.doc.create_element(self.name)?;
        self.doc.append_child(self.parent, element)?;
        Ok(element)
    }

    fn sequence(self) -> Result<SeqSerializer<'a, 'n>, Error> {
        if self.top_level {
            return Err(Error::Shape(
                "top-level sequence requires a named element".to_string(),
            ));
        }
        if self.name.starts_with('@') {
            return Err(Error::Shape(format!(
                "'{}' can only hold a scalar value",
                self.name
            )));
        }
        Ok(SeqSerializer {
            doc: self.doc,
            parent: self.parent,
            name: self.name,
        })
    }
}

macro_rules! serialize_display {
    ($($method:ident: $ty:ty,)*) => {$(
        fn $method(self, v: $ty) -> Result<(), Error> {
            self.leaf(v.to_string())
        }
    )*};
}

impl<'a, 'n> ser::Serializer for ElementSerializer<'a, 'n> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = SeqSerializer<'a, 'n>;
    type SerializeTuple = SeqSerializer<'a, 'n>;
    type SerializeTupleStruct = SeqSerializer<'a, 'n>;
    type SerializeTupleVariant = SeqSerializer<'a, 'static>;
    type SerializeMap = MapSerializer<'a>;
    type SerializeStruct = StructSerializer<'a>;
    type SerializeStructVariant = StructSerializer<'a>;

    serialize_display! {
        serialize_bool: bool,
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_i128: i128,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_u128: u128,
        serialize_char: char,
        serialize_str: &str,
    }

    fn serialize_f32(self, v: f32) -> Result<(), Error> {
        let text = if v.is_finite() {
            v.to_string()
        } else {
            format_float(f64::from(v))
        };
        self.leaf(text)
    }

    fn serialize_f64(self, v: f64) -> Result<(), Error> {
        self.leaf(format_float(v))
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<(), Error> {
        Err(Error::Shape(format!(
            "byte arrays have no XML representation (<{}>)",
            self.name
        )))
    }

    fn serialize_none(self) -> Result<(), Error> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), Error> {
        self.leaf(String::new())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), Error> {
        self.leaf(String::new())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<(), Error> {
        self.leaf(variant.to_string())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        mut self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        let element = self.open()?;
        value.serialize(ElementSerializer::new(self.doc, element, variant, false))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Error> {
        self.sequence()
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Error> {
        self.sequence()
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Error> {
        self.sequence()
    }

    fn serialize_tuple_variant(
        mut self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Error> {
        let element = self.open()?;
        Ok(SeqSerializer {
            doc: self.doc,
            parent: element,
            name: variant,
        })
    }

    fn serialize_map(mut self, _len: Option<usize>) -> Result<Self::SerializeMap, Error> {
        let element = self.open()?;
        Ok(MapSerializer {
            doc: self.doc,
            element,
            key: None,
        })
    }

    fn serialize_struct(
        mut self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Error> {
        let element = self.open()?;
        Ok(StructSerializer {
            doc: self.doc,
            element,
        })
    }

    fn serialize_struct_variant(
        mut self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Error> {
        let outer = self.open()?;
        let element = self.doc.create_element(variant)?;
        self.doc.append_child(outer, element)?;
        Ok(StructSerializer {
            doc: self.doc,
            element,
        })
    }
}

/// Writes every item as a sibling with the same name.
pub(crate) struct SeqSerializer<'a, 'n> {
    doc: &'a mut Document,
    parent: NodeId,
    name: &'n str,
}

impl SeqSerializer<'_, '_> {
    fn item<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        value.serialize(ElementSerializer::new(
            &mut *self.doc,
            self.parent,
            self.name,
            false,
        ))
    }
}

impl ser::SerializeSeq for SeqSerializer<'_, '_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.item(value)
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

impl ser::SerializeTuple for SeqSerializer<'_, '_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.item(value)
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for SeqSerializer<'_, '_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.item(value)
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for SeqSerializer<'_, '_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.item(value)
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

/// Writes each field as a child of `element`.
pub(crate) struct StructSerializer<'a> {
    doc: &'a mut Document,
    element: NodeId,
}

impl ser::SerializeStruct for StructSerializer<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        value.serialize(ElementSerializer::new(&mut *self.doc, self.element, key, false))
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for StructSerializer<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        ser::SerializeStruct::serialize_field(self, key, value)
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

/// Writes each entry as a child element named by its key.
pub(crate) struct MapSerializer<'a> {
    doc: &'a mut Document,
    element: NodeId,
    key: Option<String>,
}

impl ser::SerializeMap for MapSerializer<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), Error> {
        self.key = Some(key.serialize(KeySerializer)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        let key = self
            .key
            .take()
            .ok_or_else(|| Error::Message("map value without a key".to_string()))?;
        value.serialize(ElementSerializer::new(&mut *self.doc, self.element, &key, false))
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

/// Renders scalar map keys as element names.
struct KeySerializer;

macro_rules! key_display {
    ($($method:ident: $ty:ty,)*) => {$(
        fn $method(self, v: $ty) -> Result<String, Error> {
            Ok(v.to_string())
        }
    )*};
}

macro_rules! key_rejected {
    ($($method:ident($($arg:ty),*) -> $ret:ty,)*) => {$(
        fn $method(self, $(_: $arg),*) -> Result<$ret, Error> {
            Err(Error::Shape("map keys must be scalars".to_string()))
        }
    )*};
}

impl ser::Serializer for KeySerializer {
    type Ok = String;
    type Error = Error;
    type SerializeSeq = Impossible<String, Error>;
    type SerializeTuple = Impossible<String, Error>;
    type SerializeTupleStruct = Impossible<String, Error>;
    type SerializeTupleVariant = Impossible<String, Error>;
    type SerializeMap = Impossible<String, Error>;
    type SerializeStruct = Impossible<String, Error>;
    type SerializeStructVariant = Impossible<String, Error>;

    key_display! {
        serialize_bool: bool,
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_f32: f32,
        serialize_f64: f64,
        serialize_char: char,
        serialize_str: &str,
    }

    key_rejected! {
        serialize_bytes(&[u8]) -> String,
        serialize_none() -> String,
        serialize_unit() -> String,
        serialize_unit_struct(&'static str) -> String,
        serialize_seq(Option<usize>) -> Self::SerializeSeq,
        serialize_tuple(usize) -> Self::SerializeTuple,
        serialize_tuple_struct(&'static str, usize) -> Self::SerializeTupleStruct,
        serialize_tuple_variant(&'static str, u32, &'static str, usize) -> Self::SerializeTupleVariant,
        serialize_map(Option<usize>) -> Self::SerializeMap,
        serialize_struct(&'static str, usize) -> Self::SerializeStruct,
        serialize_struct_variant(&'static str, u32, &'static str, usize) -> Self::SerializeStructVariant,
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<String, Error> {
        value.serialize(self)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<String, Error> {
        Ok(variant.to_string())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String, Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, Error> {
        Err(Error::Shape("map keys must be scalars".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::serial::{node_to_string, WriteOptions};
    use pretty_assertions::assert_eq;
    use serde::Serialize;

    fn render<T: Serialize>(name: &str, value: &T) -> Result<String, Error> {
        let mut doc = Document::new();
        let holder = doc.create_element("holder").unwrap();
        doc.append_child(doc.root(), holder).unwrap();
        crate::bridge::to_element(&mut doc, holder, name, value)?;
        let mut out = String::new();
        for child in doc.children(holder) {
            out.push_str(&node_to_string(&doc, child, &WriteOptions::default()).unwrap());
        }
        Ok(out)
    }

    #[derive(Serialize)]
    struct Book {
        #[serde(rename = "@isbn")]
        isbn: String,
        title: String,
        author: Vec<String>,
        year: Option<u16>,
    }

    #[test]
    fn test_struct_fields() {
        let book = Book {
            isbn: "1-2".to_string(),
            title: "Rust & XML".to_string(),
            author: vec!["A".to_string(), "B".to_string()],
            year: None,
        };
        assert_eq!(
            render("book", &book).unwrap(),
            "<book isbn=\"1-2\"><title>Rust &amp; XML</title><author>A</author><author>B</author></book>"
        );
    }

    #[test]
    fn test_value_text() {
        #[derive(Serialize)]
        struct Price {
            #[serde(rename = "@currency")]
            currency: &'static str,
            #[serde(rename = "$value")]
            amount: f64,
        }
        let price = Price {
            currency: "EUR",
            amount: 9.5,
        };
        assert_eq!(render("price", &price).unwrap(), "<price currency=\"EUR\">9.5</price>");
    }

    #[test]
    fn test_leaves() {
        assert_eq!(render("b", &true).unwrap(), "<b>true</b>");
        assert_eq!(render("n", &-12i64).unwrap(), "<n>-12</n>");
        assert_eq!(render("f", &f64::INFINITY).unwrap(), "<f>INF</f>");
        assert_eq!(render("f", &0.1f32).unwrap(), "<f>0.1</f>");
        assert_eq!(render("u", &()).unwrap(), "<u/>");
        assert_eq!(render("s", &Vec::<u8>::new()).unwrap(), "");
    }

    #[test]
    fn test_enums() {
        #[derive(Serialize)]
        enum Shape {
            Empty,
            Circle(f64),
            Rect { w: u32, h: u32 },
        }
        assert_eq!(render("s", &Shape::Empty).unwrap(), "<s>Empty</s>");
        assert_eq!(render("s", &Shape::Circle(1.5)).unwrap(), "<s><Circle>1.5</Circle></s>");
        assert_eq!(
            render("s", &Shape::Rect { w: 2, h: 3 }).unwrap(),
            "<s><Rect><w>2</w><h>3</h></Rect></s>"
        );
    }

    #[test]
    fn test_map_keys_become_names() {
        let mut map = BTreeMap::new();
        map.insert("alpha", 1);
        map.insert("beta", 2);
        assert_eq!(
            render("m", &map).unwrap(),
            "<m><alpha>1</alpha><beta>2</beta></m>"
        );
        let mut bad = BTreeMap::new();
        bad.insert("not a name", 1);
        assert!(matches!(render("m", &bad), Err(Error::Tree(_))));
    }

    #[test]
    fn test_top_level_sequence_is_rejected() {
        let mut doc = Document::new();
        let root = doc.root();
        let err = crate::bridge::to_element(&mut doc, root, "item", &vec![1, 2]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "top-level sequence requires a named element"
        );
    }

    #[test]
    fn test_compound_attribute_is_rejected() {
        #[derive(Serialize)]
        struct Bad {
            #[serde(rename = "@inner")]
            inner: Vec<u8>,
        }
        assert!(matches!(
            render("bad", &Bad { inner: vec![1] }),
            Err(Error::Shape(_))
        ));
    }
}
