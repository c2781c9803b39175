//! Object mapping through serde, including the trip through XML text.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use quillxml::bridge::{self, Error};
use quillxml::{Document, WriteOptions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Person {
    firstname: String,
    lastname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Role {
    Admin,
    Guest,
    Member { since: u16 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Account {
    #[serde(rename = "@id")]
    id: u64,
    #[serde(rename = "@active")]
    active: bool,
    owner: Person,
    #[serde(default)]
    alias: Vec<String>,
    nickname: Option<String>,
    balance: f64,
    role: Role,
    #[serde(default)]
    limits: BTreeMap<String, i32>,
}

fn account() -> Account {
    Account {
        id: 42,
        active: true,
        owner: Person {
            firstname: "Jane".to_string(),
            lastname: "Doe <Jr.>".to_string(),
        },
        alias: vec!["jd".to_string(), "jane".to_string()],
        nickname: None,
        balance: -0.25,
        role: Role::Member { since: 2019 },
        limits: BTreeMap::from([("daily".to_string(), 100), ("monthly".to_string(), 2000)]),
    }
}

#[test]
fn test_person_round_trip() {
    let person = Person {
        firstname: "John".to_string(),
        lastname: "Doe".to_string(),
    };
    let mut doc = Document::new();
    doc.serialize("person", &person).unwrap();
    assert_eq!(doc.deserialize::<Person>("person").unwrap(), person);
}

#[test]
fn test_round_trip_through_text() {
    let value = account();
    let mut doc = Document::new();
    doc.serialize("account", &value).unwrap();

    let text = doc.to_string().unwrap();
    let reparsed = Document::parse_str(&text).unwrap();
    assert_eq!(reparsed.deserialize::<Account>("account").unwrap(), value);
}

#[test]
fn test_written_shape() {
    let mut doc = Document::new();
    doc.serialize("account", &account()).unwrap();
    let text = doc
        .to_string_with(&WriteOptions::default().xml_decl(false))
        .unwrap();
    assert_eq!(
        text,
        "<account id=\"42\" active=\"true\">\
         <owner><firstname>Jane</firstname><lastname>Doe &lt;Jr.&gt;</lastname></owner>\
         <alias>jd</alias><alias>jane</alias>\
         <balance>-0.25</balance>\
         <role><Member><since>2019</since></Member></role>\
         <limits><daily>100</daily><monthly>2000</monthly></limits>\
         </account>"
    );
}

#[test]
fn test_defaults_for_absent_fields() {
    let doc = Document::parse_str(
        "<account id='1' active='0'>\
           <owner><firstname>A</firstname><lastname>B</lastname></owner>\
           <balance>NaN</balance><role>Guest</role>\
         </account>",
    )
    .unwrap();
    let read: Account = doc.deserialize("account").unwrap();
    assert!(!read.active);
    assert!(read.alias.is_empty());
    assert_eq!(read.nickname, None);
    assert!(read.balance.is_nan());
    assert_eq!(read.role, Role::Guest);
    assert!(read.limits.is_empty());
}

#[test]
fn test_subtree_mapping() {
    let mut doc = Document::parse_str("<registry><people/></registry>").unwrap();
    let people = doc.find_first("/registry/people").unwrap().unwrap();
    for (first, last) in [("Ann", "Lee"), ("Bo", "Ng")] {
        let person = Person {
            firstname: first.to_string(),
            lastname: last.to_string(),
        };
        bridge::to_element(&mut doc, people, "person", &person).unwrap();
    }

    let second = doc.find_first("//person[2]").unwrap().unwrap();
    let read: Person = bridge::from_element(&doc, second).unwrap();
    assert_eq!(read.firstname, "Bo");

    let roster: Vec<Person> = doc
        .find("//person")
        .unwrap()
        .into_iter()
        .map(|p| bridge::from_element(&doc, p).unwrap())
        .collect();
    assert_eq!(roster.len(), 2);
}

#[test]
fn test_shape_errors() {
    let mut doc = Document::new();
    let err = doc.serialize("people", &vec![Role::Admin]).unwrap_err();
    assert_eq!(err.to_string(), "top-level sequence requires a named element");

    let doc = Document::parse_str("<person><firstname>J</firstname></person>").unwrap();
    assert_eq!(
        doc.deserialize::<Person>("person").unwrap_err().to_string(),
        "missing field `lastname`"
    );
    assert!(matches!(
        doc.deserialize::<Person>("account"),
        Err(Error::RootMismatch { .. })
    ));
}

#[test]
fn test_invalid_leaf_names_the_element() {
    let doc = Document::parse_str(
        "<account id='x' active='true'><owner><firstname>A</firstname><lastname>B</lastname></owner>\
         <balance>1</balance><role>Admin</role></account>",
    )
    .unwrap();
    let err = doc.deserialize::<Account>("account").unwrap_err();
    assert!(matches!(err, Error::InvalidValue { .. }), "{err}");
}
