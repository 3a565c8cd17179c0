//! JSON tree <-> attribute mapping.
//!
//! Both directions are total and side-effect free, and each is the inverse
//! of the other: `from_attribute(&to_attribute(v)) == v` for every JSON value.

use crate::value::{AttributeValue, Item};
use serde_json::{Map, Value};

/// Maps a JSON value onto its attribute form.
pub fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::Number(n.clone()),
        Value::String(s) => AttributeValue::String(s.clone()),
        Value::Array(items) => AttributeValue::List(items.iter().map(to_attribute).collect()),
        Value::Object(object) => AttributeValue::Map(to_item(object)),
    }
}

/// Maps an attribute back onto the JSON value it came from.
pub fn from_attribute(attr: &AttributeValue) -> Value {
    match attr {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Number(n) => Value::Number(n.clone()),
        AttributeValue::String(s) => Value::String(s.clone()),
        AttributeValue::List(items) => Value::Array(items.iter().map(from_attribute).collect()),
        AttributeValue::Map(item) => Value::Object(from_item(item)),
    }
}

/// Maps a JSON object onto a row item.
pub fn to_item(object: &Map<String, Value>) -> Item {
    object
        .iter()
        .map(|(k, v)| (k.clone(), to_attribute(v)))
        .collect()
}

/// Maps a row item back onto a JSON object.
pub fn from_item(item: &Item) -> Map<String, Value> {
    item.iter()
        .map(|(k, v)| (k.clone(), from_attribute(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn json_strategy() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            any::<u64>().prop_map(|n| json!(n)),
            (-1.0e9f64..1.0e9).prop_map(|f| json!(f)),
            "[a-zA-Z0-9 ]{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 64, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..6)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    #[test]
    fn false_stays_false() {
        let attr = to_attribute(&json!(false));
        assert_eq!(attr, AttributeValue::Bool(false));
        assert_eq!(from_attribute(&attr), json!(false));
    }

    #[test]
    fn nested_object() {
        let value = json!({
            "type": "plan",
            "stops": [{"aerodrome": 3, "refuel": true}],
            "ias": 95.5,
            "variation": null
        });
        let attr = to_attribute(&value);
        let map = attr.as_map().unwrap();
        assert_eq!(map["type"], AttributeValue::from("plan"));
        assert_eq!(map["variation"], AttributeValue::Null);
        assert!(matches!(map["stops"], AttributeValue::List(ref l) if l.len() == 1));
        assert_eq!(from_attribute(&attr), value);
    }

    #[test]
    fn item_roundtrip() {
        let value = json!({"entity": 4, "type": "aircraft", "registration": "N123"});
        let object = value.as_object().unwrap();
        let item = to_item(object);
        assert_eq!(item.len(), 3);
        assert_eq!(&from_item(&item), object);
    }

    proptest! {
        #[test]
        fn json_attribute_roundtrip(value in json_strategy()) {
            prop_assert_eq!(from_attribute(&to_attribute(&value)), value);
        }
    }
}
