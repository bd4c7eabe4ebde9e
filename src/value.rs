use std::collections::HashMap;
use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Number;

/// Format-agnostic parsed document.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Null,
    Boolean(bool),
    Number(Number),
    String(String),
    Sequence(Vec<DecodedValue>),
    Mapping(Mapping),
}

/// Insertion-ordered string-keyed map. Keys are unique; inserting an
/// existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: Vec<(String, DecodedValue)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Scalar,
    Null,
    Array,
    Object,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: DecodedValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&DecodedValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DecodedValue)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, DecodedValue)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (String, DecodedValue)>>(iter: I) -> Self {
        let mut entries: Vec<(String, DecodedValue)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for (key, value) in iter {
            match index.get(&key) {
                Some(&slot) => entries[slot].1 = value,
                None => {
                    index.insert(key.clone(), entries.len());
                    entries.push((key, value));
                }
            }
        }
        Mapping { entries }
    }
}

impl IntoIterator for Mapping {
    type Item = (String, DecodedValue);
    type IntoIter = std::vec::IntoIter<(String, DecodedValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl NodeKind {
    pub fn of(value: &DecodedValue) -> Self {
        match value {
            DecodedValue::Sequence(_) => NodeKind::Array,
            DecodedValue::Null => NodeKind::Null,
            DecodedValue::Mapping(_) => NodeKind::Object,
            DecodedValue::Boolean(_) | DecodedValue::Number(_) | DecodedValue::String(_) => {
                NodeKind::Scalar
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Scalar => "scalar",
            NodeKind::Null => "null",
            NodeKind::Array => "array",
            NodeKind::Object => "object",
        }
    }
}

impl DecodedValue {
    pub fn kind(&self) -> NodeKind {
        NodeKind::of(self)
    }

    /// Display text used in node labels: `null`, `true`/`false`, canonical
    /// decimal numbers and raw (unquoted) strings. Containers render as
    /// compact JSON.
    pub fn stringified(&self) -> String {
        match self {
            DecodedValue::Null => "null".to_string(),
            DecodedValue::Boolean(flag) => flag.to_string(),
            DecodedValue::Number(number) => format_number(number),
            DecodedValue::String(text) => text.clone(),
            DecodedValue::Sequence(_) | DecodedValue::Mapping(_) => {
                serde_json::Value::from(self).to_string()
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            DecodedValue::Null => "null",
            DecodedValue::Boolean(_) => "boolean",
            DecodedValue::Number(_) => "number",
            DecodedValue::String(_) => "string",
            DecodedValue::Sequence(_) => "array",
            DecodedValue::Mapping(_) => "object",
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            DecodedValue::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[DecodedValue]> {
        match self {
            DecodedValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DecodedValue::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&DecodedValue> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    /// Number of values in this tree, the root included.
    pub fn node_count(&self) -> usize {
        match self {
            DecodedValue::Sequence(items) => 1 + items.iter().map(Self::node_count).sum::<usize>(),
            DecodedValue::Mapping(map) => {
                1 + map.iter().map(|(_, value)| value.node_count()).sum::<usize>()
            }
            _ => 1,
        }
    }
}

/// Renders a number the way JavaScript's `String(n)` does: plain decimals
/// for magnitudes in `[1e-6, 1e21)`, exponent form with an explicit sign
/// outside it, and `0` for negative zero.
pub fn format_number(number: &Number) -> String {
    if number.is_i64() || number.is_u64() {
        return number.to_string();
    }
    let Some(float) = number.as_f64() else {
        return number.to_string();
    };
    if float == 0.0 {
        return "0".to_string();
    }
    if (1e-6..1e21).contains(&float.abs()) {
        return format!("{float}");
    }
    let scientific = format!("{float:e}");
    match scientific.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => scientific,
    }
}

impl From<&serde_json::Value> for DecodedValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => DecodedValue::Null,
            serde_json::Value::Bool(flag) => DecodedValue::Boolean(*flag),
            serde_json::Value::Number(number) => DecodedValue::Number(number.clone()),
            serde_json::Value::String(text) => DecodedValue::String(text.clone()),
            serde_json::Value::Array(items) => {
                DecodedValue::Sequence(items.iter().map(DecodedValue::from).collect())
            }
            serde_json::Value::Object(map) => DecodedValue::Mapping(
                map.iter()
                    .map(|(key, value)| (key.clone(), DecodedValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for DecodedValue {
    fn from(value: serde_json::Value) -> Self {
        DecodedValue::from(&value)
    }
}

impl From<&DecodedValue> for serde_json::Value {
    fn from(value: &DecodedValue) -> Self {
        match value {
            DecodedValue::Null => serde_json::Value::Null,
            DecodedValue::Boolean(flag) => serde_json::Value::Bool(*flag),
            DecodedValue::Number(number) => serde_json::Value::Number(number.clone()),
            DecodedValue::String(text) => serde_json::Value::String(text.clone()),
            DecodedValue::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            DecodedValue::Mapping(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), serde_json::Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<DecodedValue> for serde_json::Value {
    fn from(value: DecodedValue) -> Self {
        serde_json::Value::from(&value)
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stringified())
    }
}

impl Serialize for DecodedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DecodedValue::Null => serializer.serialize_unit(),
            DecodedValue::Boolean(flag) => serializer.serialize_bool(*flag),
            DecodedValue::Number(number) => number.serialize(serializer),
            DecodedValue::String(text) => serializer.serialize_str(text),
            DecodedValue::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            DecodedValue::Mapping(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map.iter() {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for DecodedValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = DecodedValue;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("any structured value")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<DecodedValue, E> {
        Ok(DecodedValue::Boolean(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<DecodedValue, E> {
        Ok(DecodedValue::Number(Number::from(value)))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<DecodedValue, E> {
        Ok(DecodedValue::Number(Number::from(value)))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<DecodedValue, E> {
        Ok(Number::from_f64(value)
            .map(DecodedValue::Number)
            .unwrap_or_else(|| DecodedValue::String(value.to_string())))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<DecodedValue, E> {
        Ok(DecodedValue::String(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<DecodedValue, E> {
        Ok(DecodedValue::String(value))
    }

    fn visit_none<E: de::Error>(self) -> Result<DecodedValue, E> {
        Ok(DecodedValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<DecodedValue, D::Error> {
        Deserialize::deserialize(deserializer)
    }

    fn visit_unit<E: de::Error>(self) -> Result<DecodedValue, E> {
        Ok(DecodedValue::Null)
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> Result<DecodedValue, D::Error> {
        Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<DecodedValue, A::Error> {
        let mut items = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(item) = access.next_element::<DecodedValue>()? {
            items.push(item);
        }
        Ok(DecodedValue::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<DecodedValue, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(MapKey(key)) = access.next_key::<MapKey>()? {
            let value = access.next_value::<DecodedValue>()?;
            entries.push((key, value));
        }
        Ok(DecodedValue::Mapping(entries.into_iter().collect()))
    }
}

/// Mapping keys from formats that allow non-string scalars (YAML) are
/// rendered to text.
struct MapKey(String);

impl<'de> Deserialize<'de> for MapKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl<'de> Visitor<'de> for KeyVisitor {
            type Value = MapKey;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a scalar mapping key")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<MapKey, E> {
                Ok(MapKey(value.to_string()))
            }

            fn visit_string<E: de::Error>(self, value: String) -> Result<MapKey, E> {
                Ok(MapKey(value))
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> Result<MapKey, E> {
                Ok(MapKey(value.to_string()))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<MapKey, E> {
                Ok(MapKey(value.to_string()))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<MapKey, E> {
                Ok(MapKey(value.to_string()))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<MapKey, E> {
                Ok(MapKey(value.to_string()))
            }

            fn visit_unit<E: de::Error>(self) -> Result<MapKey, E> {
                Ok(MapKey("null".to_string()))
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}
