use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field carrying the stable identifier, when the submitter provides one.
pub const ID_FIELD: &str = "id";

/// Field a placeholder record stores unparseable raw text under.
pub const RAW_TEXT_FIELD: &str = "raw_text";

/// Prefix marking synthetic bookkeeping identifiers.
const GENERATED_PREFIX: &str = "gen:";

/// One ingested item: an opaque JSON object with an optional stable `id`.
///
/// Records without an identifier are never deduplicated; the promotion
/// engine attaches a synthetic `gen:`-prefixed identifier to them purely
/// for bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Stable identifier, normalized to a string. Numeric ids are accepted
    /// on input; anything else counts as "no identifier".
    pub fn id(&self) -> Option<String> {
        match self.fields.get(ID_FIELD) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Attach a fresh synthetic bookkeeping identifier.
    pub fn with_generated_id(mut self) -> Self {
        let id = format!("{}{}", GENERATED_PREFIX, uuid::Uuid::new_v4());
        self.fields.insert(ID_FIELD.to_string(), Value::String(id));
        self
    }

    /// Wrap raw text that failed to parse into a placeholder record.
    pub fn placeholder(raw: &str) -> Self {
        let mut fields = Map::new();
        fields.insert(RAW_TEXT_FIELD.to_string(), Value::String(raw.to_string()));
        Self { fields }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let fields: Map<String, Value> = serde_json::from_str(raw)?;
        Ok(Self { fields })
    }
}

/// Outcome of decoding one stored entry.
///
/// Applied uniformly at every read boundary: the promotion path keeps
/// placeholders, the pagination path drops undecodable entries instead.
#[derive(Debug)]
pub enum Decoded {
    Record(Record),
    Placeholder(Record),
}

impl Decoded {
    pub fn into_record(self) -> Record {
        match self {
            Decoded::Record(record) | Decoded::Placeholder(record) => record,
        }
    }
}

/// Decode one stored entry, falling back to a raw-text placeholder.
pub fn decode(raw: &str) -> Decoded {
    match Record::from_json(raw) {
        Ok(record) => Decoded::Record(record),
        Err(_) => Decoded::Placeholder(Record::placeholder(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(fields) => Record::new(fields),
            _ => panic!("test records must be objects"),
        }
    }

    #[test]
    fn test_id_normalization() {
        assert_eq!(record(json!({"id": "42"})).id().as_deref(), Some("42"));
        assert_eq!(record(json!({"id": 42})).id().as_deref(), Some("42"));
        assert_eq!(record(json!({"id": ""})).id(), None);
        assert_eq!(record(json!({"id": null})).id(), None);
        assert_eq!(record(json!({"text": "hi"})).id(), None);
    }

    #[test]
    fn test_generated_id_is_prefixed_and_unique() {
        let a = record(json!({"text": "a"})).with_generated_id();
        let b = record(json!({"text": "b"})).with_generated_id();
        let id_a = a.id().unwrap();
        let id_b = b.id().unwrap();
        assert!(id_a.starts_with("gen:"));
        assert!(id_b.starts_with("gen:"));
        assert_ne!(id_a, id_b);
    }

    #[test]
    fn test_decode_tags_parse_failures_as_placeholder() {
        match decode(r#"{"id":"1","text":"a"}"#) {
            Decoded::Record(r) => assert_eq!(r.id().as_deref(), Some("1")),
            Decoded::Placeholder(_) => panic!("valid JSON object must decode as a record"),
        }

        match decode("not json at all") {
            Decoded::Placeholder(r) => {
                assert_eq!(
                    r.fields().get(RAW_TEXT_FIELD),
                    Some(&Value::String("not json at all".to_string()))
                );
                assert_eq!(r.id(), None);
            }
            Decoded::Record(_) => panic!("garbage must decode as a placeholder"),
        }

        // Valid JSON but not an object is still a placeholder
        assert!(matches!(decode("[1,2,3]"), Decoded::Placeholder(_)));
    }

    #[test]
    fn test_json_round_trip_preserves_fields() {
        let original = record(json!({"id": "7", "text": "hello", "likes": 3}));
        let parsed = Record::from_json(&original.to_json()).unwrap();
        assert_eq!(parsed, original);
    }
}
