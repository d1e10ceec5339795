use crate::error::{RestError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier of a remote record: PowerSchool uses numeric DCIDs for most
/// resources but some ids are strings. No local validation is done.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Number(n) => write!(f, "{}", n),
            ResourceId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i32> for ResourceId {
    fn from(id: i32) -> Self {
        ResourceId::Number(id.into())
    }
}

impl From<i64> for ResourceId {
    fn from(id: i64) -> Self {
        ResourceId::Number(id)
    }
}

impl From<u32> for ResourceId {
    fn from(id: u32) -> Self {
        ResourceId::Number(id.into())
    }
}

impl From<u64> for ResourceId {
    fn from(id: u64) -> Self {
        i64::try_from(id)
            .map(ResourceId::Number)
            .unwrap_or_else(|_| ResourceId::Text(id.to_string()))
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        ResourceId::Text(id.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        ResourceId::Text(id)
    }
}

/// A member that holds either one record or an array of records.
///
/// Collection envelopes hold a bare object instead of a one-element array
/// when a page has a single record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    Many(Vec<Value>),
    One(Value),
}

impl OneOrMany {
    /// Normalize to a sequence; `null` counts as no records
    pub fn into_vec(self) -> Vec<Value> {
        match self {
            OneOrMany::Many(records) => records,
            OneOrMany::One(Value::Null) => Vec::new(),
            OneOrMany::One(record) => vec![record],
        }
    }
}

/// Envelope keys for a collection endpoint, derived from its last path segment.
///
/// `ws/v1/district/student` pages look like `{"students": {"student": [...]}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub outer: String,
    pub inner: String,
}

impl Envelope {
    pub fn for_endpoint(endpoint: &str) -> Self {
        let path = endpoint.split(['?', '#']).next().unwrap_or_default();
        let name = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();

        Envelope {
            outer: format!("{}s", name),
            inner: name,
        }
    }

    /// Extract the records of one page
    pub fn unwrap_page(&self, mut body: Value) -> Result<Vec<Value>> {
        let inner = body
            .get_mut(&self.outer)
            .and_then(|outer| outer.get_mut(&self.inner))
            .map(Value::take)
            .ok_or_else(|| {
                RestError::UnexpectedShape(format!("missing {}.{}", self.outer, self.inner))
            })?;

        let records: OneOrMany = serde_json::from_value(inner)?;
        Ok(records.into_vec())
    }
}

/// Take the member named `key` out of a single-record envelope
pub fn unwrap_single(mut body: Value, key: &str) -> Result<Value> {
    match body.get_mut(key) {
        Some(record) => Ok(record.take()),
        None => Err(RestError::UnexpectedShape(format!("missing {}", key))),
    }
}

/// Count endpoints answer `{"resource": {"count": N}}`
pub fn resource_count(body: &Value) -> Result<u64> {
    body.pointer("/resource/count")
        .and_then(count_value)
        .ok_or_else(|| RestError::UnexpectedShape("missing resource.count".to_string()))
}

/// PowerQuery count endpoints answer `{"count": N}`
pub fn query_count(body: &Value) -> Result<u64> {
    body.get("count")
        .and_then(count_value)
        .ok_or_else(|| RestError::UnexpectedShape("missing count".to_string()))
}

fn count_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Response to a record creation POST.
#[derive(Debug, Clone, Deserialize)]
pub struct InsertResponse {
    pub insert_count: u64,
    #[serde(default)]
    pub result: Vec<InsertResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsertResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub success_message: Option<SuccessMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuccessMessage {
    pub id: ResourceId,
}

impl InsertResponse {
    /// The new record's id, when exactly one record was inserted successfully
    pub fn created_id(&self) -> Option<ResourceId> {
        if self.insert_count != 1 {
            return None;
        }
        let first = self.result.first()?;
        if first.status != "SUCCESS" {
            return None;
        }
        first.success_message.as_ref().map(|m| m.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_keys() {
        let envelope = Envelope::for_endpoint("ws/v1/district/student");
        assert_eq!(envelope.outer, "students");
        assert_eq!(envelope.inner, "student");

        let envelope = Envelope::for_endpoint("https://ps.example.org/ws/v1/school/3/section/");
        assert_eq!(envelope.outer, "sections");
        assert_eq!(envelope.inner, "section");

        let envelope = Envelope::for_endpoint("ws/v1/school/3/staff?q=x");
        assert_eq!(envelope.inner, "staff");
    }

    #[test]
    fn test_unwrap_page_array() {
        let envelope = Envelope::for_endpoint("ws/v1/district/school");
        let body = json!({"schools": {"school": [{"id": 1}, {"id": 2}]}});
        let records = envelope.unwrap_page(body).unwrap();
        assert_eq!(records, vec![json!({"id": 1}), json!({"id": 2})]);
    }

    #[test]
    fn test_unwrap_page_single_object() {
        let envelope = Envelope::for_endpoint("ws/v1/district/school");
        let body = json!({"schools": {"school": {"id": 7}}});
        let records = envelope.unwrap_page(body).unwrap();
        assert_eq!(records, vec![json!({"id": 7})]);
    }

    #[test]
    fn test_unwrap_page_missing_key() {
        let envelope = Envelope::for_endpoint("ws/v1/district/school");
        let err = envelope.unwrap_page(json!({"schools": {}})).unwrap_err();
        assert!(matches!(err, RestError::UnexpectedShape(_)));
    }

    #[test]
    fn test_null_is_empty() {
        let records: OneOrMany = serde_json::from_value(Value::Null).unwrap();
        assert!(records.into_vec().is_empty());
    }

    #[test]
    fn test_counts() {
        assert_eq!(resource_count(&json!({"resource": {"count": 42}})).unwrap(), 42);
        assert_eq!(resource_count(&json!({"resource": {"count": "5"}})).unwrap(), 5);
        assert!(resource_count(&json!({"count": 42})).is_err());
        assert_eq!(query_count(&json!({"count": 3})).unwrap(), 3);
        assert!(query_count(&json!({"message": "nope"})).is_err());
    }

    #[test]
    fn test_created_id() {
        let response: InsertResponse = serde_json::from_value(json!({
            "insert_count": 1,
            "update_count": 0,
            "delete_count": 0,
            "result": [{
                "client_uid": 1,
                "status": "SUCCESS",
                "action": "INSERT",
                "success_message": {"id": 9876, "ref": "https://ps.example.org/ws/v1/student/9876"}
            }]
        }))
        .unwrap();
        assert_eq!(response.created_id(), Some(ResourceId::Number(9876)));
    }

    #[test]
    fn test_created_id_rejects_other_shapes() {
        let failed: InsertResponse = serde_json::from_value(json!({
            "insert_count": 1,
            "result": [{"status": "ERROR", "error_message": {"error": []}}]
        }))
        .unwrap();
        assert_eq!(failed.created_id(), None);

        let none: InsertResponse = serde_json::from_value(json!({
            "insert_count": 0,
            "result": [{"status": "SUCCESS", "success_message": {"id": 1}}]
        }))
        .unwrap();
        assert_eq!(none.created_id(), None);
    }

    #[test]
    fn test_resource_id_display() {
        assert_eq!(ResourceId::from(12).to_string(), "12");
        assert_eq!(ResourceId::from("ABC-1").to_string(), "ABC-1");
        assert_eq!(ResourceId::from(u64::MAX).to_string(), u64::MAX.to_string());
    }
}
