use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Key-value namespace shared by every persisted resume review.
pub const RECORD_KEY_PREFIX: &str = "resume:";

/// Opaque record identity. Generated as a UUID at creation, but records written
/// by older clients may carry any string, so it is not parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The deterministic key-value key for this id: `resume:{id}`.
    pub fn storage_key(&self) -> String {
        format!("{RECORD_KEY_PREFIX}{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path of an object in the blob store, as returned by the store on upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Analysis result attached to a record.
///
/// Persisted as `""` while pending and as a JSON object once complete.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Feedback {
    #[default]
    Pending,
    Complete(Map<String, Value>),
}

impl Feedback {
    pub fn is_complete(&self) -> bool {
        matches!(self, Feedback::Complete(_))
    }

    pub fn overall_score(&self) -> Option<f64> {
        match self {
            Feedback::Pending => None,
            Feedback::Complete(map) => map.get("overallScore").and_then(Value::as_f64),
        }
    }

    /// Interprets a raw persisted value. Anything that is not an object (or a
    /// string holding one) reads as pending rather than failing the record.
    fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Feedback::Complete(map),
            Value::String(text) if !text.trim().is_empty() => {
                match serde_json::from_str::<Value>(&text) {
                    Ok(Value::Object(map)) => Feedback::Complete(map),
                    _ => Feedback::Pending,
                }
            }
            _ => Feedback::Pending,
        }
    }
}

impl Serialize for Feedback {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Feedback::Pending => serializer.serialize_str(""),
            Feedback::Complete(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Feedback {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Feedback::from_value(Value::deserialize(deserializer)?))
    }
}

/// One uploaded resume and its analysis status, as persisted in the key-value store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub id: RecordId,
    #[serde(
        default,
        deserialize_with = "non_empty_blob_ref",
        skip_serializing_if = "Option::is_none"
    )]
    pub resume_path: Option<BlobRef>,
    #[serde(
        default,
        deserialize_with = "non_empty_blob_ref",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_path: Option<BlobRef>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub company_name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub job_title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub job_description: String,
    #[serde(default)]
    pub feedback: Feedback,
    /// Milliseconds since the Unix epoch.
    #[serde(default, deserialize_with = "lenient_millis")]
    pub created_at: i64,
}

impl ResumeRecord {
    /// Builds a draft: feedback pending, timestamped now.
    pub fn draft(
        id: RecordId,
        resume_path: BlobRef,
        image_path: BlobRef,
        company_name: String,
        job_title: String,
        job_description: String,
    ) -> Self {
        Self {
            id,
            resume_path: Some(resume_path),
            image_path: Some(image_path),
            company_name,
            job_title,
            job_description,
            feedback: Feedback::Pending,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.created_at).single()
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decodes a stored value. Missing optional fields take defaults so that
    /// half-written and legacy records still load; a missing or empty `id`
    /// is an error because identity cannot be recovered.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        let record: ResumeRecord = serde_json::from_str(raw)?;
        if record.id.as_str().trim().is_empty() {
            return Err(serde::de::Error::custom("record has an empty id"));
        }
        Ok(record)
    }
}

fn non_empty_blob_ref<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<BlobRef>, D::Error> {
    let path: Option<String> = Option::deserialize(deserializer)?;
    Ok(path.filter(|p| !p.trim().is_empty()).map(BlobRef::new))
}

/// Form fields were written as whatever the client had: `null` when absent,
/// occasionally a number. None of that should cost the record.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            tracing::debug!("unexpected text field shape: {other}");
            String::new()
        }
    })
}

/// Accepts integer, float or numeric-string milliseconds; anything else is 0.
fn lenient_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| text.trim().parse::<f64>().ok().map(|f| f as i64))
            .unwrap_or_default(),
        _ => 0,
    })
}
