//! Plan domain type
//!
//! A plan is the title/description attached to one calendar day, together
//! with write attribution.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use super::day_key::DayKey;

/// Document field names on the wire
pub const FIELD_TITLE: &str = "title";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_LAST_UPDATED_BY: &str = "lastUpdatedBy";
pub const FIELD_TIMESTAMP: &str = "timestamp";

/// Errors decoding a remote document into a Plan
#[derive(Debug, Error)]
pub enum PlanDecodeError {
    #[error("Invalid document key: {0}")]
    InvalidKey(String),

    #[error("Malformed document {key}: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Write instant as stored remotely
///
/// Writers from this crate store RFC 3339 strings; epoch milliseconds are
/// accepted too since that is what server-side timestamps resolve to.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Rfc3339(DateTime<Utc>),
    Millis(i64),
}

impl WireTimestamp {
    fn into_instant(self) -> Option<DateTime<Utc>> {
        match self {
            Self::Rfc3339(dt) => Some(dt),
            Self::Millis(ms) => Utc.timestamp_millis_opt(ms).single(),
        }
    }
}

/// Persisted document shape, keyed externally by the day key
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanDocument {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    last_updated_by: String,
    #[serde(default)]
    timestamp: Option<WireTimestamp>,
}

/// A plan attached to one calendar day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Day this plan belongs to (also its document key)
    pub date_key: DayKey,

    /// Short label
    pub title: Option<String>,

    /// Free-form text
    pub description: Option<String>,

    /// Identity of the session that last wrote this plan
    pub last_updated_by: String,

    /// When the last write happened, according to the writer
    pub timestamp: DateTime<Utc>,
}

impl Plan {
    /// Decode a remote document stored under `key`
    pub fn from_document(key: &str, document: &Value) -> Result<Self, PlanDecodeError> {
        debug!(%key, "Plan::from_document: called");
        let date_key = DayKey::parse(key).map_err(|_| PlanDecodeError::InvalidKey(key.to_string()))?;
        let doc: PlanDocument = serde_json::from_value(document.clone()).map_err(|source| PlanDecodeError::Malformed {
            key: key.to_string(),
            source,
        })?;

        Ok(Self {
            date_key,
            title: doc.title,
            description: doc.description,
            last_updated_by: doc.last_updated_by,
            timestamp: doc
                .timestamp
                .and_then(WireTimestamp::into_instant)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        })
    }

    /// Title, or empty when absent
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    /// Description, or empty when absent
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    /// True when neither title nor description carries text
    ///
    /// A blank plan still exists remotely but is not highlighted and is left
    /// out of reports.
    pub fn is_blank(&self) -> bool {
        self.title().is_empty() && self.description().is_empty()
    }
}

/// Fields supplied by one merge write
///
/// `None` means "leave the stored value alone"; `Some("")` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanPatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl PlanPatch {
    /// Patch setting both title and description
    pub fn full(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Build the merge payload, stamping attribution fields
    pub fn into_fields(self, updated_by: &str, at: DateTime<Utc>) -> Map<String, Value> {
        debug!(%updated_by, %at, "PlanPatch::into_fields: called");
        let mut fields = Map::new();
        if let Some(title) = self.title {
            fields.insert(FIELD_TITLE.to_string(), Value::String(title));
        }
        if let Some(description) = self.description {
            fields.insert(FIELD_DESCRIPTION.to_string(), Value::String(description));
        }
        fields.insert(FIELD_LAST_UPDATED_BY.to_string(), Value::String(updated_by.to_string()));
        fields.insert(FIELD_TIMESTAMP.to_string(), Value::String(at.to_rfc3339()));
        fields
    }
}
