//! Export progress events carried in SSE `data:` payloads.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single column correction reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub column: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub original_value: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub corrected_value: String,
}

/// Spreadsheet cells come through as numbers, booleans or null as often as strings.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExportEvent {
    Log {
        step: String,
    },
    Changes {
        #[serde(default)]
        changes: Vec<Change>,
    },
    End {
        #[serde(default)]
        file: Option<String>,
    },
}

/// Parses one `data:` payload. Malformed JSON and unknown event types yield `None`.
pub fn parse_event(data: &str) -> Option<ExportEvent> {
    let data = data.trim();
    if data.is_empty() {
        return None;
    }
    match serde_json::from_str(data) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(error = %e, payload = data, "dropping export event");
            None
        }
    }
}
