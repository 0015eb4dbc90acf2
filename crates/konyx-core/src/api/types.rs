//! Wire types for the REST endpoints.

use serde::{Deserialize, Deserializer, Serialize};

/// Ids arrive as strings from some deployments and as numbers from others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub number: String,
    pub total: f64,
}

/// Backend state shown on the configuration panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminStatus {
    pub password: String,
    pub api_kissoro: String,
    pub api_en_plural: String,
    pub api_groq: String,
    pub ultimo_export: String,
    pub total_exportaciones: u64,
    pub total_exportaciones_fallidas: u64,
    pub intentos_login_fallidos: u64,
}

/// Partial API-key rotation; `None` fields are left untouched server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeysUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_kissoro: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_en_plural: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_groq: Option<String>,
}

impl ApiKeysUpdate {
    pub fn is_empty(&self) -> bool {
        self.api_kissoro.is_none() && self.api_en_plural.is_none() && self.api_groq.is_none()
    }
}

/// Acknowledgement body of the admin update endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct UpdateAck {
    pub message: Option<String>,
    pub detail: Option<String>,
}

impl UpdateAck {
    pub fn into_message(self, fallback: &str) -> String {
        self.message
            .or(self.detail)
            .unwrap_or_else(|| fallback.to_string())
    }
}
