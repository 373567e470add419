use serde_json::{Map, Value};

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct LoginDto {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
}

impl From<Verb> for reqwest::Method {
    fn from(verb: Verb) -> Self {
        match verb {
            Verb::Get => Self::GET,
            Verb::Post => Self::POST,
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    #[serde(rename = "CREATE")]
    Create,
    #[serde(rename = "UPDATE")]
    Update,
}

/// One record of the bulk endpoint: an entity type and its property bag.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct EntityRecord {
    pub entity_type: String,
    pub properties: Map<String, Value>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BulkPayload {
    pub entities: Vec<EntityRecord>,
    pub operation: Operation,
}

/// A file referenced by an entity's attachment field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub record_id: String,
    pub id: String,
    pub file_name: String,
    pub file_extension: String,
    pub is_hidden: bool,
}

#[derive(Debug, serde::Deserialize)]
pub struct AttachmentList {
    #[serde(rename = "complexTypeProperties", default)]
    pub items: Vec<AttachmentItem>,
}

#[derive(Debug, serde::Deserialize)]
pub struct AttachmentItem {
    pub properties: AttachmentProperties,
}

#[derive(Debug, serde::Deserialize)]
pub struct AttachmentProperties {
    pub id: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_extension: String,
    #[serde(rename = "IsHidden", default)]
    pub is_hidden: bool,
}

/// A successful exchange: HTTP 200 and a body that parsed as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.body).unwrap_or_else(|_| self.body.to_string())
    }
}
