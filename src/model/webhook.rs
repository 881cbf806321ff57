use serde::{Deserialize, Deserializer, Serialize};

/// A webhook subscription as Businessmap reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub webhook_id: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub board_id: Option<u64>,
    #[serde(default, deserialize_with = "flag")]
    pub is_enabled: bool,
    #[serde(default)]
    pub secret: Option<String>,
}

/// What this side remembers about its own registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookRegistration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default)]
    pub authenticate: bool,
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }
    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(n)) => n != 0,
        None => false,
    })
}
