use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Number of random bytes behind every issued key (128 bits).
pub const KEY_BYTES: usize = 16;

/// An issued API key and its usage metadata.
///
/// `id` is `None` only for synthetic records returned while key checks are
/// bypassed; persisted keys always carry the id assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Option<i64>,
    pub key: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_count: i64,
}

impl ApiKey {
    /// A record that was never written to storage.
    pub fn unsaved(key: String, description: Option<String>) -> Self {
        Self {
            id: None,
            key,
            description,
            created_at: Utc::now(),
            last_used_at: None,
            usage_count: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateApiKey {
    #[serde(default)]
    pub description: Option<String>,
}

/// Generate a new opaque key: 16 bytes from the OS RNG, lowercase hex.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Shorten a key for log output, keeping the first and last four characters.
pub fn mask_key(key: &str) -> String {
    if key.chars().count() <= 8 {
        return "****".to_string();
    }
    let head: String = key.chars().take(4).collect();
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{head}...{tail}")
}
