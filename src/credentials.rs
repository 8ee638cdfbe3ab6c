use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// API credentials loaded from `credentials.json`.
///
/// Field names match the keys in the credentials file:
///
/// ```json
/// {
///   "wsid": "...",
///   "oauth_token": "...",
///   "user_id": "..."
/// }
/// ```
#[derive(Debug, Deserialize, Clone)]
pub struct Credentials {
    pub wsid: String,
    pub oauth_token: String,
    pub user_id: String,
}

impl Credentials {
    /// Load and parse the credentials file.
    ///
    /// # Errors
    /// - Returns an error if the file cannot be read.
    /// - Returns an error if it is not valid JSON with the expected fields.
    pub fn load(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .with_context(|| format!("credentials not found: {}", path.display()))?;
        let creds: Credentials = serde_json::from_str(&txt)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(creds)
    }
}
