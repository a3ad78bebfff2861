//! Persisted settings for the summarizer.
//!
//! The OpenAI API key lives in a small JSON key/value file so it survives
//! between runs. Keys are validated against the `sk-` prefix before they are
//! stored or used.

use crate::error::{OrthoError, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Settings key holding the OpenAI API key
pub const API_KEY_SETTING: &str = "openai_api_key";

/// Required prefix for OpenAI API keys
pub const CREDENTIAL_PREFIX: &str = "sk-";

/// Default settings path: `~/.orthopub_settings.json`
fn default_settings_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".orthopub_settings.json"))
        .ok_or_else(|| OrthoError::Config("Cannot determine home directory".to_string()))
}

/// Check a credential before it is stored or sent anywhere.
pub fn validate_credential(key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        return Err(OrthoError::InvalidCredential(
            "No OpenAI API key provided.".to_string(),
        ));
    }
    if !key.starts_with(CREDENTIAL_PREFIX) {
        return Err(OrthoError::InvalidCredential(format!(
            "OpenAI API keys must start with '{}'.",
            CREDENTIAL_PREFIX
        )));
    }
    Ok(())
}

/// Show only the prefix and last four characters of a key.
pub fn mask_credential(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Durable key/value settings file
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Create a new CredentialStore with default path
    pub fn new() -> Result<Self> {
        Ok(Self {
            path: default_settings_path()?,
        })
    }

    /// Create a new CredentialStore with custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Get the settings file path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load all settings.
    ///
    /// Returns an empty map if the file doesn't exist or is invalid
    pub fn load(&self) -> BTreeMap<String, String> {
        if !self.path.exists() {
            debug!("Settings file not found: {:?}", self.path);
            return BTreeMap::new();
        }

        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Failed to parse settings: {}", e);
                    BTreeMap::new()
                }
            },
            Err(e) => {
                warn!("Failed to read settings file: {}", e);
                BTreeMap::new()
            }
        }
    }

    fn save(&self, settings: &BTreeMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Stored API key, if any.
    pub fn api_key(&self) -> Option<String> {
        self.load()
            .remove(API_KEY_SETTING)
            .filter(|k| !k.trim().is_empty())
    }

    /// Validate and persist the API key.
    pub fn save_api_key(&self, key: &str) -> Result<()> {
        validate_credential(key)?;
        let mut settings = self.load();
        settings.insert(API_KEY_SETTING.to_string(), key.trim().to_string());
        self.save(&settings)?;
        info!("Saved API key to {:?}", self.path);
        Ok(())
    }

    /// Remove the stored API key, keeping other settings.
    pub fn clear_api_key(&self) -> Result<()> {
        let mut settings = self.load();
        if settings.remove(API_KEY_SETTING).is_some() {
            if settings.is_empty() {
                std::fs::remove_file(&self.path)?;
            } else {
                self.save(&settings)?;
            }
            info!("Cleared API key at {:?}", self.path);
        }
        Ok(())
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self {
            path: PathBuf::from(".orthopub_settings.json"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_credential() {
        assert!(validate_credential("sk-abc123").is_ok());
        assert!(matches!(validate_credential(""), Err(OrthoError::InvalidCredential(_))));
        assert!(matches!(validate_credential("   "), Err(OrthoError::InvalidCredential(_))));
        assert!(matches!(validate_credential("pk-abc123"), Err(OrthoError::InvalidCredential(_))));
    }

    #[test]
    fn test_mask_credential() {
        assert_eq!(mask_credential("sk-abcdefghijkl"), "sk-...ijkl");
        assert_eq!(mask_credential("sk-ab"), "*****");
    }

    #[test]
    fn test_load_missing() {
        let store = CredentialStore::with_path(PathBuf::from("/nonexistent/path/settings.json"));
        assert!(store.load().is_empty());
        assert!(store.api_key().is_none());
    }

    #[test]
    fn test_save_and_clear() -> Result<()> {
        let dir = TempDir::new()?;
        let store = CredentialStore::with_path(dir.path().join("settings.json"));

        store.save_api_key(" sk-test-key ")?;
        assert_eq!(store.api_key().as_deref(), Some("sk-test-key"));

        store.clear_api_key()?;
        assert!(store.api_key().is_none());
        assert!(!store.path().exists());
        Ok(())
    }

    #[test]
    fn test_rejects_invalid_key_without_writing() -> Result<()> {
        let dir = TempDir::new()?;
        let store = CredentialStore::with_path(dir.path().join("settings.json"));
        assert!(store.save_api_key("not-a-key").is_err());
        assert!(!store.path().exists());
        Ok(())
    }

    #[test]
    fn test_corrupt_file_is_ignored() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json")?;
        let store = CredentialStore::with_path(path);
        assert!(store.api_key().is_none());
        Ok(())
    }
}
