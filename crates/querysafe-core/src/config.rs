use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow, bail};

pub const DEFAULT_DISPLAY_NAME: &str = "Assistant";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Embed-time settings for a widget instance.
///
/// A controller copies these when it is built; changing a config afterwards
/// does not affect widgets that already exist.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WidgetConfig {
    pub display_name: String,
    pub logo_url: Option<String>,
    pub base_url: String,
    pub chatbot_id: String,
    /// Render message text as markdown. When false, text is shown literally.
    pub formatting: bool,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            logo_url: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            chatbot_id: String::new(),
            formatting: true,
        }
    }
}

/// Values supplied on the command line. `None` leaves the loaded value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub display_name: Option<String>,
    pub logo_url: Option<String>,
    pub base_url: Option<String>,
    pub chatbot_id: Option<String>,
    pub plain_text: bool,
}

impl WidgetConfig {
    pub fn new(base_url: &str, chatbot_id: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            chatbot_id: chatbot_id.to_string(),
            ..Self::default()
        }
    }

    /// Load from the default config path. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)?;
        let config: WidgetConfig = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {}: {}", path.display(), e))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Apply `QUERYSAFE_*` environment variables on top of the loaded values.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup("QUERYSAFE_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(chatbot_id) = lookup("QUERYSAFE_CHATBOT_ID") {
            self.chatbot_id = chatbot_id;
        }
        if let Some(name) = lookup("QUERYSAFE_NAME") {
            self.display_name = name;
        }
        if let Some(logo) = lookup("QUERYSAFE_LOGO_URL") {
            self.logo_url = Some(logo);
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(base_url) = &overrides.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(chatbot_id) = &overrides.chatbot_id {
            self.chatbot_id = chatbot_id.clone();
        }
        if let Some(name) = &overrides.display_name {
            self.display_name = name.clone();
        }
        if let Some(logo) = &overrides.logo_url {
            self.logo_url = Some(logo.clone());
        }
        if overrides.plain_text {
            self.formatting = false;
        }
    }

    /// Normalize and check the config before a widget is built from it.
    pub fn validate(mut self) -> Result<Self> {
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if self.base_url.is_empty() {
            bail!("base_url must not be empty (set it in the config file, QUERYSAFE_BASE_URL or --base-url)");
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            bail!("base_url must start with http:// or https://, got {}", self.base_url);
        }

        self.chatbot_id = self.chatbot_id.trim().to_string();
        if self.chatbot_id.is_empty() {
            bail!("chatbot_id must not be empty (set it in the config file, QUERYSAFE_CHATBOT_ID or --chatbot-id)");
        }

        if self.display_name.trim().is_empty() {
            self.display_name = DEFAULT_DISPLAY_NAME.to_string();
        }
        self.logo_url = self.logo_url.filter(|url| !url.trim().is_empty());

        Ok(self)
    }

    /// First two characters of the display name, shown when there is no logo.
    pub fn initials(&self) -> String {
        self.display_name.chars().take(2).collect()
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("querysafe").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = WidgetConfig::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, WidgetConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("querysafe").join("config.json");

        let mut config = WidgetConfig::new("https://bots.example.com", "bot-42");
        config.display_name = "Metric Vibes".to_string();
        config.save_to(&path).unwrap();

        let loaded = WidgetConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "chatbot_id": "bot-1" }"#).unwrap();

        let config = WidgetConfig::load_from(&path).unwrap();
        assert_eq!(config.chatbot_id, "bot-1");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.formatting);
    }

    #[test]
    fn test_env_then_cli_overrides() {
        let env: HashMap<&str, &str> = [
            ("QUERYSAFE_BASE_URL", "https://env.example.com"),
            ("QUERYSAFE_CHATBOT_ID", "env-bot"),
        ]
        .into_iter()
        .collect();

        let mut config = WidgetConfig::default();
        config.apply_env_from(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.base_url, "https://env.example.com");
        assert_eq!(config.chatbot_id, "env-bot");

        config.apply_overrides(&ConfigOverrides {
            chatbot_id: Some("cli-bot".to_string()),
            plain_text: true,
            ..ConfigOverrides::default()
        });
        assert_eq!(config.base_url, "https://env.example.com");
        assert_eq!(config.chatbot_id, "cli-bot");
        assert!(!config.formatting);
    }

    #[test]
    fn test_validate_trims_trailing_slash() {
        let config = WidgetConfig::new("https://bots.example.com//", "bot")
            .validate()
            .unwrap();
        assert_eq!(config.base_url, "https://bots.example.com");
    }

    #[test]
    fn test_validate_rejects_missing_values() {
        assert!(WidgetConfig::new("", "bot").validate().is_err());
        assert!(WidgetConfig::new("ftp://x", "bot").validate().is_err());
        assert!(WidgetConfig::new("https://x", "  ").validate().is_err());
    }

    #[test]
    fn test_initials() {
        let mut config = WidgetConfig::new("https://x", "bot");
        config.display_name = "Écho Bot".to_string();
        assert_eq!(config.initials(), "Éc");

        config.display_name = "   ".to_string();
        let config = config.validate().unwrap();
        assert_eq!(config.initials(), "As");
    }
}
