use serde::{Deserialize, Serialize};

use crate::defaults::DEFAULT_BOT_CONFIG;

// -------------------------------------------------------------------------------------------------
// BotConfig
// -------------------------------------------------------------------------------------------------
/// The bot's behavior for a project, as set by the project's `.clabot` file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    /// The merge request label marking that every contributor has signed the CLA
    pub label: String,

    /// The comment left when contributors have not signed; `{{usersWithoutCLA}}` is substituted
    pub message: String,

    /// The comment left when commits lack an email address; `{{unidentifiedUsers}}` is substituted
    pub message_missing_email: String,

    /// The comment left after the bot was summoned to check again
    pub recheck_comment: String,

    /// Logins, email addresses, and `*@domain` wildcards of everyone who has signed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributors: Option<Vec<String>>,
}

impl BotConfig {
    /// The built-in configuration.
    pub fn defaults() -> Self {
        serde_json::from_str(DEFAULT_BOT_CONFIG).expect("default bot config should parse")
    }

    /// Overlay the contents of a project's `.clabot` file onto the built-in configuration.
    ///
    /// Only top-level keys are overridden; keys the file does not set keep their defaults.
    pub fn from_project_file(text: &str) -> Result<Self, ConfigError> {
        let overrides: serde_json::Value =
            serde_json::from_str(text).map_err(ConfigError::InvalidJson)?;
        let overrides = match overrides {
            serde_json::Value::Object(m) => m,
            _ => return Err(ConfigError::NotAnObject),
        };

        let mut merged: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(DEFAULT_BOT_CONFIG).expect("default bot config should parse");
        merged.extend(overrides);
        serde_json::from_value(serde_json::Value::Object(merged)).map_err(ConfigError::InvalidField)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

// -------------------------------------------------------------------------------------------------
// ConfigError
// -------------------------------------------------------------------------------------------------
#[derive(Debug)]
pub enum ConfigError {
    InvalidJson(serde_json::Error),
    NotAnObject,
    InvalidField(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidJson(e) => write!(f, "The .clabot file is not valid JSON: {e}"),
            ConfigError::NotAnObject => write!(f, "The .clabot file is not valid JSON: expected an object"),
            ConfigError::InvalidField(e) => write!(f, "The .clabot file has an invalid setting: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidJson(e) => Some(e),
            ConfigError::NotAnObject => None,
            ConfigError::InvalidField(e) => Some(e),
        }
    }
}
