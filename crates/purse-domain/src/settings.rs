//! The singleton user-preferences record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::Deserializer, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::common::Identifiable;

/// Stores user preferences under the fixed key [`Settings::KEY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "Settings::main_key")]
    pub key: String,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "Settings::default_language")]
    pub language: String,
    #[serde(default = "Settings::enabled")]
    pub daily_reminder: bool,
    #[serde(default)]
    pub location_tracking: bool,
    #[serde(default = "Settings::enabled")]
    pub auto_categorize: bool,
    #[serde(default = "Utc::now")]
    pub installation_date: DateTime<Utc>,
    #[serde(default = "Settings::default_alert_threshold")]
    pub budget_alert_threshold: u8,
    /// Preferences this version does not know about, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Settings {
    pub const KEY: &'static str = "main";

    pub fn main_key() -> String {
        Self::KEY.into()
    }

    pub fn default_language() -> String {
        "en".into()
    }

    pub fn default_alert_threshold() -> u8 {
        80
    }

    fn enabled() -> bool {
        true
    }

    /// Overlays a partial legacy/imported settings object on the defaults and
    /// pins the singleton key.
    pub fn from_partial(value: Value) -> Result<Self, serde_json::Error> {
        let mut object = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => return serde_json::from_value(other),
        };
        object.insert("key".into(), Value::String(Self::KEY.into()));
        serde_json::from_value(Value::Object(object))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key: Self::main_key(),
            theme: Theme::default(),
            language: Self::default_language(),
            daily_reminder: true,
            location_tracking: false,
            auto_categorize: true,
            installation_date: Utc::now(),
            budget_alert_threshold: Self::default_alert_threshold(),
            extra: Map::new(),
        }
    }
}

impl Identifiable for Settings {
    fn id(&self) -> &str {
        &self.key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Auto,
    Light,
    Dark,
}

impl Theme {
    pub fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Theme::Light,
            "dark" => Theme::Dark,
            _ => Theme::Auto,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Theme::Auto => "auto",
            Theme::Light => "light",
            Theme::Dark => "dark",
        };
        f.write_str(label)
    }
}

impl<'de> Deserialize<'de> for Theme {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.map(|v| Theme::from_str(&v)).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_settings_fill_defaults_and_keep_unknown_keys() {
        let settings = Settings::from_partial(json!({
            "theme": "dark",
            "budgetAlertThreshold": 90,
            "currency": "EUR"
        }))
        .unwrap();
        assert_eq!(settings.key, Settings::KEY);
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(settings.budget_alert_threshold, 90);
        assert!(settings.daily_reminder);
        assert_eq!(settings.extra.get("currency"), Some(&json!("EUR")));

        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back["currency"], json!("EUR"));
        assert_eq!(back["key"], json!("main"));
    }

    #[test]
    fn unknown_theme_falls_back_to_auto() {
        let settings = Settings::from_partial(json!({ "theme": "solarized" })).unwrap();
        assert_eq!(settings.theme, Theme::Auto);
    }
}
