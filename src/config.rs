//! Service configuration.
//!
//! Sources, later ones winning:
//! 1. `config/default.toml`
//! 2. `config/{CIRCLEPOLL_ENV}.toml` (defaults to `development`)
//! 3. `CIRCLEPOLL__SECTION__KEY` environment variables

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub polls: PollSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Without a URL the service runs on the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
}

/// Deployment policy for the poll engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Minimum number of non-creator members a poll needs as candidates.
    pub min_candidates: usize,
    /// How long after creation the creator may still delete a poll.
    pub delete_window_hours: i64,
    /// Templates used more often than this count as popular.
    pub popular_threshold: i64,
    /// Accept absolute deadlines in addition to the fixed durations.
    pub allow_custom_deadline: bool,
    pub max_custom_deadline_hours: i64,
    /// Lead time for the "ending soon" announcement.
    pub ending_soon_minutes: i64,
    /// Secret mixed into voter commitment salts.
    pub commitment_pepper: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 20,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            min_candidates: 2,
            delete_window_hours: 24,
            popular_threshold: 10,
            allow_custom_deadline: false,
            max_custom_deadline_hours: 168,
            ending_soon_minutes: 30,
            commitment_pepper: String::new(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("CIRCLEPOLL_ENV").unwrap_or_else(|_| "development".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CIRCLEPOLL")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let polls = PollSettings::default();
        assert_eq!(polls.min_candidates, 2);
        assert_eq!(polls.delete_window_hours, 24);
        assert!(!polls.allow_custom_deadline);
        assert!(Settings::default().database.url.is_none());
    }

    #[test]
    fn partial_sources_fill_in_defaults() {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(
                "[polls]\nmin_candidates = 3\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.polls.min_candidates, 3);
        assert_eq!(settings.polls.popular_threshold, 10);
        assert_eq!(settings.server.port, 8080);
    }
}
