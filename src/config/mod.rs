//! Configuration module for the CallBridge gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use callbridge_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

/// Default OpenAI Realtime WebSocket endpoint
pub const DEFAULT_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Default realtime model
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-realtime";

/// Default realtime voice
pub const DEFAULT_REALTIME_VOICE: &str = "alloy";

/// Default sampling temperature passed on the realtime URL
pub const DEFAULT_REALTIME_TEMPERATURE: f32 = 0.8;

/// Default interval between liveness pings on each peer (ms)
pub const DEFAULT_LIVENESS_PROBE_INTERVAL_MS: u64 = 5000;

/// Default settling delay before `session.update` is sent (ms)
pub const DEFAULT_SESSION_UPDATE_DELAY_MS: u64 = 250;

/// Default TwiML `<Say>` voice
pub const DEFAULT_TWIML_SAY_VOICE: &str = "Google.en-GB-Standard-A";

/// Default TwiML greeting spoken before the stream connects
pub const DEFAULT_TWIML_GREETING: &str = "Hello, you are through to our virtual assistant.";

/// Instructions used when none are configured
pub const DEFAULT_INSTRUCTIONS: &str = "You are a warm, attentive voice assistant answering a phone call. \
Keep replies short and conversational, and ask one question at a time.";

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Realtime speech-to-speech session settings
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeSettings {
    /// WebSocket endpoint, without query string
    pub url: String,
    /// Model name sent as the `model` query parameter and in `session.update`
    pub model: String,
    /// Output voice
    pub voice: String,
    /// Sampling temperature (0.0 to 2.0)
    pub temperature: f32,
    /// System instructions, passed through unmodified
    pub instructions: String,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_REALTIME_URL.to_string(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
            voice: DEFAULT_REALTIME_VOICE.to_string(),
            temperature: DEFAULT_REALTIME_TEMPERATURE,
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

/// Relay timing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySettings {
    pub liveness_probe_interval_ms: u64,
    pub session_update_delay_ms: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            liveness_probe_interval_ms: DEFAULT_LIVENESS_PROBE_INTERVAL_MS,
            session_update_delay_ms: DEFAULT_SESSION_UPDATE_DELAY_MS,
        }
    }
}

/// Settings for the `/incoming-call` TwiML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwimlSettings {
    pub greeting: String,
    pub say_voice: String,
}

impl Default for TwimlSettings {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_TWIML_GREETING.to_string(),
            say_voice: DEFAULT_TWIML_SAY_VOICE.to_string(),
        }
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway:
/// - Server settings (host, port, TLS)
/// - OpenAI credential and realtime session settings
/// - Relay timing (liveness probe interval, session settling delay)
/// - TwiML greeting
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// OpenAI API key used as the bearer credential for every call
    pub openai_api_key: Option<String>,

    pub realtime: RealtimeSettings,
    pub relay: RelaySettings,
    pub twiml: TwimlSettings,
}

/// Zeroize the provider credential when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// Values not present in the environment fall back to defaults. The
    /// resulting configuration is validated before it is returned.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // .env is loaded in main.rs at application startup
        let yaml_config = yaml::YamlConfig::from_file(path)?;

        let config = merge::merge_config(Some(yaml_config))?;

        validation::validate(&config)?;

        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Get the OpenAI credential, or an error message if it is not configured
    pub fn openai_api_key(&self) -> Result<&str, String> {
        match self.openai_api_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err("OpenAI API key not configured (set OPENAI_API_KEY)".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    fn test_config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 5050,
            tls: None,
            openai_api_key: Some("sk-test".to_string()),
            realtime: RealtimeSettings::default(),
            relay: RelaySettings::default(),
            twiml: TwimlSettings::default(),
        }
    }

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            env::remove_var("HOST");
            env::remove_var("PORT");
            env::remove_var("OPENAI_API_KEY");
            env::remove_var("OPENAI_REALTIME_URL");
            env::remove_var("OPENAI_REALTIME_MODEL");
            env::remove_var("OPENAI_REALTIME_VOICE");
            env::remove_var("OPENAI_REALTIME_TEMPERATURE");
            env::remove_var("REALTIME_INSTRUCTIONS");
            env::remove_var("REALTIME_INSTRUCTIONS_PATH");
            env::remove_var("LIVENESS_PROBE_INTERVAL_MS");
            env::remove_var("SESSION_UPDATE_DELAY_MS");
            env::remove_var("TWIML_GREETING");
            env::remove_var("TWIML_SAY_VOICE");
            env::remove_var("TLS_CERT_PATH");
            env::remove_var("TLS_KEY_PATH");
        }
    }

    #[test]
    fn test_address() {
        let config = test_config();
        assert_eq!(config.address(), "127.0.0.1:5050");
        assert!(!config.is_tls_enabled());
    }

    #[test]
    fn test_openai_api_key_missing() {
        let mut config = test_config();
        config.openai_api_key = None;
        assert!(config.openai_api_key().is_err());

        config.openai_api_key = Some(String::new());
        assert!(config.openai_api_key().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "sk-env");
        }

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5050);
        assert_eq!(config.openai_api_key().unwrap(), "sk-env");
        assert_eq!(config.realtime, RealtimeSettings::default());
        assert_eq!(config.relay, RelaySettings::default());
        assert_eq!(config.twiml, TwimlSettings::default());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_requires_api_key() {
        cleanup_env_vars();

        let result = ServerConfig::from_env();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("OPENAI_API_KEY"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        cleanup_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("PORT", "8081");
            env::set_var("OPENAI_REALTIME_VOICE", "marin");
            env::set_var("OPENAI_REALTIME_TEMPERATURE", "0.6");
            env::set_var("LIVENESS_PROBE_INTERVAL_MS", "1000");
            env::set_var("REALTIME_INSTRUCTIONS", "Speak like a pirate.");
        }

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.realtime.voice, "marin");
        assert_eq!(config.realtime.temperature, 0.6);
        assert_eq!(config.relay.liveness_probe_interval_ms, 1000);
        assert_eq!(config.realtime.instructions, "Speak like a pirate.");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port() {
        cleanup_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("PORT", "not-a-port");
        }

        let result = ServerConfig::from_env();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("PORT"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080

providers:
  openai_api_key: "sk-yaml"

realtime:
  model: "gpt-realtime-mini"
  voice: "cedar"

relay:
  session_update_delay_ms: 100
"#;

        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "0.0.0.0");
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("OPENAI_REALTIME_VOICE", "alloy");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.openai_api_key().unwrap(), "sk-yaml");
        assert_eq!(config.realtime.model, "gpt-realtime-mini");
        assert_eq!(config.realtime.voice, "cedar");
        assert_eq!(config.relay.session_update_delay_ms, 100);
        // Untouched values keep their defaults
        assert_eq!(
            config.relay.liveness_probe_interval_ms,
            DEFAULT_LIVENESS_PROBE_INTERVAL_MS
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_instructions_path() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let prompt_path = temp_dir.path().join("prompt.md");
        fs::write(&prompt_path, "# Role\nYou are Roberto.\n").unwrap();

        let config_path = temp_dir.path().join("config.yaml");
        let yaml_content = format!(
            "providers:\n  openai_api_key: \"sk-yaml\"\nrealtime:\n  instructions_path: \"{}\"\n",
            prompt_path.display()
        );
        fs::write(&config_path, yaml_content).unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();
        assert_eq!(config.realtime.instructions, "# Role\nYou are Roberto.\n");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_temperature() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            "providers:\n  openai_api_key: \"sk\"\nrealtime:\n  temperature: 3.5\n",
        )
        .unwrap();

        let result = ServerConfig::from_file(&config_path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("temperature"));

        cleanup_env_vars();
    }
}
