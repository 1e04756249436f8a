use std::path::PathBuf;

use super::utils::{env_parse, env_string, read_instructions};
use super::{RealtimeSettings, RelaySettings, ServerConfig, TlsConfig, TwimlSettings};

/// Load configuration from environment variables, falling back to defaults
///
/// Instructions come from `REALTIME_INSTRUCTIONS` when set, otherwise from the
/// file named by `REALTIME_INSTRUCTIONS_PATH`. TLS is only configured when
/// both `TLS_CERT_PATH` and `TLS_KEY_PATH` are present; a lone path is left
/// for validation to reject.
pub(super) fn load_from_env() -> Result<(ServerConfig, PartialTls), Box<dyn std::error::Error>> {
    let mut realtime = RealtimeSettings::default();
    if let Some(url) = env_string("OPENAI_REALTIME_URL") {
        realtime.url = url;
    }
    if let Some(model) = env_string("OPENAI_REALTIME_MODEL") {
        realtime.model = model;
    }
    if let Some(voice) = env_string("OPENAI_REALTIME_VOICE") {
        realtime.voice = voice;
    }
    if let Some(temperature) = env_parse::<f32>("OPENAI_REALTIME_TEMPERATURE")? {
        realtime.temperature = temperature;
    }
    if let Some(instructions) = env_string("REALTIME_INSTRUCTIONS") {
        realtime.instructions = instructions;
    } else if let Some(path) = env_string("REALTIME_INSTRUCTIONS_PATH") {
        realtime.instructions = read_instructions(&PathBuf::from(path))?;
    }

    let mut relay = RelaySettings::default();
    if let Some(interval) = env_parse::<u64>("LIVENESS_PROBE_INTERVAL_MS")? {
        relay.liveness_probe_interval_ms = interval;
    }
    if let Some(delay) = env_parse::<u64>("SESSION_UPDATE_DELAY_MS")? {
        relay.session_update_delay_ms = delay;
    }

    let mut twiml = TwimlSettings::default();
    if let Some(greeting) = env_string("TWIML_GREETING") {
        twiml.greeting = greeting;
    }
    if let Some(voice) = env_string("TWIML_SAY_VOICE") {
        twiml.say_voice = voice;
    }

    let tls = PartialTls {
        cert_path: env_string("TLS_CERT_PATH").map(PathBuf::from),
        key_path: env_string("TLS_KEY_PATH").map(PathBuf::from),
    };

    let config = ServerConfig {
        host: env_string("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
        port: env_parse::<u16>("PORT")?.unwrap_or(5050),
        tls: None,
        openai_api_key: env_string("OPENAI_API_KEY"),
        realtime,
        relay,
        twiml,
    };

    Ok((config, tls))
}

/// TLS paths as collected from env and YAML before they are paired up
#[derive(Debug, Default, Clone)]
pub(super) struct PartialTls {
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

impl PartialTls {
    /// Pair the paths into a [`TlsConfig`], or fail if only one is present
    pub fn resolve(self) -> Result<Option<TlsConfig>, String> {
        match (self.cert_path, self.key_path) {
            (Some(cert_path), Some(key_path)) => Ok(Some(TlsConfig {
                cert_path,
                key_path,
            })),
            (None, None) => Ok(None),
            (Some(_), None) => {
                Err("TLS certificate path is set but the key path is missing".to_string())
            }
            (None, Some(_)) => {
                Err("TLS key path is set but the certificate path is missing".to_string())
            }
        }
    }
}
