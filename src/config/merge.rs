use super::env::load_from_env;
use super::utils::read_instructions;
use super::yaml::YamlConfig;
use super::ServerConfig;

/// Merge YAML configuration on top of the environment
///
/// Every value present in the YAML file replaces the corresponding
/// environment value. Absent YAML sections leave the environment untouched.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let (mut config, mut tls) = load_from_env()?;

    if let Some(yaml) = yaml {
        if let Some(server) = yaml.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if let Some(yaml_tls) = server.tls {
                if yaml_tls.cert_path.is_some() {
                    tls.cert_path = yaml_tls.cert_path;
                }
                if yaml_tls.key_path.is_some() {
                    tls.key_path = yaml_tls.key_path;
                }
            }
        }

        if let Some(providers) = yaml.providers
            && let Some(key) = providers.openai_api_key
        {
            config.openai_api_key = Some(key);
        }

        if let Some(realtime) = yaml.realtime {
            if let Some(url) = realtime.url {
                config.realtime.url = url;
            }
            if let Some(model) = realtime.model {
                config.realtime.model = model;
            }
            if let Some(voice) = realtime.voice {
                config.realtime.voice = voice;
            }
            if let Some(temperature) = realtime.temperature {
                config.realtime.temperature = temperature;
            }
            if let Some(instructions) = realtime.instructions {
                config.realtime.instructions = instructions;
            } else if let Some(path) = realtime.instructions_path {
                config.realtime.instructions = read_instructions(&path)?;
            }
        }

        if let Some(relay) = yaml.relay {
            if let Some(interval) = relay.liveness_probe_interval_ms {
                config.relay.liveness_probe_interval_ms = interval;
            }
            if let Some(delay) = relay.session_update_delay_ms {
                config.relay.session_update_delay_ms = delay;
            }
        }

        if let Some(twiml) = yaml.twiml {
            if let Some(greeting) = twiml.greeting {
                config.twiml.greeting = greeting;
            }
            if let Some(voice) = twiml.say_voice {
                config.twiml.say_voice = voice;
            }
        }
    }

    config.tls = tls.resolve()?;

    Ok(config)
}
