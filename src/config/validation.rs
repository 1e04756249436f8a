use super::ServerConfig;

/// Validate a fully merged configuration
///
/// # Errors
/// Returns an error when:
/// - `OPENAI_API_KEY` is missing or empty
/// - the temperature lies outside 0.0..=2.0
/// - the liveness probe interval is zero
/// - the realtime URL is not a `ws`/`wss` URL
/// - a configured TLS file does not exist
pub(super) fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.openai_api_key()?;

    let temperature = config.realtime.temperature;
    if !(0.0..=2.0).contains(&temperature) {
        return Err(format!(
            "Invalid realtime temperature {temperature}: must be between 0.0 and 2.0"
        )
        .into());
    }

    if config.relay.liveness_probe_interval_ms == 0 {
        return Err("LIVENESS_PROBE_INTERVAL_MS must be greater than zero".into());
    }

    let url = url::Url::parse(&config.realtime.url)
        .map_err(|e| format!("Invalid realtime URL '{}': {}", config.realtime.url, e))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(format!(
            "Invalid realtime URL '{}': scheme must be ws or wss",
            config.realtime.url
        )
        .into());
    }

    if let Some(tls) = &config.tls {
        if !tls.cert_path.exists() {
            return Err(format!(
                "TLS certificate file not found: {}",
                tls.cert_path.display()
            )
            .into());
        }
        if !tls.key_path.exists() {
            return Err(format!("TLS key file not found: {}", tls.key_path.display()).into());
        }
    }

    Ok(())
}
