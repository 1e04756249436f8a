//! OpenAI Realtime API connector.
//!
//! Opens one WebSocket per call to `<url>?model=<model>&temperature=<t>`
//! with a bearer credential, and builds the `session.update` sent once the
//! connection has settled.
//!
//! # Example
//!
//! ```rust,ignore
//! use callbridge_gateway::core::realtime::RealtimeConnector;
//!
//! let connector = RealtimeConnector::from_config(&config)?;
//! let socket = connector.connect().await?;
//! let session_update = serde_json::to_string(&connector.session_update())?;
//! ```

use std::sync::Arc;

use http::HeaderValue;
use http::header::AUTHORIZATION;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::messages::{
    AudioConfig, AudioFormat, AudioInputConfig, AudioOutputConfig, ClientEvent, SessionConfig,
    TurnDetection,
};
use crate::config::{RealtimeSettings, ServerConfig};
use crate::errors::{RelayError, RelayResult};

/// Client socket type produced by [`RealtimeConnector::connect`]
pub type RealtimeSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens Realtime API connections for new calls
///
/// Cheap to clone; the credential is shared and wiped when the last clone drops.
#[derive(Clone)]
pub struct RealtimeConnector {
    settings: RealtimeSettings,
    api_key: Arc<Zeroizing<String>>,
}

impl std::fmt::Debug for RealtimeConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeConnector")
            .field("url", &self.settings.url)
            .field("model", &self.settings.model)
            .field("voice", &self.settings.voice)
            .finish_non_exhaustive()
    }
}

impl RealtimeConnector {
    pub fn new(settings: RealtimeSettings, api_key: impl Into<String>) -> Self {
        Self {
            settings,
            api_key: Arc::new(Zeroizing::new(api_key.into())),
        }
    }

    pub fn from_config(config: &ServerConfig) -> RelayResult<Self> {
        let api_key = config
            .openai_api_key()
            .map_err(RelayError::InvalidConfiguration)?;
        Ok(Self::new(config.realtime.clone(), api_key))
    }

    pub fn settings(&self) -> &RealtimeSettings {
        &self.settings
    }

    /// Endpoint URL with `model` and `temperature` query parameters
    pub fn endpoint(&self) -> RelayResult<url::Url> {
        let mut url = url::Url::parse(&self.settings.url).map_err(|e| {
            RelayError::InvalidConfiguration(format!(
                "invalid realtime URL '{}': {e}",
                self.settings.url
            ))
        })?;
        url.query_pairs_mut()
            .append_pair("model", &self.settings.model)
            .append_pair("temperature", &self.settings.temperature.to_string());
        Ok(url)
    }

    /// Open a new Realtime API connection
    pub async fn connect(&self) -> RelayResult<RealtimeSocket> {
        let endpoint = self.endpoint()?;

        let mut request = endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| RelayError::ConnectionFailed(e.to_string()))?;
        let bearer = Zeroizing::new(format!("Bearer {}", self.api_key.as_str()));
        let mut auth = HeaderValue::from_str(&bearer)
            .map_err(|e| RelayError::InvalidConfiguration(format!("invalid API key: {e}")))?;
        auth.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, auth);

        debug!(host = endpoint.host_str().unwrap_or_default(), "Connecting to realtime API");
        let (socket, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RelayError::ConnectionFailed(e.to_string()))?;

        info!(
            status = response.status().as_u16(),
            model = %self.settings.model,
            "Connected to realtime API"
        );
        Ok(socket)
    }

    /// The `session.update` event configuring a telephony-compatible session
    pub fn session_update(&self) -> ClientEvent {
        ClientEvent::SessionUpdate {
            session: SessionConfig {
                session_type: "realtime".to_string(),
                model: self.settings.model.clone(),
                output_modalities: vec!["audio".to_string()],
                audio: AudioConfig {
                    input: AudioInputConfig {
                        format: AudioFormat::Pcmu,
                        turn_detection: TurnDetection::ServerVad {
                            threshold: None,
                            prefix_padding_ms: None,
                            silence_duration_ms: None,
                        },
                    },
                    output: AudioOutputConfig {
                        format: AudioFormat::Pcmu,
                        voice: self.settings.voice.clone(),
                    },
                },
                instructions: self.settings.instructions.clone(),
            },
        }
    }
}
