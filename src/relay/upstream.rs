//! Upstream transcription service leg
//!
//! One WebSocket per relay session, opened with fixed acquisition
//! parameters (16kHz PCM16LE, turn-formatted output) and an optional
//! vocabulary boost list. The credential travels in the Authorization
//! header only — never in the URL, never to the client.

use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::audio::SAMPLE_RATE;
use crate::config::UpstreamSettings;
use crate::{Error, Result};

/// The upstream half of a relay session
pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection factory for the upstream transcription service
#[derive(Debug, Clone)]
pub struct Upstream {
    url: String,
    api_key: Option<SecretString>,
    keyterms: Vec<String>,
}

impl Upstream {
    /// Build from configuration
    #[must_use]
    pub fn new(settings: &UpstreamSettings) -> Self {
        Self {
            url: settings.url.clone(),
            api_key: settings.api_key.clone(),
            keyterms: settings.keyterms.clone(),
        }
    }

    /// Open a new upstream connection for one relay session
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unusable endpoint URL or
    /// credential, [`Error::Upstream`] when the connect itself fails
    pub async fn connect(&self) -> Result<UpstreamSocket> {
        let url = build_url(&self.url, &self.keyterms)?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::Config(format!("upstream request: {e}")))?;

        if let Some(key) = &self.api_key {
            let value = HeaderValue::from_str(key.expose_secret())
                .map_err(|_| Error::Config("upstream api key is not a valid header".to_string()))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (socket, response) = connect_async(request)
            .await
            .map_err(|e| Error::Upstream(format!("connect failed: {e}")))?;

        tracing::debug!(status = %response.status(), "upstream connected");
        Ok(socket)
    }
}

/// Append the fixed acquisition parameters to the endpoint URL
fn build_url(endpoint: &str, keyterms: &[String]) -> Result<Url> {
    let mut url =
        Url::parse(endpoint).map_err(|e| Error::Config(format!("upstream url: {e}")))?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("sample_rate", &SAMPLE_RATE.to_string());
        query.append_pair("encoding", "pcm_s16le");
        query.append_pair("format_turns", "true");
        if !keyterms.is_empty() {
            let hints = serde_json::to_string(keyterms)?;
            query.append_pair("keyterms_prompt", &hints);
        }
    }

    Ok(url)
}
