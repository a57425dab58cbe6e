use anyhow::Context;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

pub type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open a websocket to `url`, authenticating the handshake with `token`
/// when one is available.
pub async fn open_socket(url: &str, token: Option<&str>) -> anyhow::Result<SocketStream> {
    let mut request = url
        .into_client_request()
        .with_context(|| format!("invalid socket url {url}"))?;

    if let Some(token) = token {
        let value = HeaderValue::from_str(token).context("token is not a valid header value")?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    let (stream, response) = connect_async(request)
        .await
        .with_context(|| format!("websocket handshake with {url} failed"))?;

    debug!(
        url,
        status = %response.status(),
        authenticated = token.is_some(),
        "websocket handshake complete"
    );

    Ok(stream)
}
