//! Duplex text transport to the device.
//!
//! [`Transport`] is the seam between the command channel and the network.
//! Production code uses [`WsConnector`], which opens a WebSocket with
//! `tokio-tungstenite`; tests use the simulated device in [`crate::mock`].

use crate::error::{GtrError, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::io::ErrorKind;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use url::Url;

/// One established link carrying JSON text frames.
#[async_trait]
pub trait Transport: Send {
    /// Send one text frame.
    ///
    /// Fails with [`GtrError::NotConnected`] when the peer already closed the
    /// link.
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Wait for the next text frame. `Ok(None)` means the peer closed the link.
    async fn recv_text(&mut self) -> Result<Option<String>>;

    /// Close the link.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for [`Transport`] links.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a link to the normalized command URL.
    async fn connect(&self, url: &Url) -> Result<Box<dyn Transport>>;
}

/// Opens WebSocket links.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Transport>> {
        let (stream, response) =
            connect_async(url.as_str())
                .await
                .map_err(|e| GtrError::ConnectionFailed {
                    address: url.to_string(),
                    reason: e.to_string(),
                })?;
        debug!(url = %url, status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WsTransport { stream }))
    }
}

/// WebSocket link produced by [`WsConnector`].
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

fn is_closure(err: &WsError) -> bool {
    match err {
        WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        // a rebooting device may reset the socket instead of closing it
        WsError::Io(e) => matches!(
            e.kind(),
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
        ),
        _ => false,
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| {
                if is_closure(&e) {
                    GtrError::NotConnected
                } else {
                    GtrError::Transport(e.to_string())
                }
            })
    }

    async fn recv_text(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                None | Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Binary(bytes))) => {
                    return String::from_utf8(bytes.to_vec())
                        .map(Some)
                        .map_err(|e| GtrError::Transport(format!("non-UTF-8 frame: {e}")));
                }
                Some(Ok(other)) => trace!(?other, "ignoring control frame"),
                Some(Err(e)) if is_closure(&e) => return Ok(None),
                Some(Err(e)) => return Err(GtrError::Transport(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(e) if is_closure(&e) => Ok(()),
            Err(e) => Err(GtrError::Transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refused_connection_reports_address() {
        // Port 9 (discard) is not expected to run a WebSocket server locally.
        let url = Url::parse("ws://127.0.0.1:9/api/cmd").unwrap();
        let err = WsConnector.connect(&url).await.err().unwrap();
        match err {
            GtrError::ConnectionFailed { address, .. } => {
                assert_eq!(address, "ws://127.0.0.1:9/api/cmd");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn closure_errors_are_classified() {
        assert!(is_closure(&WsError::ConnectionClosed));
        assert!(is_closure(&WsError::AlreadyClosed));
        assert!(!is_closure(&WsError::Io(std::io::Error::new(
            ErrorKind::Other,
            "boom"
        ))));
    }

    #[test]
    fn socket_reset_counts_as_closure() {
        for kind in [
            ErrorKind::ConnectionReset,
            ErrorKind::ConnectionAborted,
            ErrorKind::BrokenPipe,
        ] {
            assert!(
                is_closure(&WsError::Io(std::io::Error::from(kind))),
                "{kind:?}"
            );
        }
        assert!(!is_closure(&WsError::Io(std::io::Error::from(
            ErrorKind::TimedOut
        ))));
    }
}
