//! WebSocket transport
//!
//! tokio-tungstenite 기반 클라이언트 채널

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, protocol::Message as WsMessage};
use tokio_tungstenite::{connect_async_tls_with_config, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::{Connector, Transport, TransportError, TransportResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// WebSocketConnector - 웹소켓 채널 생성기
// ============================================================================

/// 웹소켓 채널 생성기
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &Url, validate_cert: bool) -> TransportResult<Box<dyn Transport>> {
        let transport = WebSocketTransport::connect(url, validate_cert).await?;
        Ok(Box::new(transport))
    }
}

// ============================================================================
// WebSocketTransport - 웹소켓 채널
// ============================================================================

/// 웹소켓 채널
///
/// 송신/수신 절반을 각각 잠가서, 한 연결에서 쓰기와 읽기가 서로를
/// 막지 않습니다.
pub struct WebSocketTransport {
    /// 송신 절반
    sink: Mutex<SplitSink<WsStream, WsMessage>>,
    /// 수신 절반
    stream: Mutex<SplitStream<WsStream>>,
    /// 닫힘 여부
    closed: AtomicBool,
    /// 접속 URL
    url: String,
}

impl WebSocketTransport {
    /// 웹소켓 연결
    ///
    /// `wss` 스킴일 때만 TLS 커넥터를 사용합니다.
    pub async fn connect(url: &Url, validate_cert: bool) -> TransportResult<Self> {
        let tls = if url.scheme() == "wss" {
            Some(tls_connector(validate_cert)?)
        } else {
            None
        };

        let (ws, _response) = connect_async_tls_with_config(url.as_str(), None, true, tls)
            .await
            .map_err(|e| TransportError::Connect(format!("{}: {}", url, e)))?;

        let (sink, stream) = ws.split();

        Ok(Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: AtomicBool::new(false),
            url: url.to_string(),
        })
    }

    /// 접속 URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_frame(&self, frame: Bytes, binary: bool) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let message = if binary {
            WsMessage::Binary(frame)
        } else {
            let text = String::from_utf8(frame.to_vec())
                .map_err(|e| TransportError::Io(format!("text frame is not UTF-8: {}", e)))?;
            WsMessage::Text(text.into())
        };

        let mut sink = self.sink.lock().await;
        sink.send(message).await.map_err(|e| {
            if is_closed_error(&e) {
                self.closed.store(true, Ordering::SeqCst);
                TransportError::Closed
            } else {
                TransportError::Io(e.to_string())
            }
        })
    }

    async fn receive_frame(&self) -> TransportResult<Option<Bytes>> {
        let mut stream = self.stream.lock().await;

        loop {
            match stream.next().await {
                Some(Ok(WsMessage::Binary(data))) => return Ok(Some(data)),
                Some(Ok(WsMessage::Text(text))) => {
                    return Ok(Some(Bytes::copy_from_slice(text.as_bytes())))
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    self.closed.store(true, Ordering::SeqCst);
                    return Ok(None);
                }
                // ping/pong은 tungstenite가 처리
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.closed.store(true, Ordering::SeqCst);
                    if is_closed_error(&e) {
                        return Ok(None);
                    }
                    return Err(TransportError::Io(e.to_string()));
                }
            }
        }
    }

    async fn close(&self) -> TransportResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut sink = self.sink.lock().await;
        match sink.close().await {
            Ok(()) => Ok(()),
            Err(e) if is_closed_error(&e) => Ok(()),
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("url", &self.url)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn tls_connector(validate_cert: bool) -> TransportResult<tokio_tungstenite::Connector> {
    let tls = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(!validate_cert)
        .danger_accept_invalid_hostnames(!validate_cert)
        .build()
        .map_err(|e| TransportError::Tls(e.to_string()))?;
    Ok(tokio_tungstenite::Connector::NativeTls(tls))
}

fn is_closed_error(err: &tungstenite::Error) -> bool {
    matches!(
        err,
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_connector_builds() {
        assert!(tls_connector(false).is_ok());
        assert!(tls_connector(true).is_ok());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // 포트 1은 열려 있지 않음
        let url = Url::parse("ws://127.0.0.1:1/gremlin").unwrap();
        let result = WebSocketConnector.open(&url, false).await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }

    #[test]
    fn test_closed_error_classification() {
        assert!(is_closed_error(&tungstenite::Error::ConnectionClosed));
        assert!(is_closed_error(&tungstenite::Error::AlreadyClosed));
        assert!(!is_closed_error(&tungstenite::Error::Io(std::io::Error::other("reset"))));
    }
}
