//! Transport
//!
//! 메시지 단위 양방향 채널 추상화
//!
//! 코어(Connection, ResponseStream, Pool)는 이 두 트레이트에만 의존합니다.
//! 실제 구현은 [`websocket`] 모듈의 웹소켓 클라이언트입니다.
//!
//! ```text
//! GraphDatabase
//!   └── Connector::open(url)  ──►  Box<dyn Transport>
//!                                    ├── send_frame
//!                                    ├── receive_frame
//!                                    └── close / is_closed
//! ```

pub mod websocket;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use url::Url;

pub use websocket::{WebSocketConnector, WebSocketTransport};

// ============================================================================
// TransportError - 트랜스포트 에러
// ============================================================================

/// 트랜스포트 에러
#[derive(Error, Debug)]
pub enum TransportError {
    /// 연결 수립 실패
    #[error("connect failed: {0}")]
    Connect(String),

    /// TLS 설정 실패
    #[error("tls error: {0}")]
    Tls(String),

    /// 이미 닫힌 채널
    #[error("channel closed")]
    Closed,

    /// 송수신 실패
    #[error("{0}")]
    Io(String),
}

/// 트랜스포트 결과 타입
pub type TransportResult<T> = Result<T, TransportError>;

// ============================================================================
// Transport - 열린 채널
// ============================================================================

/// 열린 메시지 채널
///
/// 소유자는 [`Connection`](super::Connection) 하나뿐이며, 닫을 수 있는 것도
/// 그 연결뿐입니다. 원격 측이 먼저 닫을 수 있으므로 `is_closed`는 항상
/// 실제 채널 상태를 반영해야 합니다.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// 프레임 전송
    async fn send_frame(&self, frame: Bytes, binary: bool) -> TransportResult<()>;

    /// 다음 프레임 수신 (원격 종료 시 `None`)
    async fn receive_frame(&self) -> TransportResult<Option<Bytes>>;

    /// 채널 닫기
    async fn close(&self) -> TransportResult<()>;

    /// 닫힘 여부
    fn is_closed(&self) -> bool;
}

// ============================================================================
// Connector - 채널 생성기
// ============================================================================

/// 채널 생성기
///
/// 연결 타임아웃은 호출 측([`GraphDatabase`](super::GraphDatabase))이
/// 적용합니다.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// URL로 채널 열기
    async fn open(&self, url: &Url, validate_cert: bool) -> TransportResult<Box<dyn Transport>>;
}
