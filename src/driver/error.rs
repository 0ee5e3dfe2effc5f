//! Driver Error Types
//!
//! 드라이버 에러 정의

use std::time::Duration;

use thiserror::Error;

use super::transport::TransportError;
use crate::protocol::ProtocolError;

// ============================================================================
// DriverError - 드라이버 에러
// ============================================================================

/// 드라이버 에러
///
/// 호출자는 응답 메시지, 스트림 종료 표시, 또는 이 에러 중 하나만 받습니다.
/// 트랜스포트 구현의 에러 타입은 그대로 노출되지 않습니다.
#[derive(Error, Debug)]
pub enum DriverError {
    /// 연결 실패 (소켓, DNS, 핸드셰이크, TLS)
    #[error("Connection error: {0}")]
    Connect(String),

    /// 연결 타임아웃
    #[error("Connection timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// 응답 파싱 실패
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// 서버 에러 응답
    #[error("Server error: {code} - {message}")]
    Server {
        /// 응답 상태 코드
        code: u16,
        /// 서버가 보낸 상태 메시지
        message: String,
    },

    /// 세션 프로세서에 세션 ID 없음
    #[error("Session processor requires a session id")]
    MissingSession,

    /// 지원하지 않는 MIME 타입
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// 이미 닫힌 연결
    #[error("Connection has been closed")]
    ConnectionClosed,

    /// 인증 핸드셰이크 실패
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// 응답 대기 타임아웃
    #[error("Read timed out after {0:?}")]
    ReadTimeout(Duration),

    /// 트랜스포트 에러
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 풀 장부 에러
    #[error("Pool error: {0}")]
    Pool(String),

    /// 닫힌 풀
    #[error("Pool is closed")]
    PoolClosed,

    /// 대기 중인 획득 요청 취소
    #[error("Acquire cancelled")]
    Cancelled,

    /// 스트림 종료 후 연결 정리 실패
    #[error("Connection disposal failed: {0}")]
    Disposal(Box<DriverError>),
}

impl DriverError {
    /// 연결 에러 생성
    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }

    /// 인증 에러 생성
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// 서버 에러 생성
    pub fn server(code: u16, message: impl Into<String>) -> Self {
        Self::Server {
            code,
            message: message.into(),
        }
    }

    /// 설정 에러 생성
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 풀 에러 생성
    pub fn pool(msg: impl Into<String>) -> Self {
        Self::Pool(msg.into())
    }

    /// 정리 에러 생성
    pub fn disposal(err: DriverError) -> Self {
        Self::Disposal(Box::new(err))
    }

    /// 재시도 가능 여부
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect(_) | Self::ConnectTimeout(_) | Self::ConnectionClosed => true,
            Self::Server { code, .. } => is_retryable_code(*code),
            _ => false,
        }
    }

    /// 클라이언트 에러 여부
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingSession
                | Self::UnsupportedEncoding(_)
                | Self::Configuration(_)
                | Self::Authentication(_)
        )
    }
}

/// 재시도 가능한 서버 상태 코드 확인
///
/// 500 (서버 내부 에러), 598 (서버 측 타임아웃)
fn is_retryable_code(code: u16) -> bool {
    matches!(code, 500 | 598)
}

impl From<ProtocolError> for DriverError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnsupportedEncoding(mime) => DriverError::UnsupportedEncoding(mime),
            ProtocolError::MissingSession => DriverError::MissingSession,
            ProtocolError::MalformedResponse(msg) => DriverError::MalformedResponse(msg),
            ProtocolError::Serialization(e) => {
                DriverError::configuration(format!("request could not be serialized: {}", e))
            }
            ProtocolError::Io(e) => DriverError::Transport(TransportError::Io(e.to_string())),
        }
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// 드라이버 결과 타입
pub type DriverResult<T> = Result<T, DriverError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::connect("Connection refused");
        assert_eq!(err.to_string(), "Connection error: Connection refused");

        let err = DriverError::server(597, "Script evaluation error");
        assert_eq!(err.to_string(), "Server error: 597 - Script evaluation error");

        let err = DriverError::disposal(DriverError::ConnectionClosed);
        assert_eq!(
            err.to_string(),
            "Connection disposal failed: Connection has been closed"
        );
    }

    #[test]
    fn test_driver_error_retryable() {
        assert!(DriverError::connect("refused").is_retryable());
        assert!(DriverError::ConnectTimeout(Duration::from_secs(1)).is_retryable());
        assert!(DriverError::server(598, "timeout").is_retryable());
        assert!(!DriverError::server(597, "bad script").is_retryable());
        assert!(!DriverError::MissingSession.is_retryable());
    }

    #[test]
    fn test_driver_error_client_error() {
        assert!(DriverError::MissingSession.is_client_error());
        assert!(DriverError::configuration("both flags").is_client_error());
        assert!(!DriverError::connect("refused").is_client_error());
    }

    #[test]
    fn test_protocol_error_conversion() {
        let err: DriverError = ProtocolError::MissingSession.into();
        assert!(matches!(err, DriverError::MissingSession));

        let err: DriverError = ProtocolError::MalformedResponse("eof".into()).into();
        assert!(matches!(err, DriverError::MalformedResponse(_)));

        let err: DriverError = ProtocolError::UnsupportedEncoding("text/plain".into()).into();
        assert!(matches!(err, DriverError::UnsupportedEncoding(_)));

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: DriverError = ProtocolError::Io(io).into();
        assert!(matches!(err, DriverError::Transport(TransportError::Io(_))));
    }
}
