//! Observer
//!
//! 연결/풀 상태 전이 알림
//!
//! 전역 로거 대신 [`GraphConfig`](super::GraphConfig)에 주입되는 관찰자에게
//! 이벤트를 전달합니다. 기본값 [`TracingObserver`]는 `tracing`으로 기록합니다.

use std::fmt;

// ============================================================================
// DriverEvent - 드라이버 이벤트
// ============================================================================

/// 드라이버 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// 연결 수립
    Connected {
        /// 연결 ID
        connection_id: u64,
        /// 서버 주소
        url: String,
    },
    /// 연결 실패
    ConnectFailed {
        /// 서버 주소
        url: String,
        /// 실패 원인
        error: String,
    },
    /// 407 인증 요구 수신
    AuthChallenge {
        /// 연결 ID
        connection_id: u64,
    },
    /// 풀에서 연결 획득
    Acquired {
        /// 연결 ID
        connection_id: u64,
        /// 유휴 연결을 재사용했는지 여부
        reused: bool,
    },
    /// 풀이 가득 차서 대기열에 들어감
    Queued {
        /// 현재 대기자 수
        waiters: usize,
    },
    /// 풀로 연결 반환
    Released {
        /// 연결 ID
        connection_id: u64,
    },
    /// 닫혔거나 초과된 연결을 풀에서 제거
    Discarded {
        /// 연결 ID
        connection_id: u64,
    },
    /// 연결 닫힘
    ConnectionClosed {
        /// 연결 ID
        connection_id: u64,
    },
    /// 풀 닫힘
    PoolClosed {
        /// 닫은 유휴 연결 수
        closed: usize,
        /// 취소한 대기자 수
        cancelled: usize,
    },
    /// 에러
    Error {
        /// 관련 연결 ID (없을 수 있음)
        connection_id: Option<u64>,
        /// 에러 메시지
        error: String,
    },
}

// ============================================================================
// DriverObserver
// ============================================================================

/// 드라이버 이벤트 관찰자
pub trait DriverObserver: Send + Sync {
    /// 이벤트 수신
    fn on_event(&self, event: &DriverEvent);
}

/// `tracing` 기반 기본 관찰자
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DriverObserver for TracingObserver {
    fn on_event(&self, event: &DriverEvent) {
        match event {
            DriverEvent::Connected { connection_id, url } => {
                tracing::debug!(connection_id, %url, "connection opened");
            }
            DriverEvent::ConnectFailed { url, error } => {
                tracing::warn!(%url, %error, "connection failed");
            }
            DriverEvent::AuthChallenge { connection_id } => {
                tracing::debug!(connection_id, "authentication requested by server");
            }
            DriverEvent::Acquired { connection_id, reused } => {
                tracing::trace!(connection_id, reused, "connection acquired");
            }
            DriverEvent::Queued { waiters } => {
                tracing::debug!(waiters, "pool exhausted, waiting for a connection");
            }
            DriverEvent::Released { connection_id } => {
                tracing::trace!(connection_id, "connection released");
            }
            DriverEvent::Discarded { connection_id } => {
                tracing::debug!(connection_id, "connection discarded from pool");
            }
            DriverEvent::ConnectionClosed { connection_id } => {
                tracing::debug!(connection_id, "connection closed");
            }
            DriverEvent::PoolClosed { closed, cancelled } => {
                tracing::info!(closed, cancelled, "connection pool closed");
            }
            DriverEvent::Error { connection_id, error } => {
                tracing::warn!(?connection_id, %error, "driver error");
            }
        }
    }
}

/// 아무것도 하지 않는 관찰자
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DriverObserver for NoopObserver {
    fn on_event(&self, _event: &DriverEvent) {}
}

impl fmt::Debug for dyn DriverObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DriverObserver")
    }
}
