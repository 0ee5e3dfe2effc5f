//! ResponseStream
//!
//! 요청 하나에 대한 응답 메시지 스트림
//!
//! 서버는 결과를 여러 메시지로 나눠 보낼 수 있습니다 (206 Partial Content).
//! 스트림은 종료 메시지(200/204) 또는 에러를 만나면 닫히고, 그 시점에
//! 연결의 [`Disposal`] 설정에 따라 연결을 닫거나 풀로 반환합니다.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use serde_json::Value;
use uuid::Uuid;

use super::config::Disposal;
use super::connection::Connection;
use super::error::{DriverError, DriverResult};
use super::observer::DriverEvent;
use crate::protocol::{Message, ResponseStatus};

/// 응답 데이터 변환 핸들러
pub type ResponseHandler = Arc<dyn Fn(Value) -> Value + Send + Sync>;

// ============================================================================
// ResponseStream
// ============================================================================

/// 응답 스트림
///
/// `read`가 `&mut self`를 받으므로 한 스트림을 동시에 읽을 수 없습니다.
///
/// 종료 메시지를 읽기 전에 스트림을 버리면 남은 응답이 채널에 남습니다.
/// 풀 연결이거나 `Disposal::Keep`이 아닌 연결이면 다음 사용자가 이전 요청의
/// 응답을 읽지 않도록 연결을 닫습니다. 직접 소유한 `Keep` 연결은 그대로 두므로
/// 남은 응답을 읽어 비우거나 연결을 닫아야 합니다.
pub struct ResponseStream {
    /// 연결 (닫히면 None)
    conn: Option<Connection>,
    /// 요청 ID
    request_id: Uuid,
    /// 요청 프로세서 (인증 응답용)
    processor: String,
    /// 요청 세션 (인증 응답용)
    session: Option<String>,
    /// 메시지 하나를 기다리는 최대 시간
    timeout: Option<Duration>,
    /// 데이터 변환 핸들러
    handlers: Vec<ResponseHandler>,
    /// 대여 번호 (Release 처리용)
    lease: u64,
    /// 종료 처리 중 발생한 에러
    disposal_error: Option<DriverError>,
}

impl ResponseStream {
    pub(crate) fn new(
        conn: Connection,
        request_id: Uuid,
        processor: String,
        session: Option<String>,
        timeout: Option<Duration>,
        handlers: Vec<ResponseHandler>,
    ) -> Self {
        let lease = conn.lease();
        Self {
            conn: Some(conn),
            request_id,
            processor,
            session,
            timeout,
            handlers,
            lease,
            disposal_error: None,
        }
    }

    /// 요청 ID
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// 스트림 종료 여부
    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// 핸들러 추가
    pub fn add_handler<F>(&mut self, handler: F)
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    /// 종료 처리 중 발생한 에러
    ///
    /// 연결을 닫거나 반환하다 실패해도 `read`의 결과는 바뀌지 않습니다.
    pub fn disposal_error(&self) -> Option<&DriverError> {
        self.disposal_error.as_ref()
    }

    /// 다음 메시지 읽기
    ///
    /// 스트림이 이미 닫혔으면 `Ok(None)`을 반환합니다.
    pub async fn read(&mut self) -> DriverResult<Option<Message>> {
        let conn = match &self.conn {
            Some(conn) => conn.clone(),
            None => return Ok(None),
        };
        if conn.is_closed() {
            return self.finish(&conn, Err(DriverError::ConnectionClosed)).await;
        }

        let mut challenged = false;
        loop {
            let message = match self.receive(&conn).await {
                Ok(message) => message,
                Err(err) => {
                    if let DriverError::ReadTimeout(_) = err {
                        // 뒤늦은 응답이 다음 요청에 섞이지 않도록 연결을 버림
                        if let Err(close_err) = conn.close().await {
                            self.record_disposal_error(&conn, close_err);
                        }
                    }
                    return self.finish(&conn, Err(err)).await;
                }
            };

            match message.status() {
                ResponseStatus::PartialContent => {
                    return Ok(Some(self.apply_handlers(message)));
                }
                ResponseStatus::Success | ResponseStatus::NoContent => {
                    let message = self.apply_handlers(message);
                    return self.finish(&conn, Ok(message)).await;
                }
                ResponseStatus::Authenticate => {
                    if challenged {
                        let err = DriverError::authentication("server repeated the authentication challenge");
                        return self.finish(&conn, Err(err)).await;
                    }
                    challenged = true;
                    conn.notify(DriverEvent::AuthChallenge {
                        connection_id: conn.id(),
                    });
                    if let Err(err) = conn.authenticate(&self.processor, self.session.as_deref()).await {
                        return self.finish(&conn, Err(err)).await;
                    }
                }
                ResponseStatus::Error(code) => {
                    let err = DriverError::server(code, message.message);
                    return self.finish(&conn, Err(err)).await;
                }
            }
        }
    }

    /// 남은 메시지 모두 읽기
    pub async fn collect_all(mut self) -> DriverResult<Vec<Message>> {
        let mut messages = Vec::new();
        while let Some(message) = self.read().await? {
            messages.push(message);
        }
        Ok(messages)
    }

    /// `futures::Stream`으로 변환
    ///
    /// 첫 에러를 내보낸 뒤 끝납니다.
    pub fn into_stream(self) -> impl Stream<Item = DriverResult<Message>> + Send {
        futures::stream::unfold(Some(self), |state| async move {
            let mut stream = state?;
            match stream.read().await {
                Ok(Some(message)) => Some((Ok(message), Some(stream))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    async fn receive(&self, conn: &Connection) -> DriverResult<Message> {
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, conn.receive())
                .await
                .map_err(|_| DriverError::ReadTimeout(timeout))?,
            None => conn.receive().await,
        }
    }

    fn apply_handlers(&self, mut message: Message) -> Message {
        message.data = self
            .handlers
            .iter()
            .fold(message.data, |data, handler| handler(data));
        message
    }

    /// 스트림 종료와 연결 처리 (정확히 한 번)
    async fn finish(
        &mut self,
        conn: &Connection,
        outcome: DriverResult<Message>,
    ) -> DriverResult<Option<Message>> {
        self.conn = None;

        let disposed = match conn.disposal() {
            Disposal::Keep => Ok(()),
            Disposal::Close => conn.close().await,
            Disposal::Release => conn.release_lease(self.lease).await,
        };
        if let Err(err) = disposed {
            self.record_disposal_error(conn, err);
        }

        outcome.map(Some)
    }

    fn record_disposal_error(&mut self, conn: &Connection, err: DriverError) {
        tracing::warn!(connection_id = conn.id(), error = %err, "connection disposal failed");
        conn.notify(DriverEvent::Error {
            connection_id: Some(conn.id()),
            error: err.to_string(),
        });
        if self.disposal_error.is_none() {
            self.disposal_error = Some(DriverError::disposal(err));
        }
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        // 이미 다른 사용자에게 넘어간 연결은 건드리지 않음
        if conn.lease() != self.lease {
            return;
        }
        if conn.is_pooled() || conn.disposal() != Disposal::Keep {
            tracing::debug!(
                connection_id = conn.id(),
                request_id = %self.request_id,
                "response stream dropped before completion, closing connection"
            );
            conn.close_detached();
        }
    }
}

impl fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseStream")
            .field("request_id", &self.request_id)
            .field("connection", &self.conn.as_ref().map(Connection::id))
            .field("closed", &self.is_closed())
            .field("timeout", &self.timeout)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
