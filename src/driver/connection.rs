//! Connection
//!
//! 트랜스포트 채널 하나와 그 위의 요청 전송

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio_util::codec::Encoder;
use uuid::Uuid;

use super::config::{Disposal, GraphConfig, SubmitOptions};
use super::error::{DriverError, DriverResult};
use super::observer::{DriverEvent, DriverObserver};
use super::pool::{Pool, PoolShared};
use super::stream::ResponseStream;
use super::transport::{Transport, TransportError};
use crate::protocol::{op, processor, AuthMessage, Message, MessageCodec, RequestMessage};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// Connection - 연결
// ============================================================================

/// 서버 연결
///
/// 복제 가능한 핸들이며, 복제본은 모두 같은 트랜스포트 채널을 가리킵니다.
/// 채널을 닫을 수 있는 것은 연결뿐입니다.
///
/// 한 연결에서 동시에 여러 요청을 보내는 것은 지원하지 않습니다. 응답은
/// 서버가 보낸 순서대로 하나의 채널에 섞여 들어오므로, 이전 스트림을 끝까지
/// 읽은 다음 새 요청을 보내야 합니다.
///
/// 세션 연결([`GraphDatabase::session`](super::GraphDatabase::session))은
/// 생성 시 정해진 세션 ID를 모든 요청에 붙이고 프로세서를 `session`으로
/// 고정합니다.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    /// 연결 ID
    id: u64,
    /// 트랜스포트 채널
    transport: Box<dyn Transport>,
    /// 명시적으로 닫힘
    closed: AtomicBool,
    /// 고정 세션 ID
    session: Option<String>,
    /// 서버 URL
    url: String,
    /// 기본 언어
    lang: String,
    /// 기본 프로세서
    processor: String,
    /// 기본 MIME 타입
    mime_type: String,
    /// 사용자명
    username: String,
    /// 비밀번호
    password: String,
    /// 응답 대기 타임아웃
    request_timeout: Option<Duration>,
    /// 스트림 종료 후 처리
    disposal: Mutex<Disposal>,
    /// 풀 대여 번호
    lease: AtomicU64,
    /// 소속 풀
    pool: Mutex<Option<Weak<PoolShared>>>,
    /// 관찰자
    observer: Arc<dyn DriverObserver>,
}

impl Connection {
    pub(crate) fn new(
        transport: Box<dyn Transport>,
        config: &GraphConfig,
        session: Option<String>,
        disposal: Disposal,
        pool: Option<Weak<PoolShared>>,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
                transport,
                closed: AtomicBool::new(false),
                session,
                url: config.url.to_string(),
                lang: config.lang.clone(),
                processor: config.processor.clone(),
                mime_type: config.mime_type.clone(),
                username: config.username.clone(),
                password: config.password.clone(),
                request_timeout: config.request_timeout,
                disposal: Mutex::new(disposal),
                lease: AtomicU64::new(0),
                pool: Mutex::new(pool),
                observer: config.observer.clone(),
            }),
        }
    }

    /// 연결 ID
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// 서버 URL
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// 고정 세션 ID
    pub fn session(&self) -> Option<&str> {
        self.inner.session.as_deref()
    }

    /// 기본 언어
    pub fn lang(&self) -> &str {
        &self.inner.lang
    }

    /// 기본 프로세서 (세션 연결은 항상 `session`)
    pub fn processor(&self) -> &str {
        if self.inner.session.is_some() {
            processor::SESSION
        } else {
            &self.inner.processor
        }
    }

    /// 스트림 종료 후 처리 방식
    pub fn disposal(&self) -> Disposal {
        *self.inner.disposal.lock()
    }

    pub(crate) fn set_disposal(&self, disposal: Disposal) {
        *self.inner.disposal.lock() = disposal;
    }

    /// 닫힘 여부
    ///
    /// 원격 측이 먼저 닫을 수 있으므로 트랜스포트 상태도 함께 확인합니다.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst) || self.inner.transport.is_closed()
    }

    /// 풀 소속 여부
    pub fn is_pooled(&self) -> bool {
        self.pool().is_some()
    }

    /// 스크립트 전송
    ///
    /// 요청을 쓰고 바로 반환합니다. 응답은 돌려받은 스트림에서 읽습니다.
    pub async fn send(&self, gremlin: &str, options: SubmitOptions) -> DriverResult<ResponseStream> {
        if self.is_closed() {
            return Err(DriverError::ConnectionClosed);
        }

        let SubmitOptions {
            bindings,
            lang,
            aliases,
            rebindings,
            op,
            processor,
            session,
            timeout,
            mime_type,
            handlers,
        } = options;

        let (processor, session) = self.resolve_session(processor, session)?;
        let mut codec = MessageCodec::for_mime_type(mime_type.as_deref().unwrap_or(&self.inner.mime_type))?;

        let request = RequestMessage::eval(gremlin)
            .with_op(op.unwrap_or_else(|| op::EVAL.to_string()))
            .with_processor(processor.clone())
            .with_bindings(bindings)
            .with_language(lang.unwrap_or_else(|| self.inner.lang.clone()))
            .with_aliases(aliases)
            .with_rebindings(rebindings)
            .with_session(session.clone());
        let request_id = request.request_id;
        let mut frame = BytesMut::new();
        codec.encode(request, &mut frame)?;

        tracing::trace!(connection_id = self.id(), %request_id, "sending request");
        self.write(frame.freeze()).await?;

        Ok(ResponseStream::new(
            self.clone(),
            request_id,
            processor,
            session,
            timeout.or(self.inner.request_timeout),
            handlers,
        ))
    }

    /// 기본 옵션으로 스크립트 전송
    pub async fn submit(&self, gremlin: &str) -> DriverResult<ResponseStream> {
        self.send(gremlin, SubmitOptions::default()).await
    }

    /// 연결 닫기
    ///
    /// 여러 번 호출해도 안전합니다. 풀에 속해 있었다면 풀에서도 제거됩니다.
    pub async fn close(&self) -> DriverResult<()> {
        if !self.detach() {
            return Ok(());
        }
        self.shutdown().await
    }

    /// 동기 문맥에서 연결 닫기
    ///
    /// 닫힘 표시와 풀 장부 정리는 즉시 하고, 트랜스포트 종료는 현재 런타임에
    /// 맡깁니다. 런타임 밖이면 트랜스포트는 드롭될 때 정리됩니다.
    pub(crate) fn close_detached(&self) {
        if !self.detach() {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let conn = self.clone();
            handle.spawn(async move {
                if let Err(err) = conn.shutdown().await {
                    tracing::debug!(connection_id = conn.id(), error = %err, "close failed");
                }
            });
        }
    }

    /// 닫힘 표시 후 풀에서 제거 (처음 닫을 때만 true)
    fn detach(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let pool = self.inner.pool.lock().take();
        if let Some(pool) = pool.and_then(|weak| weak.upgrade()) {
            pool.forget(self.id());
        }
        true
    }

    async fn shutdown(&self) -> DriverResult<()> {
        let result = self.inner.transport.close().await;
        self.notify(DriverEvent::ConnectionClosed {
            connection_id: self.id(),
        });
        result.map_err(DriverError::from)
    }

    /// 풀로 반환 (풀에 속하지 않으면 아무것도 하지 않음)
    pub async fn release(&self) -> DriverResult<()> {
        match self.pool() {
            Some(shared) => Pool::from_shared(shared).release(self.clone()).await,
            None => Ok(()),
        }
    }

    /// 현재 대여 번호로 반환
    ///
    /// 그 사이 다른 보유자에게 넘어간 연결은 건드리지 않습니다.
    pub(crate) async fn release_lease(&self, lease: u64) -> DriverResult<()> {
        match self.pool() {
            Some(shared) => Pool::from_shared(shared).release_lease(self.clone(), lease).await,
            None => Ok(()),
        }
    }

    /// 407 인증 요구에 응답
    ///
    /// 인증 메시지를 쓰고 바로 반환합니다. 후속 응답은 스트림이 읽습니다.
    pub(crate) async fn authenticate(&self, processor: &str, session: Option<&str>) -> DriverResult<()> {
        let auth = AuthMessage::new(&self.inner.username, &self.inner.password, processor, session)?;
        let mut frame = BytesMut::new();
        MessageCodec::json().encode(auth, &mut frame)?;

        self.inner
            .transport
            .send_frame(frame.freeze(), true)
            .await
            .map_err(|e| DriverError::authentication(format!("failed to answer challenge: {}", e)))
    }

    /// 다음 응답 수신
    pub(crate) async fn receive(&self) -> DriverResult<Message> {
        let frame = self
            .inner
            .transport
            .receive_frame()
            .await
            .map_err(map_transport_error)?
            .ok_or(DriverError::ConnectionClosed)?;

        Ok(MessageCodec::json().decode_response(&frame)?)
    }

    pub(crate) fn lease(&self) -> u64 {
        self.inner.lease.load(Ordering::SeqCst)
    }

    pub(crate) fn next_lease(&self) -> u64 {
        self.inner.lease.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn notify(&self, event: DriverEvent) {
        self.inner.observer.on_event(&event);
    }

    fn pool(&self) -> Option<Arc<PoolShared>> {
        self.inner.pool.lock().as_ref().and_then(Weak::upgrade)
    }

    fn resolve_session(
        &self,
        requested_processor: Option<String>,
        requested_session: Option<String>,
    ) -> DriverResult<(String, Option<String>)> {
        match &self.inner.session {
            Some(bound) => {
                if let Some(p) = requested_processor.filter(|p| p != processor::SESSION) {
                    return Err(DriverError::configuration(format!(
                        "session connection cannot use processor '{}'",
                        p
                    )));
                }
                if let Some(s) = requested_session.filter(|s| s != bound) {
                    return Err(DriverError::configuration(format!(
                        "session connection is bound to '{}', not '{}'",
                        bound, s
                    )));
                }
                Ok((processor::SESSION.to_string(), Some(bound.clone())))
            }
            None => {
                let processor = requested_processor
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| self.inner.processor.clone());
                Ok((processor, requested_session))
            }
        }
    }

    async fn write(&self, frame: Bytes) -> DriverResult<()> {
        self.inner
            .transport
            .send_frame(frame, true)
            .await
            .map_err(map_transport_error)
    }
}

/// 새 세션 ID 생성
pub(crate) fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

fn map_transport_error(err: TransportError) -> DriverError {
    match err {
        TransportError::Closed => DriverError::ConnectionClosed,
        other => DriverError::Transport(other),
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url)
            .field("session", &self.inner.session)
            .field("closed", &self.is_closed())
            .field("disposal", &self.disposal())
            .finish()
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Connection {}

// ============================================================================
// Tests
// ============================================================================
