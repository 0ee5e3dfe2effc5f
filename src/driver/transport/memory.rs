//! In-memory transport for tests
//!
//! 요청 프레임을 디코딩해서 응답 목록을 돌려주는 스크립트 서버

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use url::Url;

use super::{Connector, Transport, TransportError, TransportResult};
use crate::protocol::split_envelope;

/// 요청 본문 → 응답 본문 목록
pub(crate) type Responder = Arc<dyn Fn(&Value) -> Vec<Value> + Send + Sync>;

/// 응답 본문 생성
pub(crate) fn response(request: &Value, code: u16, data: Value) -> Value {
    json!({
        "requestId": request["requestId"],
        "status": {"code": code, "message": "", "attributes": {}},
        "result": {"data": data, "meta": {}}
    })
}

/// 에러 응답 본문 생성
pub(crate) fn error_response(request: &Value, code: u16, message: &str) -> Value {
    json!({
        "requestId": request["requestId"],
        "status": {"code": code, "message": message, "attributes": {}},
        "result": {"data": null, "meta": {}}
    })
}

// ============================================================================
// MemoryServer
// ============================================================================

pub(crate) struct MemoryServer {
    responder: Responder,
    channels: Mutex<Vec<Arc<Channel>>>,
    failures: AtomicUsize,
    open_delay: Mutex<Option<Duration>>,
}

impl MemoryServer {
    pub(crate) fn new(responder: impl Fn(&Value) -> Vec<Value> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            responder: Arc::new(responder),
            channels: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(0),
            open_delay: Mutex::new(None),
        })
    }

    /// 모든 eval 요청에 200 `[2]`로 응답
    pub(crate) fn ok() -> Arc<Self> {
        Self::new(|req| vec![response(req, 200, json!([2]))])
    }

    /// 다음 `count`번의 연결 시도를 실패시킴
    pub(crate) fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub(crate) fn set_open_delay(&self, delay: Duration) {
        *self.open_delay.lock() = Some(delay);
    }

    pub(crate) fn opened(&self) -> usize {
        self.channels.lock().len()
    }

    pub(crate) fn channel(&self, index: usize) -> Arc<Channel> {
        self.channels.lock()[index].clone()
    }
}

#[async_trait]
impl Connector for MemoryServer {
    async fn open(&self, _url: &Url, _validate_cert: bool) -> TransportResult<Box<dyn Transport>> {
        let delay = *self.open_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let channel = Channel::new();
        self.channels.lock().push(channel.clone());

        Ok(Box::new(MemoryTransport {
            channel,
            responder: self.responder.clone(),
        }))
    }
}

// ============================================================================
// Channel
// ============================================================================

pub(crate) struct Channel {
    incoming_tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    incoming_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Bytes>>,
    sent: Mutex<Vec<Value>>,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    fail_close: AtomicBool,
}

impl Channel {
    fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            incoming_tx: Mutex::new(Some(tx)),
            incoming_rx: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            fail_close: AtomicBool::new(false),
        })
    }

    /// 클라이언트가 보낸 요청 본문들
    pub(crate) fn sent(&self) -> Vec<Value> {
        self.sent.lock().clone()
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 이후 `close`가 채널은 닫되 에러를 반환하게 함
    pub(crate) fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    /// 서버 측에서 채널 닫기
    pub(crate) fn close_remote(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.incoming_tx.lock().take();
    }

    /// 요청과 무관한 프레임 주입
    pub(crate) fn push_raw(&self, frame: &[u8]) {
        if let Some(tx) = self.incoming_tx.lock().as_ref() {
            let _ = tx.send(Bytes::copy_from_slice(frame));
        }
    }
}

struct MemoryTransport {
    channel: Arc<Channel>,
    responder: Responder,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_frame(&self, frame: Bytes, _binary: bool) -> TransportResult<()> {
        if self.channel.is_closed() {
            return Err(TransportError::Closed);
        }

        let (_mime, body) = split_envelope(&frame).map_err(|e| TransportError::Io(e.to_string()))?;
        let request: Value =
            serde_json::from_slice(body).map_err(|e| TransportError::Io(e.to_string()))?;
        self.channel.sent.lock().push(request.clone());

        for reply in (self.responder)(&request) {
            self.channel.push_raw(reply.to_string().as_bytes());
        }
        Ok(())
    }

    async fn receive_frame(&self) -> TransportResult<Option<Bytes>> {
        let mut rx = self.channel.incoming_rx.lock().await;
        Ok(rx.recv().await)
    }

    async fn close(&self) -> TransportResult<()> {
        self.channel.close_calls.fetch_add(1, Ordering::SeqCst);
        self.channel.close_remote();
        if self.channel.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::Io("close failed".to_string()));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}
