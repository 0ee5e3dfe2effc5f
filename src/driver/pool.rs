//! Connection Pool
//!
//! 연결 풀링
//!
//! 풀은 최대 `max_size`개의 연결을 유지합니다. 빈 연결이 없고 한도에 도달하면
//! 호출자는 대기열(FIFO)에 들어가고, 반환된 연결은 빈 목록을 거치지 않고 가장
//! 오래 기다린 호출자에게 바로 넘어갑니다.
//!
//! 연결이 닫혀서 자리가 비면, 넘겨줄 연결 대신 "새 연결을 만들 권리"를 가장 오래
//! 기다린 호출자에게 넘깁니다. 대기 중인 호출이 취소되면 받은 연결이나 권리는
//! 다음 대기자에게 돌아갑니다.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::config::{Disposal, PoolConfig};
use super::connection::Connection;
use super::error::{DriverError, DriverResult};
use super::graph::GraphDatabase;
use super::observer::{DriverEvent, DriverObserver};

// ============================================================================
// PoolMetrics - 풀 메트릭
// ============================================================================

/// 풀 메트릭
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    /// 최대 크기
    pub max_size: usize,
    /// 현재 크기 (빈 연결 + 대여 중)
    pub size: usize,
    /// 빈 연결 수
    pub free: usize,
    /// 대여 중인 연결 수
    pub acquired: usize,
    /// 생성 중인 연결 수
    pub creating: usize,
    /// 대기자 수
    pub waiters: usize,
    /// 총 획득 횟수
    pub total_acquisitions: u64,
    /// 총 생성 횟수
    pub total_created: u64,
    /// 총 닫힌 연결 수
    pub total_closed: u64,
}

// ============================================================================
// Pool internals
// ============================================================================

/// 대기자에게 넘기는 것
enum Grant {
    /// 바로 쓸 수 있는 연결
    Ready(Connection),
    /// 새 연결을 만들 권리 (`creating`에 이미 포함됨)
    Create,
}

type GrantSender = oneshot::Sender<DriverResult<Grant>>;
type GrantReceiver = oneshot::Receiver<DriverResult<Grant>>;

enum Checkout {
    Ready(Connection),
    Create(CreationSlot),
    Wait(GrantReceiver),
}

enum Checkin {
    /// 빈 목록으로 들어감
    Pooled,
    /// 대기자에게 넘어감
    Handed,
    /// 닫힌 연결이라 버림
    Discarded,
    /// 한도 초과 또는 풀 닫힘, 호출자가 닫아야 함
    Excess(Connection),
    /// 이미 반환된 대여
    Stale,
}

#[derive(Default)]
struct PoolState {
    free: VecDeque<Connection>,
    /// 연결 ID → 대여 번호
    acquired: HashMap<u64, u64>,
    waiters: VecDeque<GrantSender>,
    creating: usize,
    closed: bool,
}

impl PoolState {
    fn total(&self) -> usize {
        self.free.len() + self.acquired.len() + self.creating
    }
}

pub(crate) struct PoolShared {
    /// 연결 생성기 (풀이 닫히면 분리)
    factory: Mutex<Option<GraphDatabase>>,
    max_size: AtomicUsize,
    disposal: Disposal,
    state: Mutex<PoolState>,
    observer: Arc<dyn DriverObserver>,
    total_acquisitions: AtomicU64,
    total_created: AtomicU64,
    total_closed: AtomicU64,
}

impl PoolShared {
    fn max_size(&self) -> usize {
        self.max_size.load(Ordering::SeqCst)
    }

    fn notify(&self, event: DriverEvent) {
        self.observer.on_event(&event);
    }

    fn checkout(self: &Arc<Self>) -> DriverResult<Checkout> {
        let mut discarded = Vec::new();
        let mut queued = None;

        let step = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(DriverError::PoolClosed);
            }
            state.waiters.retain(|tx| !tx.is_closed());

            let mut ready = None;
            while let Some(conn) = state.free.pop_front() {
                if conn.is_closed() {
                    discarded.push(conn.id());
                    continue;
                }
                let lease = conn.next_lease();
                state.acquired.insert(conn.id(), lease);
                ready = Some(conn);
                break;
            }

            match ready {
                Some(conn) => Checkout::Ready(conn),
                None if state.waiters.is_empty() && state.total() < self.max_size() => {
                    state.creating += 1;
                    Checkout::Create(CreationSlot::new(self.clone()))
                }
                None => {
                    let (tx, rx) = oneshot::channel();
                    state.waiters.push_back(tx);
                    queued = Some(state.waiters.len());
                    Checkout::Wait(rx)
                }
            }
        };

        for connection_id in discarded {
            self.total_closed.fetch_add(1, Ordering::Relaxed);
            self.notify(DriverEvent::Discarded { connection_id });
        }
        if let Some(waiters) = queued {
            tracing::debug!(waiters, "pool exhausted, waiting for a connection");
            self.notify(DriverEvent::Queued { waiters });
        }
        Ok(step)
    }

    fn checkin(&self, conn: Connection, lease: Option<u64>) -> DriverResult<Checkin> {
        let mut state = self.state.lock();
        let id = conn.id();

        match state.acquired.get(&id).copied() {
            Some(current) if lease.is_some_and(|lease| lease != current) => return Ok(Checkin::Stale),
            Some(_) => {}
            None if lease.is_some() || conn.is_closed() => return Ok(Checkin::Stale),
            None => {
                let message = if state.free.iter().any(|c| c.id() == id) {
                    format!("connection {} was already released", id)
                } else {
                    format!("connection {} is not checked out from this pool", id)
                };
                return Err(DriverError::pool(message));
            }
        }

        if conn.is_closed() {
            state.acquired.remove(&id);
            self.grant_capacity(&mut state);
            return Ok(Checkin::Discarded);
        }

        if state.closed || state.total() > self.max_size() {
            state.acquired.remove(&id);
            return Ok(Checkin::Excess(conn));
        }

        let mut conn = conn;
        while let Some(tx) = state.waiters.pop_front() {
            let lease = conn.next_lease();
            state.acquired.insert(id, lease);
            match hand_over(tx, conn) {
                None => return Ok(Checkin::Handed),
                Some(returned) => conn = returned,
            }
        }

        state.acquired.remove(&id);
        state.free.push_back(conn);
        Ok(Checkin::Pooled)
    }

    /// 닫힌 연결을 장부에서 제거
    pub(crate) fn forget(&self, id: u64) {
        let mut state = self.state.lock();
        let removed = state.acquired.remove(&id).is_some()
            || match state.free.iter().position(|c| c.id() == id) {
                Some(index) => state.free.remove(index).is_some(),
                None => false,
            };
        if removed {
            self.total_closed.fetch_add(1, Ordering::Relaxed);
            self.grant_capacity(&mut state);
        }
    }

    /// 남는 자리를 대기자들에게 생성 권리로 넘김
    fn grant_capacity(&self, state: &mut PoolState) {
        if state.closed {
            return;
        }
        while state.total() < self.max_size() {
            let Some(tx) = state.waiters.pop_front() else {
                break;
            };
            if tx.send(Ok(Grant::Create)).is_ok() {
                state.creating += 1;
            }
        }
    }

    fn release_slot(&self) {
        let mut state = self.state.lock();
        state.creating = state.creating.saturating_sub(1);
        self.grant_capacity(&mut state);
    }

    /// 취소된 대기자가 받은 것을 되돌림
    fn return_grant(&self, grant: Grant) {
        match grant {
            Grant::Create => self.release_slot(),
            Grant::Ready(conn) => match self.checkin(conn, None) {
                Ok(Checkin::Excess(conn)) => conn.close_detached(),
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "failed to return connection to pool"),
            },
        }
    }
}

/// 대기자에게 연결 전달 (대기자가 떠났으면 연결을 돌려받음)
fn hand_over(tx: GrantSender, conn: Connection) -> Option<Connection> {
    match tx.send(Ok(Grant::Ready(conn))) {
        Ok(()) => None,
        Err(Ok(Grant::Ready(conn))) => Some(conn),
        Err(_) => None,
    }
}

/// 생성 중인 자리
///
/// 연결이 등록되지 않은 채 버려지면 자리를 다음 대기자에게 넘깁니다.
struct CreationSlot {
    shared: Arc<PoolShared>,
    armed: bool,
}

impl CreationSlot {
    fn new(shared: Arc<PoolShared>) -> Self {
        Self { shared, armed: true }
    }

    /// 새 연결 등록 (풀이 닫혔으면 false)
    fn commit(mut self, conn: &Connection) -> bool {
        self.armed = false;
        let mut state = self.shared.state.lock();
        state.creating = state.creating.saturating_sub(1);
        if state.closed {
            return false;
        }
        let lease = conn.next_lease();
        state.acquired.insert(conn.id(), lease);
        true
    }
}

impl Drop for CreationSlot {
    fn drop(&mut self) {
        if self.armed {
            self.shared.release_slot();
        }
    }
}

/// 대기열의 자리
struct Waiter {
    shared: Arc<PoolShared>,
    rx: Option<GrantReceiver>,
}

impl Waiter {
    async fn wait(&mut self) -> DriverResult<Grant> {
        let received = match self.rx.as_mut() {
            Some(rx) => rx.await,
            None => return Err(DriverError::Cancelled),
        };
        self.rx = None;
        match received {
            Ok(grant) => grant,
            Err(_) => Err(DriverError::Cancelled),
        }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if let Ok(Ok(grant)) = rx.try_recv() {
                self.shared.return_grant(grant);
            }
        }
    }
}

/// `with_connection` 대여 보호
struct LeaseGuard {
    shared: Arc<PoolShared>,
    conn: Option<Connection>,
    lease: u64,
}

impl LeaseGuard {
    async fn release(&mut self) -> DriverResult<()> {
        match self.conn.take() {
            Some(conn) => Pool::from_shared(self.shared.clone()).release_lease(conn, self.lease).await,
            None => Ok(()),
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            match self.shared.checkin(conn, Some(self.lease)) {
                Ok(Checkin::Excess(conn)) => conn.close_detached(),
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "failed to return connection to pool"),
            }
        }
    }
}

// ============================================================================
// Pool - 연결 풀
// ============================================================================

/// 연결 풀
///
/// 복제 가능한 핸들입니다.
///
/// # 예시
///
/// ```rust,ignore
/// use gremlin_driver::{GraphConfig, GraphDatabase, Pool, PoolConfig};
///
/// let graph = GraphDatabase::new(GraphConfig::new("ws://localhost:8182/gremlin")?);
/// let pool = Pool::new(graph, PoolConfig::builder().max_size(8).force_release(true).build()?)?;
///
/// let conn = pool.acquire().await?;
/// let results = conn.submit("g.V().count()").await?.collect_all().await?;
/// ```
#[derive(Clone)]
pub struct Pool {
    shared: Arc<PoolShared>,
}

impl Pool {
    /// 새 연결 풀 생성
    pub fn new(graph: GraphDatabase, config: PoolConfig) -> DriverResult<Self> {
        config.validate()?;
        let observer = graph.config().observer.clone();

        Ok(Self {
            shared: Arc::new(PoolShared {
                factory: Mutex::new(Some(graph)),
                max_size: AtomicUsize::new(config.max_size),
                disposal: config.disposal,
                state: Mutex::new(PoolState::default()),
                observer,
                total_acquisitions: AtomicU64::new(0),
                total_created: AtomicU64::new(0),
                total_closed: AtomicU64::new(0),
            }),
        })
    }

    pub(crate) fn from_shared(shared: Arc<PoolShared>) -> Self {
        Self { shared }
    }

    /// 연결 획득 (풀 기본 처리 방식)
    pub async fn acquire(&self) -> DriverResult<Connection> {
        self.acquire_with(self.shared.disposal).await
    }

    /// 연결 획득 (처리 방식 지정)
    ///
    /// 닫힌 연결은 건너뜁니다. 한도에 도달했으면 다른 보유자가 반환할
    /// 때까지 기다립니다.
    pub async fn acquire_with(&self, disposal: Disposal) -> DriverResult<Connection> {
        let (conn, reused) = match self.shared.checkout()? {
            Checkout::Ready(conn) => (conn, true),
            Checkout::Create(slot) => (self.create(slot).await?, false),
            Checkout::Wait(rx) => {
                let mut waiter = Waiter {
                    shared: self.shared.clone(),
                    rx: Some(rx),
                };
                match waiter.wait().await? {
                    Grant::Ready(conn) => (conn, true),
                    Grant::Create => {
                        let slot = CreationSlot::new(self.shared.clone());
                        (self.create(slot).await?, false)
                    }
                }
            }
        };

        conn.set_disposal(disposal);
        self.shared.total_acquisitions.fetch_add(1, Ordering::Relaxed);
        self.shared.notify(DriverEvent::Acquired {
            connection_id: conn.id(),
            reused,
        });
        Ok(conn)
    }

    /// 연결 반환
    ///
    /// 닫힌 연결은 버리고, 대기자가 있으면 바로 넘기고, 아니면 빈 목록에
    /// 넣습니다. 한도를 넘었거나 풀이 닫혔으면 연결을 닫습니다.
    pub async fn release(&self, conn: Connection) -> DriverResult<()> {
        self.finish_release(conn, None).await
    }

    pub(crate) async fn release_lease(&self, conn: Connection, lease: u64) -> DriverResult<()> {
        self.finish_release(conn, Some(lease)).await
    }

    async fn finish_release(&self, conn: Connection, lease: Option<u64>) -> DriverResult<()> {
        let connection_id = conn.id();
        match self.shared.checkin(conn, lease)? {
            Checkin::Pooled | Checkin::Handed => {
                self.shared.notify(DriverEvent::Released { connection_id });
                Ok(())
            }
            Checkin::Discarded => {
                self.shared.total_closed.fetch_add(1, Ordering::Relaxed);
                self.shared.notify(DriverEvent::Discarded { connection_id });
                Ok(())
            }
            Checkin::Excess(conn) => {
                self.shared.total_closed.fetch_add(1, Ordering::Relaxed);
                self.shared.notify(DriverEvent::Discarded { connection_id });
                conn.close().await
            }
            Checkin::Stale => Ok(()),
        }
    }

    /// 연결을 빌려 `f` 실행
    ///
    /// 성공, 에러, 취소 어느 경우에도 연결을 반환합니다.
    pub async fn with_connection<F, Fut, T>(&self, f: F) -> DriverResult<T>
    where
        F: FnOnce(Connection) -> Fut,
        Fut: Future<Output = DriverResult<T>>,
    {
        let conn = self.acquire().await?;
        let mut guard = LeaseGuard {
            shared: self.shared.clone(),
            lease: conn.lease(),
            conn: Some(conn.clone()),
        };

        let result = f(conn).await;
        let released = guard.release().await;

        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Err(release_err)) => {
                tracing::warn!(error = %release_err, "failed to release connection");
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
        }
    }

    /// 풀 닫기
    ///
    /// 빈 연결을 모두 닫고 대기자를 모두 취소합니다. 대여 중인 연결은
    /// 보유자가 반환할 때 닫힙니다.
    pub async fn close(&self) -> DriverResult<()> {
        let (free, waiters) = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            (
                state.free.drain(..).collect::<Vec<_>>(),
                std::mem::take(&mut state.waiters),
            )
        };
        self.shared.factory.lock().take();

        let mut cancelled = 0;
        for tx in waiters {
            if tx.send(Err(DriverError::Cancelled)).is_ok() {
                cancelled += 1;
            }
        }

        let closed = free.len();
        let mut first_error = None;
        for conn in free {
            self.shared.total_closed.fetch_add(1, Ordering::Relaxed);
            if let Err(err) = conn.close().await {
                tracing::warn!(connection_id = conn.id(), error = %err, "failed to close pooled connection");
                first_error.get_or_insert(err);
            }
        }

        tracing::info!(closed, cancelled, "pool closed");
        self.shared.notify(DriverEvent::PoolClosed { closed, cancelled });
        first_error.map_or(Ok(()), Err)
    }

    /// 최대 크기 변경
    ///
    /// 줄이면 남는 빈 연결을 닫고, 대여 중인 초과분은 반환될 때 닫습니다.
    pub async fn set_max_size(&self, max_size: usize) -> DriverResult<()> {
        if max_size == 0 {
            return Err(DriverError::configuration("max pool size must be at least 1"));
        }

        let shed = {
            let mut state = self.shared.state.lock();
            self.shared.max_size.store(max_size, Ordering::SeqCst);
            let mut shed = Vec::new();
            while state.total() > max_size {
                match state.free.pop_back() {
                    Some(conn) => shed.push(conn),
                    None => break,
                }
            }
            self.shared.grant_capacity(&mut state);
            shed
        };

        let mut first_error = None;
        for conn in shed {
            self.shared.total_closed.fetch_add(1, Ordering::Relaxed);
            self.shared.notify(DriverEvent::Discarded {
                connection_id: conn.id(),
            });
            if let Err(err) = conn.close().await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// 현재 크기 (빈 연결 + 대여 중)
    pub fn size(&self) -> usize {
        let state = self.shared.state.lock();
        state.free.len() + state.acquired.len()
    }

    /// 빈 연결 수
    pub fn free_size(&self) -> usize {
        self.shared.state.lock().free.len()
    }

    /// 최대 크기
    pub fn max_size(&self) -> usize {
        self.shared.max_size()
    }

    /// 닫힘 여부
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// 메트릭 조회
    pub fn metrics(&self) -> PoolMetrics {
        let state = self.shared.state.lock();

        PoolMetrics {
            max_size: self.shared.max_size(),
            size: state.free.len() + state.acquired.len(),
            free: state.free.len(),
            acquired: state.acquired.len(),
            creating: state.creating,
            waiters: state.waiters.iter().filter(|tx| !tx.is_closed()).count(),
            total_acquisitions: self.shared.total_acquisitions.load(Ordering::Relaxed),
            total_created: self.shared.total_created.load(Ordering::Relaxed),
            total_closed: self.shared.total_closed.load(Ordering::Relaxed),
        }
    }

    async fn create(&self, slot: CreationSlot) -> DriverResult<Connection> {
        let factory = self.shared.factory.lock().clone();
        let factory = factory.ok_or(DriverError::PoolClosed)?;

        let conn = factory
            .open(None, Disposal::Keep, Some(Arc::downgrade(&self.shared)))
            .await?;
        if !slot.commit(&conn) {
            if let Err(err) = conn.close().await {
                tracing::debug!(connection_id = conn.id(), error = %err, "close failed");
            }
            return Err(DriverError::PoolClosed);
        }

        self.shared.total_created.fetch_add(1, Ordering::Relaxed);
        Ok(conn)
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let metrics = self.metrics();
        f.debug_struct("Pool")
            .field("max_size", &metrics.max_size)
            .field("size", &metrics.size)
            .field("free", &metrics.free)
            .field("waiters", &metrics.waiters)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio_test::{assert_pending, assert_ready_err, assert_ready_ok};

    use super::*;
    use crate::driver::config::GraphConfig;
    use crate::driver::transport::memory::{response, MemoryServer};

    fn graph(server: &Arc<MemoryServer>) -> GraphDatabase {
        let config = GraphConfig::new("ws://localhost:8182/gremlin").unwrap();
        GraphDatabase::with_connector(config, server.clone())
    }

    fn pool(server: &Arc<MemoryServer>, max_size: usize) -> Pool {
        let config = PoolConfig::builder().max_size(max_size).build().unwrap();
        Pool::new(graph(server), config).unwrap()
    }

    #[tokio::test]
    async fn test_pool_acquire_creates_lazily() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 2);
        assert_eq!(server.opened(), 0);

        let conn = pool.acquire().await.unwrap();
        assert_eq!(server.opened(), 1);
        assert!(conn.is_pooled());
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.free_size(), 0);
    }

    #[tokio::test]
    async fn test_pool_reuse_connection() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 2);

        let first = pool.acquire().await.unwrap();
        pool.release(first.clone()).await.unwrap();
        assert_eq!(pool.free_size(), 1);

        let second = pool.acquire().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(server.opened(), 1);
    }

    #[tokio::test]
    async fn test_pool_exhaustion_then_release() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 2);

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_ne!(a, b);

        let mut third = tokio_test::task::spawn(pool.acquire());
        assert_pending!(third.poll());
        assert_eq!(pool.metrics().waiters, 1);

        pool.release(a.clone()).await.unwrap();
        assert!(third.is_woken());
        let c = assert_ready_ok!(third.poll());
        assert_eq!(c, a);
        assert_eq!(pool.free_size(), 0);
        assert_eq!(server.opened(), 2);
    }

    #[tokio::test]
    async fn test_waiters_served_fifo() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 1);
        let held = pool.acquire().await.unwrap();

        let mut first = tokio_test::task::spawn(pool.acquire());
        let mut second = tokio_test::task::spawn(pool.acquire());
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        pool.release(held.clone()).await.unwrap();
        let conn = assert_ready_ok!(first.poll());
        assert_pending!(second.poll());

        pool.release(conn).await.unwrap();
        let conn = assert_ready_ok!(second.poll());
        assert_eq!(conn, held);
    }

    #[tokio::test]
    async fn test_capacity_never_exceeded() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 3);

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    pool.with_connection(|conn| async move {
                        let messages = conn.submit("1 + 1").await?.collect_all().await?;
                        tokio::task::yield_now().await;
                        Ok::<_, DriverError>(messages.len())
                    })
                    .await
                })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            assert_eq!(task.unwrap().unwrap(), 1);
        }

        assert!(server.opened() <= 3);
        let metrics = pool.metrics();
        assert!(metrics.size <= 3);
        assert_eq!(metrics.acquired, 0);
        assert_eq!(metrics.total_acquisitions, 20);
    }

    #[tokio::test]
    async fn test_closed_free_connection_skipped() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 2);

        let conn = pool.acquire().await.unwrap();
        pool.release(conn.clone()).await.unwrap();
        server.channel(0).close_remote();

        let fresh = pool.acquire().await.unwrap();
        assert_ne!(fresh, conn);
        assert!(!fresh.is_closed());
        assert_eq!(server.opened(), 2);
        assert_eq!(pool.size(), 1);
    }

    #[tokio::test]
    async fn test_release_closed_connection_frees_slot() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 1);

        let conn = pool.acquire().await.unwrap();
        server.channel(0).close_remote();
        pool.release(conn).await.unwrap();

        assert_eq!(pool.size(), 0);
        assert_eq!(pool.free_size(), 0);
        pool.acquire().await.unwrap();
        assert_eq!(server.opened(), 2);
    }

    #[tokio::test]
    async fn test_closing_held_connection_grants_waiter() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 1);
        let held = pool.acquire().await.unwrap();

        let waiter = tokio::spawn({
            let pool = pool.clone();
            async move { pool.acquire().await }
        });
        tokio::task::yield_now().await;
        while pool.metrics().waiters == 0 {
            tokio::task::yield_now().await;
        }

        held.close().await.unwrap();
        let conn = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_ne!(conn, held);
        assert_eq!(pool.size(), 1);
    }

    #[tokio::test]
    async fn test_pool_close_cancels_waiters() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 1);
        let held = pool.acquire().await.unwrap();

        let mut waiter = tokio_test::task::spawn(pool.acquire());
        assert_pending!(waiter.poll());

        pool.close().await.unwrap();
        assert!(pool.is_closed());
        let err = assert_ready_err!(waiter.poll());
        assert!(matches!(err, DriverError::Cancelled));

        // 대여 중이던 연결은 반환될 때 닫힘
        assert!(!held.is_closed());
        pool.release(held.clone()).await.unwrap();
        assert!(held.is_closed());
    }

    #[tokio::test]
    async fn test_pool_close_closes_free_connections() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 2);

        let conn = pool.acquire().await.unwrap();
        pool.release(conn.clone()).await.unwrap();

        pool.close().await.unwrap();
        assert!(conn.is_closed());
        assert_eq!(server.channel(0).close_calls(), 1);
        assert_eq!(pool.free_size(), 0);

        assert!(matches!(pool.acquire().await, Err(DriverError::PoolClosed)));
        pool.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_release_unknown_connection() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 2);
        let outsider = graph(&server).connect().await.unwrap();

        let err = pool.release(outsider.clone()).await.unwrap_err();
        assert!(matches!(err, DriverError::Pool(_)));
        assert_eq!(pool.size(), 0);

        outsider.close().await.unwrap();
        pool.release(outsider).await.unwrap();
    }

    #[tokio::test]
    async fn test_double_release_fails() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 2);

        let conn = pool.acquire().await.unwrap();
        pool.release(conn.clone()).await.unwrap();
        let err = pool.release(conn).await.unwrap_err();
        assert!(matches!(err, DriverError::Pool(_)));
        assert_eq!(pool.free_size(), 1);
        assert_eq!(pool.size(), 1);
    }

    #[tokio::test]
    async fn test_creation_failure_does_not_consume_capacity() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 1);

        server.fail_next(1);
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, DriverError::Connect(_)));
        assert_eq!(pool.metrics().creating, 0);

        pool.acquire().await.unwrap();
        assert_eq!(pool.size(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_is_skipped() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 1);
        let held = pool.acquire().await.unwrap();

        let mut waiter = tokio_test::task::spawn(pool.acquire());
        assert_pending!(waiter.poll());
        drop(waiter);

        pool.release(held).await.unwrap();
        assert_eq!(pool.free_size(), 1);
        assert_eq!(pool.metrics().waiters, 0);
    }

    #[tokio::test]
    async fn test_set_max_size_sheds_excess() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 2);

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        pool.set_max_size(1).await.unwrap();

        pool.release(a.clone()).await.unwrap();
        assert!(a.is_closed());
        pool.release(b.clone()).await.unwrap();
        assert!(!b.is_closed());
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.max_size(), 1);

        assert!(pool.set_max_size(0).await.is_err());
    }

    #[tokio::test]
    async fn test_set_max_size_grows_for_waiters() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 1);
        let _held = pool.acquire().await.unwrap();

        let mut waiter = tokio_test::task::spawn(pool.acquire());
        assert_pending!(waiter.poll());

        pool.set_max_size(2).await.unwrap();
        assert!(waiter.is_woken());
        assert_ready_ok!(waiter.poll());
        assert_eq!(server.opened(), 2);
    }

    #[tokio::test]
    async fn test_with_connection_releases_on_error() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 1);

        let result: DriverResult<()> = pool
            .with_connection(|_conn| async { Err(DriverError::configuration("bad script")) })
            .await;
        assert!(matches!(result, Err(DriverError::Configuration(_))));
        assert_eq!(pool.free_size(), 1);
    }

    #[tokio::test]
    async fn test_with_connection_releases_on_cancel() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 1);

        let mut scoped = tokio_test::task::spawn(
            pool.with_connection(|_conn| futures::future::pending::<DriverResult<()>>()),
        );
        assert_pending!(scoped.poll());
        assert_eq!(pool.metrics().acquired, 1);

        drop(scoped);
        assert_eq!(pool.free_size(), 1);
        assert_eq!(pool.metrics().acquired, 0);
    }

    #[tokio::test]
    async fn test_force_release_returns_connection() {
        let server = MemoryServer::new(|req| {
            vec![response(req, 206, json!([1])), response(req, 200, json!([2]))]
        });
        let config = PoolConfig::builder().max_size(1).force_release(true).build().unwrap();
        let pool = Pool::new(graph(&server), config).unwrap();

        let conn = pool.acquire().await.unwrap();
        let mut stream = conn.submit("g.V()").await.unwrap();
        stream.read().await.unwrap();
        assert_eq!(pool.free_size(), 0);

        stream.read().await.unwrap();
        assert_eq!(pool.free_size(), 1);
        assert!(!conn.is_closed());
    }

    #[tokio::test]
    async fn test_stale_stream_does_not_release_new_holder() {
        let server = MemoryServer::new(|_| Vec::new());
        let config = PoolConfig::builder().max_size(1).force_release(true).build().unwrap();
        let pool = Pool::new(graph(&server), config).unwrap();

        let conn = pool.acquire().await.unwrap();
        let mut stream = conn.submit("1").await.unwrap();
        pool.release(conn.clone()).await.unwrap();
        let again = pool.acquire().await.unwrap();

        let frame = json!({
            "status": {"code": 200, "message": ""},
            "result": {"data": [1], "meta": {}}
        });
        server.channel(0).push_raw(frame.to_string().as_bytes());
        stream.read().await.unwrap();

        assert_eq!(pool.metrics().acquired, 1);
        assert_eq!(pool.free_size(), 0);
        pool.release(again).await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_close_frees_force_release_slot() {
        let server = MemoryServer::new(|req| vec![response(req, 206, json!([1]))]);
        let config = PoolConfig::builder().max_size(1).force_release(true).build().unwrap();
        let pool = Pool::new(graph(&server), config).unwrap();

        let conn = pool.acquire().await.unwrap();
        let mut stream = conn.submit("g.V()").await.unwrap();
        assert_eq!(stream.read().await.unwrap().unwrap().status_code, 206);

        server.channel(0).close_remote();
        let err = stream.read().await.unwrap_err();
        assert!(matches!(err, DriverError::ConnectionClosed));
        assert!(stream.is_closed());
        assert!(stream.read().await.unwrap().is_none());
        assert_eq!(pool.metrics().acquired, 0);

        let next = tokio::time::timeout(Duration::from_millis(200), pool.acquire())
            .await
            .expect("slot should be free")
            .unwrap();
        assert_ne!(next.id(), conn.id());
        assert_eq!(server.opened(), 2);
    }

    #[tokio::test]
    async fn test_dropped_stream_does_not_leak_frames() {
        let server = MemoryServer::new(|req| {
            vec![response(req, 206, json!([1])), response(req, 206, json!([2]))]
        });
        let config = PoolConfig::builder().max_size(1).force_release(true).build().unwrap();
        let pool = Pool::new(graph(&server), config).unwrap();

        let conn = pool.acquire().await.unwrap();
        let mut stream = conn.submit("g.V()").await.unwrap();
        stream.read().await.unwrap();
        drop(stream);

        assert!(conn.is_closed());
        assert_eq!(pool.size(), 0);

        let next = pool.acquire().await.unwrap();
        assert_ne!(next.id(), conn.id());
        assert_eq!(server.opened(), 2);
    }

    #[tokio::test]
    async fn test_dropped_stream_inside_with_connection() {
        let server = MemoryServer::new(|req| vec![response(req, 206, json!([1]))]);
        let pool = pool(&server, 1);

        let first = pool
            .with_connection(|conn| async move {
                let mut stream = conn.submit("g.V()").await?;
                stream.read().await?;
                Ok::<_, DriverError>(conn.id())
            })
            .await
            .unwrap();

        assert_eq!(pool.size(), 0);
        let next = pool.acquire().await.unwrap();
        assert_ne!(next.id(), first);
    }

    #[tokio::test]
    async fn test_acquire_with_disposal() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 1);

        let conn = pool.acquire_with(Disposal::Close).await.unwrap();
        conn.submit("1").await.unwrap().read().await.unwrap();
        assert!(conn.is_closed());
        assert_eq!(pool.size(), 0);
    }

    #[tokio::test]
    async fn test_pool_metrics() {
        let server = MemoryServer::ok();
        let pool = pool(&server, 4);

        let a = pool.acquire().await.unwrap();
        let _b = pool.acquire().await.unwrap();
        pool.release(a).await.unwrap();

        let metrics = pool.metrics();
        assert_eq!(metrics.max_size, 4);
        assert_eq!(metrics.size, 2);
        assert_eq!(metrics.free, 1);
        assert_eq!(metrics.acquired, 1);
        assert_eq!(metrics.total_created, 2);
        assert_eq!(metrics.total_acquisitions, 2);
        assert_eq!(metrics.total_closed, 0);
    }
}
