//! Driver Module
//!
//! Gremlin Server 클라이언트 드라이버
//!
//! # 구성
//!
//! - [`GraphDatabase`]: 연결 생성기 (설정 + 트랜스포트 커넥터)
//! - [`Connection`]: 트랜스포트 채널 하나, 요청 전송과 407 인증 응답
//! - [`ResponseStream`]: 요청 하나의 응답 읽기 (206/200/204/407/에러)
//! - [`Pool`]: 최대 크기가 정해진 연결 풀, FIFO 대기열
//! - [`transport`]: 트랜스포트 트레이트와 웹소켓 구현
//!
//! # Example
//!
//! ```ignore
//! use gremlin_driver::driver::{GraphConfig, GraphDatabase, PoolConfig, SubmitOptions};
//!
//! let graph = GraphDatabase::new(GraphConfig::new("ws://localhost:8182/gremlin")?);
//!
//! // 단일 연결
//! let conn = graph.connect().await?;
//! let mut stream = conn.submit("g.V().count()").await?;
//! while let Some(message) = stream.read().await? {
//!     println!("{}", message.data);
//! }
//!
//! // 세션 (서버 측 변수 유지)
//! let session = graph.session(None).await?;
//! session.submit("x = 1").await?.collect_all().await?;
//! session.submit("x + 1").await?.collect_all().await?;
//!
//! // 풀 (스트림이 끝나면 자동 반환)
//! let pool = graph.pool(PoolConfig::builder().max_size(8).force_release(true).build()?)?;
//! let conn = pool.acquire().await?;
//! let results = conn.send("g.V(id)", SubmitOptions::new().bindings(bindings)).await?.collect_all().await?;
//!
//! pool.close().await?;
//! ```

pub mod transport;
mod api;
mod config;
mod connection;
mod error;
mod graph;
mod observer;
mod pool;
mod stream;

// Re-exports
pub use api::{create_connection, submit};
pub use config::{
    Disposal, GraphConfig, GraphConfigBuilder, PoolConfig, PoolConfigBuilder, SubmitOptions,
    DEFAULT_MAX_POOL_SIZE, DEFAULT_URL,
};
pub use connection::Connection;
pub use error::{DriverError, DriverResult};
pub use graph::GraphDatabase;
pub use observer::{DriverEvent, DriverObserver, NoopObserver, TracingObserver};
pub use pool::{Pool, PoolMetrics};
pub use stream::{ResponseHandler, ResponseStream};
