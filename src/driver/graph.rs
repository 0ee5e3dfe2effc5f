//! GraphDatabase
//!
//! 연결 생성기
//!
//! 설정과 트랜스포트 커넥터를 묶어서 연결, 세션 연결, 풀을 만듭니다.

use std::fmt;
use std::sync::{Arc, Weak};

use super::config::{Disposal, GraphConfig, PoolConfig, SubmitOptions};
use super::connection::{new_session_id, Connection};
use super::error::{DriverError, DriverResult};
use super::observer::DriverEvent;
use super::pool::{Pool, PoolShared};
use super::stream::ResponseStream;
use super::transport::{Connector, WebSocketConnector};

// ============================================================================
// GraphDatabase
// ============================================================================

/// 연결 생성기
///
/// # 예시
///
/// ```rust,ignore
/// use gremlin_driver::{GraphConfig, GraphDatabase};
///
/// let config = GraphConfig::builder("ws://localhost:8182/gremlin")?
///     .with_credentials("stephen", "password")
///     .build();
/// let graph = GraphDatabase::new(config);
///
/// let conn = graph.connect().await?;
/// let mut stream = conn.submit("1 + 1").await?;
/// while let Some(message) = stream.read().await? {
///     println!("{}", message.data);
/// }
/// conn.close().await?;
/// ```
#[derive(Clone)]
pub struct GraphDatabase {
    config: Arc<GraphConfig>,
    connector: Arc<dyn Connector>,
}

impl GraphDatabase {
    /// 웹소켓 커넥터로 생성
    pub fn new(config: GraphConfig) -> Self {
        Self::with_connector(config, Arc::new(WebSocketConnector))
    }

    /// 커넥터 지정
    pub fn with_connector(config: GraphConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
        }
    }

    /// URL만으로 생성
    pub fn from_url(url: &str) -> DriverResult<Self> {
        Ok(Self::new(GraphConfig::new(url)?))
    }

    /// 설정
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// 연결 (스트림 종료 후 연결 유지)
    pub async fn connect(&self) -> DriverResult<Connection> {
        self.open(None, Disposal::Keep, None).await
    }

    /// 연결 (스트림 종료 후 처리 방식 지정)
    pub async fn connect_with(&self, disposal: Disposal) -> DriverResult<Connection> {
        self.open(None, disposal, None).await
    }

    /// 세션 연결
    ///
    /// `session_id`가 없으면 새 UUID를 만듭니다.
    pub async fn session(&self, session_id: Option<String>) -> DriverResult<Connection> {
        self.session_with(session_id, Disposal::Keep).await
    }

    /// 세션 연결 (처리 방식 지정)
    pub async fn session_with(&self, session_id: Option<String>, disposal: Disposal) -> DriverResult<Connection> {
        let session_id = session_id.unwrap_or_else(new_session_id);
        self.open(Some(session_id), disposal, None).await
    }

    /// 일회성 요청
    ///
    /// 새 연결로 보내고, 스트림이 끝나면 연결을 닫습니다.
    pub async fn submit(&self, gremlin: &str, options: SubmitOptions) -> DriverResult<ResponseStream> {
        let conn = self.connect_with(Disposal::Close).await?;
        match conn.send(gremlin, options).await {
            Ok(stream) => Ok(stream),
            Err(err) => {
                if let Err(close_err) = conn.close().await {
                    tracing::debug!(connection_id = conn.id(), error = %close_err, "close failed");
                }
                Err(err)
            }
        }
    }

    /// 이 생성기를 쓰는 연결 풀
    pub fn pool(&self, config: PoolConfig) -> DriverResult<Pool> {
        Pool::new(self.clone(), config)
    }

    pub(crate) async fn open(
        &self,
        session: Option<String>,
        disposal: Disposal,
        pool: Option<Weak<PoolShared>>,
    ) -> DriverResult<Connection> {
        let url = &self.config.url;
        let opening = self.connector.open(url, self.config.validate_cert);

        let opened = match self.config.connect_timeout {
            Some(timeout) if !timeout.is_zero() => match tokio::time::timeout(timeout, opening).await {
                Ok(opened) => opened,
                Err(_) => {
                    let err = DriverError::ConnectTimeout(timeout);
                    self.notify_failure(&err);
                    return Err(err);
                }
            },
            _ => opening.await,
        };

        let transport = match opened {
            Ok(transport) => transport,
            Err(err) => {
                let err = DriverError::connect(err.to_string());
                self.notify_failure(&err);
                return Err(err);
            }
        };

        let conn = Connection::new(transport, &self.config, session, disposal, pool);
        self.config.observer.on_event(&DriverEvent::Connected {
            connection_id: conn.id(),
            url: conn.url().to_string(),
        });
        Ok(conn)
    }

    fn notify_failure(&self, err: &DriverError) {
        self.config.observer.on_event(&DriverEvent::ConnectFailed {
            url: self.config.url.to_string(),
            error: err.to_string(),
        });
    }
}

impl fmt::Debug for GraphDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphDatabase")
            .field("config", &self.config)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
