//! # Gremlin Driver
//!
//! An async Rust client for [Gremlin Server](https://tinkerpop.apache.org/) over websockets.
//!
//! ## Features
//!
//! - **Streaming responses** - Partial (206) results are delivered as they arrive
//! - **In-band authentication** - SASL PLAIN challenges (407) are answered transparently
//! - **Sessions** - Session-bound connections keep server-side state between requests
//! - **Connection Pooling** - Bounded pool with FIFO waiters and direct hand-off
//! - **Async/Await** - Built on Tokio and tokio-tungstenite
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! gremlin-driver = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use gremlin_driver::{GraphConfig, GraphDatabase, SubmitOptions};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GraphConfig::builder("ws://localhost:8182/gremlin")?
//!         .with_credentials("stephen", "password")
//!         .build();
//!     let graph = GraphDatabase::new(config);
//!
//!     let conn = graph.connect().await?;
//!
//!     let mut bindings = serde_json::Map::new();
//!     bindings.insert("x".to_string(), json!(1));
//!     let mut stream = conn
//!         .send("x + x", SubmitOptions::new().bindings(bindings))
//!         .await?;
//!
//!     while let Some(message) = stream.read().await? {
//!         println!("{} {}", message.status_code, message.data);
//!     }
//!
//!     conn.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection Pooling
//!
//! ```rust,no_run
//! # use gremlin_driver::{GraphConfig, GraphDatabase, PoolConfig};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = GraphDatabase::new(GraphConfig::new("ws://localhost:8182/gremlin")?);
//! let pool = graph.pool(PoolConfig::builder().max_size(8).force_release(true).build()?)?;
//!
//! // Released back to the pool once the stream ends
//! let conn = pool.acquire().await?;
//! let messages = conn.submit("g.V().count()").await?.collect_all().await?;
//!
//! // Scoped acquisition
//! let count = pool
//!     .with_connection(|conn| async move {
//!         let messages = conn.submit("g.E().count()").await?.collect_all().await?;
//!         Ok::<_, gremlin_driver::DriverError>(messages.len())
//!     })
//!     .await?;
//!
//! pool.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All driver operations return [`DriverResult`]:
//!
//! ```rust,no_run
//! # use gremlin_driver::{submit, DriverError, SubmitOptions};
//! # async fn example() {
//! match submit("ws://localhost:8182/gremlin", "1 / 0", SubmitOptions::default()).await {
//!     Ok(mut stream) => match stream.read().await {
//!         Ok(message) => println!("{:?}", message),
//!         Err(DriverError::Server { code, message }) => eprintln!("server error {}: {}", code, message),
//!         Err(e) => eprintln!("Error: {}", e),
//!     },
//!     Err(e) => eprintln!("Connection failed: {}", e),
//! }
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`driver`] - Connections, response streams, pooling and transports
//! - [`protocol`] - Low-level message envelope and JSON messages
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod driver;
pub mod protocol;

// Re-exports for convenience
pub use driver::{
    create_connection, submit,
    Connection, Disposal, GraphConfig, GraphConfigBuilder, GraphDatabase,
    Pool, PoolConfig, PoolConfigBuilder, PoolMetrics,
    ResponseHandler, ResponseStream, SubmitOptions,
    DriverError, DriverResult,
    DriverEvent, DriverObserver, TracingObserver,
};

pub use protocol::{Message, ProtocolError, ResponseStatus};

/// Config alias for convenience
pub type Config = GraphConfig;
