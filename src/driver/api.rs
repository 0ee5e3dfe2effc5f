//! One-shot helpers
//!
//! 설정 없이 URL만으로 쓰는 간단한 진입점

use super::config::SubmitOptions;
use super::connection::Connection;
use super::error::DriverResult;
use super::graph::GraphDatabase;
use super::stream::ResponseStream;

/// 새 연결로 스크립트 하나를 보내고 응답 스트림 반환
///
/// 스트림이 끝나면 연결이 닫힙니다.
pub async fn submit(url: &str, gremlin: &str, options: SubmitOptions) -> DriverResult<ResponseStream> {
    GraphDatabase::from_url(url)?.submit(gremlin, options).await
}

/// 기본 설정으로 연결
pub async fn create_connection(url: &str) -> DriverResult<Connection> {
    GraphDatabase::from_url(url)?.connect().await
}
