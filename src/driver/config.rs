//! Configuration
//!
//! 그래프 데이터베이스 접속 설정, 풀 설정, 요청 옵션

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use super::error::{DriverError, DriverResult};
use super::observer::{DriverObserver, TracingObserver};
use super::stream::ResponseHandler;
use crate::protocol::{Bindings, DEFAULT_LANGUAGE, JSON_MIME_TYPE};

/// 기본 서버 URL
pub const DEFAULT_URL: &str = "ws://localhost:8182/gremlin";

/// 기본 풀 최대 크기
pub const DEFAULT_MAX_POOL_SIZE: usize = 256;

// ============================================================================
// Disposal - 스트림 종료 후 연결 처리
// ============================================================================

/// 응답 스트림이 끝났을 때 연결을 처리하는 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposal {
    /// 그대로 둠 (수동 재사용)
    #[default]
    Keep,
    /// 연결 닫기
    Close,
    /// 풀로 반환
    Release,
}

impl Disposal {
    /// `force_close` / `force_release` 플래그에서 변환
    ///
    /// 두 플래그를 동시에 켜는 것은 설정 에러입니다.
    pub fn from_flags(force_close: bool, force_release: bool) -> DriverResult<Self> {
        match (force_close, force_release) {
            (true, true) => Err(DriverError::configuration(
                "force_close and force_release are mutually exclusive",
            )),
            (true, false) => Ok(Disposal::Close),
            (false, true) => Ok(Disposal::Release),
            (false, false) => Ok(Disposal::Keep),
        }
    }
}

// ============================================================================
// GraphConfig - 접속 설정
// ============================================================================

/// 접속 설정
///
/// # 필드
///
/// | 필드 | 기본값 | 설명 |
/// |------|--------|------|
/// | `url` | - | 서버 URL (`ws`, `wss`; `http(s)`는 `ws(s)`로 변환) |
/// | `username` / `password` | `""` | 407 인증 요구에 응답할 자격 증명 |
/// | `lang` | `gremlin-groovy` | 스크립트 언어 |
/// | `processor` | `""` | 기본 프로세서 |
/// | `validate_cert` | false | TLS 인증서 검증 여부 |
/// | `connect_timeout` | 없음 | 연결 타임아웃 |
/// | `request_timeout` | 없음 | 응답 한 건을 기다리는 최대 시간 |
/// | `mime_type` | `application/json` | 요청 직렬화 형식 |
#[derive(Clone)]
pub struct GraphConfig {
    /// 서버 URL
    pub url: Url,
    /// 사용자명
    pub username: String,
    /// 비밀번호
    pub password: String,
    /// 스크립트 언어
    pub lang: String,
    /// 기본 프로세서
    pub processor: String,
    /// TLS 인증서 검증
    pub validate_cert: bool,
    /// 연결 타임아웃
    pub connect_timeout: Option<Duration>,
    /// 응답 대기 타임아웃
    pub request_timeout: Option<Duration>,
    /// 요청 MIME 타입
    pub mime_type: String,
    /// 이벤트 관찰자
    pub observer: Arc<dyn DriverObserver>,
}

impl GraphConfig {
    /// 기본값으로 설정 생성
    pub fn new(url: &str) -> DriverResult<Self> {
        Ok(Self {
            url: parse_url(url)?,
            username: String::new(),
            password: String::new(),
            lang: DEFAULT_LANGUAGE.to_string(),
            processor: String::new(),
            validate_cert: false,
            connect_timeout: None,
            request_timeout: None,
            mime_type: JSON_MIME_TYPE.to_string(),
            observer: Arc::new(TracingObserver),
        })
    }

    /// 빌더 시작
    pub fn builder(url: &str) -> DriverResult<GraphConfigBuilder> {
        Ok(GraphConfigBuilder {
            config: Self::new(url)?,
        })
    }
}

impl fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphConfig")
            .field("url", &self.url.as_str())
            .field("username", &self.username)
            .field("lang", &self.lang)
            .field("processor", &self.processor)
            .field("validate_cert", &self.validate_cert)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// 접속 설정 빌더
#[derive(Debug, Clone)]
pub struct GraphConfigBuilder {
    config: GraphConfig,
}

impl GraphConfigBuilder {
    /// 자격 증명 설정
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = username.into();
        self.config.password = password.into();
        self
    }

    /// 스크립트 언어 설정
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.config.lang = lang.into();
        self
    }

    /// 기본 프로세서 설정
    pub fn with_processor(mut self, processor: impl Into<String>) -> Self {
        self.config.processor = processor.into();
        self
    }

    /// TLS 인증서 검증 설정
    pub fn with_validate_cert(mut self, validate: bool) -> Self {
        self.config.validate_cert = validate;
        self
    }

    /// 연결 타임아웃 설정
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// 응답 대기 타임아웃 설정
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// MIME 타입 설정
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.config.mime_type = mime_type.into();
        self
    }

    /// 관찰자 설정
    pub fn with_observer(mut self, observer: Arc<dyn DriverObserver>) -> Self {
        self.config.observer = observer;
        self
    }

    /// 설정 빌드
    pub fn build(self) -> GraphConfig {
        self.config
    }
}

/// URL 파싱 및 스킴 정규화
fn parse_url(raw: &str) -> DriverResult<Url> {
    let mut url = Url::parse(raw)
        .map_err(|e| DriverError::configuration(format!("Invalid URL '{}': {}", raw, e)))?;

    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(DriverError::configuration(format!(
                "Unsupported URL scheme: {}",
                other
            )))
        }
    };

    if url.scheme() != scheme {
        url.set_scheme(scheme)
            .map_err(|_| DriverError::configuration(format!("Cannot use scheme {} for {}", scheme, raw)))?;
    }

    Ok(url)
}

// ============================================================================
// PoolConfig - 풀 설정
// ============================================================================

/// 연결 풀 설정
///
/// | 필드 | 기본값 | 설명 |
/// |------|--------|------|
/// | `max_size` | 256 | 최대 연결 수 |
/// | `disposal` | `Keep` | 획득한 연결의 스트림 종료 후 처리 |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// 최대 연결 수
    pub max_size: usize,
    /// 기본 처리 방식
    pub disposal: Disposal,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_POOL_SIZE,
            disposal: Disposal::Keep,
        }
    }
}

impl PoolConfig {
    /// 빌더 패턴으로 풀 설정 생성
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    /// 설정 검증
    pub fn validate(&self) -> DriverResult<()> {
        if self.max_size == 0 {
            return Err(DriverError::configuration("max_size must be at least 1"));
        }
        Ok(())
    }
}

/// 풀 설정 빌더
#[derive(Debug, Clone)]
pub struct PoolConfigBuilder {
    max_size: usize,
    force_close: bool,
    force_release: bool,
}

impl Default for PoolConfigBuilder {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_POOL_SIZE,
            force_close: false,
            force_release: false,
        }
    }
}

impl PoolConfigBuilder {
    /// 최대 연결 수 설정
    pub fn max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// 스트림 종료 후 연결 닫기
    pub fn force_close(mut self, enabled: bool) -> Self {
        self.force_close = enabled;
        self
    }

    /// 스트림 종료 후 풀로 반환
    pub fn force_release(mut self, enabled: bool) -> Self {
        self.force_release = enabled;
        self
    }

    /// 설정 빌드
    pub fn build(self) -> DriverResult<PoolConfig> {
        let config = PoolConfig {
            max_size: self.max_size,
            disposal: Disposal::from_flags(self.force_close, self.force_release)?,
        };
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// SubmitOptions - 요청 옵션
// ============================================================================

/// 요청별 옵션
///
/// 지정하지 않은 값은 연결의 기본값을 따릅니다.
#[derive(Clone, Default)]
pub struct SubmitOptions {
    /// 스크립트 바인딩
    pub bindings: Option<Bindings>,
    /// 스크립트 언어
    pub lang: Option<String>,
    /// 그래프 별칭
    pub aliases: Option<Bindings>,
    /// 그래프 별칭 (구 이름)
    pub rebindings: Option<Bindings>,
    /// 연산 (기본 `eval`)
    pub op: Option<String>,
    /// 프로세서
    pub processor: Option<String>,
    /// 세션 ID
    pub session: Option<String>,
    /// 응답 대기 타임아웃
    pub timeout: Option<Duration>,
    /// 요청 MIME 타입
    pub mime_type: Option<String>,
    /// 응답 변환 핸들러
    pub(crate) handlers: Vec<ResponseHandler>,
}

impl SubmitOptions {
    /// 빈 옵션
    pub fn new() -> Self {
        Self::default()
    }

    /// 바인딩 설정
    pub fn bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = Some(bindings);
        self
    }

    /// 언어 설정
    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// 별칭 설정
    pub fn aliases(mut self, aliases: Bindings) -> Self {
        self.aliases = Some(aliases);
        self
    }

    /// 구 이름 별칭 설정
    pub fn rebindings(mut self, rebindings: Bindings) -> Self {
        self.rebindings = Some(rebindings);
        self
    }

    /// 연산 설정
    pub fn op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// 프로세서 설정
    pub fn processor(mut self, processor: impl Into<String>) -> Self {
        self.processor = Some(processor.into());
        self
    }

    /// 세션 ID 설정
    pub fn session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// 응답 대기 타임아웃 설정
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// MIME 타입 설정
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// 응답 데이터 변환 핸들러 추가 (등록 순서대로 적용)
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(serde_json::Value) -> serde_json::Value + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
        self
    }
}

impl fmt::Debug for SubmitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitOptions")
            .field("bindings", &self.bindings)
            .field("lang", &self.lang)
            .field("aliases", &self.aliases)
            .field("rebindings", &self.rebindings)
            .field("op", &self.op)
            .field("processor", &self.processor)
            .field("session", &self.session)
            .field("timeout", &self.timeout)
            .field("mime_type", &self.mime_type)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
