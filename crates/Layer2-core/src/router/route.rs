//! Route - 라우트 기술자, 핸들러, 봉투 타입

use super::middleware::Middleware;
use super::validator::ValidationRule;
use async_trait::async_trait;
use lumen_foundation::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

// ============================================================================
// CallContext / RequestEnvelope - 호출 정보
// ============================================================================

/// 호출 컨텍스트 - 채널 호출자가 함께 전달하는 부가 정보
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// 호출한 창/발신자 식별자
    pub sender: Option<String>,

    /// 부가 메타데이터
    pub metadata: HashMap<String, Value>,
}

impl CallContext {
    pub fn from_sender(sender: impl Into<String>) -> Self {
        Self {
            sender: Some(sender.into()),
            metadata: HashMap::new(),
        }
    }
}

/// 요청 봉투 - 미들웨어 체인을 타고 흐르는 값
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    /// 채널 이름
    pub channel: String,

    /// 위치 인자 목록
    pub args: Vec<Value>,

    /// 호출 컨텍스트
    pub context: CallContext,
}

impl RequestEnvelope {
    /// 위치 인자 접근
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }
}

// ============================================================================
// ResponseEnvelope - 라우터가 보장하는 유일한 와이어 계약
// ============================================================================

/// 응답 봉투 - 핸들러가 실패해도 항상 이 형태로 반환됩니다
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// 성공 응답
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// 실패 응답
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

// ============================================================================
// Handler - 라우트 핸들러
// ============================================================================

/// 라우트 핸들러 트레이트
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, request: &RequestEnvelope) -> Result<Value>;
}

struct FnHandler<F> {
    inner: F,
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(RequestEnvelope) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    async fn call(&self, request: &RequestEnvelope) -> Result<Value> {
        (self.inner)(request.clone()).await
    }
}

/// 클로저를 핸들러로 감싸는 헬퍼
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(RequestEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler { inner: f })
}

// ============================================================================
// Route - 등록된 라우트 기술자
// ============================================================================

/// 라우트 기술자 - 등록 이후에는 불변
pub struct Route {
    /// 채널 이름 (라우터 맵의 유일 키)
    pub channel: String,

    /// 핸들러
    pub handler: Arc<dyn Handler>,

    /// 미들웨어 목록 (글로벌 미들웨어가 앞에 붙은 최종 순서)
    pub middleware: Vec<Arc<dyn Middleware>>,

    /// 위치 인덱스별 검증 규칙
    pub validation: BTreeMap<usize, ValidationRule>,

    /// 소속 그룹 이름
    pub group: Option<String>,

    /// 설명
    pub description: Option<String>,
}

impl Route {
    pub fn new(channel: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self {
            channel: channel.into(),
            handler,
            middleware: Vec::new(),
            validation: BTreeMap::new(),
            group: None,
            description: None,
        }
    }
}

// ============================================================================
// RouteBuilder - 플루언트 라우트 빌더
// ============================================================================

/// 라우트 빌더 - 미들웨어/검증 규칙/메타데이터를 누적한 뒤 `register`로 확정
pub struct RouteBuilder<'r> {
    router: &'r super::dispatcher::Router,
    route: Route,
}

impl<'r> RouteBuilder<'r> {
    pub(crate) fn new(router: &'r super::dispatcher::Router, route: Route) -> Self {
        Self { router, route }
    }

    /// 라우트 미들웨어 추가
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.route.middleware.push(middleware);
        self
    }

    /// 위치 인덱스 검증 규칙 추가
    pub fn validate(mut self, index: usize, rule: ValidationRule) -> Self {
        self.route.validation.insert(index, rule);
        self
    }

    /// 설명 설정
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.route.description = Some(text.into());
        self
    }

    /// 라우터에 등록
    pub fn register(self) {
        self.router.register(self.route);
    }
}

// ============================================================================
// GroupConfig - 그룹 등록 설정
// ============================================================================

/// 그룹 등록 설정 - 등록 시점 편의일 뿐 런타임 개념이 아님
#[derive(Default)]
pub struct GroupConfig {
    /// 그룹 이름 (라우트 기술자에 기록)
    pub name: Option<String>,

    /// 채널 접두사
    pub prefix: Option<String>,

    /// 그룹 동안 글로벌 목록에 올라가는 미들웨어
    pub middleware: Vec<Arc<dyn Middleware>>,
}

impl GroupConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }
}
