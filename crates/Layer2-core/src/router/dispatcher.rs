//! Router - 채널 라우터
//!
//! 채널 → 라우트 맵, 글로벌 미들웨어 목록, 디스패치 알고리즘을 소유합니다.
//!
//! ## 실패 격리 계약
//!
//! 디스패치 내부에서 발생한 모든 에러(미들웨어, 핸들러, 그 아래 전부)는
//! 디스패치 경계에서 정확히 한 번 잡혀 `{success:false, error}` 봉투로
//! 정규화됩니다. 라우터는 호출자에게 절대 에러를 흘리지 않습니다.
//!
//! ## 등록 규칙
//!
//! - 채널은 라우터 맵의 유일 키이며 재등록은 덮어씁니다.
//! - 글로벌 미들웨어는 라우트 자신의 미들웨어 앞에 붙습니다.
//! - 그룹 등록은 콜백 동안만 그룹 미들웨어를 글로벌 목록에 올렸다가
//!   복원합니다. 그룹은 등록 시점 편의이지 런타임 개념이 아닙니다.

use super::middleware::{Middleware, Next};
use super::route::{
    CallContext, GroupConfig, Handler, RequestEnvelope, ResponseEnvelope, Route, RouteBuilder,
};
use super::validator::{validate, ValidationRule};
use lumen_foundation::Error;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// 그룹 등록 프레임
struct GroupFrame {
    name: Option<String>,
    prefix: Option<String>,
}

/// 채널 라우터
pub struct Router {
    /// 채널 → 라우트
    routes: RwLock<HashMap<String, Arc<Route>>>,

    /// 글로벌 미들웨어 (등록 순서 유지)
    global_middleware: RwLock<Vec<Arc<dyn Middleware>>>,

    /// 활성 그룹 스택 (등록 시점에만 사용)
    group_stack: RwLock<Vec<GroupFrame>>,
}

impl Router {
    /// 새 라우터 생성
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            global_middleware: RwLock::new(Vec::new()),
            group_stack: RwLock::new(Vec::new()),
        }
    }

    // ========================================================================
    // 등록
    // ========================================================================

    /// 글로벌 미들웨어 추가
    pub fn use_middleware(&self, middleware: Arc<dyn Middleware>) {
        self.global_middleware.write().push(middleware);
    }

    /// 라우트 빌더 시작
    pub fn handle(&self, channel: impl Into<String>, handler: Arc<dyn Handler>) -> RouteBuilder<'_> {
        let channel = self.apply_prefix(channel.into());
        let mut route = Route::new(channel, handler);
        route.group = self.current_group_name();
        RouteBuilder::new(self, route)
    }

    /// `handle` 별칭 - 채널만이 실제 라우팅 키입니다
    pub fn get(&self, channel: impl Into<String>, handler: Arc<dyn Handler>) -> RouteBuilder<'_> {
        self.handle(channel, handler).description("GET")
    }

    pub fn post(&self, channel: impl Into<String>, handler: Arc<dyn Handler>) -> RouteBuilder<'_> {
        self.handle(channel, handler).description("POST")
    }

    pub fn put(&self, channel: impl Into<String>, handler: Arc<dyn Handler>) -> RouteBuilder<'_> {
        self.handle(channel, handler).description("PUT")
    }

    pub fn delete(&self, channel: impl Into<String>, handler: Arc<dyn Handler>) -> RouteBuilder<'_> {
        self.handle(channel, handler).description("DELETE")
    }

    /// 그룹 등록
    ///
    /// 콜백 동안 그룹 미들웨어가 글로벌 목록에 올라가며, 콜백이 끝나면
    /// 이전 목록으로 복원됩니다.
    pub fn group(&self, config: GroupConfig, register: impl FnOnce(&Router)) {
        let added = config.middleware.len();

        self.global_middleware
            .write()
            .extend(config.middleware.iter().cloned());
        self.group_stack.write().push(GroupFrame {
            name: config.name,
            prefix: config.prefix,
        });

        register(self);

        self.group_stack.write().pop();
        let mut global = self.global_middleware.write();
        let len = global.len();
        global.truncate(len - added);
    }

    /// 라우트 등록 - 글로벌 미들웨어를 앞에 붙여 저장
    pub fn register(&self, mut route: Route) {
        let mut chain: Vec<Arc<dyn Middleware>> = self.global_middleware.read().clone();
        chain.extend(route.middleware.drain(..));
        route.middleware = chain;

        let mut routes = self.routes.write();
        if routes.contains_key(&route.channel) {
            debug!("Overwriting route: {}", route.channel);
        }
        routes.insert(route.channel.clone(), Arc::new(route));
    }

    // ========================================================================
    // 디스패치
    // ========================================================================

    /// 채널 디스패치
    ///
    /// 항상 응답 봉투를 반환합니다. 검증 실패는 미들웨어/핸들러 호출 없이
    /// 실패 봉투가 됩니다.
    pub async fn dispatch(
        &self,
        channel: &str,
        args: Vec<Value>,
        context: CallContext,
    ) -> ResponseEnvelope {
        let route = match self.routes.read().get(channel) {
            Some(route) => Arc::clone(route),
            None => {
                return ResponseEnvelope::fail(Error::RouteNotFound(channel.to_string()).to_string())
            }
        };

        if !route.validation.is_empty() {
            let report = validate(&args, &route.validation);
            if !report.valid {
                return ResponseEnvelope::fail(report.joined());
            }
        }

        let request = RequestEnvelope {
            channel: channel.to_string(),
            args,
            context,
        };

        let chain = Next::compose(&route.middleware, Arc::clone(&route.handler));
        match chain.run(request).await {
            Ok(data) => ResponseEnvelope::ok(data),
            Err(e) => {
                warn!("Dispatch failed on channel {}: {}", channel, e);
                ResponseEnvelope::fail(e.to_string())
            }
        }
    }

    // ========================================================================
    // 조회 / 정리
    // ========================================================================

    /// 등록된 채널 목록
    pub fn routes(&self) -> Vec<String> {
        self.routes.read().keys().cloned().collect()
    }

    /// 채널 등록 여부
    pub fn has_route(&self, channel: &str) -> bool {
        self.routes.read().contains_key(channel)
    }

    /// 전체 라우트 제거 (테스트용)
    pub fn clear(&self) {
        self.routes.write().clear();
        self.global_middleware.write().clear();
    }

    // ========================================================================
    // 내부 유틸리티
    // ========================================================================

    fn apply_prefix(&self, channel: String) -> String {
        let stack = self.group_stack.read();
        let mut prefixed = String::new();
        for frame in stack.iter() {
            if let Some(prefix) = &frame.prefix {
                prefixed.push_str(prefix.trim_end_matches('/'));
                prefixed.push('/');
            }
        }
        prefixed.push_str(&channel);
        prefixed
    }

    fn current_group_name(&self) -> Option<String> {
        self.group_stack
            .read()
            .iter()
            .rev()
            .find_map(|frame| frame.name.clone())
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::middleware::middleware_fn;
    use crate::router::route::handler_fn;
    use crate::router::validator::ArgType;
    use lumen_foundation::Error;
    use parking_lot::Mutex;
    use serde_json::json;

    fn logging_middleware(
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    ) -> Arc<dyn Middleware> {
        middleware_fn(move |request, next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(format!("{}:in", name));
                let result = next.run(request).await;
                log.lock().push(format!("{}:out", name));
                result
            }
        })
    }

    #[tokio::test]
    async fn test_dispatch_unknown_channel() {
        let router = Router::new();
        let response = router.dispatch("nowhere", vec![], CallContext::default()).await;

        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Route not found: nowhere"));
    }

    #[tokio::test]
    async fn test_dispatch_never_propagates_handler_errors() {
        let router = Router::new();
        router
            .handle(
                "failing",
                handler_fn(|_| async { Err(Error::Internal("handler exploded".to_string())) }),
            )
            .register();

        let response = router.dispatch("failing", vec![], CallContext::default()).await;

        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("Internal error: handler exploded")
        );
    }

    #[tokio::test]
    async fn test_middleware_order_global_then_route() {
        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        let router = Router::new();

        router.use_middleware(logging_middleware("a", Arc::clone(&log)));
        router.use_middleware(logging_middleware("b", Arc::clone(&log)));

        let handler_log = Arc::clone(&log);
        router
            .handle(
                "x",
                handler_fn(move |_| {
                    let log = Arc::clone(&handler_log);
                    async move {
                        log.lock().push("handler".to_string());
                        Ok(json!(null))
                    }
                }),
            )
            .middleware(logging_middleware("c", Arc::clone(&log)))
            .register();

        let response = router.dispatch("x", vec![], CallContext::default()).await;
        assert!(response.success);

        assert_eq!(
            *log.lock(),
            vec!["a:in", "b:in", "c:in", "handler", "c:out", "b:out", "a:out"]
        );
    }

    #[tokio::test]
    async fn test_validation_failure_skips_middleware_and_handler() {
        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        let router = Router::new();

        router
            .handle("greet", handler_fn(|_| async { panic!("handler must not run") }))
            .middleware(logging_middleware("m", Arc::clone(&log)))
            .validate(0, ValidationRule::new().required().of_type(ArgType::String))
            .register();

        let response = router.dispatch("greet", vec![], CallContext::default()).await;

        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("missing required parameter at index 0")
        );
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_group_middleware_is_restored_after_callback() {
        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        let router = Router::new();

        let group_config = GroupConfig::new("plugins")
            .with_prefix("plugins")
            .with_middleware(logging_middleware("g", Arc::clone(&log)));

        router.group(group_config, |r| {
            r.handle("list", handler_fn(|_| async { Ok(json!("listed")) }))
                .register();
        });

        // 그룹 밖 라우트에는 그룹 미들웨어가 붙지 않음
        router
            .handle("outside", handler_fn(|_| async { Ok(json!("out")) }))
            .register();

        let response = router
            .dispatch("plugins/list", vec![], CallContext::default())
            .await;
        assert!(response.success);
        assert_eq!(*log.lock(), vec!["g:in", "g:out"]);

        log.lock().clear();
        let response = router.dispatch("outside", vec![], CallContext::default()).await;
        assert!(response.success);
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_reregistration_overwrites() {
        let router = Router::new();
        router
            .handle("dup", handler_fn(|_| async { Ok(json!(1)) }))
            .register();
        router
            .handle("dup", handler_fn(|_| async { Ok(json!(2)) }))
            .register();

        let response = router.dispatch("dup", vec![], CallContext::default()).await;
        assert_eq!(response.data, Some(json!(2)));
        assert_eq!(router.routes().len(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let router = Router::new();
        router
            .handle("temp", handler_fn(|_| async { Ok(json!(null)) }))
            .register();

        router.clear();
        assert!(router.routes().is_empty());
    }
}
