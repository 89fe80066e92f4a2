//! Middleware - 양파 모델 미들웨어 체인
//!
//! 미들웨어는 `(request, next)`를 받아 요청을 검사/수정하거나,
//! `next`를 호출하지 않고 단락시키거나, 하류 결과를 감쌀 수 있습니다.
//! 체인은 미들웨어 배열의 오른쪽 접기로 합성된 하나의 continuation입니다.

use super::route::{Handler, RequestEnvelope};
use async_trait::async_trait;
use futures::future::BoxFuture;
use lumen_foundation::Result;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// 미들웨어 트레이트
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, request: RequestEnvelope, next: Next) -> Result<Value>;
}

/// 다음 단계 continuation
///
/// 가장 안쪽 continuation은 등록된 핸들러를 호출합니다.
#[derive(Clone)]
pub struct Next {
    inner: Arc<dyn Fn(RequestEnvelope) -> BoxFuture<'static, Result<Value>> + Send + Sync>,
}

impl Next {
    /// 하류 실행
    pub async fn run(&self, request: RequestEnvelope) -> Result<Value> {
        (self.inner)(request).await
    }

    /// 핸들러를 감싼 가장 안쪽 continuation
    pub(crate) fn for_handler(handler: Arc<dyn Handler>) -> Self {
        Self {
            inner: Arc::new(move |request| {
                let handler = Arc::clone(&handler);
                Box::pin(async move { handler.call(&request).await })
            }),
        }
    }

    /// 미들웨어 목록 + 핸들러를 하나의 continuation으로 합성 (오른쪽 접기)
    pub(crate) fn compose(middleware: &[Arc<dyn Middleware>], handler: Arc<dyn Handler>) -> Self {
        let mut next = Self::for_handler(handler);

        for mw in middleware.iter().rev() {
            let mw = Arc::clone(mw);
            let downstream = next.clone();
            next = Self {
                inner: Arc::new(move |request| {
                    let mw = Arc::clone(&mw);
                    let downstream = downstream.clone();
                    Box::pin(async move { mw.handle(request, downstream).await })
                }),
            };
        }

        next
    }
}

struct FnMiddleware<F> {
    inner: F,
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(RequestEnvelope, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    async fn handle(&self, request: RequestEnvelope, next: Next) -> Result<Value> {
        (self.inner)(request, next).await
    }
}

/// 클로저를 미들웨어로 감싸는 헬퍼
pub fn middleware_fn<F, Fut>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(RequestEnvelope, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(FnMiddleware { inner: f })
}
