//! Router - 채널 라우터 시스템
//!
//! 인바운드 채널 호출을 검증 → 미들웨어 체인 → 핸들러 순으로 흘려보내고,
//! 결과를 항상 `{success, data?, error?}` 봉투로 정규화합니다.

mod dispatcher;
mod middleware;
mod route;
mod validator;

pub use dispatcher::Router;
pub use middleware::{middleware_fn, Middleware, Next};
pub use route::{
    handler_fn, CallContext, GroupConfig, Handler, RequestEnvelope, ResponseEnvelope, Route,
    RouteBuilder,
};
pub use validator::{validate, ArgPredicate, ArgType, ValidationReport, ValidationRule};
