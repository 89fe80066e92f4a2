//! lumen-core: Core Runtime for Lumen
//!
//! Layer2 - 런처 확장성 코어 레이어
//!
//! # 주요 모듈
//!
//! - `router`: 채널 라우터 (검증 → 미들웨어 체인 → 핸들러, 봉투 정규화)
//! - `plugin`: 플러그인 시스템 (다중 저장소, 동적 모듈 로드, 샌드박스)
//!
//! # 사용 예시
//!
//! ```ignore
//! use lumen_core::{handler_fn, CallContext, Router, ValidationRule, ArgType};
//! use serde_json::json;
//!
//! let router = Router::new();
//! router
//!     .handle("greet", handler_fn(|req| async move {
//!         let name = req.arg(0).and_then(|v| v.as_str()).unwrap_or_default();
//!         Ok(json!({ "hi": name }))
//!     }))
//!     .validate(0, ValidationRule::new().required().of_type(ArgType::String))
//!     .register();
//!
//! let response = router.dispatch("greet", vec![json!("world")], CallContext::default()).await;
//! assert!(response.success);
//! ```

// Core modules
pub mod plugin;
pub mod router;

// Re-exports: Router
pub use router::{
    handler_fn,
    middleware_fn,
    validate,
    ArgPredicate,
    ArgType,
    // Envelope
    CallContext,
    GroupConfig,
    // Handler
    Handler,
    // Middleware
    Middleware,
    Next,
    RequestEnvelope,
    ResponseEnvelope,
    Route,
    RouteBuilder,
    // Router
    Router,
    // Validator
    ValidationReport,
    ValidationRule,
};

// Re-exports: Plugin
pub use plugin::{
    sanitize_package_dir,
    // Action
    ActionAggregate,
    ActionEntity,
    ActionExecutor,
    ActionLister,
    ActionQuery,
    ActionSpec,
    ActionStatus,
    // Context
    AiProxy,
    DirectoryRepository,
    ExecuteRequest,
    ExecutionContext,
    ExecutionContextBuilder,
    HttpDownloader,
    // Module
    ModuleLoader,
    NativeModuleLoader,
    PackageDownloader,
    PluginConfig,
    PluginDescriptor,
    // Entity
    PluginEntity,
    PluginFailure,
    PluginKind,
    PluginLogger,
    // Manager
    PluginManager,
    PluginManagerConfig,
    // Manifest
    PluginManifest,
    PluginModule,
    // Repository
    PluginRepository,
    PluginStatus,
    PluginValidation,
    RemotePackage,
    RemoteRepository,
    // Sandbox
    ScopedFs,
    ViewMode,
};

// Layer1 re-exports
pub use lumen_foundation::{Error, Result, ServiceContainer, SettingsStore};

/// Layer2 버전
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
