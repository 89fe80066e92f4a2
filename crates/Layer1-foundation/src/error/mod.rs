//! Error types for Lumen
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Lumen 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 서비스 컨테이너 관련
    // ========================================================================
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    // ========================================================================
    // 라우터 관련
    // ========================================================================
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // ========================================================================
    // 플러그인 저장소 관련
    // ========================================================================
    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    // ========================================================================
    // 플러그인 관련
    // ========================================================================
    #[error("Plugin load failed: {plugin} - {message}")]
    PluginLoad { plugin: String, message: String },

    #[error("Plugin execution failed: {plugin} - {message}")]
    PluginExecution { plugin: String, message: String },

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    // ========================================================================
    // 샌드박스 관련
    // ========================================================================
    #[error("Sandbox violation: '{path}' escapes plugin directory '{root}'")]
    SandboxViolation { path: String, root: String },

    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 플러그인 로드 에러 생성 헬퍼
    pub fn plugin_load(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::PluginLoad {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// 플러그인 실행 에러 생성 헬퍼
    pub fn plugin_execution(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::PluginExecution {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// 샌드박스 위반 에러 생성 헬퍼
    pub fn sandbox_violation(path: impl Into<String>, root: impl Into<String>) -> Self {
        Error::SandboxViolation {
            path: path.into(),
            root: root.into(),
        }
    }

    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::RouteNotFound(_)
                | Error::Validation(_)
                | Error::PluginNotFound(_)
                | Error::PluginExecution { .. }
                | Error::SandboxViolation { .. }
                | Error::NotFound(_)
                | Error::InvalidInput(_)
        )
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
