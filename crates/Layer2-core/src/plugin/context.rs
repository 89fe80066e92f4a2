//! Execution Context - 액션 호출마다 만들어지는 capability 묶음
//!
//! 컨텍스트는 호출 직전에 만들어져 호출이 끝나면 버려집니다. 파일 시스템
//! 루트 같은 capability 스코프가 플러그인별로 묶이기 때문에 호출 간에
//! 캐시하거나 공유하지 않습니다.

use super::sandbox::ScopedFs;
use async_trait::async_trait;
use lumen_foundation::{Result, SettingsStore};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

// ============================================================================
// AiProxy - AI capability 계약
// ============================================================================

/// AI capability 프록시 - 구현은 코어 밖의 협력자
#[async_trait]
pub trait AiProxy: Send + Sync {
    /// 프롬프트로 텍스트 생성
    async fn generate_text(&self, prompt: &str) -> Result<String>;

    /// API 키 설정
    async fn set_api_key(&self, key: &str) -> Result<()>;
}

// ============================================================================
// PluginLogger - 플러그인 이름이 붙는 로그 채널
// ============================================================================

/// 플러그인 로거
#[derive(Debug, Clone)]
pub struct PluginLogger {
    plugin_id: String,
}

impl PluginLogger {
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
        }
    }

    pub fn debug(&self, message: &str) {
        debug!(plugin = %self.plugin_id, "{}", message);
    }

    pub fn info(&self, message: &str) {
        info!(plugin = %self.plugin_id, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        warn!(plugin = %self.plugin_id, "{}", message);
    }

    pub fn error(&self, message: &str) {
        error!(plugin = %self.plugin_id, "{}", message);
    }
}

// ============================================================================
// PluginConfig - 네임스페이스 설정
// ============================================================================

/// 플러그인 설정 - 모든 키를 `plugins.{id}.` 아래로 네임스페이스
///
/// 플러그인은 서로의 설정이나 코어 설정을 읽거나 덮어쓸 수 없습니다.
#[derive(Clone)]
pub struct PluginConfig {
    plugin_id: String,
    settings: Arc<SettingsStore>,
}

impl PluginConfig {
    pub fn new(plugin_id: impl Into<String>, settings: Arc<SettingsStore>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            settings,
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("plugins.{}.{}", self.plugin_id, key)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.settings.get(&self.namespaced(key))
    }

    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        self.settings.set(&self.namespaced(key), value)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.settings.remove(&self.namespaced(key))
    }
}

// ============================================================================
// ExecutionContext - 호출 단위 값
// ============================================================================

/// 실행 컨텍스트
pub struct ExecutionContext {
    /// 호출 대상 액션 id (플러그인 내 id)
    pub action_id: String,

    /// 검색 키워드
    pub keyword: String,

    /// 런처가 덮고 있던 전면 앱 이름
    pub overlay_app: Option<String>,

    /// 로그 capability
    pub logger: PluginLogger,

    /// 경로 제한 파일 시스템 capability
    pub fs: ScopedFs,

    /// 네임스페이스 설정 capability
    pub config: PluginConfig,

    /// AI capability
    pub ai: Arc<dyn AiProxy>,

    /// 런처 버전
    pub app_version: String,
}

// ============================================================================
// ExecutionContextBuilder
// ============================================================================

/// 실행 컨텍스트 빌더
///
/// 공유 의존성(설정 저장소, AI 프록시, 앱 버전)을 한 번 주입받아
/// 호출마다 순수하게 컨텍스트를 만들어냅니다.
pub struct ExecutionContextBuilder {
    settings: Arc<SettingsStore>,
    ai: Arc<dyn AiProxy>,
    app_version: String,
}

impl ExecutionContextBuilder {
    pub fn new(
        settings: Arc<SettingsStore>,
        ai: Arc<dyn AiProxy>,
        app_version: impl Into<String>,
    ) -> Self {
        Self {
            settings,
            ai,
            app_version: app_version.into(),
        }
    }

    /// 컨텍스트 생성 - 순수 함수, 내부 상태를 바꾸지 않음
    pub fn build(
        &self,
        plugin_id: &str,
        plugin_dir: &Path,
        action_id: impl Into<String>,
        keyword: impl Into<String>,
        overlay_app: Option<String>,
    ) -> ExecutionContext {
        ExecutionContext {
            action_id: action_id.into(),
            keyword: keyword.into(),
            overlay_app,
            logger: PluginLogger::new(plugin_id),
            fs: ScopedFs::new(plugin_dir),
            config: PluginConfig::new(plugin_id, Arc::clone(&self.settings)),
            ai: Arc::clone(&self.ai),
            app_version: self.app_version.clone(),
        }
    }
}

// ============================================================================
// 테스트
// ============================================================================
