//! Plugin Module - 동적으로 로드되는 플러그인 코드 단위
//!
//! 모듈은 두 개의 선택적 capability 슬롯을 가집니다:
//!
//! - `lister`: 액션 목록 제공 (`list_actions`)
//! - `executor`: 액션 실행 (`execute_action`)
//!
//! 슬롯 부재는 정상적인, 검사되는 상태입니다. lister가 없는 플러그인은
//! 액션이 없는 것이고, executor가 없는 플러그인은 실행 시점에
//! `PluginExecution` 에러가 됩니다.

use super::action::ActionSpec;
use super::context::ExecutionContext;
use async_trait::async_trait;
use lumen_foundation::{Error, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Capability 슬롯
// ============================================================================

/// 액션 목록 capability
#[async_trait]
pub trait ActionLister: Send + Sync {
    async fn list_actions(&self, ctx: &ExecutionContext) -> Result<Vec<ActionSpec>>;
}

/// 액션 실행 capability
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute_action(&self, ctx: &ExecutionContext) -> Result<Value>;
}

/// 로드된 플러그인 모듈
#[derive(Clone, Default)]
pub struct PluginModule {
    /// 액션 목록 슬롯
    pub lister: Option<Arc<dyn ActionLister>>,

    /// 액션 실행 슬롯
    pub executor: Option<Arc<dyn ActionExecutor>>,
}

impl PluginModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lister(mut self, lister: Arc<dyn ActionLister>) -> Self {
        self.lister = Some(lister);
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn has_lister(&self) -> bool {
        self.lister.is_some()
    }

    pub fn has_executor(&self) -> bool {
        self.executor.is_some()
    }
}

impl std::fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginModule")
            .field("lister", &self.lister.is_some())
            .field("executor", &self.executor.is_some())
            .finish()
    }
}

// ============================================================================
// ModuleLoader - 동적 로딩 seam
// ============================================================================

/// 모듈 로더 - 진입 파일로부터 모듈을 만들어내는 seam
///
/// 플러그인 코드가 어떤 기술로 실행되는지는 로더 구현의 몫입니다.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// 모듈 로드
    ///
    /// 진입 파일이 없거나 로드가 실패하면 `PluginLoad` 에러를 반환해야
    /// 합니다.
    async fn load(&self, plugin_id: &str, entry_file: &Path) -> Result<PluginModule>;
}

// ============================================================================
// NativeModuleLoader - 인프로세스 팩토리 레지스트리
// ============================================================================

/// 모듈 팩토리
pub type ModuleFactory = Arc<dyn Fn() -> PluginModule + Send + Sync>;

/// 인프로세스 모듈 로더
///
/// 플러그인 id별로 등록된 팩토리에서 모듈을 만듭니다. 진입 파일 존재
/// 검사는 매니페스트 계약대로 수행합니다.
#[derive(Default)]
pub struct NativeModuleLoader {
    factories: RwLock<HashMap<String, ModuleFactory>>,
}

impl NativeModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 팩토리 등록
    pub fn register<F>(&self, plugin_id: impl Into<String>, factory: F)
    where
        F: Fn() -> PluginModule + Send + Sync + 'static,
    {
        let plugin_id = plugin_id.into();
        debug!("Registering module factory: {}", plugin_id);
        self.factories.write().insert(plugin_id, Arc::new(factory));
    }

    /// 팩토리 등록 여부
    pub fn contains(&self, plugin_id: &str) -> bool {
        self.factories.read().contains_key(plugin_id)
    }
}

#[async_trait]
impl ModuleLoader for NativeModuleLoader {
    async fn load(&self, plugin_id: &str, entry_file: &Path) -> Result<PluginModule> {
        if !tokio::fs::try_exists(entry_file).await.unwrap_or(false) {
            return Err(Error::plugin_load(
                plugin_id,
                format!("entry file not found: {}", entry_file.display()),
            ));
        }

        let factory = self
            .factories
            .read()
            .get(plugin_id)
            .cloned()
            .ok_or_else(|| {
                Error::plugin_load(plugin_id, "no module factory registered for this plugin")
            })?;

        Ok(factory())
    }
}

// ============================================================================
// 테스트
// ============================================================================
