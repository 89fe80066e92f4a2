//! Plugin Entity - 발견된 플러그인 하나
//!
//! 메타데이터, 지연 로드되는 모듈 핸들, 액션 해석/실행을 담당합니다.

use super::action::ActionEntity;
use super::context::ExecutionContext;
use super::manifest::{PluginKind, PluginManifest, PluginValidation};
use super::module::{ModuleLoader, PluginModule};
use lumen_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

// ============================================================================
// PluginStatus
// ============================================================================

/// 플러그인 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginStatus {
    /// 활성 - 액션 수집/실행 대상
    Active,

    /// 비활성 - 액션 수집에서 제외 (원격 카탈로그 항목 등)
    Inactive,

    /// 비활성화됨 (사용자 조치)
    Disabled,

    /// 오류 상태 (로드 실패 등)
    Error,
}

impl std::fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Disabled => "disabled",
            Self::Error => "error",
        };
        f.write_str(text)
    }
}

// ============================================================================
// PluginDescriptor - UI로 보낼 수 있는 공개 기술자
// ============================================================================

/// 공개 플러그인 기술자
///
/// 로드 실패 메시지가 포함되므로 UI는 크래시 없이 깨진 플러그인
/// 표시를 그릴 수 있습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub path: PathBuf,
    pub kind: PluginKind,
    pub status: PluginStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// PluginEntity
// ============================================================================

/// 플러그인 엔티티
pub struct PluginEntity {
    /// 플러그인 id (= 패키지 이름, 전역 유일)
    pub id: String,

    /// 표시 이름
    pub name: String,

    pub description: String,
    pub version: String,
    pub author: Option<String>,

    /// 설치 디렉토리 - 저장소 루트의 하위여야 함
    pub path: PathBuf,

    /// 출처
    pub kind: PluginKind,

    /// 발견 시점 검증 결과
    pub validation: PluginValidation,

    /// 진입 파일 절대 경로
    entry_file: PathBuf,

    status: parking_lot::RwLock<PluginStatus>,
    last_error: parking_lot::RwLock<Option<String>>,

    /// 지연 로드된 모듈 핸들
    module: tokio::sync::RwLock<Option<PluginModule>>,

    loader: Arc<dyn ModuleLoader>,
}

impl PluginEntity {
    /// 매니페스트 + 검증 결과로 엔티티 생성
    ///
    /// 검증을 통과한 플러그인은 active, 아니면 error 상태로 시작합니다.
    pub fn new(
        manifest: PluginManifest,
        dir: &Path,
        kind: PluginKind,
        validation: PluginValidation,
        loader: Arc<dyn ModuleLoader>,
    ) -> Self {
        let status = if validation.is_valid {
            PluginStatus::Active
        } else {
            PluginStatus::Error
        };
        let last_error = if validation.is_valid {
            None
        } else {
            Some(validation.errors.join("; "))
        };

        let entry_file = manifest.entry_file(dir);

        Self {
            id: manifest.name.clone(),
            name: manifest
                .display_name
                .clone()
                .unwrap_or_else(|| manifest.name.clone()),
            description: manifest.description,
            version: manifest.version,
            author: manifest.author,
            path: dir.to_path_buf(),
            kind,
            validation,
            entry_file,
            status: parking_lot::RwLock::new(status),
            last_error: parking_lot::RwLock::new(last_error),
            module: tokio::sync::RwLock::new(None),
            loader,
        }
    }

    // ========================================================================
    // 상태
    // ========================================================================

    pub fn status(&self) -> PluginStatus {
        *self.status.read()
    }

    pub fn set_status(&self, status: PluginStatus) {
        *self.status.write() = status;
    }

    fn record_error(&self, message: impl Into<String>) {
        *self.status.write() = PluginStatus::Error;
        *self.last_error.write() = Some(message.into());
    }

    // ========================================================================
    // 모듈 로딩
    // ========================================================================

    /// 모듈 지연 로드
    ///
    /// 첫 사용 때만 로더를 호출하고 핸들을 캐시합니다. 실패하면 상태를
    /// error로 바꾸고 메시지를 보관한 뒤 `PluginLoad`로 실패합니다.
    pub async fn load(&self, reason: &str) -> Result<PluginModule> {
        if let Some(module) = self.module.read().await.clone() {
            return Ok(module);
        }

        debug!("Loading plugin module: {} ({})", self.id, reason);

        match self.loader.load(&self.id, &self.entry_file).await {
            Ok(module) => {
                *self.module.write().await = Some(module.clone());
                Ok(module)
            }
            Err(e) => {
                let e = match e {
                    already @ Error::PluginLoad { .. } => already,
                    other => Error::plugin_load(&self.id, other.to_string()),
                };
                self.record_error(e.to_string());
                Err(e)
            }
        }
    }

    /// 캐시된 모듈 핸들 무효화 (재설치/디렉토리 변경 시)
    pub async fn invalidate_module(&self) {
        *self.module.write().await = None;
    }

    // ========================================================================
    // 액션 해석 / 실행
    // ========================================================================

    /// 액션 목록
    ///
    /// active가 아니면 빈 목록을 반환합니다 (fail-soft). 비활성 플러그인
    /// 하나가 전역 액션 수집을 깨뜨리면 안 됩니다. 모듈에 목록 슬롯이
    /// 없으면 역시 빈 목록입니다.
    pub async fn get_actions(&self, ctx: &ExecutionContext) -> Result<Vec<ActionEntity>> {
        if self.status() != PluginStatus::Active {
            return Ok(Vec::new());
        }

        let module = self.load("list actions").await?;
        let Some(lister) = module.lister else {
            return Ok(Vec::new());
        };

        let specs = lister.list_actions(ctx).await?;
        Ok(specs
            .into_iter()
            .map(|spec| ActionEntity::from_spec(spec, &self.id, self.kind, &self.version))
            .collect())
    }

    /// 액션 실행
    ///
    /// 모듈에 실행 슬롯이 없으면 `PluginExecution`으로 실패합니다. 실행
    /// 중의 에러도 동일하게 분류됩니다.
    pub async fn execute_action(&self, ctx: &ExecutionContext) -> Result<Value> {
        let module = self.load("execute action").await?;
        let executor = module.executor.ok_or_else(|| {
            Error::plugin_execution(&self.id, "module does not expose an execution entry point")
        })?;

        executor.execute_action(ctx).await.map_err(|e| match e {
            already @ Error::PluginExecution { .. } => already,
            other => Error::plugin_execution(&self.id, other.to_string()),
        })
    }

    // ========================================================================
    // 공개 기술자 / 삭제
    // ========================================================================

    /// UI로 보낼 수 있는 공개 기술자
    pub fn sendable_view(&self) -> PluginDescriptor {
        PluginDescriptor {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            version: self.version.clone(),
            author: self.author.clone(),
            path: self.path.clone(),
            kind: self.kind,
            status: self.status(),
            error: self.last_error.read().clone(),
        }
    }

    /// 플러그인 디렉토리 삭제
    ///
    /// 경로가 이미 없으면 `DirectoryNotFound`로 실패합니다. 호출자는
    /// `find`로 존재를 확인했다고 가정합니다 (의도적으로 비멱등).
    pub async fn delete(&self) -> Result<()> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Err(Error::DirectoryNotFound(self.path.display().to_string()));
        }

        fs::remove_dir_all(&self.path).await?;
        self.invalidate_module().await;
        debug!("Deleted plugin directory: {}", self.path.display());
        Ok(())
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::action::ActionSpec;
    use crate::plugin::context::{AiProxy, ExecutionContextBuilder};
    use crate::plugin::module::{ActionExecutor, ActionLister, NativeModuleLoader};
    use async_trait::async_trait;
    use lumen_foundation::{JsonStore, SettingsStore};
    use serde_json::json;
    use tempfile::TempDir;

    struct StubAi;

    #[async_trait]
    impl AiProxy for StubAi {
        async fn generate_text(&self, _prompt: &str) -> Result<String> {
            Ok(String::new())
        }

        async fn set_api_key(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    struct TwoActions;

    #[async_trait]
    impl ActionLister for TwoActions {
        async fn list_actions(&self, _ctx: &ExecutionContext) -> Result<Vec<ActionSpec>> {
            Ok(vec![ActionSpec::new("first"), ActionSpec::new("second")])
        }
    }

    struct EchoExecutor;

    #[async_trait]
    impl ActionExecutor for EchoExecutor {
        async fn execute_action(&self, ctx: &ExecutionContext) -> Result<Value> {
            Ok(json!({ "action": ctx.action_id, "keyword": ctx.keyword }))
        }
    }

    async fn plugin_dir(temp: &TempDir, id: &str) -> PathBuf {
        let dir = temp.path().join(id);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("index.js"), "// entry")
            .await
            .unwrap();
        dir
    }

    fn context(temp: &TempDir, dir: &Path, id: &str) -> ExecutionContext {
        let settings = Arc::new(SettingsStore::with_defaults(JsonStore::new(temp.path())));
        ExecutionContextBuilder::new(settings, Arc::new(StubAi), "0.1.0")
            .build(id, dir, "first", "kw", None)
    }

    async fn entity_with(
        temp: &TempDir,
        id: &str,
        loader: Arc<NativeModuleLoader>,
    ) -> PluginEntity {
        let dir = plugin_dir(temp, id).await;
        let manifest = PluginManifest::new(id);
        let validation = manifest.validate_in_dir(&dir).await;
        PluginEntity::new(manifest, &dir, PluginKind::User, validation, loader)
    }

    #[tokio::test]
    async fn test_actions_are_stamped_with_plugin_identity() {
        let temp = TempDir::new().unwrap();
        let loader = Arc::new(NativeModuleLoader::new());
        loader.register("stamped", || {
            PluginModule::new().with_lister(Arc::new(TwoActions))
        });

        let entity = entity_with(&temp, "stamped", Arc::clone(&loader)).await;
        let ctx = context(&temp, &entity.path, "stamped");

        let actions = entity.get_actions(&ctx).await.unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].global_id, "stamped:first");
        assert_eq!(actions[0].plugin_version, "1.0.0");
        assert_eq!(actions[1].global_id, "stamped:second");
    }

    #[tokio::test]
    async fn test_inactive_plugin_returns_no_actions() {
        let temp = TempDir::new().unwrap();
        let loader = Arc::new(NativeModuleLoader::new());
        loader.register("idle", || {
            PluginModule::new().with_lister(Arc::new(TwoActions))
        });

        let entity = entity_with(&temp, "idle", Arc::clone(&loader)).await;
        entity.set_status(PluginStatus::Inactive);

        let ctx = context(&temp, &entity.path, "idle");
        let actions = entity.get_actions(&ctx).await.unwrap();
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn test_module_without_lister_has_no_actions() {
        let temp = TempDir::new().unwrap();
        let loader = Arc::new(NativeModuleLoader::new());
        loader.register("mute", PluginModule::new);

        let entity = entity_with(&temp, "mute", Arc::clone(&loader)).await;
        let ctx = context(&temp, &entity.path, "mute");

        let actions = entity.get_actions(&ctx).await.unwrap();
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn test_execute_without_executor_fails() {
        let temp = TempDir::new().unwrap();
        let loader = Arc::new(NativeModuleLoader::new());
        loader.register("listonly", || {
            PluginModule::new().with_lister(Arc::new(TwoActions))
        });

        let entity = entity_with(&temp, "listonly", Arc::clone(&loader)).await;
        let ctx = context(&temp, &entity.path, "listonly");

        let err = entity.execute_action(&ctx).await.unwrap_err();
        assert!(matches!(err, Error::PluginExecution { .. }));
        assert!(err.to_string().contains("execution entry point"));
    }

    #[tokio::test]
    async fn test_execute_delegates_with_full_context() {
        let temp = TempDir::new().unwrap();
        let loader = Arc::new(NativeModuleLoader::new());
        loader.register("echo", || {
            PluginModule::new().with_executor(Arc::new(EchoExecutor))
        });

        let entity = entity_with(&temp, "echo", Arc::clone(&loader)).await;
        let ctx = context(&temp, &entity.path, "echo");

        let result = entity.execute_action(&ctx).await.unwrap();
        assert_eq!(result, json!({ "action": "first", "keyword": "kw" }));
    }

    #[tokio::test]
    async fn test_load_failure_sets_error_status() {
        let temp = TempDir::new().unwrap();
        // 등록되지 않은 플러그인 - 로드 실패
        let loader = Arc::new(NativeModuleLoader::new());

        let entity = entity_with(&temp, "broken", Arc::clone(&loader)).await;
        let ctx = context(&temp, &entity.path, "broken");

        let err = entity.execute_action(&ctx).await.unwrap_err();
        assert!(matches!(err, Error::PluginLoad { .. }));
        assert_eq!(entity.status(), PluginStatus::Error);

        let view = entity.sendable_view();
        assert_eq!(view.status, PluginStatus::Error);
        assert!(view.error.is_some());
    }

    #[tokio::test]
    async fn test_delete_is_not_idempotent() {
        let temp = TempDir::new().unwrap();
        let loader = Arc::new(NativeModuleLoader::new());
        loader.register("gone", PluginModule::new);

        let entity = entity_with(&temp, "gone", Arc::clone(&loader)).await;

        entity.delete().await.unwrap();
        let err = entity.delete().await.unwrap_err();
        assert!(matches!(err, Error::DirectoryNotFound(_)));
    }
}
