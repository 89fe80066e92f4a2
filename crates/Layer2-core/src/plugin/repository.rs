//! Plugin Repository - 루트 디렉토리에서 플러그인 발견
//!
//! 하나의 `DirectoryRepository`가 세 가지 로컬 변형을 설정으로 커버합니다:
//!
//! - user: 고정된 설치 디렉토리
//! - dev: 사용자가 지정한 링크 패키지 디렉토리 (0..N), 경로를 잃지 않고
//!   켜고 끌 수 있음
//! - dev-package: 링크된 단일 패키지 (루트 자체가 0-1개의 후보)
//!
//! 발견 규칙: 후보 디렉토리마다 매니페스트를 읽고, 실패하면 경고를 남기고
//! 건너뜁니다. 깨진 플러그인 하나가 나머지의 발견을 막으면 안 됩니다.

use super::entity::PluginEntity;
use super::manifest::{PluginKind, PluginManifest};
use super::module::ModuleLoader;
use async_trait::async_trait;
use lumen_foundation::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};

// ============================================================================
// PluginRepository - 저장소 추상화
// ============================================================================

/// 플러그인 저장소
#[async_trait]
pub trait PluginRepository: Send + Sync {
    /// 루트 디렉토리
    fn root_dir(&self) -> &Path;

    /// 루트 존재 확인 - 없으면 `RepositoryNotFound`
    async fn ensure_repo_dirs(&self) -> Result<()>;

    /// 유효한 플러그인 전체 (표시 이름 순 정렬)
    async fn get_all_plugins(&self) -> Result<Vec<Arc<PluginEntity>>>;

    /// id로 플러그인 찾기
    async fn find(&self, id: &str) -> Result<Option<Arc<PluginEntity>>> {
        let plugins = self.get_all_plugins().await?;
        Ok(plugins.into_iter().find(|p| p.id == id))
    }

    /// id 존재 여부
    async fn has(&self, id: &str) -> Result<bool> {
        Ok(self.find(id).await?.is_some())
    }
}

// ============================================================================
// DirectoryRepository - 로컬 디렉토리 저장소
// ============================================================================

/// 디렉토리 기반 저장소
pub struct DirectoryRepository {
    root: PathBuf,
    kind: PluginKind,

    /// true면 루트 자체가 단일 패키지 후보 (dev-package)
    single_package: bool,

    enabled: AtomicBool,
    loader: Arc<dyn ModuleLoader>,
}

impl DirectoryRepository {
    /// 사용자 설치 저장소
    pub fn user(root: impl Into<PathBuf>, loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            root: root.into(),
            kind: PluginKind::User,
            single_package: false,
            enabled: AtomicBool::new(true),
            loader,
        }
    }

    /// 개발자 링크 저장소 (여러 패키지)
    pub fn dev(root: impl Into<PathBuf>, loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            root: root.into(),
            kind: PluginKind::Dev,
            single_package: false,
            enabled: AtomicBool::new(true),
            loader,
        }
    }

    /// 개발자 링크 단일 패키지
    pub fn dev_package(root: impl Into<PathBuf>, loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            root: root.into(),
            kind: PluginKind::DevPackage,
            single_package: true,
            enabled: AtomicBool::new(true),
            loader,
        }
    }

    pub fn kind(&self) -> PluginKind {
        self.kind
    }

    /// 켜기/끄기 - 설정된 경로는 유지됩니다
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    // ========================================================================
    // 발견
    // ========================================================================

    /// 후보 디렉토리 목록
    async fn candidate_dirs(&self) -> Result<Vec<PathBuf>> {
        if self.single_package {
            return Ok(vec![self.root.clone()]);
        }

        let mut candidates = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_dir() {
                candidates.push(path);
            }
        }
        Ok(candidates)
    }

    /// 후보 디렉토리 하나를 엔티티로
    async fn scan_candidate(&self, dir: &Path) -> Result<Arc<PluginEntity>> {
        let manifest = PluginManifest::read_from_dir(dir).await?;
        let validation = manifest.validate_in_dir(dir).await;
        Ok(Arc::new(PluginEntity::new(
            manifest,
            dir,
            self.kind,
            validation,
            Arc::clone(&self.loader),
        )))
    }
}

#[async_trait]
impl PluginRepository for DirectoryRepository {
    fn root_dir(&self) -> &Path {
        &self.root
    }

    async fn ensure_repo_dirs(&self) -> Result<()> {
        if !fs::try_exists(&self.root).await.unwrap_or(false) {
            return Err(Error::RepositoryNotFound(self.root.display().to_string()));
        }
        Ok(())
    }

    async fn get_all_plugins(&self) -> Result<Vec<Arc<PluginEntity>>> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }

        if !fs::try_exists(&self.root).await.unwrap_or(false) {
            debug!("Repository root does not exist: {}", self.root.display());
            return Ok(Vec::new());
        }

        let mut plugins = Vec::new();
        for dir in self.candidate_dirs().await? {
            match self.scan_candidate(&dir).await {
                Ok(entity) => {
                    debug!("Found plugin: {} at {:?}", entity.id, dir);
                    plugins.push(entity);
                }
                Err(e) => {
                    warn!("Failed to read plugin manifest in {:?}: {}", dir, e);
                }
            }
        }

        // 유효한 것만, 표시 이름 순으로
        plugins.retain(|p| p.validation.is_valid);
        plugins.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(plugins)
    }
}

// ============================================================================
// 테스트
// ============================================================================
