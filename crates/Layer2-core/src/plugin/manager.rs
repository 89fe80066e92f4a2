//! Plugin Manager - 다중 저장소 오케스트레이션
//!
//! 저장소들을 고정 우선순위(dev-package > dev > user)로 합치고, 전역 id로
//! 액션을 중복 제거하며, 실행 요청을 올바른 플러그인 엔티티로 보냅니다.
//!
//! ## 부분 실패 정책
//!
//! 플러그인 하나의 액션 수집 실패는 로그를 남기고 건너뜁니다. 런처의
//! 핵심 가치(사용 가능한 액션 보여주기)는 서드파티 플러그인 하나가
//! 잘못되어도 우아하게 저하되어야 합니다. 실패는 플러그인별 비치명
//! 실패로 결과에 함께 보고됩니다.

use super::action::{ActionEntity, GLOBAL_ID_SEPARATOR};
use super::context::{AiProxy, ExecutionContextBuilder};
use super::entity::PluginEntity;
use super::installer::{sanitize_package_dir, PackageDownloader};
use super::module::ModuleLoader;
use super::remote::{RemoteRepository, DEFAULT_REGISTRY_URL};
use super::repository::{DirectoryRepository, PluginRepository};
use lumen_foundation::{Error, Result, SettingsStore};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

// ============================================================================
// 요청 / 결과 타입
// ============================================================================

/// 액션 수집 질의
#[derive(Debug, Clone, Default)]
pub struct ActionQuery {
    /// 검색 키워드
    pub keyword: String,

    /// 런처가 덮고 있던 전면 앱
    pub overlay_app: Option<String>,
}

impl ActionQuery {
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            overlay_app: None,
        }
    }
}

/// 액션 실행 요청
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    /// 전역 액션 id (`"{plugin_id}:{action_id}"`)
    pub global_id: String,

    pub keyword: String,
    pub overlay_app: Option<String>,
}

impl ExecuteRequest {
    pub fn new(global_id: impl Into<String>) -> Self {
        Self {
            global_id: global_id.into(),
            keyword: String::new(),
            overlay_app: None,
        }
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }
}

/// 플러그인별 비치명 실패
#[derive(Debug, Clone)]
pub struct PluginFailure {
    pub plugin_id: String,
    pub message: String,
}

/// 액션 수집 결과
#[derive(Debug, Clone, Default)]
pub struct ActionAggregate {
    pub actions: Vec<ActionEntity>,
    pub failures: Vec<PluginFailure>,
}

// ============================================================================
// PluginManagerConfig
// ============================================================================

/// 매니저 설정
#[derive(Debug, Clone)]
pub struct PluginManagerConfig {
    /// 사용자 설치 저장소 루트
    pub user_root: PathBuf,

    /// 개발자 링크 저장소 루트
    pub dev_root: PathBuf,

    /// 링크된 단일 패키지 (없으면 dev-package 저장소 비활성)
    pub dev_package_root: Option<PathBuf>,

    /// 원격 카탈로그 레지스트리
    pub registry_url: String,

    /// 런처 버전 (실행 컨텍스트로 전달)
    pub app_version: String,
}

impl Default for PluginManagerConfig {
    fn default() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("lumen");

        Self {
            user_root: base.join("plugins"),
            dev_root: base.join("dev-plugins"),
            dev_package_root: None,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// ============================================================================
// PluginManager
// ============================================================================

/// 플러그인 매니저
pub struct PluginManager {
    /// 링크된 단일 패키지 저장소 (0-1개 엔트리)
    dev_package: RwLock<Option<Arc<DirectoryRepository>>>,

    /// 개발자 링크 저장소
    dev: Arc<DirectoryRepository>,

    /// 사용자 설치 저장소
    user: Arc<DirectoryRepository>,

    /// 원격 카탈로그
    remote: Arc<RemoteRepository>,

    downloader: Arc<dyn PackageDownloader>,
    loader: Arc<dyn ModuleLoader>,
    context_builder: ExecutionContextBuilder,
}

impl PluginManager {
    /// 새 매니저 생성
    pub fn new(
        config: PluginManagerConfig,
        loader: Arc<dyn ModuleLoader>,
        settings: Arc<SettingsStore>,
        ai: Arc<dyn AiProxy>,
        downloader: Arc<dyn PackageDownloader>,
    ) -> Self {
        let dev_package = config
            .dev_package_root
            .map(|root| Arc::new(DirectoryRepository::dev_package(root, Arc::clone(&loader))));

        Self {
            dev_package: RwLock::new(dev_package),
            dev: Arc::new(DirectoryRepository::dev(
                config.dev_root,
                Arc::clone(&loader),
            )),
            user: Arc::new(DirectoryRepository::user(
                config.user_root,
                Arc::clone(&loader),
            )),
            remote: Arc::new(RemoteRepository::new(
                config.registry_url,
                dirs::cache_dir()
                    .unwrap_or_else(std::env::temp_dir)
                    .join("lumen")
                    .join("catalog"),
                Arc::clone(&loader),
            )),
            downloader,
            loader,
            context_builder: ExecutionContextBuilder::new(settings, ai, config.app_version),
        }
    }

    // ========================================================================
    // 저장소 구성
    // ========================================================================

    /// 단일 패키지 링크
    pub fn link_dev_package(&self, root: impl Into<PathBuf>) {
        *self.dev_package.write() = Some(Arc::new(DirectoryRepository::dev_package(
            root.into(),
            Arc::clone(&self.loader),
        )));
    }

    /// 단일 패키지 링크 해제
    pub fn unlink_dev_package(&self) {
        *self.dev_package.write() = None;
    }

    /// 개발자 저장소 켜기/끄기
    pub fn set_dev_enabled(&self, enabled: bool) {
        self.dev.set_enabled(enabled);
    }

    /// 원격 카탈로그 접근
    pub fn remote(&self) -> &Arc<RemoteRepository> {
        &self.remote
    }

    /// 우선순위 순서의 로컬 소스 목록 - dev-package > dev > user
    fn local_sources(&self) -> Vec<Arc<DirectoryRepository>> {
        let mut sources = Vec::new();
        if let Some(dev_package) = self.dev_package.read().clone() {
            sources.push(dev_package);
        }
        sources.push(Arc::clone(&self.dev));
        sources.push(Arc::clone(&self.user));
        sources
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 모든 플러그인 (우선순위 순서로 이어붙임)
    pub async fn all(&self) -> Result<Vec<Arc<PluginEntity>>> {
        let mut plugins = Vec::new();
        for source in self.local_sources() {
            plugins.extend(source.get_all_plugins().await?);
        }
        Ok(plugins)
    }

    /// id로 찾기 - 같은 순서로 탐색하며 첫 일치를 반환
    ///
    /// 이 순서가 사실상의 오버라이드 우선순위입니다. 개발자가 링크한
    /// 플러그인이 같은 id의 설치본을 가립니다.
    pub async fn find(&self, id: &str) -> Result<Option<Arc<PluginEntity>>> {
        for source in self.local_sources() {
            if let Some(plugin) = source.find(id).await? {
                return Ok(Some(plugin));
            }
        }
        Ok(None)
    }

    // ========================================================================
    // 액션 수집 / 실행
    // ========================================================================

    /// 모든 플러그인의 액션 수집
    ///
    /// 전역 id 기준으로 중복을 제거하며 첫 번째 것을 유지합니다. 같은
    /// 플러그인이 두 저장소를 통해 동시에 보일 때를 방어합니다.
    pub async fn actions(&self, query: &ActionQuery) -> Result<ActionAggregate> {
        let mut aggregate = ActionAggregate::default();
        let mut seen: HashSet<String> = HashSet::new();

        // 플러그인 순서대로 순차 수집
        for plugin in self.all().await? {
            let ctx = self.context_builder.build(
                &plugin.id,
                &plugin.path,
                "",
                &query.keyword,
                query.overlay_app.clone(),
            );

            match plugin.get_actions(&ctx).await {
                Ok(actions) => {
                    for action in actions {
                        if seen.insert(action.global_id.clone()) {
                            aggregate.actions.push(action);
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to collect actions from plugin {}: {}", plugin.id, e);
                    aggregate.failures.push(PluginFailure {
                        plugin_id: plugin.id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        debug!(
            "Collected {} actions ({} plugin failures)",
            aggregate.actions.len(),
            aggregate.failures.len()
        );
        Ok(aggregate)
    }

    /// 전역 id로 액션 실행
    pub async fn execute_action(&self, request: &ExecuteRequest) -> Result<Value> {
        let (plugin_id, action_id) = request
            .global_id
            .split_once(GLOBAL_ID_SEPARATOR)
            .ok_or_else(|| {
                Error::InvalidInput(format!("invalid action id: {}", request.global_id))
            })?;

        let plugin = self
            .find(plugin_id)
            .await?
            .ok_or_else(|| Error::PluginNotFound(plugin_id.to_string()))?;

        let ctx = self.context_builder.build(
            &plugin.id,
            &plugin.path,
            action_id,
            &request.keyword,
            request.overlay_app.clone(),
        );

        plugin.execute_action(&ctx).await
    }

    // ========================================================================
    // 설치 / 제거
    // ========================================================================

    /// 플러그인 설치
    ///
    /// id를 파일 시스템 안전 이름으로 바꾸고, 사용자 저장소 루트를 만든 뒤
    /// 다운로더에 위임하고 재스캔합니다.
    pub async fn install(&self, id: &str) -> Result<()> {
        // 재설치라면 캐시된 모듈 핸들부터 무효화
        if let Some(existing) = self.user.find(id).await? {
            existing.invalidate_module().await;
        }

        let dir_name = sanitize_package_dir(id);
        fs::create_dir_all(self.user.root_dir()).await?;

        let dest = self.user.root_dir().join(dir_name);
        info!("Installing plugin {} into {:?}", id, dest);

        self.downloader.download_and_extract(id, &dest).await?;

        // 재스캔으로 설치 결과 확인
        let installed = self.user.get_all_plugins().await?;
        debug!("User repository now holds {} plugins", installed.len());
        Ok(())
    }

    /// 플러그인 제거
    ///
    /// 모든 소스에서 찾아 해당 엔티티의 delete를 호출합니다.
    pub async fn uninstall(&self, id: &str) -> Result<()> {
        let plugin = self
            .find(id)
            .await?
            .ok_or_else(|| Error::PluginNotFound(id.to_string()))?;

        info!("Uninstalling plugin: {}", id);
        plugin.delete().await
    }
}

// ============================================================================
// 테스트
// ============================================================================
