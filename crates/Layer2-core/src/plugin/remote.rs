//! Remote Repository - 패키지 레지스트리 카탈로그
//!
//! 파일 시스템을 읽지 않는 저장소 변형입니다. 인식 키워드가 붙은 패키지를
//! 레지스트리 검색 서비스에서 조회해 캐시하고, 고정 주기(1시간)로
//! 갱신합니다. 겹치는 갱신 호출은 재진입 가드로 하나의 진행 중 갱신에
//! 수렴합니다.

use super::entity::{PluginEntity, PluginStatus};
use super::manifest::{PluginKind, PluginManifest, PluginValidation};
use super::module::ModuleLoader;
use super::repository::PluginRepository;
use async_trait::async_trait;
use lumen_foundation::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 플러그인 패키지 인식 키워드
pub const PLUGIN_KEYWORD: &str = "lumen-plugin";

/// 기본 레지스트리
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// 카탈로그 캐시 수명 - 1시간
const CACHE_TTL: Duration = Duration::from_secs(3600);

// ============================================================================
// RemotePackage - 카탈로그 항목
// ============================================================================

/// 원격 카탈로그의 패키지 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePackage {
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

// 레지스트리 검색 응답 구조
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    objects: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    package: SearchPackage,
}

#[derive(Debug, Deserialize)]
struct SearchPackage {
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    description: String,
    publisher: Option<SearchPublisher>,
}

#[derive(Debug, Deserialize)]
struct SearchPublisher {
    username: String,
}

// ============================================================================
// RemoteRepository
// ============================================================================

/// 원격 카탈로그 저장소
pub struct RemoteRepository {
    client: Client,
    registry_url: String,
    keyword: String,

    /// 카탈로그 캐시 디렉토리 (root_dir로 보고)
    cache_dir: PathBuf,

    loader: Arc<dyn ModuleLoader>,

    cache: tokio::sync::RwLock<Vec<RemotePackage>>,
    last_refresh: parking_lot::Mutex<Option<Instant>>,

    /// 진행 중 갱신 가드
    is_refreshing: AtomicBool,
}

impl RemoteRepository {
    pub fn new(
        registry_url: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
        loader: Arc<dyn ModuleLoader>,
    ) -> Self {
        Self {
            client: Client::new(),
            registry_url: registry_url.into(),
            keyword: PLUGIN_KEYWORD.to_string(),
            cache_dir: cache_dir.into(),
            loader,
            cache: tokio::sync::RwLock::new(Vec::new()),
            last_refresh: parking_lot::Mutex::new(None),
            is_refreshing: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // 캐시 갱신
    // ========================================================================

    fn is_stale(&self) -> bool {
        self.last_refresh
            .lock()
            .map_or(true, |at| at.elapsed() >= CACHE_TTL)
    }

    /// 캐시가 오래됐으면 갱신
    ///
    /// 겹치는 호출은 하나의 진행 중 갱신으로 수렴합니다. 갱신 실패는
    /// 경고만 남기고 기존 캐시를 유지합니다.
    pub async fn refresh_if_stale(&self) {
        if !self.is_stale() {
            return;
        }

        if self.is_refreshing.swap(true, Ordering::SeqCst) {
            // 다른 호출이 이미 갱신 중
            return;
        }

        let result = self.refresh().await;
        self.is_refreshing.store(false, Ordering::SeqCst);

        if let Err(e) = result {
            warn!("Failed to refresh plugin catalog: {}", e);
        }
    }

    /// 카탈로그 강제 갱신
    pub async fn refresh(&self) -> Result<()> {
        let packages = self.fetch_catalog().await?;
        info!(
            "Loaded {} plugins from registry {}",
            packages.len(),
            self.registry_url
        );

        *self.cache.write().await = packages;
        *self.last_refresh.lock() = Some(Instant::now());
        Ok(())
    }

    /// 레지스트리 검색 호출
    async fn fetch_catalog(&self) -> Result<Vec<RemotePackage>> {
        let url = format!(
            "{}/-/v1/search?text=keywords:{}&size=250",
            self.registry_url, self.keyword
        );
        debug!("Fetching plugin catalog from {}", url);

        let response = self
            .client
            .get(&url)
            .header("User-Agent", "Lumen")
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "Failed to search registry: HTTP {}",
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(body
            .objects
            .into_iter()
            .map(|entry| RemotePackage {
                name: entry.package.name,
                version: entry.package.version,
                description: entry.package.description,
                author: entry.package.publisher.map(|p| p.username),
            })
            .collect())
    }

    // ========================================================================
    // 검색
    // ========================================================================

    /// 캐시된 카탈로그 전체
    pub async fn packages(&self) -> Vec<RemotePackage> {
        self.refresh_if_stale().await;
        self.cache.read().await.clone()
    }

    /// 이름/설명으로 검색
    pub async fn search(&self, query: &str) -> Vec<RemotePackage> {
        let query = query.to_lowercase();
        self.packages()
            .await
            .into_iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&query)
                    || p.description.to_lowercase().contains(&query)
            })
            .collect()
    }

    /// 이름으로 패키지 찾기
    pub async fn find_package(&self, name: &str) -> Option<RemotePackage> {
        self.packages().await.into_iter().find(|p| p.name == name)
    }

    fn entity_for(&self, package: &RemotePackage) -> Arc<PluginEntity> {
        let mut manifest = PluginManifest::new(&package.name)
            .with_version(&package.version)
            .with_description(&package.description);
        if let Some(author) = &package.author {
            manifest = manifest.with_author(author);
        }

        let entity = PluginEntity::new(
            manifest,
            &self.cache_dir.join(&package.name),
            PluginKind::Remote,
            PluginValidation::valid(),
            Arc::clone(&self.loader),
        );
        // 카탈로그 항목은 설치 전까지 실행 대상이 아님
        entity.set_status(PluginStatus::Inactive);
        Arc::new(entity)
    }
}

#[async_trait]
impl PluginRepository for RemoteRepository {
    fn root_dir(&self) -> &Path {
        &self.cache_dir
    }

    async fn ensure_repo_dirs(&self) -> Result<()> {
        // 파일 시스템을 읽지 않는 저장소
        Ok(())
    }

    async fn get_all_plugins(&self) -> Result<Vec<Arc<PluginEntity>>> {
        self.refresh_if_stale().await;
        let cache = self.cache.read().await;
        Ok(cache.iter().map(|p| self.entity_for(p)).collect())
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::module::NativeModuleLoader;
    use tempfile::TempDir;

    fn sample_packages() -> Vec<RemotePackage> {
        vec![
            RemotePackage {
                name: "calc".to_string(),
                version: "1.2.0".to_string(),
                description: "Quick calculator".to_string(),
                author: Some("alice".to_string()),
            },
            RemotePackage {
                name: "clipboard-history".to_string(),
                version: "0.9.0".to_string(),
                description: "Search your clipboard".to_string(),
                author: None,
            },
        ]
    }

    async fn primed_repository(temp: &TempDir) -> RemoteRepository {
        let repo = RemoteRepository::new(
            DEFAULT_REGISTRY_URL,
            temp.path().join("catalog"),
            Arc::new(NativeModuleLoader::new()),
        );
        *repo.cache.write().await = sample_packages();
        *repo.last_refresh.lock() = Some(Instant::now());
        repo
    }

    #[tokio::test]
    async fn test_search_matches_name_and_description() {
        let temp = TempDir::new().unwrap();
        let repo = primed_repository(&temp).await;

        let results = repo.search("calc").await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "calc");

        let results = repo.search("clipboard").await;
        assert_eq!(results.len(), 1);

        let results = repo.search("nothing").await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_find_package() {
        let temp = TempDir::new().unwrap();
        let repo = primed_repository(&temp).await;

        assert!(repo.find_package("calc").await.is_some());
        assert!(repo.find_package("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_catalog_entities_are_inactive_remote_plugins() {
        let temp = TempDir::new().unwrap();
        let repo = primed_repository(&temp).await;

        let plugins = repo.get_all_plugins().await.unwrap();
        assert_eq!(plugins.len(), 2);
        assert_eq!(plugins[0].kind, PluginKind::Remote);
        assert_eq!(plugins[0].status(), PluginStatus::Inactive);
    }

    #[tokio::test]
    async fn test_fresh_cache_is_not_refetched() {
        let temp = TempDir::new().unwrap();
        // registry_url이 유효하지 않아도 캐시가 신선하면 네트워크를 타지 않음
        let repo = RemoteRepository::new(
            "http://127.0.0.1:0",
            temp.path().join("catalog"),
            Arc::new(NativeModuleLoader::new()),
        );
        *repo.cache.write().await = sample_packages();
        *repo.last_refresh.lock() = Some(Instant::now());

        let packages = repo.packages().await;
        assert_eq!(packages.len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_guard_collapses_overlapping_calls() {
        let temp = TempDir::new().unwrap();
        let repo = RemoteRepository::new(
            "http://127.0.0.1:0",
            temp.path().join("catalog"),
            Arc::new(NativeModuleLoader::new()),
        );

        // 가드가 이미 잡혀 있으면 stale 캐시라도 바로 반환
        repo.is_refreshing.store(true, Ordering::SeqCst);
        repo.refresh_if_stale().await;
        assert!(repo.cache.read().await.is_empty());
        assert!(repo.is_refreshing.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_search_response_parsing() {
        let body = r#"{
            "objects": [
                { "package": { "name": "calc", "version": "1.0.0",
                               "description": "calc", "publisher": { "username": "alice" } } }
            ],
            "total": 1
        }"#;

        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.objects.len(), 1);
        assert_eq!(parsed.objects[0].package.name, "calc");
        assert_eq!(
            parsed.objects[0].package.publisher.as_ref().unwrap().username,
            "alice"
        );
    }
}
