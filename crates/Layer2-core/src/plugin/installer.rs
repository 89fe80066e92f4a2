//! Plugin Installer - 패키지 다운로드 및 압축 해제
//!
//! 매니저는 다운로더 계약(`PackageDownloader`)만 알고, 실제 레지스트리
//! tarball 처리는 `HttpDownloader`가 담당합니다.

use super::remote::DEFAULT_REGISTRY_URL;
use async_trait::async_trait;
use lumen_foundation::{Error, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

// ============================================================================
// PackageDownloader - 다운로더 계약
// ============================================================================

/// 패키지 다운로더
#[async_trait]
pub trait PackageDownloader: Send + Sync {
    /// 패키지를 받아 `dest_dir`에 풀어놓기
    async fn download_and_extract(&self, package: &str, dest_dir: &Path) -> Result<()>;
}

/// 패키지 id를 파일 시스템 안전 디렉토리 이름으로
///
/// 스코프 패키지는 `@scope/name` → `scope__name` 형태가 됩니다.
pub fn sanitize_package_dir(id: &str) -> String {
    id.trim_start_matches('@')
        .replace('/', "__")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

// ============================================================================
// HttpDownloader - 레지스트리 tarball 다운로더
// ============================================================================

/// 레지스트리 tarball 다운로더
pub struct HttpDownloader {
    client: Client,
    registry_url: String,
}

impl HttpDownloader {
    pub fn new(registry_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            registry_url: registry_url.into(),
        }
    }

    pub fn default_registry() -> Self {
        Self::new(DEFAULT_REGISTRY_URL)
    }

    // ========================================================================
    // 유틸리티
    // ========================================================================

    /// 최신 버전의 tarball URL 조회
    async fn tarball_url(&self, package: &str) -> Result<String> {
        let url = format!("{}/{}/latest", self.registry_url, package);
        debug!("Resolving tarball for {}", package);

        let response = self
            .client
            .get(&url)
            .header("User-Agent", "Lumen")
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "Failed to resolve package {}: HTTP {}",
                package,
                response.status()
            )));
        }

        let metadata: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        metadata["dist"]["tarball"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| {
                Error::NotFound(format!("package {} has no tarball in registry", package))
            })
    }

    /// 파일 다운로드
    async fn download_file(&self, url: &str, dest: &Path) -> Result<()> {
        debug!("Downloading {} to {:?}", url, dest);

        let response = self
            .client
            .get(url)
            .header("User-Agent", "Lumen")
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "Failed to download: HTTP {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        fs::write(dest, bytes).await?;
        Ok(())
    }

    /// tarball 압축 해제
    async fn extract_tarball(&self, archive: &Path, dest: &Path) -> Result<()> {
        debug!("Extracting {:?} to {:?}", archive, dest);

        let output = tokio::process::Command::new("tar")
            .args([
                "-xzf",
                &archive.to_string_lossy(),
                "-C",
                &dest.to_string_lossy(),
            ])
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::Internal(format!(
                "Failed to extract archive: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Ok(())
    }

    /// 압축 해제 후 실제 패키지 디렉토리 찾기
    ///
    /// 레지스트리 tarball은 보통 `package/` 루트를 가집니다.
    async fn find_extracted_dir(&self, temp_dir: &Path) -> Result<PathBuf> {
        let mut entries = fs::read_dir(temp_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_dir() {
                return Ok(path);
            }
        }

        Err(Error::NotFound(
            "no directory found after extraction".into(),
        ))
    }

    /// 디렉토리 재귀 복사
    async fn copy_dir_recursive(&self, src: &Path, dest: &Path) -> Result<()> {
        if !fs::try_exists(dest).await.unwrap_or(false) {
            fs::create_dir_all(dest).await?;
        }

        let mut entries = fs::read_dir(src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let src_path = entry.path();
            let dest_path = dest.join(entry.file_name());

            if src_path.is_dir() {
                Box::pin(self.copy_dir_recursive(&src_path, &dest_path)).await?;
            } else {
                fs::copy(&src_path, &dest_path).await?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl PackageDownloader for HttpDownloader {
    async fn download_and_extract(&self, package: &str, dest_dir: &Path) -> Result<()> {
        info!("Downloading plugin package: {}", package);

        let tarball = self.tarball_url(package).await?;

        let temp_dir = std::env::temp_dir().join(format!("lumen_plugin_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&temp_dir).await?;

        let archive_path = temp_dir.join("package.tgz");
        let result = async {
            self.download_file(&tarball, &archive_path).await?;
            self.extract_tarball(&archive_path, &temp_dir).await?;

            let extracted = self.find_extracted_dir(&temp_dir).await?;
            self.copy_dir_recursive(&extracted, dest_dir).await?;

            info!("Installed package {} into {:?}", package, dest_dir);
            Ok(())
        }
        .await;

        // 임시 디렉토리 정리
        let _ = fs::remove_dir_all(&temp_dir).await;

        result
    }
}

// ============================================================================
// 테스트
// ============================================================================
