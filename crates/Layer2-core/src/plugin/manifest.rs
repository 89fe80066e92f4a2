//! Plugin Manifest - package.json 메타데이터
//!
//! 플러그인 디렉토리는 최소한 `name`을 가진 package.json을 포함해야 합니다.
//! 매니페스트가 없거나 깨진 디렉토리는 발견 단계에서 건너뜁니다 (스캔 전체를
//! 중단하지 않음).

use lumen_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 매니페스트 파일 이름
pub const MANIFEST_FILE: &str = "package.json";

/// 기본 진입 파일 (main 미지정 시)
pub const DEFAULT_ENTRY: &str = "index.js";

// ============================================================================
// PluginKind - 플러그인 출처
// ============================================================================

/// 플러그인이 어느 저장소에서 왔는지
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginKind {
    /// 사용자 설치 디렉토리
    User,
    /// 개발자 링크 저장소 (여러 패키지)
    Dev,
    /// 개발자 링크 단일 패키지
    DevPackage,
    /// 원격 카탈로그
    Remote,
}

impl PluginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Dev => "dev",
            Self::DevPackage => "dev-package",
            Self::Remote => "remote",
        }
    }

    /// 우선순위 (높을수록 우선) - dev-package > dev > user > remote
    pub fn priority(&self) -> u8 {
        match self {
            Self::DevPackage => 3,
            Self::Dev => 2,
            Self::User => 1,
            Self::Remote => 0,
        }
    }
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PluginValidation - 검증 결과
// ============================================================================

/// 플러그인 검증 결과
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl PluginValidation {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
        }
    }
}

// ============================================================================
// PluginManifest - package.json 구조
// ============================================================================

/// package.json 매니페스트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// 패키지 이름 (= 플러그인 id, 전역 유일)
    pub name: String,

    /// 표시 이름 (없으면 패키지 이름 사용)
    #[serde(
        default,
        rename = "displayName",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<String>,

    /// 버전
    #[serde(default = "default_version")]
    pub version: String,

    /// 설명
    #[serde(default)]
    pub description: String,

    /// 작성자
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// 진입 파일 (플러그인 디렉토리 기준 상대 경로)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,

    /// 키워드 (원격 카탈로그 검색용)
    #[serde(default)]
    pub keywords: Vec<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl PluginManifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            version: default_version(),
            description: String::new(),
            author: None,
            main: None,
            keywords: Vec::new(),
        }
    }

    /// 빌더 패턴: 표시 이름 설정
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// 빌더 패턴: 버전 설정
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// 빌더 패턴: 설명 설정
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 빌더 패턴: 작성자 설정
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// 빌더 패턴: 진입 파일 설정
    pub fn with_main(mut self, main: impl Into<String>) -> Self {
        self.main = Some(main.into());
        self
    }

    // ========================================================================
    // 파싱 / 검증
    // ========================================================================

    /// 문자열에서 파싱
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: PluginManifest = serde_json::from_str(content)?;
        Ok(manifest)
    }

    /// 디렉토리에서 package.json 읽기
    pub async fn read_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(Error::NotFound(format!(
                "{} not found in {}",
                MANIFEST_FILE,
                dir.display()
            )));
        }

        let content = fs::read_to_string(&path).await?;
        Self::parse(&content)
    }

    /// 진입 파일의 절대 경로
    pub fn entry_file(&self, dir: &Path) -> PathBuf {
        dir.join(self.main.as_deref().unwrap_or(DEFAULT_ENTRY))
    }

    /// 디렉토리 기준 검증 - 비어있지 않은 id, 존재하는 진입 파일
    pub async fn validate_in_dir(&self, dir: &Path) -> PluginValidation {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("plugin id (package name) is required".to_string());
        }

        let entry = self.entry_file(dir);
        if !fs::try_exists(&entry).await.unwrap_or(false) {
            errors.push(format!("entry file not found: {}", entry.display()));
        }

        if errors.is_empty() {
            PluginValidation::valid()
        } else {
            PluginValidation::invalid(errors)
        }
    }
}

// ============================================================================
// 테스트
// ============================================================================
