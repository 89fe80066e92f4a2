//! Scoped Fs - 플러그인 디렉토리로 제한된 파일 시스템 capability
//!
//! 모든 경로 인자는 절대 경로로 해석한 뒤(상대 경로는 플러그인 디렉토리
//! 기준) 정규화하며, 결과가 플러그인 디렉토리의 하위가 아니면
//! `SandboxViolation`으로 실패합니다. 이것이 코어가 제공하는 유일한
//! 샌드박스 보장입니다.

use lumen_foundation::{Error, Result};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// 경로 제한 파일 시스템
#[derive(Debug, Clone)]
pub struct ScopedFs {
    root: PathBuf,
}

impl ScopedFs {
    /// 플러그인 디렉토리를 루트로 생성
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: normalize_path(&root.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 경로 해석 + 봉쇄 검사
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        let normalized = normalize_path(&absolute);
        if !normalized.starts_with(&self.root) {
            return Err(Error::sandbox_violation(
                path.display().to_string(),
                self.root.display().to_string(),
            ));
        }

        Ok(normalized)
    }

    // ========================================================================
    // 파일 연산
    // ========================================================================

    pub async fn read(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let resolved = self.resolve(path)?;
        Ok(fs::read(&resolved).await?)
    }

    pub async fn read_to_string(&self, path: impl AsRef<Path>) -> Result<String> {
        let resolved = self.resolve(path)?;
        Ok(fs::read_to_string(&resolved).await?)
    }

    pub async fn write(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(fs::write(&resolved, contents.as_ref()).await?)
    }

    pub async fn exists(&self, path: impl AsRef<Path>) -> Result<bool> {
        let resolved = self.resolve(path)?;
        Ok(fs::try_exists(&resolved).await.unwrap_or(false))
    }

    pub async fn create_dir_all(&self, path: impl AsRef<Path>) -> Result<()> {
        let resolved = self.resolve(path)?;
        Ok(fs::create_dir_all(&resolved).await?)
    }

    pub async fn remove_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let resolved = self.resolve(path)?;
        Ok(fs::remove_file(&resolved).await?)
    }
}

/// 경로 정규화 (canonicalize 없이)
fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                // ".." 이면 마지막 컴포넌트 제거 (루트가 아닌 경우)
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                }
            }
            Component::CurDir => {
                // "." 무시
            }
            _ => {
                components.push(component);
            }
        }
    }

    components.iter().collect()
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_relative_path_resolves_under_root() {
        let sandbox = ScopedFs::new("/plugins/foo");
        let resolved = sandbox.resolve("./data.json").unwrap();
        assert_eq!(resolved, PathBuf::from("/plugins/foo/data.json"));
    }

    #[test]
    fn test_parent_escape_is_rejected() {
        let sandbox = ScopedFs::new("/plugins/foo");
        let err = sandbox.resolve("../../etc/passwd").unwrap_err();

        match err {
            Error::SandboxViolation { path, root } => {
                assert_eq!(path, "../../etc/passwd");
                assert_eq!(root, "/plugins/foo");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_absolute_path_outside_root_is_rejected() {
        let sandbox = ScopedFs::new("/plugins/foo");
        assert!(sandbox.resolve("/etc/passwd").is_err());
        // 루트 내부 절대 경로는 허용
        assert!(sandbox.resolve("/plugins/foo/sub/file.txt").is_ok());
    }

    #[test]
    fn test_sneaky_traversal_inside_path() {
        let sandbox = ScopedFs::new("/plugins/foo");
        // 중간 ..이 루트 안에서 해소되면 허용
        assert!(sandbox.resolve("sub/../data.json").is_ok());
        // 루트 밖으로 나가면 거부
        assert!(sandbox.resolve("sub/../../bar/data.json").is_err());
    }

    #[tokio::test]
    async fn test_read_write_inside_root() {
        let temp = TempDir::new().unwrap();
        let sandbox = ScopedFs::new(temp.path());

        sandbox.write("data.json", b"{\"ok\":true}").await.unwrap();
        let content = sandbox.read_to_string("./data.json").await.unwrap();
        assert_eq!(content, "{\"ok\":true}");
        assert!(sandbox.exists("data.json").await.unwrap());

        sandbox.remove_file("data.json").await.unwrap();
        assert!(!sandbox.exists("data.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_read_escape_fails_before_touching_fs() {
        let temp = TempDir::new().unwrap();
        let sandbox = ScopedFs::new(temp.path());

        let err = sandbox.read("../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, Error::SandboxViolation { .. }));
    }
}
