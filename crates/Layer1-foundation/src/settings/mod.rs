//! Settings Store - dotted key 설정 저장소
//!
//! 하나의 JSON 문서 위에서 `a.b.c` 형태의 키로 get/set/remove를 제공합니다.
//! 플러그인 설정 네임스페이스(`plugins.{id}.`)가 이 저장소 위에 올라갑니다.

use crate::storage::JsonStore;
use crate::Result;
use parking_lot::RwLock;
use serde_json::{Map, Value};

/// 기본 설정 파일 이름
pub const SETTINGS_FILE: &str = "settings.json";

/// dotted-key 설정 저장소
pub struct SettingsStore {
    store: JsonStore,
    filename: String,

    /// 메모리 캐시 - 저장 시점마다 파일과 동기화
    document: RwLock<Value>,
}

impl SettingsStore {
    /// 저장소 생성 - 파일이 있으면 로드, 없으면 빈 문서로 시작
    pub fn new(store: JsonStore, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let document = store
            .load::<Value>(&filename)
            .unwrap_or_else(|_| Value::Object(Map::new()));

        Self {
            store,
            filename,
            document: RwLock::new(document),
        }
    }

    /// 기본 파일 이름으로 생성
    pub fn with_defaults(store: JsonStore) -> Self {
        Self::new(store, SETTINGS_FILE)
    }

    // ========================================================================
    // 조회 / 변경
    // ========================================================================

    /// dotted 키로 값 조회
    pub fn get(&self, key: &str) -> Option<Value> {
        let document = self.document.read();
        let mut current = &*document;
        for segment in key.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// dotted 키로 값 설정 (중간 오브젝트는 자동 생성, 즉시 저장)
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        {
            let mut document = self.document.write();
            let mut current = &mut *document;

            let segments: Vec<&str> = key.split('.').collect();
            for segment in &segments[..segments.len() - 1] {
                if !current.is_object() {
                    *current = Value::Object(Map::new());
                }
                current = current
                    .as_object_mut()
                    .expect("object ensured above")
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
            }

            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            current
                .as_object_mut()
                .expect("object ensured above")
                .insert(segments[segments.len() - 1].to_string(), value);
        }

        self.persist()
    }

    /// dotted 키 삭제 (즉시 저장)
    pub fn remove(&self, key: &str) -> Result<()> {
        {
            let mut document = self.document.write();
            let mut current = &mut *document;

            let segments: Vec<&str> = key.split('.').collect();
            for segment in &segments[..segments.len() - 1] {
                match current.get_mut(*segment) {
                    Some(next) => current = next,
                    None => return Ok(()),
                }
            }

            if let Some(map) = current.as_object_mut() {
                map.remove(segments[segments.len() - 1]);
            }
        }

        self.persist()
    }

    /// 전체 문서 스냅샷
    pub fn snapshot(&self) -> Value {
        self.document.read().clone()
    }

    fn persist(&self) -> Result<()> {
        let document = self.document.read();
        self.store.save(&self.filename, &*document)
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_store(temp: &TempDir) -> SettingsStore {
        SettingsStore::with_defaults(JsonStore::new(temp.path()))
    }

    #[test]
    fn test_set_and_get_nested_key() {
        let temp = TempDir::new().unwrap();
        let settings = test_store(&temp);

        settings.set("plugins.calc.precision", json!(4)).unwrap();

        assert_eq!(settings.get("plugins.calc.precision"), Some(json!(4)));
        assert_eq!(
            settings.get("plugins.calc"),
            Some(json!({ "precision": 4 }))
        );
        assert_eq!(settings.get("plugins.other"), None);
    }

    #[test]
    fn test_remove_key() {
        let temp = TempDir::new().unwrap();
        let settings = test_store(&temp);

        settings.set("theme.mode", json!("dark")).unwrap();
        settings.remove("theme.mode").unwrap();

        assert_eq!(settings.get("theme.mode"), None);
        // 존재하지 않는 키 삭제는 에러가 아님
        settings.remove("theme.missing.deep").unwrap();
    }

    #[test]
    fn test_persists_across_instances() {
        let temp = TempDir::new().unwrap();
        {
            let settings = test_store(&temp);
            settings.set("hotkey", json!("alt+space")).unwrap();
        }

        let reloaded = test_store(&temp);
        assert_eq!(reloaded.get("hotkey"), Some(json!("alt+space")));
    }
}
