//! Service Container - 서비스 컨테이너
//!
//! 문자열 키를 서비스 팩토리/싱글톤/인스턴스에 바인딩하고,
//! alias 해석과 lazy 생성(싱글톤 메모이제이션)을 지원합니다.
//!
//! ## 규칙
//!
//! - `resolve`는 alias 맵을 먼저 통과시킨 뒤 바인딩을 조회합니다.
//! - 싱글톤 팩토리는 프로세스당 최대 한 번만 실행됩니다 (컨테이너가 책임).
//! - 해석은 이벤트 처리 스레드에서만 일어나므로 락은 맵 접근 동안만 유지하며,
//!   팩토리 실행 중에는 절대 잡지 않습니다.

use crate::{Error, Result};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 컨테이너가 보관하는 타입 소거 서비스 인스턴스
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// 서비스 팩토리 - 컨테이너를 받아 인스턴스를 생성
pub type ServiceFactory = Arc<dyn Fn(&ServiceContainer) -> ServiceInstance + Send + Sync>;

/// 개별 바인딩
struct Binding {
    factory: ServiceFactory,
    singleton: bool,
    cached: Option<ServiceInstance>,
}

/// 서비스 컨테이너
pub struct ServiceContainer {
    /// 키 → 바인딩
    bindings: RwLock<HashMap<String, Binding>>,

    /// alias 키 → 실제 키
    aliases: RwLock<HashMap<String, String>>,
}

impl ServiceContainer {
    /// 새 컨테이너 생성
    pub fn new() -> Self {
        Self {
            bindings: RwLock::new(HashMap::new()),
            aliases: RwLock::new(HashMap::new()),
        }
    }

    // ========================================================================
    // 바인딩 등록
    // ========================================================================

    /// 팩토리 바인딩
    ///
    /// `singleton`이 true이면 첫 resolve 때 생성된 인스턴스가 캐시됩니다.
    pub fn bind<T, F>(&self, key: impl Into<String>, factory: F, singleton: bool)
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceContainer) -> T + Send + Sync + 'static,
    {
        let key = key.into();
        let wrapped: ServiceFactory = Arc::new(move |c| Arc::new(factory(c)) as ServiceInstance);

        let mut bindings = self.bindings.write();
        if bindings.contains_key(&key) {
            debug!("Rebinding service: {}", key);
        }
        bindings.insert(
            key,
            Binding {
                factory: wrapped,
                singleton,
                cached: None,
            },
        );
    }

    /// 싱글톤 바인딩 (`bind(..., true)` 축약)
    pub fn singleton<T, F>(&self, key: impl Into<String>, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceContainer) -> T + Send + Sync + 'static,
    {
        self.bind(key, factory, true);
    }

    /// 이미 생성된 인스턴스 바인딩 (항상 싱글톤)
    pub fn instance<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
        let key = key.into();
        let inst: ServiceInstance = Arc::new(value);
        let for_factory = Arc::clone(&inst);

        let mut bindings = self.bindings.write();
        bindings.insert(
            key,
            Binding {
                factory: Arc::new(move |_| Arc::clone(&for_factory)),
                singleton: true,
                cached: Some(inst),
            },
        );
    }

    /// alias 등록 - `alias_key` 해석 시 `real_key`의 바인딩을 사용
    pub fn alias(&self, alias_key: impl Into<String>, real_key: impl Into<String>) {
        let mut aliases = self.aliases.write();
        aliases.insert(alias_key.into(), real_key.into());
    }

    // ========================================================================
    // 해석
    // ========================================================================

    /// 서비스 해석
    ///
    /// 바인딩이 없으면 원래(alias 적용 전) 키를 담아 `ServiceNotFound`를 반환합니다.
    pub fn resolve<T: Send + Sync + 'static>(&self, key: &str) -> Result<Arc<T>> {
        let real_key = self.resolve_alias(key);

        // 캐시된 싱글톤 fast path
        {
            let bindings = self.bindings.read();
            let binding = bindings
                .get(&real_key)
                .ok_or_else(|| Error::ServiceNotFound(key.to_string()))?;
            if let Some(cached) = &binding.cached {
                return Self::downcast(Arc::clone(cached), key);
            }
        }

        // 팩토리는 락 밖에서 실행 (팩토리가 다른 서비스를 resolve할 수 있음)
        let (factory, singleton) = {
            let bindings = self.bindings.read();
            let binding = bindings
                .get(&real_key)
                .ok_or_else(|| Error::ServiceNotFound(key.to_string()))?;
            (Arc::clone(&binding.factory), binding.singleton)
        };

        let instance = factory(self);

        if singleton {
            let mut bindings = self.bindings.write();
            if let Some(binding) = bindings.get_mut(&real_key) {
                // 팩토리 실행 중 다른 해석이 먼저 캐시했다면 그 인스턴스를 유지
                if let Some(already) = &binding.cached {
                    return Self::downcast(Arc::clone(already), key);
                }
                binding.cached = Some(Arc::clone(&instance));
            }
        }

        Self::downcast(instance, key)
    }

    /// 바인딩 존재 여부 (alias 적용 후)
    pub fn bound(&self, key: &str) -> bool {
        let real_key = self.resolve_alias(key);
        self.bindings.read().contains_key(&real_key)
    }

    /// 등록된 모든 바인딩 키
    pub fn keys(&self) -> Vec<String> {
        self.bindings.read().keys().cloned().collect()
    }

    /// 바인딩 제거 (캐시 포함)
    pub fn forget(&self, key: &str) -> bool {
        let real_key = self.resolve_alias(key);
        self.bindings.write().remove(&real_key).is_some()
    }

    // ========================================================================
    // 내부 유틸리티
    // ========================================================================

    /// alias 체인 해석 (순환 방지 상한 포함)
    fn resolve_alias(&self, key: &str) -> String {
        let aliases = self.aliases.read();
        let mut current = key;
        let mut hops = 0usize;
        while let Some(next) = aliases.get(current) {
            current = next;
            hops += 1;
            if hops > 32 {
                break;
            }
        }
        current.to_string()
    }

    fn downcast<T: Send + Sync + 'static>(instance: ServiceInstance, key: &str) -> Result<Arc<T>> {
        instance.downcast::<T>().map_err(|_| {
            Error::Internal(format!("Service '{}' resolved to an unexpected type", key))
        })
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Counter {
        value: usize,
    }

    #[test]
    fn test_singleton_resolves_to_identical_instance() {
        let container = ServiceContainer::new();
        container.singleton("counter", |_| Counter { value: 7 });

        let a = container.resolve::<Counter>("counter").unwrap();
        let b = container.resolve::<Counter>("counter").unwrap();

        assert_eq!(a.value, 7);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_singleton_factory_runs_at_most_once() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let container = ServiceContainer::new();
        container.singleton("counted", |_| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Counter { value: 1 }
        });

        let _ = container.resolve::<Counter>("counted").unwrap();
        let _ = container.resolve::<Counter>("counted").unwrap();
        let _ = container.resolve::<Counter>("counted").unwrap();

        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_non_singleton_creates_fresh_instances() {
        let container = ServiceContainer::new();
        container.bind("fresh", |_| Counter { value: 3 }, false);

        let a = container.resolve::<Counter>("fresh").unwrap();
        let b = container.resolve::<Counter>("fresh").unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_alias_transparency() {
        let container = ServiceContainer::new();
        container.singleton("real", |_| Counter { value: 42 });
        container.alias("shortcut", "real");

        let via_alias = container.resolve::<Counter>("shortcut").unwrap();
        let direct = container.resolve::<Counter>("real").unwrap();

        assert!(Arc::ptr_eq(&via_alias, &direct));
        assert!(container.bound("shortcut"));
    }

    #[test]
    fn test_missing_key_names_original_key() {
        let container = ServiceContainer::new();
        container.alias("shortcut", "nowhere");

        let err = container.resolve::<Counter>("shortcut").unwrap_err();
        match err {
            Error::ServiceNotFound(key) => assert_eq!(key, "shortcut"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_instance_binding() {
        let container = ServiceContainer::new();
        container.instance("fixed", Counter { value: 99 });

        let resolved = container.resolve::<Counter>("fixed").unwrap();
        assert_eq!(resolved.value, 99);
    }

    #[test]
    fn test_factory_can_resolve_other_services() {
        let container = ServiceContainer::new();
        container.instance("base", Counter { value: 10 });
        container.singleton("derived", |c| {
            let base = c.resolve::<Counter>("base").unwrap();
            Counter {
                value: base.value * 2,
            }
        });

        let derived = container.resolve::<Counter>("derived").unwrap();
        assert_eq!(derived.value, 20);
    }

    #[test]
    fn test_forget_removes_binding() {
        let container = ServiceContainer::new();
        container.instance("temp", Counter { value: 1 });

        assert!(container.forget("temp"));
        assert!(!container.bound("temp"));
        assert!(container.resolve::<Counter>("temp").is_err());
    }
}
