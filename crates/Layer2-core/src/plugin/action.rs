//! Action - 플러그인이 노출하는 호출 단위
//!
//! `ActionSpec`은 모듈이 돌려주는 원시 정보이고, `ActionEntity`는 소유
//! 플러그인의 id/종류/버전이 찍힌 시스템 전역 단위입니다. 전역 id는
//! `"{plugin_id}:{action_id}"`로 항상 재파생되며 따로 저장되지 않습니다.

use super::manifest::PluginKind;
use chrono::{DateTime, Utc};
use lumen_foundation::{Error, Result};
use serde::{Deserialize, Serialize};

/// 전역 id 구분자
pub const GLOBAL_ID_SEPARATOR: char = ':';

// ============================================================================
// ViewMode / ActionStatus
// ============================================================================

/// 액션 뷰 모드
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// 런처 창 안에 내장
    #[default]
    Embedded,
    /// 별도 창
    Window,
}

/// 액션 상태
///
/// ready → executing → {completed | error} → ready(reset),
/// disabled는 명시적으로 enable하기 전까지 터미널 상태입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Ready,
    Executing,
    Completed,
    Error,
    Disabled,
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Ready => "ready",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Disabled => "disabled",
        };
        f.write_str(text)
    }
}

// ============================================================================
// ActionSpec - 모듈이 반환하는 원시 액션
// ============================================================================

/// 모듈의 액션 목록 함수가 반환하는 원시 액션 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSpec {
    /// 플러그인 내 유일 id
    pub id: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_path: Option<String>,

    #[serde(default)]
    pub view_mode: ViewMode,

    #[serde(default)]
    pub dev_tools: bool,
}

impl ActionSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            icon: None,
            view_path: None,
            view_mode: ViewMode::default(),
            dev_tools: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_view(mut self, path: impl Into<String>, mode: ViewMode) -> Self {
        self.view_path = Some(path.into());
        self.view_mode = mode;
        self
    }
}

// ============================================================================
// ActionEntity - 시스템 전역 액션
// ============================================================================

/// 액션 엔티티
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEntity {
    pub id: String,

    /// 전역 id - 실행 디스패치에 쓰이는 유일한 식별자
    pub global_id: String,

    pub plugin_id: String,
    pub plugin_kind: PluginKind,
    pub plugin_version: String,

    pub description: String,
    pub icon: Option<String>,
    pub view_path: Option<String>,
    pub view_mode: ViewMode,
    pub dev_tools: bool,

    pub status: ActionStatus,
    pub last_execute_time: Option<DateTime<Utc>>,
}

impl ActionEntity {
    /// 전역 id 파생
    pub fn global_id_for(plugin_id: &str, action_id: &str) -> String {
        format!("{}{}{}", plugin_id, GLOBAL_ID_SEPARATOR, action_id)
    }

    /// 원시 스펙을 소유 플러그인 정보로 감싸 엔티티 생성
    pub fn from_spec(
        spec: ActionSpec,
        plugin_id: &str,
        plugin_kind: PluginKind,
        plugin_version: &str,
    ) -> Self {
        Self {
            global_id: Self::global_id_for(plugin_id, &spec.id),
            id: spec.id,
            plugin_id: plugin_id.to_string(),
            plugin_kind,
            plugin_version: plugin_version.to_string(),
            description: spec.description,
            icon: spec.icon,
            view_path: spec.view_path,
            view_mode: spec.view_mode,
            dev_tools: spec.dev_tools,
            status: ActionStatus::Ready,
            last_execute_time: None,
        }
    }

    // ========================================================================
    // 상태 전이
    // ========================================================================

    /// 실행 시작 - ready에서만 가능, disabled면 항상 거부
    pub fn begin_execution(&mut self) -> Result<()> {
        match self.status {
            ActionStatus::Disabled => Err(Error::InvalidInput(format!(
                "action {} is disabled",
                self.global_id
            ))),
            ActionStatus::Executing => Err(Error::InvalidInput(format!(
                "action {} is already executing",
                self.global_id
            ))),
            ActionStatus::Completed | ActionStatus::Error => Err(Error::InvalidInput(format!(
                "action {} must be reset before executing again",
                self.global_id
            ))),
            ActionStatus::Ready => {
                self.status = ActionStatus::Executing;
                self.last_execute_time = Some(Utc::now());
                Ok(())
            }
        }
    }

    /// 실행 완료
    pub fn complete(&mut self) {
        if self.status == ActionStatus::Executing {
            self.status = ActionStatus::Completed;
        }
    }

    /// 실행 실패
    pub fn fail(&mut self) {
        if self.status == ActionStatus::Executing {
            self.status = ActionStatus::Error;
        }
    }

    /// completed/error → ready
    pub fn reset(&mut self) {
        if matches!(self.status, ActionStatus::Completed | ActionStatus::Error) {
            self.status = ActionStatus::Ready;
        }
    }

    /// 비활성화 - enable 전까지 실행 불가
    pub fn disable(&mut self) {
        self.status = ActionStatus::Disabled;
    }

    /// 활성화
    pub fn enable(&mut self) {
        if self.status == ActionStatus::Disabled {
            self.status = ActionStatus::Ready;
        }
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> ActionEntity {
        ActionEntity::from_spec(
            ActionSpec::new("search").with_description("search things"),
            "finder",
            PluginKind::User,
            "1.0.0",
        )
    }

    #[test]
    fn test_global_id_is_derived() {
        let action = entity();
        assert_eq!(action.global_id, "finder:search");
        assert_eq!(ActionEntity::global_id_for("a", "b"), "a:b");
    }

    #[test]
    fn test_execution_lifecycle() {
        let mut action = entity();
        assert_eq!(action.status, ActionStatus::Ready);

        action.begin_execution().unwrap();
        assert_eq!(action.status, ActionStatus::Executing);
        assert!(action.last_execute_time.is_some());

        action.complete();
        assert_eq!(action.status, ActionStatus::Completed);

        // completed에서 바로 재실행은 불가, reset 후 가능
        assert!(action.begin_execution().is_err());
        action.reset();
        action.begin_execution().unwrap();
        action.fail();
        assert_eq!(action.status, ActionStatus::Error);
    }

    #[test]
    fn test_disabled_action_cannot_execute() {
        let mut action = entity();
        action.disable();

        let err = action.begin_execution().unwrap_err();
        assert!(err.to_string().contains("disabled"));
        assert_eq!(action.status, ActionStatus::Disabled);

        action.enable();
        assert_eq!(action.status, ActionStatus::Ready);
        action.begin_execution().unwrap();
    }
}
