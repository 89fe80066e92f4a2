//! Validator - 위치 인자 검증
//!
//! 규칙은 모두 평가되어 에러가 누적됩니다. 첫 실패에서 중단하지 않으므로
//! 호출자는 한 번에 모든 위반을 확인할 수 있습니다.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// ArgType - 런타임 타입 검사
// ============================================================================

/// 인자 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ArgType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

// ============================================================================
// ValidationRule - 인덱스별 규칙
// ============================================================================

/// 커스텀 검증 술어 - 통과 시 Ok, 실패 시 에러 메시지
pub type ArgPredicate = Arc<dyn Fn(&Value) -> std::result::Result<(), String> + Send + Sync>;

/// 위치 인자 하나에 대한 규칙
#[derive(Clone, Default)]
pub struct ValidationRule {
    /// 필수 여부
    pub required: bool,

    /// 기대 타입
    pub arg_type: Option<ArgType>,

    /// 커스텀 술어 - required/type 검사를 통과한 경우에만 실행
    pub validator: Option<ArgPredicate>,
}

impl ValidationRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn of_type(mut self, arg_type: ArgType) -> Self {
        self.arg_type = Some(arg_type);
        self
    }

    pub fn with_validator<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(predicate));
        self
    }
}

// ============================================================================
// validate - 검증 실행
// ============================================================================

/// 검증 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// 모든 에러를 하나의 메시지로
    pub fn joined(&self) -> String {
        self.errors.join("; ")
    }
}

/// 위치 인자를 규칙에 대해 검증
///
/// 인자가 없거나 null이면 "없는" 것으로 취급합니다.
pub fn validate(args: &[Value], rules: &BTreeMap<usize, ValidationRule>) -> ValidationReport {
    let mut errors = Vec::new();

    for (index, rule) in rules {
        let arg = args.get(*index);
        let missing = matches!(arg, None | Some(Value::Null));

        if missing {
            if rule.required {
                errors.push(format!("missing required parameter at index {}", index));
            }
            continue;
        }

        let Some(value) = arg else { continue };

        let mut basic_ok = true;
        if let Some(expected) = rule.arg_type {
            if !expected.matches(value) {
                errors.push(format!(
                    "parameter at index {} must be of type {}",
                    index,
                    expected.as_str()
                ));
                basic_ok = false;
            }
        }

        // 술어는 기본 검사를 통과했을 때만 실행
        if basic_ok {
            if let Some(predicate) = &rule.validator {
                if let Err(message) = predicate(value) {
                    errors.push(message);
                }
            }
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

// ============================================================================
// 테스트
// ============================================================================
