//! MessagePipeline - メッセージ body の decode と検証
//!
//! # フロー
//! 1. body を JSON object として読み、FixtureEvent に decode（失敗 → Decode）
//!    配列など object 以外の body も Decode 扱い
//! 2. Details の有無を検証（なし → Validation）
//! 3. 成功したら event を返す。削除（ack）は呼び出し側の責務
//!
//! 副作用はない。

use serde::de::Error as _;
use serde_json::Value;

use crate::domain::{FixtureEvent, PipelineError};

/// Decodes and validates fixture events.
#[derive(Debug, Clone, Default)]
pub struct MessagePipeline;

impl MessagePipeline {
    pub fn new() -> Self {
        Self
    }

    pub fn process(&self, body: &str) -> Result<FixtureEvent, PipelineError> {
        let value: Value = serde_json::from_str(body)?;
        // derive された Deserialize は配列も位置指定の struct として受け付けてしまう
        if !value.is_object() {
            return Err(PipelineError::Decode(serde_json::Error::custom(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            ))));
        }
        let event: FixtureEvent = serde_json::from_value(value)?;
        Self::validate(&event)?;
        Ok(event)
    }

    fn validate(event: &FixtureEvent) -> Result<(), PipelineError> {
        if !event.has_details() {
            return Err(PipelineError::Validation("details required"));
        }
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
