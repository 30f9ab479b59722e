//! Errors - パイプラインのエラー分類
//!
//! どちらのエラーもメッセージを削除せずに残す（再配送はトランスポート任せ）。

use thiserror::Error;

/// Why a message body was rejected by the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Body is not a decodable fixture event.
    #[error("malformed fixture payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Decoded fine but a required field is missing.
    #[error("invalid fixture event: {0}")]
    Validation(&'static str),
}

impl PipelineError {
    pub fn is_decode(&self) -> bool {
        matches!(self, PipelineError::Decode(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, PipelineError::Validation(_))
    }
}
