//! # 统一错误处理模块
//!
//! 定义 totscat 的所有错误类型，使用 `thiserror` 派生。
//!
//! 所有错误都向上传播到顶层并终止整个约化流程；唯一不报错的分支是
//! "未配置吸收/多重散射校正" 的跳过，它只打印警告。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// totscat 统一错误类型
#[derive(Error, Debug)]
pub enum TotscatError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Invalid run range: {0}")]
    InvalidRange(String),

    #[error("Unknown element '{0}' in chemical formula")]
    UnknownElement(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // 配置错误
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error at '{key}': {reason}")]
    Config { key: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // 工作区 / 流水线错误
    // ─────────────────────────────────────────────────────────────
    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("Bin mismatch between '{lhs}' and '{rhs}': {reason}")]
    BinMismatch {
        lhs: String,
        rhs: String,
        reason: String,
    },

    #[error("Sample material not set on '{workspace}'")]
    MissingMaterial { workspace: String },

    #[error("Geometry field '{field}' is required by {required_by}")]
    MissingGeometry { field: String, required_by: String },

    #[error("Unsupported geometry shape: {0}")]
    UnsupportedGeometry(String),

    #[error("Unsupported unit: {0}")]
    UnsupportedUnit(String),

    #[error("Unsupported correction type: {0}")]
    UnsupportedCorrectionType(String),

    #[error("{operation} requires unit {expected}, but '{workspace}' is in {actual}")]
    InvalidUnitState {
        operation: String,
        workspace: String,
        expected: String,
        actual: String,
    },

    #[error("{operation} is not available for event data in '{workspace}'")]
    EventData {
        operation: String,
        workspace: String,
    },

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<TotscatError>,
    },

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Other(String),
}

impl TotscatError {
    /// 错误分类名（顶层报告用）
    pub fn kind(&self) -> &'static str {
        match self {
            TotscatError::Config { .. } => "ConfigError",
            TotscatError::BinMismatch { .. } => "BinMismatchError",
            TotscatError::MissingMaterial { .. } => "MissingMaterialError",
            TotscatError::MissingGeometry { .. } => "MissingGeometryError",
            TotscatError::UnsupportedGeometry(_) => "UnsupportedGeometryError",
            TotscatError::UnsupportedUnit(_) => "UnsupportedUnitError",
            TotscatError::UnsupportedCorrectionType(_) => "UnsupportedCorrectionTypeError",
            TotscatError::InvalidUnitState { .. } => "InvalidUnitStateError",
            TotscatError::Stage { source, .. } => source.kind(),
            TotscatError::FileReadError { .. }
            | TotscatError::FileWriteError { .. }
            | TotscatError::FileNotFound { .. } => "IoError",
            TotscatError::ParseError { .. }
            | TotscatError::CsvError(_)
            | TotscatError::JsonError(_) => "ParseError",
            TotscatError::InvalidRange(_) => "InvalidRangeError",
            TotscatError::UnknownElement(_) => "UnknownElementError",
            TotscatError::WorkspaceNotFound(_) => "WorkspaceNotFoundError",
            TotscatError::EventData { .. } => "EventDataError",
            TotscatError::InvalidArgument(_) => "InvalidArgumentError",
            TotscatError::Other(_) => "Error",
        }
    }

    /// 出错的阶段名（未包装时为 None）
    pub fn stage(&self) -> Option<&str> {
        match self {
            TotscatError::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// 缺少配置项的快捷构造
    pub fn config(key: &str, reason: impl Into<String>) -> Self {
        TotscatError::Config {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, TotscatError>;

/// 为 Result 附加阶段名
pub trait ResultExt<T> {
    fn in_stage(self, stage: &str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn in_stage(self, stage: &str) -> Result<T> {
        self.map_err(|e| match e {
            // 已经带阶段信息的错误保持最内层阶段
            TotscatError::Stage { .. } => e,
            other => TotscatError::Stage {
                stage: stage.to_string(),
                source: Box::new(other),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wrapping_keeps_kind() {
        let err: Result<()> = Err(TotscatError::MissingMaterial {
            workspace: "sam_corrected".to_string(),
        });
        let wrapped = err.in_stage("structure factor").unwrap_err();
        assert_eq!(wrapped.kind(), "MissingMaterialError");
        assert_eq!(wrapped.stage(), Some("structure factor"));

        // 二次包装不覆盖内层阶段
        let rewrapped: Result<()> = Err(wrapped);
        let rewrapped = rewrapped.in_stage("outer").unwrap_err();
        assert_eq!(rewrapped.stage(), Some("structure factor"));
    }
}
