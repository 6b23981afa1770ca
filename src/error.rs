//! # 统一错误处理模块
//!
//! 定义 mapmodel 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 错误分类
//! - 配置错误：构造时输入组合非法（如只给了一个半图）
//! - 几何不兼容：map / model / NCS 之间的对称性、网格或平移不一致
//! - 资源缺失：缺少 mask、缺少 model 等前置条件
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// mapmodel 统一错误类型
#[derive(Error, Debug)]
pub enum MapModelError {
    // ─────────────────────────────────────────────────────────────
    // 构造 / 配置错误
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ─────────────────────────────────────────────────────────────
    // 几何一致性错误
    // ─────────────────────────────────────────────────────────────
    #[error("Incompatible geometry between {entities}: {reason}")]
    IncompatibleGeometry { entities: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // 前置条件错误
    // ─────────────────────────────────────────────────────────────
    #[error("Missing resource: {0}")]
    MissingResource(String),

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // I/O 错误（仅用于导出统计数据）
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

impl MapModelError {
    /// 构造几何不兼容错误
    pub fn incompatible(entities: impl Into<String>, reason: impl Into<String>) -> Self {
        MapModelError::IncompatibleGeometry {
            entities: entities.into(),
            reason: reason.into(),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, MapModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incompatible_message_names_entities() {
        let err = MapModelError::incompatible("map_manager and map_manager_1", "gridding differs");
        let msg = err.to_string();
        assert!(msg.contains("map_manager and map_manager_1"));
        assert!(msg.contains("gridding differs"));
    }
}
