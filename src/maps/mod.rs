//! # 密度图模块
//!
//! 单张 map 的外观层及其协作者：网格访问、mask、盒子、统计、合成数据与导出。
//!
//! ## 依赖关系
//! - 被 `manager/` 和 `commands/` 使用
//! - 使用 `models/`
//! - 子模块: grid, map_manager, mask, boxing, stats, generate, export

pub mod boxing;
pub mod export;
pub mod generate;
pub mod grid;
pub mod map_manager;
pub mod mask;
pub mod stats;

pub use boxing::{shift_and_box_model, AroundModel};
pub use generate::GenerateOptions;
pub use grid::GridAccessor;
pub use map_manager::{MapManager, ShiftInfo};
pub use stats::{MapCounts, MapHistograms};
