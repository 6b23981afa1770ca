//! # mapmodel - 密度图与原子模型的一致性管理
//!
//! 在原点平移、截取盒子和 mask 操作中，让密度图、原子模型和 NCS 操作
//! 始终处于同一坐标框架，并能随时回到原始框架。
//!
//! ## 依赖关系
//! ```text
//! lib.rs
//!   ├── manager/  (聚合体：MapModelManager, RModel, MatchMapModelNcs)
//!   │     └── maps/    (单张 map：网格、mask、盒子、统计)
//!   │           └── models/ (对称性、平移记录、模型、NCS)
//!   └── error.rs  (错误处理)
//! ```

pub mod error;
pub mod manager;
pub mod maps;
pub mod models;

pub use error::{MapModelError, Result};
pub use manager::{MapModelBase, MapModelManager, MapModelManagerBuilder, MatchMapModelNcs, RModel};
pub use maps::MapManager;
pub use models::{Model, NcsObject, ShiftTracker};
