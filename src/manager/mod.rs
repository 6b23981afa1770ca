//! # 聚合管理模块
//!
//! 把 map、模型与 NCS 作为一个整体管理，保证三者始终处于同一坐标框架。
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `maps/`, `models/`
//! - 子模块: map_dict, base, matching, map_model_manager, r_model

pub mod base;
pub mod map_dict;
pub mod map_model_manager;
pub mod matching;
pub mod r_model;

pub use base::{
    ApplyMaskOptions, MapManagerInfo, MapModelBase, MaskAroundAtomsOptions, MaskAroundDensityOptions,
    MaskAroundEdgesOptions,
};
pub use map_dict::{MapDict, MapKey};
pub use map_model_manager::{MapModelManager, MapModelManagerBuilder};
pub use matching::MatchMapModelNcs;
pub use r_model::RModel;
