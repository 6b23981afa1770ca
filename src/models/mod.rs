//! # 数据模型模块
//!
//! 定义晶体坐标框架、平移记录、原子模型与 NCS 操作集。
//!
//! ## 依赖关系
//! - 被 `maps/` 和 `manager/` 使用
//! - 子模块: symmetry, shift, structure, ncs

pub mod ncs;
pub mod shift;
pub mod structure;
pub mod symmetry;

pub use ncs::{NcsObject, NcsOperator};
pub use shift::{ShiftTracker, SHIFT_TOLERANCE};
pub use structure::{Atom, Model};
pub use symmetry::{CrystalSymmetry, Mat3, UnitCell, Vec3};
