//! # 平移记录（ShiftTracker）
//!
//! 记录一个实体（map / model / NCS）自原始坐标框架以来累计施加的
//! 笛卡尔平移 `shift_cart`；对 map 同时记录等价的网格单位原点平移。
//!
//! 约定：`shift_cart` 是“已经加到实体原始坐标上的量”，要回到原始位置
//! 需施加其相反数。对 map 有 `shift_cart = -origin_shift_grid_units * pixel_size`。
//!
//! ## 依赖关系
//! - 被 `maps/map_manager.rs`, `models/structure.rs`, `models/ncs.rs`,
//!   `manager/` 使用
//! - 使用 `models/symmetry.rs` 的向量工具

use super::symmetry::{add, approx_equal, neg, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 默认平移比较容差（Å）
pub const SHIFT_TOLERANCE: f64 = 1e-5;

/// 累计平移记录
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShiftTracker {
    /// 累计笛卡尔平移（Å）
    pub shift_cart: Vec3,

    /// 等价的网格单位原点平移（仅 map 有）
    pub origin_shift_grid_units: Option<[i64; 3]>,
}

impl Default for ShiftTracker {
    fn default() -> Self {
        Self::zero()
    }
}

impl ShiftTracker {
    /// 未平移
    pub fn zero() -> Self {
        ShiftTracker {
            shift_cart: [0.0; 3],
            origin_shift_grid_units: None,
        }
    }

    /// 从笛卡尔平移创建
    pub fn from_cart(shift_cart: Vec3) -> Self {
        ShiftTracker {
            shift_cart,
            origin_shift_grid_units: None,
        }
    }

    /// 从网格单位原点平移创建
    ///
    /// `to_cart` 把网格单位转换为笛卡尔坐标（通常为 `MapManager::grid_units_to_cart`）。
    pub fn from_grid_units<F>(origin_shift_grid_units: [i64; 3], to_cart: F) -> Self
    where
        F: Fn([f64; 3]) -> Vec3,
    {
        let g = origin_shift_grid_units;
        let shift_cart = to_cart([-(g[0] as f64), -(g[1] as f64), -(g[2] as f64)]);
        ShiftTracker {
            shift_cart,
            origin_shift_grid_units: Some(origin_shift_grid_units),
        }
    }

    /// 先施加 `self` 再施加 `other` 的累计平移
    pub fn compose(&self, other: &ShiftTracker) -> ShiftTracker {
        let grid = match (self.origin_shift_grid_units, other.origin_shift_grid_units) {
            (Some(a), Some(b)) => Some([a[0] + b[0], a[1] + b[1], a[2] + b[2]]),
            _ => None,
        };
        ShiftTracker {
            shift_cart: add(self.shift_cart, other.shift_cart),
            origin_shift_grid_units: grid,
        }
    }

    /// 逆平移
    pub fn inverse(&self) -> ShiftTracker {
        ShiftTracker {
            shift_cart: neg(self.shift_cart),
            origin_shift_grid_units: self
                .origin_shift_grid_units
                .map(|g| [-g[0], -g[1], -g[2]]),
        }
    }

    /// 平移一个坐标
    pub fn apply_to(&self, site: Vec3) -> Vec3 {
        add(site, self.shift_cart)
    }

    /// 笛卡尔平移近似相等（不比较网格单位）
    pub fn approx_eq(&self, other: &ShiftTracker, tolerance: f64) -> bool {
        approx_equal(self.shift_cart, other.shift_cart, tolerance)
    }

    pub fn is_zero(&self) -> bool {
        approx_equal(self.shift_cart, [0.0; 3], SHIFT_TOLERANCE)
    }
}

impl fmt::Display for ShiftTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.shift_cart;
        write!(f, "({:.4}, {:.4}, {:.4})", s[0], s[1], s[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_grid_units_sign_convention() {
        let t = ShiftTracker::from_grid_units([10, -4, 2], |g| [g[0] * 1.5, g[1] * 1.5, g[2] * 1.5]);
        assert!(approx_equal(t.shift_cart, [-15.0, 6.0, -3.0], 1e-12));
        assert_eq!(t.origin_shift_grid_units, Some([10, -4, 2]));
    }

    #[test]
    fn test_compose_with_inverse_is_zero() {
        let t = ShiftTracker::from_cart([1.25, -3.0, 7.5]);
        assert!(t.compose(&t.inverse()).is_zero());
    }

    #[test]
    fn test_apply_then_inverse_restores_site() {
        let t = ShiftTracker::from_cart([4.0, 5.0, -6.0]);
        let site = [10.0, 20.0, 30.0];
        let back = t.inverse().apply_to(t.apply_to(site));
        assert!(approx_equal(site, back, 1e-12));
    }

    #[test]
    fn test_compose_drops_grid_units_when_unknown() {
        let a = ShiftTracker::from_grid_units([1, 1, 1], |g| g);
        let b = ShiftTracker::from_cart([1.0, 0.0, 0.0]);
        assert!(a.compose(&b).origin_shift_grid_units.is_none());
        assert_eq!(a.compose(&a).origin_shift_grid_units, Some([2, 2, 2]));
    }
}
