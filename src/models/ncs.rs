//! # 非晶体学对称（NCS）操作集
//!
//! 每个操作为旋转 + 平移：`x' = R x + t`，附带操作中心。
//! NCS 对象跟随 map 的平移：坐标框架移动 `s` 后，同一组操作表示为
//! `t' = t + s - R s`，中心加 `s`，平移记录累加 `s`。
//!
//! ## 依赖关系
//! - 被 `maps/map_manager.rs`, `manager/` 使用
//! - 使用 `models/symmetry.rs`, `models/shift.rs`

use super::shift::ShiftTracker;
use super::symmetry::{add, mat_vec, sub, Mat3, Vec3};
use serde::{Deserialize, Serialize};

const IDENTITY: Mat3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// 单个 NCS 操作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NcsOperator {
    pub rotation: Mat3,
    pub translation: Vec3,
    pub center: Vec3,
}

impl NcsOperator {
    pub fn new(rotation: Mat3, translation: Vec3, center: Vec3) -> Self {
        NcsOperator {
            rotation,
            translation,
            center,
        }
    }

    pub fn identity() -> Self {
        Self::new(IDENTITY, [0.0; 3], [0.0; 3])
    }

    /// 作用于一个坐标
    pub fn apply(&self, site: Vec3) -> Vec3 {
        add(mat_vec(&self.rotation, site), self.translation)
    }

    /// 同一操作在平移 `shift` 之后的坐标框架中的表示
    fn offset(&self, shift: Vec3) -> NcsOperator {
        let r_shift = mat_vec(&self.rotation, shift);
        NcsOperator {
            rotation: self.rotation,
            translation: sub(add(self.translation, shift), r_shift),
            center: add(self.center, shift),
        }
    }
}

/// NCS 操作集
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NcsObject {
    operators: Vec<NcsOperator>,
    shift: Option<ShiftTracker>,
}

impl NcsObject {
    pub fn new(operators: Vec<NcsOperator>) -> Self {
        NcsObject {
            operators,
            shift: None,
        }
    }

    /// 只含恒等操作的 NCS
    pub fn unit() -> Self {
        Self::new(vec![NcsOperator::identity()])
    }

    pub fn operators(&self) -> &[NcsOperator] {
        &self.operators
    }

    pub fn max_operators(&self) -> usize {
        self.operators.len()
    }

    pub fn shift_cart(&self) -> Option<ShiftTracker> {
        self.shift
    }

    pub fn set_shift_cart(&mut self, shift: ShiftTracker) {
        self.shift = Some(ShiftTracker::from_cart(shift.shift_cart));
    }

    /// 返回在平移 `shift` 后的框架中描述同一组操作的新对象
    pub fn coordinate_offset(&self, shift: Vec3) -> NcsObject {
        let previous = self.shift.unwrap_or_default();
        NcsObject {
            operators: self.operators.iter().map(|op| op.offset(shift)).collect(),
            shift: Some(previous.compose(&ShiftTracker::from_cart(shift))),
        }
    }

    /// 对坐标施加第 `index` 个操作
    pub fn apply(&self, index: usize, site: Vec3) -> Option<Vec3> {
        self.operators.get(index).map(|op| op.apply(site))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::symmetry::approx_equal;

    fn two_fold() -> NcsObject {
        let rot = [[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]];
        NcsObject::new(vec![
            NcsOperator::identity(),
            NcsOperator::new(rot, [20.0, 20.0, 0.0], [10.0, 10.0, 0.0]),
        ])
    }

    #[test]
    fn test_offset_commutes_with_shifted_coordinates() {
        let ncs = two_fold();
        let shift = [-5.0, 3.0, 7.0];
        let moved = ncs.coordinate_offset(shift);

        // 先作用再平移 == 先平移再用新操作作用
        let site = [12.0, 4.0, 1.0];
        let expected = add(ncs.apply(1, site).unwrap(), shift);
        let actual = moved.apply(1, add(site, shift)).unwrap();
        assert!(approx_equal(expected, actual, 1e-10));

        assert!(approx_equal(moved.operators()[1].center, [5.0, 13.0, 7.0], 1e-12));
    }

    #[test]
    fn test_offset_accumulates_shift_record() {
        let ncs = two_fold()
            .coordinate_offset([1.0, 0.0, 0.0])
            .coordinate_offset([0.0, 2.0, 0.0]);
        let shift = ncs.shift_cart().unwrap();
        assert!(approx_equal(shift.shift_cart, [1.0, 2.0, 0.0], 1e-12));
    }

    #[test]
    fn test_unit_ncs() {
        let ncs = NcsObject::unit();
        assert_eq!(ncs.max_operators(), 1);
        assert!(ncs.shift_cart().is_none());
        assert!(approx_equal(ncs.apply(0, [1.0, 2.0, 3.0]).unwrap(), [1.0, 2.0, 3.0], 1e-12));
        assert!(ncs.apply(1, [0.0; 3]).is_none());
    }
}
