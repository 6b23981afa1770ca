//! # 晶胞与晶体对称性
//!
//! 定义 map / model / NCS 共享的坐标框架（CrystalFrame）：
//! - `UnitCell`: 晶胞参数 + 正交化/分数化矩阵
//! - `CrystalSymmetry`: 晶胞 + 空间群符号
//!
//! 空间群只作为不透明的符号保存，不做对称操作代数。
//!
//! ## 依赖关系
//! - 被 `maps/`, `models/structure.rs`, `manager/` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};
use std::fmt;

/// 笛卡尔或分数坐标三元组
pub type Vec3 = [f64; 3];

/// 3x3 矩阵（行主序）
pub type Mat3 = [[f64; 3]; 3];

/// 默认长度相对容差
pub const DEFAULT_LENGTH_TOLERANCE: f64 = 0.01;

/// 默认角度绝对容差（度）
pub const DEFAULT_ANGLE_TOLERANCE: f64 = 1.0;

/// 晶胞参数表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitCell {
    /// (a, b, c, alpha, beta, gamma)，长度 Å，角度为度
    parameters: [f64; 6],

    /// 晶格向量矩阵，行向量表示 a, b, c
    matrix: Mat3,

    /// 分数化矩阵：frac = F * cart
    fractionalization: Mat3,
}

impl UnitCell {
    /// 从晶胞参数 (a, b, c, alpha, beta, gamma) 创建晶胞
    /// 角度单位：度
    pub fn new(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let cos_alpha = alpha.to_radians().cos();
        let cos_beta = beta.to_radians().cos();
        let gamma_rad = gamma.to_radians();
        let cos_gamma = gamma_rad.cos();
        let sin_gamma = gamma_rad.sin();

        let a_vec = [a, 0.0, 0.0];
        let b_vec = [b * cos_gamma, b * sin_gamma, 0.0];

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).max(0.0).sqrt();
        let c_vec = [c1, c2, c3];

        let matrix = [a_vec, b_vec, c_vec];
        let fractionalization = invert(&transpose(&matrix)).unwrap_or([[0.0; 3]; 3]);

        UnitCell {
            parameters: [a, b, c, alpha, beta, gamma],
            matrix,
            fractionalization,
        }
    }

    /// 正交晶胞的便捷构造
    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Self {
        Self::new(a, b, c, 90.0, 90.0, 90.0)
    }

    /// 获取晶胞参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> [f64; 6] {
        self.parameters
    }

    /// 晶胞边长 (a, b, c)
    pub fn lengths(&self) -> Vec3 {
        [self.parameters[0], self.parameters[1], self.parameters[2]]
    }

    /// 晶胞角度 (alpha, beta, gamma)
    pub fn angles(&self) -> Vec3 {
        [self.parameters[3], self.parameters[4], self.parameters[5]]
    }

    /// 晶格向量矩阵（行向量 a, b, c）
    pub fn matrix(&self) -> &Mat3 {
        &self.matrix
    }

    /// 分数化矩阵
    pub fn fractionalization_matrix(&self) -> &Mat3 {
        &self.fractionalization
    }

    /// 计算晶胞体积
    pub fn volume(&self) -> f64 {
        let a = self.matrix[0];
        let b = self.matrix[1];
        let c = self.matrix[2];

        // 行列式计算
        (a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
            + a[2] * (b[0] * c[1] - b[1] * c[0]))
            .abs()
    }

    /// 分数坐标转笛卡尔坐标
    pub fn orthogonalize(&self, frac: Vec3) -> Vec3 {
        let m = &self.matrix;
        [
            frac[0] * m[0][0] + frac[1] * m[1][0] + frac[2] * m[2][0],
            frac[0] * m[0][1] + frac[1] * m[1][1] + frac[2] * m[2][1],
            frac[0] * m[0][2] + frac[1] * m[1][2] + frac[2] * m[2][2],
        ]
    }

    /// 笛卡尔坐标转分数坐标
    pub fn fractionalize(&self, cart: Vec3) -> Vec3 {
        mat_vec(&self.fractionalization, cart)
    }

    /// 球半径 `radius` 在各分数坐标轴上的最大投影
    ///
    /// 对任意晶胞，球内点的分数坐标 i 分量的最大偏移为 `radius * |F_i|`。
    pub fn fractional_radius(&self, radius: f64) -> Vec3 {
        let f = &self.fractionalization;
        [
            radius * norm(f[0]),
            radius * norm(f[1]),
            radius * norm(f[2]),
        ]
    }

    /// 判断两个晶胞是否近似相同
    pub fn is_similar(&self, other: &UnitCell, length_tolerance: f64, angle_tolerance: f64) -> bool {
        let p = self.parameters;
        let q = other.parameters;
        for i in 0..3 {
            let scale = p[i].abs().max(q[i].abs()).max(1e-12);
            if (p[i] - q[i]).abs() / scale > length_tolerance {
                return false;
            }
        }
        for i in 3..6 {
            if (p[i] - q[i]).abs() > angle_tolerance {
                return false;
            }
        }
        true
    }

    /// 保持角度不变，按比例缩放边长
    pub fn scaled(&self, factors: Vec3) -> UnitCell {
        let p = self.parameters;
        UnitCell::new(
            p[0] * factors[0],
            p[1] * factors[1],
            p[2] * factors[2],
            p[3],
            p[4],
            p[5],
        )
    }
}

impl fmt::Display for UnitCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.parameters;
        write!(
            f,
            "({:.3}, {:.3}, {:.3}, {:.2}, {:.2}, {:.2})",
            p[0], p[1], p[2], p[3], p[4], p[5]
        )
    }
}

/// 晶体对称性：晶胞 + 空间群符号
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrystalSymmetry {
    pub unit_cell: UnitCell,
    pub space_group: String,
}

impl CrystalSymmetry {
    pub fn new(unit_cell: UnitCell, space_group: impl Into<String>) -> Self {
        CrystalSymmetry {
            unit_cell,
            space_group: space_group.into(),
        }
    }

    /// P1 对称性
    pub fn p1(unit_cell: UnitCell) -> Self {
        Self::new(unit_cell, "P 1")
    }

    pub fn unit_cell(&self) -> &UnitCell {
        &self.unit_cell
    }

    /// 使用默认容差判断对称性是否近似相同
    pub fn is_similar_symmetry(&self, other: &CrystalSymmetry) -> bool {
        self.is_similar_symmetry_with(other, DEFAULT_LENGTH_TOLERANCE, DEFAULT_ANGLE_TOLERANCE)
    }

    pub fn is_similar_symmetry_with(
        &self,
        other: &CrystalSymmetry,
        length_tolerance: f64,
        angle_tolerance: f64,
    ) -> bool {
        normalize_symbol(&self.space_group) == normalize_symbol(&other.space_group)
            && self
                .unit_cell
                .is_similar(&other.unit_cell, length_tolerance, angle_tolerance)
    }
}

impl fmt::Display for CrystalSymmetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.unit_cell, self.space_group)
    }
}

/// 空间群符号比较时忽略空白与大小写
fn normalize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

// ─────────────────────────────────────────────────────────────
// 向量 / 矩阵工具
// ─────────────────────────────────────────────────────────────

/// 矩阵乘向量
pub fn mat_vec(m: &Mat3, v: Vec3) -> Vec3 {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// 矩阵转置
pub fn transpose(m: &Mat3) -> Mat3 {
    [
        [m[0][0], m[1][0], m[2][0]],
        [m[0][1], m[1][1], m[2][1]],
        [m[0][2], m[1][2], m[2][2]],
    ]
}

/// 3x3 矩阵求逆，奇异时返回 None
pub fn invert(m: &Mat3) -> Option<Mat3> {
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    Some([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ])
}

/// 向量加法
pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// 向量减法
pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// 向量取负
pub fn neg(a: Vec3) -> Vec3 {
    [-a[0], -a[1], -a[2]]
}

/// 向量长度
pub fn norm(a: Vec3) -> f64 {
    (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt()
}

/// 逐分量近似相等
pub fn approx_equal(a: Vec3, b: Vec3, tolerance: f64) -> bool {
    (0..3).all(|i| (a[i] - b[i]).abs() <= tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_cell_cubic() {
        let cell = UnitCell::new(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        let p = cell.parameters();

        assert!((p[0] - 5.0).abs() < 1e-6);
        assert!((p[3] - 90.0).abs() < 1e-6);
        // 5^3 = 125
        assert!((cell.volume() - 125.0).abs() < 1e-6);
    }

    #[test]
    fn test_unit_cell_hexagonal_volume() {
        let cell = UnitCell::new(3.0, 3.0, 5.0, 90.0, 90.0, 120.0);
        let expected = 3.0 * 3.0 * 5.0 * (120.0_f64).to_radians().sin();
        assert!((cell.volume() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_fractionalize_inverts_orthogonalize() {
        let cell = UnitCell::new(30.0, 40.0, 50.0, 80.0, 95.0, 110.0);
        let frac = [0.1, 0.35, 0.8];
        let back = cell.fractionalize(cell.orthogonalize(frac));
        assert!(approx_equal(frac, back, 1e-10));
    }

    #[test]
    fn test_fractional_radius_orthogonal() {
        let cell = UnitCell::orthorhombic(10.0, 20.0, 40.0);
        let r = cell.fractional_radius(2.0);
        assert!((r[0] - 0.2).abs() < 1e-12);
        assert!((r[1] - 0.1).abs() < 1e-12);
        assert!((r[2] - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_symmetry_similarity_tolerances() {
        let a = CrystalSymmetry::p1(UnitCell::orthorhombic(50.0, 50.0, 50.0));
        let b = CrystalSymmetry::new(UnitCell::orthorhombic(50.2, 50.0, 50.0), "p1");
        let c = CrystalSymmetry::p1(UnitCell::orthorhombic(52.0, 50.0, 50.0));
        let d = CrystalSymmetry::new(UnitCell::orthorhombic(50.0, 50.0, 50.0), "P 21 21 21");

        assert!(a.is_similar_symmetry(&b));
        assert!(!a.is_similar_symmetry(&c));
        assert!(!a.is_similar_symmetry(&d));
    }

    #[test]
    fn test_invert_singular() {
        let m = [[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]];
        assert!(invert(&m).is_none());
    }
}
