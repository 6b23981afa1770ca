//! # 原子模型
//!
//! 定义原子模型 `Model`：原子坐标 + 每原子元数据 + 自身的晶体对称性
//! + 平移记录。map 与 model 不共享可变引用，二者的一致性由
//! `manager/` 在每个同步点显式建立。
//!
//! ## 依赖关系
//! - 被 `maps/boxing.rs`, `maps/mask.rs`, `maps/generate.rs`, `manager/` 使用
//! - 使用 `models/symmetry.rs`, `models/shift.rs`, `error.rs`

use super::shift::ShiftTracker;
use super::symmetry::{add, CrystalSymmetry, Vec3};
use crate::error::{MapModelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// 原子信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// 原子名（如 "CA"）
    pub name: String,

    /// 元素符号
    pub element: String,

    /// 残基名（如 "ALA"）
    pub resname: String,

    /// 链标识
    pub chain_id: String,

    /// 残基序号
    pub resseq: i32,

    /// 笛卡尔坐标 [x, y, z]（Å）
    pub xyz: Vec3,

    /// 各向同性 B 因子
    pub b_iso: f64,

    /// 占有率
    pub occupancy: f64,
}

impl Atom {
    pub fn new(name: impl Into<String>, element: impl Into<String>, xyz: Vec3) -> Self {
        Atom {
            name: name.into(),
            element: element.into(),
            resname: "UNK".to_string(),
            chain_id: "A".to_string(),
            resseq: 1,
            xyz,
            b_iso: 30.0,
            occupancy: 1.0,
        }
    }

    pub fn with_residue(mut self, resname: impl Into<String>, chain_id: impl Into<String>, resseq: i32) -> Self {
        self.resname = resname.into();
        self.chain_id = chain_id.into();
        self.resseq = resseq;
        self
    }

    pub fn with_b_iso(mut self, b_iso: f64) -> Self {
        self.b_iso = b_iso;
        self
    }
}

/// 原子模型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    atoms: Vec<Atom>,

    /// 当前工作框架的对称性
    crystal_symmetry: Option<CrystalSymmetry>,

    /// 原始完整晶胞的对称性
    unit_cell_crystal_symmetry: Option<CrystalSymmetry>,

    /// 自原始位置以来的累计平移；None 表示从未与任何 map 同步
    shift: Option<ShiftTracker>,
}

impl Model {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Model {
            atoms,
            crystal_symmetry: None,
            unit_cell_crystal_symmetry: None,
            shift: None,
        }
    }

    pub fn with_crystal_symmetry(mut self, crystal_symmetry: CrystalSymmetry) -> Self {
        self.crystal_symmetry = Some(crystal_symmetry);
        self
    }

    pub fn with_unit_cell_crystal_symmetry(mut self, crystal_symmetry: CrystalSymmetry) -> Self {
        self.unit_cell_crystal_symmetry = Some(crystal_symmetry);
        self
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// 残基数（按链 + 残基号去重）
    pub fn n_residues(&self) -> usize {
        self.atoms
            .iter()
            .map(|a| (a.chain_id.as_str(), a.resseq))
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// 所有原子的笛卡尔坐标
    pub fn sites_cart(&self) -> Vec<Vec3> {
        self.atoms.iter().map(|a| a.xyz).collect()
    }

    /// 替换所有原子坐标，数量必须一致
    pub fn set_sites_cart(&mut self, sites: &[Vec3]) -> Result<()> {
        if sites.len() != self.atoms.len() {
            return Err(MapModelError::InvalidArgument(format!(
                "{} sites given for a model with {} atoms",
                sites.len(),
                self.atoms.len()
            )));
        }
        for (atom, site) in self.atoms.iter_mut().zip(sites) {
            atom.xyz = *site;
        }
        Ok(())
    }

    pub fn crystal_symmetry(&self) -> Option<&CrystalSymmetry> {
        self.crystal_symmetry.as_ref()
    }

    pub fn set_crystal_symmetry(&mut self, crystal_symmetry: CrystalSymmetry) {
        self.crystal_symmetry = Some(crystal_symmetry);
    }

    pub fn unit_cell_crystal_symmetry(&self) -> Option<&CrystalSymmetry> {
        self.unit_cell_crystal_symmetry.as_ref()
    }

    pub fn set_unit_cell_crystal_symmetry(&mut self, crystal_symmetry: CrystalSymmetry) {
        self.unit_cell_crystal_symmetry = Some(crystal_symmetry);
    }

    /// 当前平移记录
    pub fn shift_cart(&self) -> Option<ShiftTracker> {
        self.shift
    }

    /// 覆盖平移记录（不移动坐标）
    pub fn set_shift_cart(&mut self, shift: ShiftTracker) {
        self.shift = Some(ShiftTracker::from_cart(shift.shift_cart));
    }

    /// 平移所有原子并设置对称性，累计平移记录
    pub fn shift_model_and_set_crystal_symmetry(
        &mut self,
        shift: Vec3,
        crystal_symmetry: Option<CrystalSymmetry>,
    ) {
        for atom in &mut self.atoms {
            atom.xyz = add(atom.xyz, shift);
        }
        let previous = self.shift.unwrap_or_default();
        self.shift = Some(previous.compose(&ShiftTracker::from_cart(shift)));
        if let Some(cs) = crystal_symmetry {
            self.crystal_symmetry = Some(cs);
        }
    }

    /// 坐标包围盒 (min, max)，无原子时返回 None
    pub fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let first = self.atoms.first()?.xyz;
        let mut lo = first;
        let mut hi = first;
        for atom in &self.atoms[1..] {
            for i in 0..3 {
                lo[i] = lo[i].min(atom.xyz[i]);
                hi[i] = hi[i].max(atom.xyz[i]);
            }
        }
        Some((lo, hi))
    }

    /// 回到原始坐标框架后的坐标
    pub fn sites_cart_in_original_frame(&self) -> Vec<Vec3> {
        let back = self.shift.unwrap_or_default().inverse();
        self.atoms.iter().map(|a| back.apply_to(a.xyz)).collect()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model: {} atoms, {} residues", self.n_atoms(), self.n_residues())?;
        if let Some(cs) = &self.crystal_symmetry {
            write!(f, ", symmetry {}", cs)?;
        }
        if let Some(shift) = &self.shift {
            write!(f, ", shift_cart {}", shift)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::symmetry::{approx_equal, UnitCell};

    fn two_atom_model() -> Model {
        Model::new(vec![
            Atom::new("N", "N", [1.0, 2.0, 3.0]).with_residue("GLY", "A", 1),
            Atom::new("CA", "C", [4.0, -1.0, 6.0]).with_residue("GLY", "A", 1),
        ])
    }

    #[test]
    fn test_shift_accumulates_and_reverses() {
        let mut model = two_atom_model();
        model.shift_model_and_set_crystal_symmetry([1.0, 1.0, 1.0], None);
        model.shift_model_and_set_crystal_symmetry([-3.0, 0.5, 2.0], None);

        let shift = model.shift_cart().unwrap();
        assert!(approx_equal(shift.shift_cart, [-2.0, 1.5, 3.0], 1e-12));

        let original = model.sites_cart_in_original_frame();
        assert!(approx_equal(original[0], [1.0, 2.0, 3.0], 1e-12));
        assert!(approx_equal(original[1], [4.0, -1.0, 6.0], 1e-12));
    }

    #[test]
    fn test_shift_sets_symmetry_when_given() {
        let mut model = two_atom_model();
        let cs = CrystalSymmetry::p1(UnitCell::orthorhombic(20.0, 20.0, 20.0));
        model.shift_model_and_set_crystal_symmetry([0.0; 3], Some(cs.clone()));
        assert_eq!(model.crystal_symmetry(), Some(&cs));
    }

    #[test]
    fn test_bounding_box_and_residue_count() {
        let model = two_atom_model();
        let (lo, hi) = model.bounding_box().unwrap();
        assert!(approx_equal(lo, [1.0, -1.0, 3.0], 1e-12));
        assert!(approx_equal(hi, [4.0, 2.0, 6.0], 1e-12));
        assert_eq!(model.n_residues(), 1);
        assert!(Model::new(vec![]).bounding_box().is_none());
    }

    #[test]
    fn test_set_sites_cart_rejects_wrong_length() {
        let mut model = two_atom_model();
        let err = model.set_sites_cart(&[[0.0; 3]]).unwrap_err();
        assert!(matches!(err, MapModelError::InvalidArgument(_)));
        assert!(approx_equal(model.atoms()[0].xyz, two_atom_model().atoms()[0].xyz, 1e-12));
        model.set_sites_cart(&[[0.0; 3], [1.0; 3]]).unwrap();
        assert!(approx_equal(model.atoms()[1].xyz, [1.0; 3], 1e-12));
    }
}
