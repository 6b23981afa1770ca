//! # Map / 模型 / NCS 的一致性协调
//!
//! `MatchMapModelNcs` 收集一张 map、一个模型和可选的 NCS 对象，
//! 检查它们的对称性与平移记录是否一致，并把三者一起移到指定原点。
//!
//! ## 平移约定
//! - 工作框架: map 当前原点为零的框架
//! - 原始框架: map 最初读入时的框架
//! - `get_coordinate_shift(false)` 把坐标从原始框架移到工作框架，
//!   `get_coordinate_shift(true)` 反向
//!
//! ## 依赖关系
//! - 被 `manager/map_model_manager.rs` 使用
//! - 使用 `maps/map_manager.rs`, `models/`

use crate::error::{MapModelError, Result};
use crate::manager::map_model_manager::{MapModelManager, MapModelManagerBuilder};
use crate::maps::MapManager;
use crate::models::symmetry::{CrystalSymmetry, Vec3};
use crate::models::{Model, NcsObject, ShiftTracker, SHIFT_TOLERANCE};

use tracing::{debug, info};

/// map、模型与 NCS 的协调器
#[derive(Debug, Clone, Default)]
pub struct MatchMapModelNcs {
    map_manager: Option<MapManager>,
    model: Option<Model>,
}

impl MatchMapModelNcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_manager(&self) -> Option<&MapManager> {
        self.map_manager.as_ref()
    }

    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    /// NCS 对象由 map 携带
    pub fn ncs_object(&self) -> Option<&NcsObject> {
        self.map_manager.as_ref().and_then(|m| m.ncs_object())
    }

    /// map 的对称性，没有 map 时取模型的
    pub fn crystal_symmetry(&self) -> Option<CrystalSymmetry> {
        match (&self.map_manager, &self.model) {
            (Some(mm), _) => Some(mm.crystal_symmetry()),
            (None, Some(model)) => model.crystal_symmetry().cloned(),
            (None, None) => None,
        }
    }

    pub fn unit_cell_crystal_symmetry(&self) -> Option<&CrystalSymmetry> {
        self.map_manager.as_ref().map(|m| m.unit_cell_crystal_symmetry())
    }

    // ─────────────────────────────────────────────────────────────
    // 加入对象
    // ─────────────────────────────────────────────────────────────

    /// 加入 map；已有模型时检查兼容性并让模型跟随 map
    pub fn add_map_manager(&mut self, map_manager: MapManager) -> Result<()> {
        if let Some(model) = self.model.as_mut() {
            Self::match_model_to_map(&map_manager, model)?;
        }
        self.map_manager = Some(map_manager);
        Ok(())
    }

    /// 加入模型；已有 map 时检查兼容性并让模型跟随 map
    pub fn add_model(&mut self, mut model: Model) -> Result<()> {
        if let Some(mm) = self.map_manager.as_ref() {
            Self::match_model_to_map(mm, &mut model)?;
        }
        self.model = Some(model);
        Ok(())
    }

    /// 把 NCS 对象附到 map 上，需要已有 map
    pub fn add_ncs_object(&mut self, ncs_object: NcsObject) -> Result<()> {
        let mm = self.map_manager.as_mut().ok_or_else(|| {
            MapModelError::MissingResource("a map is required before adding an NCS object".to_string())
        })?;
        mm.set_ncs_object(ncs_object)?;
        self.check_model_and_set_to_match_map_if_necessary()
    }

    /// map 与模型都存在时检查兼容性，并用 map 的对称性和平移覆盖模型的记录
    pub fn check_model_and_set_to_match_map_if_necessary(&mut self) -> Result<()> {
        if let (Some(mm), Some(model)) = (self.map_manager.as_ref(), self.model.as_mut()) {
            Self::match_model_to_map(mm, model)?;
        }
        Ok(())
    }

    fn match_model_to_map(map_manager: &MapManager, model: &mut Model) -> Result<()> {
        if let Some(reason) = map_manager.model_mismatch(model, false) {
            return Err(MapModelError::incompatible("map and model", reason));
        }
        map_manager.set_model_symmetries_and_shift_cart_to_match_map(model);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // 平移
    // ─────────────────────────────────────────────────────────────

    /// 把 map（及其 NCS）和模型一起移到 `desired_origin`
    ///
    /// 模型已有的平移记录必须与 map 当前的一致，检查在任何修改之前完成。
    pub fn shift_origin(&mut self, desired_origin: [i64; 3]) -> Result<()> {
        let Some(mm) = self.map_manager.as_mut() else {
            info!("no map present, no information about origin available");
            return Ok(());
        };
        if mm.origin() == desired_origin {
            info!(origin = ?desired_origin, "origin is already at desired origin, no shifts will be applied");
        }

        let shift_info = mm.shift_info(desired_origin);
        let current_shift = mm.shift_cart();
        let g = shift_info.shift_to_apply;
        let shift_to_apply_cart = mm.grid_units_to_cart([g[0] as f64, g[1] as f64, g[2] as f64]);

        if let Some(existing) = self.model.as_ref().and_then(|m| m.shift_cart()) {
            if !existing.approx_eq(&current_shift, SHIFT_TOLERANCE) {
                return Err(MapModelError::incompatible(
                    "map and model",
                    format!(
                        "model shift_cart {} differs from map shift_cart {}",
                        existing, current_shift
                    ),
                ));
            }
        }

        mm.shift_origin(desired_origin);
        let new_shift = mm.shift_cart();
        if let Some(model) = self.model.as_mut() {
            model.shift_model_and_set_crystal_symmetry(shift_to_apply_cart, None);
            model.set_shift_cart(new_shift);
        }
        debug!(
            shift_to_apply = ?shift_to_apply_cart,
            shift_cart = %new_shift,
            "shifted map and model"
        );
        Ok(())
    }

    fn require_map(&self) -> Result<&MapManager> {
        self.map_manager
            .as_ref()
            .ok_or_else(|| MapModelError::MissingResource("no map present".to_string()))
    }

    /// 原始框架到工作框架的坐标平移；`reverse` 时反向
    pub fn get_coordinate_shift(&self, reverse: bool) -> Result<Vec3> {
        let mm = self.require_map()?;
        let osgu = mm.origin_shift_grid_units();
        let sign = if reverse { 1.0 } else { -1.0 };
        Ok(mm.grid_units_to_cart([
            sign * osgu[0] as f64,
            sign * osgu[1] as f64,
            sign * osgu[2] as f64,
        ]))
    }

    /// 把一个原始框架中的模型移到工作框架
    pub fn shift_model_to_match_working_map(&self, model: Model) -> Result<Model> {
        self.shift_model(model, false)
    }

    /// 把一个工作框架中的模型移回原始框架
    pub fn shift_model_to_match_original_map(&self, model: Model) -> Result<Model> {
        self.shift_model(model, true)
    }

    fn shift_model(&self, mut model: Model, reverse: bool) -> Result<Model> {
        let shift = self.get_coordinate_shift(reverse)?;
        model.shift_model_and_set_crystal_symmetry(shift, None);
        Ok(model)
    }

    /// 把一个原始框架中的 NCS 对象移到工作框架
    pub fn shift_ncs_to_match_working_map(&self, ncs_object: &NcsObject) -> Result<NcsObject> {
        Ok(ncs_object.coordinate_offset(self.get_coordinate_shift(false)?))
    }

    /// 把一个工作框架中的 NCS 对象移回原始框架
    pub fn shift_ncs_to_match_original_map(&self, ncs_object: &NcsObject) -> Result<NcsObject> {
        Ok(ncs_object.coordinate_offset(self.get_coordinate_shift(true)?))
    }

    /// 重新定义原始原点和/或完整晶胞网格，模型的平移记录随之更新
    pub fn set_original_origin_and_gridding(
        &mut self,
        original_origin: Option<[i64; 3]>,
        gridding: Option<[usize; 3]>,
    ) -> Result<()> {
        let mm = self
            .map_manager
            .as_mut()
            .ok_or_else(|| MapModelError::MissingResource("no map present".to_string()))?;
        mm.set_original_origin_and_gridding(original_origin, gridding)?;

        if let Some(model) = self.model.as_mut() {
            if model.shift_cart().is_none() {
                model.set_unit_cell_crystal_symmetry(mm.unit_cell_crystal_symmetry().clone());
            }
            model.set_shift_cart(mm.shift_cart());
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // 输出
    // ─────────────────────────────────────────────────────────────

    /// 文字摘要
    pub fn show_summary(&self) -> String {
        let mut lines = vec!["Summary of maps and models".to_string()];
        if let Some(mm) = &self.map_manager {
            lines.push("Map summary:".to_string());
            lines.push(mm.to_string());
        }
        if let Some(model) = &self.model {
            lines.push("Model summary:".to_string());
            lines.push(format!("Residues: {}", model.n_residues()));
        }
        if let Some(ncs) = self.ncs_object() {
            lines.push("NCS summary:".to_string());
            lines.push(format!("Operators: {}", ncs.max_operators()));
        }
        lines.join("\n")
    }

    pub fn into_parts(self) -> (Option<MapManager>, Option<Model>) {
        (self.map_manager, self.model)
    }

    /// 以当前内容构造 `MapModelManager`
    pub fn into_map_model_manager(self) -> Result<MapModelManager> {
        let (map_manager, model) = self.into_parts();
        let map_manager = map_manager.ok_or_else(|| {
            MapModelError::MissingResource("a map is required to build a map model manager".to_string())
        })?;
        let mut builder = MapModelManagerBuilder::new().map_manager(map_manager);
        if let Some(model) = model {
            builder = builder.model(model);
        }
        builder.build()
    }

    /// 当前 map 的平移记录
    pub fn shift_cart(&self) -> Option<ShiftTracker> {
        self.map_manager.as_ref().map(|m| m.shift_cart())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::symmetry::{approx_equal, UnitCell};
    use crate::models::Atom;
    use ndarray::Array3;

    fn boxed_map(origin: [i64; 3]) -> MapManager {
        let cs = CrystalSymmetry::new(UnitCell::orthorhombic(60.0, 60.0, 60.0), "P 1");
        MapManager::new(Array3::zeros((20, 20, 20)), origin, [60, 60, 60], cs).unwrap()
    }

    fn model() -> Model {
        Model::new(vec![
            Atom::new("N", "N", [12.5, 13.0, 14.25]),
            Atom::new("CA", "C", [15.0, 16.5, 17.0]),
        ])
    }

    #[test]
    fn test_shift_origin_round_trip() {
        let mut mmmn = MatchMapModelNcs::new();
        mmmn.add_map_manager(boxed_map([10, 11, 12])).unwrap();
        mmmn.add_model(model()).unwrap();
        mmmn.shift_origin([0, 0, 0]).unwrap();

        let shifted = mmmn.model().unwrap();
        assert!(approx_equal(shifted.atoms()[0].xyz, [2.5, 2.0, 2.25], 1e-8));
        let shift = shifted.shift_cart().unwrap();
        assert!(approx_equal(shift.shift_cart, [-10.0, -11.0, -12.0], 1e-8));

        let back = mmmn
            .shift_model_to_match_original_map(shifted.clone())
            .unwrap();
        for (a, b) in back.atoms().iter().zip(model().atoms()) {
            assert!(approx_equal(a.xyz, b.xyz, 1e-5));
        }
        assert!(back.shift_cart().unwrap().is_zero());
    }

    #[test]
    fn test_coordinate_shift_directions() {
        let mut mmmn = MatchMapModelNcs::new();
        assert!(mmmn.get_coordinate_shift(false).is_err());
        mmmn.add_map_manager(boxed_map([4, 0, -2])).unwrap();
        mmmn.shift_origin([0, 0, 0]).unwrap();
        let forward = mmmn.get_coordinate_shift(false).unwrap();
        let reverse = mmmn.get_coordinate_shift(true).unwrap();
        assert!(approx_equal(forward, [-4.0, 0.0, 2.0], 1e-10));
        assert!(approx_equal(reverse, [4.0, 0.0, -2.0], 1e-10));
    }

    #[test]
    fn test_shift_origin_rejects_stale_model_shift() {
        let mut mmmn = MatchMapModelNcs::new();
        mmmn.add_map_manager(boxed_map([10, 10, 10])).unwrap();
        mmmn.add_model(model()).unwrap();

        // 模型记录被外部改写后不再与 map 一致
        let mut stale = mmmn.clone();
        if let Some(m) = stale.model.as_mut() {
            m.set_shift_cart(ShiftTracker::from_cart([3.0, 0.0, 0.0]));
        }
        let before = stale.map_manager().unwrap().origin();
        assert!(stale.shift_origin([0, 0, 0]).is_err());
        assert_eq!(stale.map_manager().unwrap().origin(), before);
    }

    #[test]
    fn test_no_map_and_no_op_shift() {
        let mut empty = MatchMapModelNcs::new();
        assert!(empty.shift_origin([0, 0, 0]).is_ok());
        assert!(empty.add_ncs_object(NcsObject::unit()).is_err());

        let mut mmmn = MatchMapModelNcs::new();
        mmmn.add_map_manager(boxed_map([0, 0, 0])).unwrap();
        mmmn.add_model(model()).unwrap();
        mmmn.shift_origin([0, 0, 0]).unwrap();
        assert!(approx_equal(mmmn.model().unwrap().atoms()[1].xyz, [15.0, 16.5, 17.0], 1e-12));
    }

    #[test]
    fn test_incompatible_model_rejected() {
        let mut mmmn = MatchMapModelNcs::new();
        mmmn.add_map_manager(boxed_map([0, 0, 0])).unwrap();
        let other_cell = CrystalSymmetry::p1(UnitCell::orthorhombic(30.0, 30.0, 30.0));
        let bad = model().with_crystal_symmetry(other_cell);
        assert!(mmmn.add_model(bad).is_err());
        assert!(mmmn.model().is_none());
    }

    #[test]
    fn test_ncs_follows_shift() {
        let mut mmmn = MatchMapModelNcs::new();
        mmmn.add_map_manager(boxed_map([6, 0, 0])).unwrap();
        mmmn.add_ncs_object(NcsObject::unit()).unwrap();
        mmmn.shift_origin([0, 0, 0]).unwrap();
        let ncs_shift = mmmn.ncs_object().unwrap().shift_cart().unwrap();
        assert!(approx_equal(ncs_shift.shift_cart, [-6.0, 0.0, 0.0], 1e-10));

        let original = mmmn
            .shift_ncs_to_match_original_map(mmmn.ncs_object().unwrap())
            .unwrap();
        assert!(original.shift_cart().unwrap().is_zero());
    }

    #[test]
    fn test_set_original_origin_restamps_model() {
        let mut mmmn = MatchMapModelNcs::new();
        mmmn.add_map_manager(boxed_map([0, 0, 0])).unwrap();
        mmmn.add_model(model()).unwrap();
        mmmn.set_original_origin_and_gridding(Some([5, 5, 5]), None).unwrap();
        let shift = mmmn.model().unwrap().shift_cart().unwrap();
        assert!(approx_equal(shift.shift_cart, [-5.0, -5.0, -5.0], 1e-10));
        assert!(mmmn.show_summary().contains("Residues: 1"));
    }
}
