//! # MapModelManager：map、模型与 NCS 的聚合体
//!
//! 通过 `MapModelManagerBuilder` 构造。构造时：
//! 1. 只给两个半图时以其平均作为主 map
//! 2. 检查所有 map 同网格，统一 wrapping
//! 3. 借助 `MatchMapModelNcs` 把主 map、模型和 NCS 一起移到原点
//! 4. 其余 map 同样移到原点并附上 NCS
//! 5. 记录原始原点，供之后还原坐标
//!
//! 之后可以围绕模型截取盒子、创建和应用 mask、生成统计信息。
//!
//! ## 依赖关系
//! - 被 `commands/`, `manager/matching.rs` 使用
//! - 使用 `manager/base.rs`, `manager/map_dict.rs`, `manager/matching.rs`,
//!   `manager/r_model.rs`, `maps/`, `models/`

use crate::error::{MapModelError, Result};
use crate::manager::base::{box_map_dict, write_summary, MapModelBase, Token};
use crate::manager::map_dict::{MapDict, MapKey};
use crate::manager::matching::MatchMapModelNcs;
use crate::manager::r_model::RModel;
use crate::maps::generate::{self, GenerateOptions};
use crate::maps::map_manager::WRAPPING_WARNING;
use crate::maps::stats::{MapCounts, MapHistograms, DEFAULT_N_SLOTS};
use crate::maps::MapManager;
use crate::models::symmetry::{neg, Vec3};
use crate::models::{Model, NcsObject, ShiftTracker, SHIFT_TOLERANCE};

use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};

// ─────────────────────────────────────────────────────────────
// 构造器
// ─────────────────────────────────────────────────────────────

/// `MapModelManager` 的构造器
#[derive(Debug, Clone, Default)]
pub struct MapModelManagerBuilder {
    model: Option<Model>,
    map_manager: Option<MapManager>,
    map_manager_1: Option<MapManager>,
    map_manager_2: Option<MapManager>,
    extra_map_manager_list: Vec<MapManager>,
    extra_map_manager_id_list: Option<Vec<String>>,
    ncs_object: Option<NcsObject>,
    wrapping: Option<bool>,
}

impl MapModelManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn map_manager(mut self, map_manager: MapManager) -> Self {
        self.map_manager = Some(map_manager);
        self
    }

    pub fn map_manager_1(mut self, map_manager: MapManager) -> Self {
        self.map_manager_1 = Some(map_manager);
        self
    }

    pub fn map_manager_2(mut self, map_manager: MapManager) -> Self {
        self.map_manager_2 = Some(map_manager);
        self
    }

    pub fn extra_map_manager_list(mut self, map_managers: Vec<MapManager>) -> Self {
        self.extra_map_manager_list = map_managers;
        self
    }

    /// 额外 map 的名称；不给时为 extra_map_manager_1, extra_map_manager_2, ...
    pub fn extra_map_manager_id_list(mut self, ids: Vec<String>) -> Self {
        self.extra_map_manager_id_list = Some(ids);
        self
    }

    pub fn ncs_object(mut self, ncs_object: NcsObject) -> Self {
        self.ncs_object = Some(ncs_object);
        self
    }

    /// 对所有 map 强制设置 wrapping
    pub fn wrapping(mut self, wrapping: bool) -> Self {
        self.wrapping = Some(wrapping);
        self
    }

    fn extra_keys(&self) -> Result<Vec<MapKey>> {
        let n = self.extra_map_manager_list.len();
        let ids: Vec<String> = match &self.extra_map_manager_id_list {
            Some(ids) => {
                if ids.len() != n {
                    return Err(MapModelError::Configuration(format!(
                        "{} extra maps but {} extra map ids",
                        n,
                        ids.len()
                    )));
                }
                ids.clone()
            }
            None => (1..=n).map(|i| format!("extra_map_manager_{}", i)).collect(),
        };

        let mut seen = BTreeSet::new();
        for id in &ids {
            if MapKey::is_reserved_name(id) {
                return Err(MapModelError::Configuration(format!(
                    "extra map id '{}' is reserved",
                    id
                )));
            }
            if !seen.insert(id.as_str()) {
                return Err(MapModelError::Configuration(format!(
                    "duplicate extra map id '{}'",
                    id
                )));
            }
        }
        Ok(ids.into_iter().map(MapKey::Named).collect())
    }

    /// 校验输入、移动原点并构造聚合体
    pub fn build(self) -> Result<MapModelManager> {
        let extra_keys = self.extra_keys()?;
        let MapModelManagerBuilder {
            model,
            map_manager,
            map_manager_1,
            map_manager_2,
            extra_map_manager_list,
            ncs_object,
            wrapping: force_wrapping,
            ..
        } = self;

        let half_maps = match (map_manager_1, map_manager_2) {
            (Some(h1), Some(h2)) => Some((h1, h2)),
            (None, None) => None,
            _ => {
                return Err(MapModelError::Configuration(
                    "None or two half-maps are required".to_string(),
                ))
            }
        };

        let mut primary = match (map_manager, &half_maps) {
            (Some(mm), _) => mm,
            (None, Some((h1, h2))) => {
                if let Some(reason) = h1.similarity_mismatch(h2) {
                    return Err(MapModelError::incompatible("map_manager_1 and map_manager_2", reason));
                }
                let average = (h1.map_data() + h2.map_data()) * 0.5;
                h1.customized_copy(average)?
            }
            (None, None) => {
                return Err(MapModelError::Configuration("A map is required".to_string()));
            }
        };

        let mut aux: Vec<(MapKey, MapManager)> = Vec::new();
        if let Some((h1, h2)) = half_maps {
            aux.push((MapKey::Half1, h1));
            aux.push((MapKey::Half2, h2));
        }
        aux.extend(extra_keys.into_iter().zip(extra_map_manager_list));

        // wrapping 统一为强制值或主 map 的值
        let wrapping = force_wrapping.unwrap_or_else(|| primary.wrapping());
        primary.set_wrapping(wrapping);
        for (_, mm) in aux.iter_mut() {
            mm.set_wrapping(wrapping);
        }
        let mut warning_message = None;
        if force_wrapping == Some(true) && !primary.is_full_size() {
            warn!("{}", WRAPPING_WARNING);
            warning_message = Some(WRAPPING_WARNING.to_string());
        }

        if !primary.origin_is_zero() && primary.origin_shift_grid_units() != [0, 0, 0] {
            return Err(MapModelError::incompatible(
                "map_manager",
                format!(
                    "map has origin {:?} and has already been shifted by {:?}",
                    primary.origin(),
                    primary.origin_shift_grid_units()
                ),
            ));
        }
        for (key, mm) in &aux {
            if let Some(reason) = primary.similarity_mismatch(mm) {
                return Err(MapModelError::incompatible(format!("map_manager and {}", key), reason));
            }
        }

        // 主 map、模型与 NCS 一起移到原点
        let mut mmmn = MatchMapModelNcs::new();
        mmmn.add_map_manager(primary)?;
        if let Some(model) = model {
            mmmn.add_model(model)?;
        }
        if let Some(ncs) = ncs_object {
            mmmn.add_ncs_object(ncs)?;
        }
        mmmn.shift_origin([0, 0, 0])?;

        let (primary, model) = mmmn.into_parts();
        let primary = primary
            .ok_or_else(|| MapModelError::Other("map lost during origin shift".to_string()))?;
        let shift_cart = primary.shift_cart();

        if let Some(model_shift) = model.as_ref().and_then(|m| m.shift_cart()) {
            if !model_shift.approx_eq(&shift_cart, SHIFT_TOLERANCE) {
                return Err(MapModelError::incompatible(
                    "map and model",
                    format!("model shift_cart {} differs from map shift_cart {}", model_shift, shift_cart),
                ));
            }
        }
        let ncs = primary.ncs_object().cloned();
        if let Some(ncs_shift) = ncs.as_ref().and_then(|n| n.shift_cart()) {
            if !ncs_shift.approx_eq(&shift_cart, SHIFT_TOLERANCE) {
                return Err(MapModelError::incompatible(
                    "map and NCS object",
                    format!("NCS shift_cart {} differs from map shift_cart {}", ncs_shift, shift_cart),
                ));
            }
        }

        let mut extra_map_manager_id_list = Vec::new();
        let mut map_dict = MapDict::new(primary);
        for (key, mut mm) in aux {
            mm.shift_origin([0, 0, 0]);
            if let Some(ncs) = &ncs {
                mm.set_ncs_object(ncs.clone())?;
            }
            if let Some(reason) = map_dict.primary().similarity_mismatch(&mm) {
                return Err(MapModelError::incompatible(format!("map_manager and {}", key), reason));
            }
            if matches!(key, MapKey::Named(_)) {
                extra_map_manager_id_list.push(key.clone());
            }
            map_dict.insert(key, mm);
        }

        let primary = map_dict.primary();
        let original_origin_grid_units = primary.origin_shift_grid_units();
        let original_origin_cart = neg(primary.shift_cart().shift_cart);
        let gridding_last = primary.all();
        debug!(
            original_origin_grid_units = ?original_origin_grid_units,
            n_maps = map_dict.len(),
            "constructed map model manager"
        );

        Ok(MapModelManager {
            map_dict,
            model,
            extra_map_manager_id_list,
            original_origin_grid_units,
            original_origin_cart,
            gridding_first: [0, 0, 0],
            gridding_last,
            solvent_content: None,
            force_wrapping,
            warning_message,
        })
    }
}

// ─────────────────────────────────────────────────────────────
// 聚合体
// ─────────────────────────────────────────────────────────────

/// map、模型与 NCS 的聚合体；所有 map 原点为零且同网格
///
/// `Clone` 得到完全独立的副本。
#[derive(Debug, Clone)]
pub struct MapModelManager {
    map_dict: MapDict,
    model: Option<Model>,
    extra_map_manager_id_list: Vec<MapKey>,
    original_origin_grid_units: [i64; 3],
    original_origin_cart: Vec3,
    gridding_first: [i64; 3],
    gridding_last: [usize; 3],
    solvent_content: Option<f64>,
    force_wrapping: Option<bool>,
    warning_message: Option<String>,
}

impl MapModelBase for MapModelManager {
    fn map_dict(&self) -> &MapDict {
        &self.map_dict
    }

    fn map_dict_mut(&mut self, _: Token) -> &mut MapDict {
        &mut self.map_dict
    }

    fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    fn forced_wrapping(&self) -> Option<bool> {
        self.force_wrapping
    }

    fn record_warning(&mut self, message: String) {
        self.warning_message = Some(message);
    }

    fn warning_message(&self) -> Option<&str> {
        self.warning_message.as_deref()
    }
}

impl MapModelManager {
    pub fn builder() -> MapModelManagerBuilder {
        MapModelManagerBuilder::new()
    }

    /// 生成合成模型与密度图并构造聚合体
    pub fn generate(options: &GenerateOptions) -> Result<MapModelManager> {
        let (model, map_manager) = generate::generate(options)?;
        MapModelManagerBuilder::new()
            .map_manager(map_manager)
            .model(model)
            .build()
    }

    // ── 访问器 ──

    pub fn extra_map_manager_id_list(&self) -> &[MapKey] {
        &self.extra_map_manager_id_list
    }

    pub fn extra_map_manager_list(&self) -> Vec<&MapManager> {
        self.extra_map_manager_id_list
            .iter()
            .filter_map(|key| self.map_dict.get(key))
            .collect()
    }

    pub fn take_model(&mut self) -> Option<Model> {
        self.model.take()
    }

    /// 主 map 自原始框架以来的累计平移
    pub fn shift_cart(&self) -> ShiftTracker {
        self.map_dict.primary().shift_cart()
    }

    /// 构造时（盒子之前）原点在原始网格中的位置
    pub fn original_origin_grid_units(&self) -> [i64; 3] {
        self.original_origin_grid_units
    }

    pub fn original_origin_cart(&self) -> Vec3 {
        self.original_origin_cart
    }

    pub fn gridding_first(&self) -> [i64; 3] {
        self.gridding_first
    }

    pub fn gridding_last(&self) -> [usize; 3] {
        self.gridding_last
    }

    pub fn set_gridding_first(&mut self, gridding_first: [i64; 3]) {
        self.gridding_first = gridding_first;
    }

    pub fn set_gridding_last(&mut self, gridding_last: [usize; 3]) {
        self.gridding_last = gridding_last;
    }

    pub fn solvent_content(&self) -> Option<f64> {
        self.solvent_content
    }

    pub fn set_solvent_content(&mut self, solvent_content: f64) {
        self.solvent_content = Some(solvent_content);
    }

    // ── 盒子 ──

    /// 围绕模型截取所有 map 并把原点移到零，模型同步平移
    ///
    /// 所有盒子先在新字典中构建，任一步失败时聚合体不变。
    pub fn box_all_maps_around_model_and_shift_origin(&mut self, box_cushion: f64) -> Result<()> {
        let model = self.model.as_ref().ok_or_else(|| {
            MapModelError::MissingResource("a model is required to box maps around it".to_string())
        })?;
        let (map_dict, model, warning) =
            box_map_dict(&self.map_dict, model, box_cushion, self.force_wrapping)?;

        self.map_dict = map_dict;
        self.model = Some(model);
        if let Some(w) = warning {
            self.warning_message = Some(w);
        }
        Ok(())
    }

    // ── 副本与转换 ──

    /// 替换模型和/或 map 字典的副本；未替换的部分复制
    pub fn customized_copy(&self, model: Option<Model>, map_dict: Option<MapDict>) -> Result<MapModelManager> {
        if model.is_none() && map_dict.is_none() {
            return Err(MapModelError::Configuration(
                "customized_copy requires a new model or a new map dictionary".to_string(),
            ));
        }
        let model = model.or_else(|| self.model.clone());
        let map_dict = map_dict.unwrap_or_else(|| self.map_dict.clone());
        validate_aggregate(&map_dict, model.as_ref())?;

        let extra_map_manager_id_list = map_dict
            .other_keys()
            .into_iter()
            .filter(|key| self.extra_map_manager_id_list.contains(key))
            .collect();
        Ok(MapModelManager {
            map_dict,
            model,
            extra_map_manager_id_list,
            original_origin_grid_units: self.original_origin_grid_units,
            original_origin_cart: self.original_origin_cart,
            gridding_first: self.gridding_first,
            gridding_last: self.gridding_last,
            solvent_content: self.solvent_content,
            force_wrapping: self.force_wrapping,
            warning_message: None,
        })
    }

    /// 完全独立的副本
    pub fn deep_copy(&self) -> MapModelManager {
        self.clone()
    }

    /// 以副本构造 `RModel`，需要模型
    pub fn as_r_model(&self) -> Result<RModel> {
        self.clone().into_r_model()
    }

    pub fn into_r_model(self) -> Result<RModel> {
        let model = self.model.ok_or_else(|| {
            MapModelError::MissingResource("a model is required for an r_model".to_string())
        })?;
        RModel::new(model, self.map_dict, self.force_wrapping)
    }

    /// 以副本构造协调器
    pub fn as_match_map_model_ncs(&self) -> Result<MatchMapModelNcs> {
        let mut mmmn = MatchMapModelNcs::new();
        mmmn.add_map_manager(self.map_dict.primary().clone())?;
        if let Some(model) = &self.model {
            mmmn.add_model(model.clone())?;
        }
        Ok(mmmn)
    }

    // ── 统计 ──

    pub fn counts(&self) -> MapCounts {
        let mm = self.map_dict.primary();
        MapCounts::new(mm.map_data(), &mm.accessor(), &mm.crystal_symmetry())
    }

    pub fn histograms(&self) -> MapHistograms {
        let halves = match (self.map_data_1(), self.map_data_2()) {
            (Some(d1), Some(d2)) => Some((d1, d2)),
            _ => None,
        };
        MapHistograms::new(self.map_data(), halves, DEFAULT_N_SLOTS)
    }
}

/// 所有 map 原点为零、与主 map 同网格且与模型兼容
pub(crate) fn validate_aggregate(map_dict: &MapDict, model: Option<&Model>) -> Result<()> {
    let primary = map_dict.primary();
    for (key, mm) in map_dict.iter() {
        if !mm.origin_is_zero() {
            return Err(MapModelError::incompatible(
                key.to_string(),
                format!("map origin {:?} is not zero", mm.origin()),
            ));
        }
        if let Some(reason) = primary.similarity_mismatch(mm) {
            return Err(MapModelError::incompatible(format!("map_manager and {}", key), reason));
        }
        if let Some(model) = model {
            if let Some(reason) = mm.model_mismatch(model, false) {
                return Err(MapModelError::incompatible(format!("{} and model", key), reason));
            }
        }
    }
    Ok(())
}

impl fmt::Display for MapModelManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_summary(f, "Map_model_manager", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::base::{
        ApplyMaskOptions, MaskAroundAtomsOptions, MaskAroundDensityOptions, MaskAroundEdgesOptions,
    };
    use crate::maps::mask;
    use crate::models::symmetry::{approx_equal, norm, sub, CrystalSymmetry, UnitCell};
    use crate::models::Atom;
    use ndarray::Array3;

    fn cell() -> CrystalSymmetry {
        CrystalSymmetry::new(UnitCell::orthorhombic(64.0, 64.0, 64.0), "P 1")
    }

    /// 64³ 晶胞中一块 32³ 的 map，原点在 (16, 16, 16)
    fn boxed_map(fill: f64) -> MapManager {
        let data = Array3::from_shape_fn((32, 32, 32), |(i, j, k)| fill + (i + 2 * j + 3 * k) as f64);
        MapManager::new(data, [16, 16, 16], [64, 64, 64], cell()).unwrap()
    }

    fn model() -> Model {
        Model::new(vec![
            Atom::new("N", "N", [30.0, 31.0, 32.0]).with_residue("GLY", "A", 1),
            Atom::new("CA", "C", [31.5, 32.0, 32.5]).with_residue("GLY", "A", 1),
            Atom::new("C", "C", [33.0, 32.0, 34.0]).with_residue("GLY", "A", 1),
        ])
    }

    fn manager() -> MapModelManager {
        MapModelManager::builder()
            .map_manager(boxed_map(0.0))
            .model(model())
            .extra_map_manager_list(vec![boxed_map(100.0)])
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_shifts_everything_to_origin() {
        let mmm = manager();
        assert!(mmm.map_manager().origin_is_zero());
        assert_eq!(mmm.original_origin_grid_units(), [16, 16, 16]);
        assert!(approx_equal(mmm.original_origin_cart(), [16.0, 16.0, 16.0], 1e-10));
        assert_eq!(mmm.gridding_last(), [32, 32, 32]);
        assert_eq!(
            mmm.map_manager_id_list(),
            vec![MapKey::Primary, MapKey::Named("extra_map_manager_1".to_string())]
        );

        let model = mmm.model().unwrap();
        assert!(approx_equal(model.atoms()[0].xyz, [14.0, 15.0, 16.0], 1e-8));
        assert!(model.shift_cart().unwrap().approx_eq(&mmm.shift_cart(), 1e-8));
        assert!(mmm.extra_map_manager_list()[0].origin_is_zero());
    }

    #[test]
    fn test_model_round_trip_to_original_frame() {
        let mmm = manager();
        let mmmn = mmm.as_match_map_model_ncs().unwrap();
        let back = mmmn
            .shift_model_to_match_original_map(mmm.model().unwrap().clone())
            .unwrap();
        for (a, b) in back.atoms().iter().zip(model().atoms()) {
            assert!(approx_equal(a.xyz, b.xyz, 1e-5));
        }
    }

    #[test]
    fn test_single_half_map_is_configuration_error() {
        let err = MapModelManager::builder()
            .map_manager_1(boxed_map(0.0))
            .build()
            .unwrap_err();
        assert!(matches!(err, MapModelError::Configuration(_)));

        let err = MapModelManager::builder().build().unwrap_err();
        assert!(matches!(err, MapModelError::Configuration(_)));
    }

    #[test]
    fn test_half_maps_are_averaged() {
        let mmm = MapModelManager::builder()
            .map_manager_1(boxed_map(0.0))
            .map_manager_2(boxed_map(2.0))
            .build()
            .unwrap();
        let expected = mmm.map_data_1().unwrap()[[3, 4, 5]] + 1.0;
        assert!((mmm.map_data()[[3, 4, 5]] - expected).abs() < 1e-12);
        assert!(mmm.map_manager_2().unwrap().origin_is_zero());
        assert!(mmm.histograms().half_map_histogram_cc.is_some());
    }

    #[test]
    fn test_extra_map_ids_validated() {
        let reserved = MapModelManager::builder()
            .map_manager(boxed_map(0.0))
            .extra_map_manager_list(vec![boxed_map(1.0)])
            .extra_map_manager_id_list(vec!["map_manager_mask".to_string()])
            .build();
        assert!(matches!(reserved, Err(MapModelError::Configuration(_))));

        let duplicate = MapModelManager::builder()
            .map_manager(boxed_map(0.0))
            .extra_map_manager_list(vec![boxed_map(1.0), boxed_map(2.0)])
            .extra_map_manager_id_list(vec!["a".to_string(), "a".to_string()])
            .build();
        assert!(matches!(duplicate, Err(MapModelError::Configuration(_))));
    }

    #[test]
    fn test_dissimilar_extra_map_rejected() {
        let other = MapManager::new(Array3::zeros((32, 32, 31)), [16, 16, 16], [64, 64, 64], cell()).unwrap();
        let result = MapModelManager::builder()
            .map_manager(boxed_map(0.0))
            .extra_map_manager_list(vec![other])
            .build();
        assert!(matches!(result, Err(MapModelError::IncompatibleGeometry { .. })));
    }

    #[test]
    fn test_shifted_map_with_nonzero_origin_rejected() {
        let mut mm = boxed_map(0.0);
        mm.shift_origin([0, 0, 0]);
        mm.shift_origin([2, 2, 2]);
        let result = MapModelManager::builder().map_manager(mm).build();
        assert!(matches!(result, Err(MapModelError::IncompatibleGeometry { .. })));
    }

    #[test]
    fn test_forced_wrapping_on_partial_map_warns() {
        let mmm = MapModelManager::builder()
            .map_manager(boxed_map(0.0))
            .wrapping(true)
            .build()
            .unwrap();
        assert_eq!(mmm.warning_message(), Some(WRAPPING_WARNING));
        assert!(mmm.map_manager().wrapping());
    }

    #[test]
    fn test_ncs_attached_to_all_maps() {
        let mmm = MapModelManager::builder()
            .map_manager(boxed_map(0.0))
            .extra_map_manager_list(vec![boxed_map(1.0)])
            .ncs_object(NcsObject::unit())
            .build()
            .unwrap();
        for mm in mmm.map_managers() {
            let shift = mm.ncs_object().unwrap().shift_cart().unwrap();
            assert!(shift.approx_eq(&mmm.shift_cart(), 1e-8));
        }
    }

    #[test]
    fn test_box_all_maps_around_model() {
        let mut mmm = manager();
        mmm.box_all_maps_around_model_and_shift_origin(3.0).unwrap();

        let primary_cs = mmm.map_manager().crystal_symmetry();
        let model = mmm.model().unwrap();
        assert!(model.crystal_symmetry().unwrap().is_similar_symmetry(&primary_cs));
        assert!(model.shift_cart().unwrap().approx_eq(&mmm.shift_cart(), 1e-8));
        for mm in mmm.map_managers() {
            assert!(mm.origin_is_zero());
            assert!(mm.is_similar(mmm.map_manager()));
        }
        // 原始坐标可恢复
        let original = model.sites_cart_in_original_frame();
        assert!(approx_equal(original[2], [33.0, 32.0, 34.0], 1e-5));
    }

    #[test]
    fn test_box_without_model_fails_untouched() {
        let mut mmm = MapModelManager::builder()
            .map_manager(boxed_map(0.0))
            .build()
            .unwrap();
        let err = mmm.box_all_maps_around_model_and_shift_origin(3.0).unwrap_err();
        assert!(matches!(err, MapModelError::MissingResource(_)));
        assert_eq!(mmm.map_manager().all(), [32, 32, 32]);
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let mmm = manager();
        let mut copy = mmm.deep_copy();
        copy.initialize_maps(7.0);
        copy.box_all_maps_around_model_and_shift_origin(2.0).unwrap();
        assert_eq!(mmm.map_manager().all(), [32, 32, 32]);
        assert!((mmm.map_data()[[0, 0, 0]] - 0.0).abs() < 1e-12);
        assert!(approx_equal(mmm.model().unwrap().atoms()[0].xyz, [14.0, 15.0, 16.0], 1e-8));
    }

    #[test]
    fn test_hard_mask_is_multiplication() {
        let mut mmm = manager();
        let before: Vec<Array3<f64>> = mmm.map_managers().iter().map(|m| m.map_data().clone()).collect();
        mmm.create_mask_around_atoms(&MaskAroundAtomsOptions::default()).unwrap();
        let mask = mmm.get_map_manager(&MapKey::default_mask()).unwrap().map_data().clone();
        mmm.apply_mask_to_maps(&ApplyMaskOptions::default()).unwrap();

        let after: Vec<&MapManager> = mmm
            .map_managers()
            .into_iter()
            .filter(|m| !m.is_mask())
            .collect();
        assert_eq!(after.len(), before.len());
        for (old, new) in before.iter().zip(after) {
            let expected = old * &mask;
            assert!(expected
                .iter()
                .zip(new.map_data().iter())
                .all(|(a, b)| (a - b).abs() < 1e-12));
        }
    }

    #[test]
    fn test_mask_around_atoms_end_to_end() {
        let data = Array3::from_shape_fn((64, 64, 64), |(i, j, k)| 1.0 + ((i * 7 + j * 3 + k) % 11) as f64);
        let primary = MapManager::full_cell(data.clone(), cell()).unwrap();
        let sites = [[20.0, 20.0, 20.0], [40.0, 30.0, 25.0]];
        let model = Model::new(
            sites
                .iter()
                .map(|&xyz| Atom::new("CA", "C", xyz))
                .collect(),
        );
        let mut mmm = MapModelManager::builder()
            .map_manager(primary)
            .model(model)
            .build()
            .unwrap();
        assert!(!mmm.map_manager().wrapping());

        mmm.create_mask_around_atoms(&MaskAroundAtomsOptions::default()).unwrap();
        mmm.apply_mask_to_maps(&ApplyMaskOptions::default()).unwrap();

        // 1 Å 格距：格点索引即坐标
        let masked = mmm.map_data();
        for ((i, j, k), &v) in masked.indexed_iter() {
            let p = [i as f64, j as f64, k as f64];
            let d = sites
                .iter()
                .map(|s| norm(sub(p, *s)))
                .fold(f64::INFINITY, f64::min);
            if d > 3.0 + 1e-6 {
                assert!(v.abs() < 1e-12, "value {} left at distance {}", v, d);
            } else if d < 3.0 - 1e-6 {
                assert!((v - data[[i, j, k]]).abs() < 1e-12);
            }
        }
    }

    /// 32 Å 的 P 1 晶胞，32³ 网格，格点索引即坐标
    fn unit_grid_map(f: impl Fn((usize, usize, usize)) -> f64) -> MapManager {
        let cs = CrystalSymmetry::p1(UnitCell::orthorhombic(32.0, 32.0, 32.0));
        MapManager::full_cell(Array3::from_shape_fn((32, 32, 32), f), cs).unwrap()
    }

    #[test]
    fn test_soft_mask_around_atoms_stays_near_atom() {
        let center = [16.0, 16.0, 16.0];
        let mut mmm = MapModelManager::builder()
            .map_manager(unit_grid_map(|_| 2.0))
            .model(Model::new(vec![Atom::new("CA", "C", center)]))
            .build()
            .unwrap();
        let options = MaskAroundAtomsOptions {
            mask_atoms_atom_radius: 4.0,
            soft_mask: true,
            soft_mask_radius: Some(2.0),
            ..MaskAroundAtomsOptions::default()
        };
        mmm.create_mask_around_atoms(&options).unwrap();

        // 硬球半径 4 + 2 = 6，sigma 1 格点，核截断于 3 格点
        let reach = 6.0 + 3.0 * 3f64.sqrt();
        let mask_data = mmm.map_manager_mask().unwrap().map_data().clone();
        assert!((mask_data[[16, 16, 16]] - 1.0).abs() < 1e-9);
        let edge = mask_data[[22, 16, 16]];
        assert!(edge > 0.0 && edge < 1.0);
        for ((i, j, k), &m) in mask_data.indexed_iter() {
            let d = norm(sub([i as f64, j as f64, k as f64], center));
            assert!((0.0..=1.0).contains(&m));
            if d > reach + 1e-6 {
                assert_eq!(m, 0.0, "mask {} at distance {}", m, d);
            }
            if d <= 4.0 {
                assert!(m > 0.5, "mask {} at distance {}", m, d);
            }
        }

        mmm.apply_mask_to_maps(&ApplyMaskOptions::default()).unwrap();
        assert!((mmm.map_data()[[16, 16, 16]] - 2.0).abs() < 1e-9);
        assert_eq!(mmm.map_data()[[0, 0, 0]], 0.0);
        assert_eq!(mmm.map_data()[[16, 16, 31]], 0.0);
    }

    #[test]
    fn test_density_mask_selects_dense_half() {
        let extra = unit_grid_map(|(i, j, k)| 1.0 + (i + j + k) as f64);
        let mut mmm = MapModelManager::builder()
            .map_manager(unit_grid_map(|(i, _, _)| if i < 16 { 1.0 } else { 0.0 }))
            .extra_map_manager_list(vec![extra.clone()])
            .wrapping(true)
            .build()
            .unwrap();
        assert!(mmm.warning_message().is_none());

        let options = MaskAroundDensityOptions {
            solvent_content: Some(0.5),
            soft_mask: false,
            ..MaskAroundDensityOptions::default()
        };
        mmm.create_mask_around_density(&options).unwrap();
        let mask_data = mmm.map_manager_mask().unwrap().map_data().clone();
        for ((i, _, _), &m) in mask_data.indexed_iter() {
            assert_eq!(m, if i < 16 { 1.0 } else { 0.0 });
        }

        mmm.apply_mask_to_maps(&ApplyMaskOptions::default()).unwrap();
        let masked = mmm.map_data_list()[0];
        for ((i, j, k), &v) in masked.indexed_iter() {
            let expected = if i < 16 { extra.map_data()[[i, j, k]] } else { 0.0 };
            assert_eq!(v, expected);
        }
    }

    #[test]
    fn test_apply_mask_outside_set_to_mean_inside() {
        let mut mmm = manager();
        let before: Vec<Array3<f64>> = mmm.map_managers().iter().map(|m| m.map_data().clone()).collect();
        mmm.create_mask_around_atoms(&MaskAroundAtomsOptions::default()).unwrap();
        let mask_data = mmm.map_manager_mask().unwrap().map_data().clone();
        assert!(mask_data.iter().any(|&m| m == 0.0));
        assert!(mask_data.iter().any(|&m| m == 1.0));

        let options = ApplyMaskOptions {
            set_outside_to_mean_inside: true,
            ..ApplyMaskOptions::default()
        };
        mmm.apply_mask_to_maps(&options).unwrap();

        let after: Vec<&MapManager> = mmm
            .map_managers()
            .into_iter()
            .filter(|m| !m.is_mask())
            .collect();
        assert_eq!(after.len(), before.len());
        for (old, new) in before.iter().zip(after) {
            let mean = mask::mean_inside(old, &mask_data).unwrap();
            for ((index, &v), &m) in new.map_data().indexed_iter().zip(mask_data.iter()) {
                let expected = if m == 1.0 { old[index] } else { mean };
                assert!((v - expected).abs() < 1e-9, "{} != {} at {:?}", v, expected, index);
            }
        }
    }

    #[test]
    fn test_set_map_manager_validates_every_key() {
        let mut mmm = manager();
        let small = MapManager::new(Array3::zeros((20, 20, 20)), [0, 0, 0], [64, 64, 64], cell()).unwrap();

        let err = mmm.set_map_manager(MapKey::Primary, small.clone()).unwrap_err();
        assert!(matches!(err, MapModelError::IncompatibleGeometry { .. }));
        assert_eq!(mmm.map_manager().all(), [32, 32, 32]);

        let err = mmm
            .set_map_manager(MapKey::Named("small".to_string()), small)
            .unwrap_err();
        assert!(matches!(err, MapModelError::IncompatibleGeometry { .. }));
        assert_eq!(mmm.map_manager_id_list().len(), 2);

        let replacement = mmm
            .map_manager()
            .customized_copy(Array3::from_elem((32, 32, 32), 5.0))
            .unwrap();
        mmm.set_map_manager(MapKey::Primary, replacement).unwrap();
        assert_eq!(mmm.map_data()[[3, 3, 3]], 5.0);

        // 替换后仍可整体施加 mask
        mmm.create_mask_around_atoms(&MaskAroundAtomsOptions::default()).unwrap();
        mmm.apply_mask_to_maps(&ApplyMaskOptions::default()).unwrap();
    }

    #[test]
    fn test_map_data_list_holds_extra_maps_only() {
        let mut mmm = manager();
        assert_eq!(mmm.map_data_list().len(), 1);
        assert_eq!(mmm.map_data_list()[0][[0, 0, 0]], 100.0);
        mmm.create_mask_around_atoms(&MaskAroundAtomsOptions::default()).unwrap();
        assert_eq!(mmm.map_data_list().len(), 1);

        let halves = MapModelManager::builder()
            .map_manager_1(boxed_map(0.0))
            .map_manager_2(boxed_map(2.0))
            .build()
            .unwrap();
        assert!(halves.map_data_list().is_empty());
    }

    #[test]
    fn test_apply_mask_errors() {
        let mut mmm = manager();
        let err = mmm.apply_mask_to_maps(&ApplyMaskOptions::default()).unwrap_err();
        assert!(matches!(err, MapModelError::MissingResource(_)));

        // 普通 map 不能当作 mask
        let opts = ApplyMaskOptions {
            mask_key: MapKey::Named("extra_map_manager_1".to_string()),
            ..ApplyMaskOptions::default()
        };
        assert!(mmm.apply_mask_to_maps(&opts).is_err());

        mmm.mask_all_maps_around_edges(&MaskAroundEdgesOptions::default()).unwrap();
        let err = mmm
            .apply_mask_to_map(MapKey::Named("missing".to_string()), MapKey::default_mask(), false)
            .unwrap_err();
        assert!(matches!(err, MapModelError::MissingResource(_)));
    }

    #[test]
    fn test_customized_copy() {
        let mmm = manager();
        assert!(matches!(
            mmm.customized_copy(None, None),
            Err(MapModelError::Configuration(_))
        ));

        let mut moved = mmm.model().unwrap().clone();
        moved.shift_model_and_set_crystal_symmetry([1.0, 0.0, 0.0], None);
        assert!(mmm.customized_copy(Some(moved), None).is_err());

        let copy = mmm
            .customized_copy(None, Some(MapDict::new(mmm.map_manager().clone())))
            .unwrap();
        assert_eq!(copy.map_manager_id_list(), vec![MapKey::Primary]);
        assert!(copy.extra_map_manager_id_list().is_empty());
    }

    #[test]
    fn test_generate_and_counts() {
        let options = GenerateOptions {
            n_residues: 4,
            origin_shift_grid_units: Some([3, 2, 1]),
            ..GenerateOptions::default()
        };
        let mmm = MapModelManager::generate(&options).unwrap();
        assert_eq!(mmm.original_origin_grid_units(), [3, 2, 1]);
        let counts = mmm.counts();
        assert_eq!(counts.origin, [0, 0, 0]);
        assert!(counts.max > counts.min);
        assert!(counts.d_min_corner > 0.0);
        assert!(mmm.to_string().starts_with("Map_model_manager"));
    }

    #[test]
    fn test_as_r_model() {
        let mmm = manager();
        let rm = mmm.as_r_model().unwrap();
        assert_eq!(rm.map_manager_id_list(), mmm.map_manager_id_list());

        let no_model = MapModelManager::builder()
            .map_manager(boxed_map(0.0))
            .build()
            .unwrap();
        assert!(matches!(no_model.as_r_model(), Err(MapModelError::MissingResource(_))));
    }
}
