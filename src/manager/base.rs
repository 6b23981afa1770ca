//! # Map 字典的公共操作
//!
//! `MapModelManager` 和 `RModel` 都持有一个 map 字典和可选的模型，
//! 共享访问器、mask 的创建与应用、强制 wrapping 等操作。
//! 这些操作作为 `MapModelBase` trait 的默认方法提供。
//!
//! ## 依赖关系
//! - 被 `manager/map_model_manager.rs`, `manager/r_model.rs` 实现
//! - 使用 `manager/map_dict.rs`, `maps/mask.rs`, `maps/boxing.rs`

use crate::error::{MapModelError, Result};
use crate::manager::map_dict::{MapDict, MapKey};
use crate::maps::boxing::AroundModel;
use crate::maps::map_manager::WRAPPING_WARNING;
use crate::maps::mask;
use crate::maps::MapManager;
use crate::models::symmetry::CrystalSymmetry;
use crate::models::{Model, NcsObject};

use ndarray::Array3;
use std::fmt;
use tracing::info;

// ─────────────────────────────────────────────────────────────
// 选项
// ─────────────────────────────────────────────────────────────

/// 原子周围 mask 的选项
#[derive(Debug, Clone)]
pub struct MaskAroundAtomsOptions {
    /// 原子周围的半径（Å）
    pub mask_atoms_atom_radius: f64,
    pub soft_mask: bool,
    /// None 时取由格点估计的分辨率
    pub soft_mask_radius: Option<f64>,
    pub mask_key: MapKey,
}

impl Default for MaskAroundAtomsOptions {
    fn default() -> Self {
        MaskAroundAtomsOptions {
            mask_atoms_atom_radius: 3.0,
            soft_mask: false,
            soft_mask_radius: None,
            mask_key: MapKey::default_mask(),
        }
    }
}

/// 边缘 mask 的选项
#[derive(Debug, Clone)]
pub struct MaskAroundEdgesOptions {
    pub soft_mask_radius: Option<f64>,
    pub mask_key: MapKey,
}

impl Default for MaskAroundEdgesOptions {
    fn default() -> Self {
        MaskAroundEdgesOptions {
            soft_mask_radius: None,
            mask_key: MapKey::default_mask(),
        }
    }
}

/// 密度 mask 的选项
#[derive(Debug, Clone)]
pub struct MaskAroundDensityOptions {
    /// 溶剂含量，None 时取默认值
    pub solvent_content: Option<f64>,
    pub soft_mask: bool,
    pub soft_mask_radius: Option<f64>,
    pub mask_key: MapKey,
}

impl Default for MaskAroundDensityOptions {
    fn default() -> Self {
        MaskAroundDensityOptions {
            solvent_content: None,
            soft_mask: true,
            soft_mask_radius: None,
            mask_key: MapKey::default_mask(),
        }
    }
}

/// 应用 mask 的选项
#[derive(Debug, Clone)]
pub struct ApplyMaskOptions {
    /// None 时应用到所有非 mask 的 map
    pub map_keys: Option<Vec<MapKey>>,
    pub mask_key: MapKey,
    /// mask 外部平滑过渡到 mask 内均值，而不是置零
    pub set_outside_to_mean_inside: bool,
}

impl Default for ApplyMaskOptions {
    fn default() -> Self {
        ApplyMaskOptions {
            map_keys: None,
            mask_key: MapKey::default_mask(),
            set_outside_to_mean_inside: false,
        }
    }
}

/// 主 map 的键与其余键
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapManagerInfo {
    pub map_manager_id: MapKey,
    pub other_map_manager_id_list: Vec<MapKey>,
}

// ─────────────────────────────────────────────────────────────
// trait
// ─────────────────────────────────────────────────────────────

mod sealed {
    /// 只能在 crate 内构造
    #[derive(Debug, Clone, Copy)]
    pub struct Token;
}

pub(crate) use sealed::Token;

/// 持有 map 字典与可选模型的聚合体
///
/// 字典只能经由校验过的方法修改；`map_dict_mut` 需要 crate 内部的 `Token`。
pub trait MapModelBase {
    fn map_dict(&self) -> &MapDict;

    fn map_dict_mut(&mut self, token: Token) -> &mut MapDict;

    fn model(&self) -> Option<&Model>;

    /// 构造时指定的强制 wrapping
    fn forced_wrapping(&self) -> Option<bool>;

    fn record_warning(&mut self, message: String);

    fn warning_message(&self) -> Option<&str>;

    // ── 访问器 ──

    fn map_manager(&self) -> &MapManager {
        self.map_dict().primary()
    }

    fn map_manager_1(&self) -> Option<&MapManager> {
        self.map_dict().get(&MapKey::Half1)
    }

    fn map_manager_2(&self) -> Option<&MapManager> {
        self.map_dict().get(&MapKey::Half2)
    }

    fn map_manager_mask(&self) -> Option<&MapManager> {
        self.map_dict().get(&MapKey::Mask)
    }

    fn get_map_manager(&self, key: &MapKey) -> Option<&MapManager> {
        self.map_dict().get(key)
    }

    fn map_manager_id_list(&self) -> Vec<MapKey> {
        self.map_dict().keys()
    }

    fn map_managers(&self) -> Vec<&MapManager> {
        self.map_dict().values().collect()
    }

    fn map_data(&self) -> &Array3<f64> {
        self.map_manager().map_data()
    }

    fn map_data_1(&self) -> Option<&Array3<f64>> {
        self.map_manager_1().map(|m| m.map_data())
    }

    fn map_data_2(&self) -> Option<&Array3<f64>> {
        self.map_manager_2().map(|m| m.map_data())
    }

    /// 额外 map（自由命名且不是 mask）的数据；不含主 map 与半图
    fn map_data_list(&self) -> Vec<&Array3<f64>> {
        self.map_dict()
            .iter()
            .filter(|(key, mm)| matches!(key, MapKey::Named(_)) && !mm.is_mask())
            .map(|(_, mm)| mm.map_data())
            .collect()
    }

    fn crystal_symmetry(&self) -> CrystalSymmetry {
        self.map_manager().crystal_symmetry()
    }

    fn unit_cell_crystal_symmetry(&self) -> &CrystalSymmetry {
        self.map_manager().unit_cell_crystal_symmetry()
    }

    fn ncs_object(&self) -> Option<&NcsObject> {
        self.map_manager().ncs_object()
    }

    fn get_map_manager_info(&self) -> MapManagerInfo {
        MapManagerInfo {
            map_manager_id: MapKey::Primary,
            other_map_manager_id_list: self.map_dict().other_keys(),
        }
    }

    // ── 修改 ──

    /// 加入或替换一张 map
    ///
    /// 新 map 必须与字典中现有的每张 map（包括被替换的）同网格，
    /// 并与模型兼容。检查失败时字典不变。
    fn set_map_manager(&mut self, key: MapKey, mut map_manager: MapManager) -> Result<()> {
        let key = MapKey::from_id(key.as_str());
        for (other_key, other) in self.map_dict().iter() {
            if let Some(reason) = other.similarity_mismatch(&map_manager) {
                return Err(MapModelError::incompatible(
                    format!("{} and {}", other_key, key),
                    reason,
                ));
            }
        }
        if let Some(model) = self.model() {
            if let Some(reason) = map_manager.model_mismatch(model, false) {
                return Err(MapModelError::incompatible(format!("{} and model", key), reason));
            }
        }
        self.force_wrapping_if_necessary(&mut map_manager);
        self.map_dict_mut(Token).insert(key, map_manager);
        Ok(())
    }

    /// 有强制 wrapping 时套用到 map 上，非完整晶胞时记录警告
    fn force_wrapping_if_necessary(&mut self, map_manager: &mut MapManager) {
        if let Some(wrapping) = self.forced_wrapping() {
            map_manager.set_wrapping(wrapping);
            if wrapping && !map_manager.is_full_size() {
                self.record_warning(WRAPPING_WARNING.to_string());
            }
        }
    }

    /// 所有 map 设为同一值
    fn initialize_maps(&mut self, map_value: f64) {
        for mm in self.map_dict_mut(Token).values_mut() {
            mm.initialize_map_data(map_value);
        }
    }

    /// 软化半径：给定值或由主 map 格点估计的分辨率
    fn resolve_soft_mask_radius(&self, soft_mask_radius: Option<f64>) -> f64 {
        soft_mask_radius
            .filter(|r| *r > 0.0)
            .unwrap_or_else(|| mask::d_min_from_map(self.map_manager()))
    }

    // ── mask ──

    /// 由模型生成 mask，存入 `mask_key`，不应用
    ///
    /// 软 mask 时原子半径加上软化半径。
    fn create_mask_around_atoms(&mut self, options: &MaskAroundAtomsOptions) -> Result<()> {
        let model = self.model().ok_or_else(|| {
            MapModelError::MissingResource("a model is required to create a mask around atoms".to_string())
        })?;
        let soft_radius = if options.soft_mask {
            Some(self.resolve_soft_mask_radius(options.soft_mask_radius))
        } else {
            None
        };
        let radius = options.mask_atoms_atom_radius + soft_radius.unwrap_or(0.0);

        let mut mask_mm = mask::create_mask_around_atoms(self.map_manager(), model, radius)?;
        if let Some(r) = soft_radius {
            mask_mm = mask::soft_mask(&mask_mm, r)?;
        }
        self.set_map_manager(options.mask_key.clone(), mask_mm)
    }

    /// 生成盒子边缘的软 mask，存入 `mask_key`，不应用
    fn create_mask_around_edges(&mut self, options: &MaskAroundEdgesOptions) -> Result<()> {
        let radius = self.resolve_soft_mask_radius(options.soft_mask_radius);
        let mask_mm = mask::create_mask_around_edges(self.map_manager(), radius)?;
        self.set_map_manager(options.mask_key.clone(), mask_mm)
    }

    /// 由主 map 的密度生成 mask，存入 `mask_key`，不应用
    fn create_mask_around_density(&mut self, options: &MaskAroundDensityOptions) -> Result<()> {
        let mut mask_mm = mask::create_mask_around_density(self.map_manager(), options.solvent_content)?;
        if options.soft_mask {
            let radius = self.resolve_soft_mask_radius(options.soft_mask_radius);
            mask_mm = mask::soft_mask(&mask_mm, radius)?;
        }
        self.set_map_manager(options.mask_key.clone(), mask_mm)
    }

    /// 把 `mask_key` 处的 mask 应用到指定 map（默认全部）；mask 本身跳过
    fn apply_mask_to_maps(&mut self, options: &ApplyMaskOptions) -> Result<()> {
        let mask_mm = self
            .get_map_manager(&options.mask_key)
            .ok_or_else(|| MapModelError::MissingResource(format!("no mask with key '{}'", options.mask_key)))?;
        if !mask_mm.is_mask() {
            return Err(MapModelError::MissingResource(format!(
                "map '{}' is not flagged as a mask",
                options.mask_key
            )));
        }
        let mask_mm = mask_mm.clone();

        let keys = match &options.map_keys {
            Some(keys) => keys.clone(),
            None => self.map_manager_id_list(),
        };
        if let Some(missing) = keys.iter().find(|k| !self.map_dict().contains(k)) {
            return Err(MapModelError::MissingResource(format!("no map with key '{}'", missing)));
        }

        for key in &keys {
            if let Some(mm) = self.map_dict_mut(Token).get_mut(key) {
                if mm.is_mask() {
                    continue;
                }
                mask::apply_mask(mm, &mask_mm, options.set_outside_to_mean_inside)?;
            }
        }
        Ok(())
    }

    fn apply_mask_to_map(&mut self, map_key: MapKey, mask_key: MapKey, set_outside_to_mean_inside: bool) -> Result<()> {
        self.apply_mask_to_maps(&ApplyMaskOptions {
            map_keys: Some(vec![map_key]),
            mask_key,
            set_outside_to_mean_inside,
        })
    }

    /// 生成原子周围的 mask 并应用到所有 map
    fn mask_all_maps_around_atoms(
        &mut self,
        options: &MaskAroundAtomsOptions,
        set_outside_to_mean_inside: bool,
    ) -> Result<()> {
        self.create_mask_around_atoms(options)?;
        self.apply_mask_to_maps(&ApplyMaskOptions {
            map_keys: None,
            mask_key: options.mask_key.clone(),
            set_outside_to_mean_inside,
        })
    }

    /// 生成边缘软 mask 并应用到所有 map
    fn mask_all_maps_around_edges(&mut self, options: &MaskAroundEdgesOptions) -> Result<()> {
        self.create_mask_around_edges(options)?;
        self.apply_mask_to_maps(&ApplyMaskOptions {
            map_keys: None,
            mask_key: options.mask_key.clone(),
            set_outside_to_mean_inside: false,
        })
    }
}

// ─────────────────────────────────────────────────────────────
// 共用实现
// ─────────────────────────────────────────────────────────────

/// 围绕模型截取字典中的所有 map，返回新字典、平移后的模型和警告
///
/// 全部在新字典中构建，失败时调用方的状态不变。
pub(crate) fn box_map_dict(
    map_dict: &MapDict,
    model: &Model,
    box_cushion: f64,
    wrapping: Option<bool>,
) -> Result<(MapDict, Model, Option<String>)> {
    let bx = AroundModel::new(map_dict.primary(), model, box_cushion, wrapping)?;
    let warning = bx.warning_message().map(str::to_string);
    if let Some(w) = &warning {
        info!("{}", w);
    }

    let mut others = Vec::with_capacity(map_dict.len() - 1);
    for (key, mm) in map_dict.iter().filter(|(k, _)| **k != MapKey::Primary) {
        others.push((key.clone(), bx.apply_to_map(mm)?));
    }

    let (boxed_primary, boxed_model) = bx.into_parts();
    let mut boxed = MapDict::new(boxed_primary);
    for (key, mm) in others {
        boxed.insert(key, mm);
    }

    let model_cs = boxed_model.crystal_symmetry().cloned();
    let map_cs = boxed.primary().crystal_symmetry();
    if !model_cs.map_or(false, |cs| cs.is_similar_symmetry(&map_cs)) {
        return Err(MapModelError::incompatible(
            "boxed map and model",
            format!("model symmetry does not match boxed map symmetry {}", map_cs),
        ));
    }
    Ok((boxed, boxed_model, warning))
}

/// 以统一格式列出模型和所有 map
pub(crate) fn write_summary<T: MapModelBase + ?Sized>(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    aggregate: &T,
) -> fmt::Result {
    write!(f, "{}: ", title)?;
    if let Some(model) = aggregate.model() {
        write!(f, "\n{}", model)?;
    }
    write!(f, "\nmap_manager: {}", aggregate.map_manager())?;
    for key in aggregate.get_map_manager_info().other_map_manager_id_list {
        if let Some(mm) = aggregate.get_map_manager(&key) {
            write!(f, "\n{}: {}", key, mm)?;
        }
    }
    Ok(())
}
