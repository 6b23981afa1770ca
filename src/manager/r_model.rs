//! # RModel：模型与一组原点为零的 map
//!
//! 与 `MapModelManager` 不同，构造时不移动任何东西：
//! 要求所有 map 原点已为零、彼此同网格，并与模型兼容。
//!
//! ## 依赖关系
//! - 被 `manager/map_model_manager.rs` 使用
//! - 使用 `manager/base.rs`, `manager/map_dict.rs`

use crate::error::{MapModelError, Result};
use crate::manager::base::{box_map_dict, write_summary, MapModelBase, Token};
use crate::manager::map_dict::MapDict;
use crate::manager::map_model_manager::validate_aggregate;
use crate::maps::map_manager::WRAPPING_WARNING;
use crate::models::Model;

use std::fmt;
use tracing::warn;

/// 模型与 map 字典
#[derive(Debug, Clone)]
pub struct RModel {
    model: Model,
    map_dict: MapDict,
    force_wrapping: Option<bool>,
    warning_message: Option<String>,
}

impl RModel {
    /// 校验后构造；`wrapping` 给定时套用到所有 map
    pub fn new(model: Model, mut map_dict: MapDict, wrapping: Option<bool>) -> Result<Self> {
        validate_aggregate(&map_dict, Some(&model))?;

        let mut warning_message = None;
        if let Some(w) = wrapping {
            for mm in map_dict.values_mut() {
                mm.set_wrapping(w);
            }
            if w && !map_dict.primary().is_full_size() {
                warn!("{}", WRAPPING_WARNING);
                warning_message = Some(WRAPPING_WARNING.to_string());
            }
        }

        Ok(RModel {
            model,
            map_dict,
            force_wrapping: wrapping,
            warning_message,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn into_parts(self) -> (Model, MapDict) {
        (self.model, self.map_dict)
    }

    /// 替换模型和/或 map 字典的副本
    pub fn customized_copy(&self, model: Option<Model>, map_dict: Option<MapDict>) -> Result<RModel> {
        if model.is_none() && map_dict.is_none() {
            return Err(MapModelError::Configuration(
                "customized_copy requires a new model or a new map dictionary".to_string(),
            ));
        }
        RModel::new(
            model.unwrap_or_else(|| self.model.clone()),
            map_dict.unwrap_or_else(|| self.map_dict.clone()),
            self.force_wrapping,
        )
    }

    /// 围绕模型截取所有 map，返回新的 `RModel`，自身不变
    pub fn box_all_maps_around_model_and_shift_origin(&self, box_cushion: f64) -> Result<RModel> {
        let (map_dict, model, warning) =
            box_map_dict(&self.map_dict, &self.model, box_cushion, self.force_wrapping)?;
        Ok(RModel {
            model,
            map_dict,
            force_wrapping: self.force_wrapping,
            warning_message: warning.or_else(|| self.warning_message.clone()),
        })
    }
}

impl MapModelBase for RModel {
    fn map_dict(&self) -> &MapDict {
        &self.map_dict
    }

    fn map_dict_mut(&mut self, _: Token) -> &mut MapDict {
        &mut self.map_dict
    }

    fn model(&self) -> Option<&Model> {
        Some(&self.model)
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

impl fmt::Display for RModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_summary(f, "RModel", self)
    }
}
