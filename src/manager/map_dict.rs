//! # Map 字典
//!
//! 以 `MapKey` 为键保存一组同网格的 map。
//! 四个约定键：主 map、两个半图和 mask；其余为自由命名。
//! 字典由主 map 构造，因此主 map 始终存在且不能移除。
//!
//! ## 依赖关系
//! - 被 `manager/base.rs`, `manager/map_model_manager.rs`, `manager/r_model.rs` 使用
//! - 使用 `maps/map_manager.rs`

use crate::error::{MapModelError, Result};
use crate::maps::MapManager;

use std::collections::BTreeMap;
use std::fmt;

/// map 的键
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    /// 主 map
    Primary,
    /// 半图 1
    Half1,
    /// 半图 2
    Half2,
    /// 约定的 mask 位置
    Mask,
    /// 其他 map 或 mask
    Named(String),
}

impl MapKey {
    /// 四个约定键的名称
    pub const RESERVED: [&'static str; 4] = [
        "map_manager",
        "map_manager_1",
        "map_manager_2",
        "map_manager_mask",
    ];

    pub fn as_str(&self) -> &str {
        match self {
            MapKey::Primary => "map_manager",
            MapKey::Half1 => "map_manager_1",
            MapKey::Half2 => "map_manager_2",
            MapKey::Mask => "map_manager_mask",
            MapKey::Named(name) => name,
        }
    }

    /// 由名称解析，约定名称映射到对应的键
    pub fn from_id(id: &str) -> MapKey {
        match id {
            "map_manager" => MapKey::Primary,
            "map_manager_1" => MapKey::Half1,
            "map_manager_2" => MapKey::Half2,
            "map_manager_mask" => MapKey::Mask,
            other => MapKey::Named(other.to_string()),
        }
    }

    pub fn is_reserved_name(id: &str) -> bool {
        Self::RESERVED.contains(&id)
    }

    /// 新建 mask 默认使用的键
    pub fn default_mask() -> MapKey {
        MapKey::Named("mask".to_string())
    }

    fn normalized(self) -> MapKey {
        match self {
            MapKey::Named(name) => MapKey::from_id(&name),
            key => key,
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for MapKey {
    fn from(id: &str) -> Self {
        MapKey::from_id(id)
    }
}

static PRIMARY_KEY: MapKey = MapKey::Primary;

/// 以键排序的 map 集合
#[derive(Debug, Clone)]
pub struct MapDict {
    primary: MapManager,
    others: BTreeMap<MapKey, MapManager>,
}

impl MapDict {
    pub fn new(primary: MapManager) -> Self {
        MapDict {
            primary,
            others: BTreeMap::new(),
        }
    }

    pub fn primary(&self) -> &MapManager {
        &self.primary
    }

    pub fn get(&self, key: &MapKey) -> Option<&MapManager> {
        match key.clone().normalized() {
            MapKey::Primary => Some(&self.primary),
            key => self.others.get(&key),
        }
    }

    pub(crate) fn get_mut(&mut self, key: &MapKey) -> Option<&mut MapManager> {
        match key.clone().normalized() {
            MapKey::Primary => Some(&mut self.primary),
            key => self.others.get_mut(&key),
        }
    }

    pub fn contains(&self, key: &MapKey) -> bool {
        self.get(key).is_some()
    }

    /// 插入或替换，返回被替换的 map
    pub fn insert(&mut self, key: MapKey, map_manager: MapManager) -> Option<MapManager> {
        match key.normalized() {
            MapKey::Primary => Some(std::mem::replace(&mut self.primary, map_manager)),
            key => self.others.insert(key, map_manager),
        }
    }

    /// 移除非主 map
    pub fn remove(&mut self, key: &MapKey) -> Result<Option<MapManager>> {
        match key.clone().normalized() {
            MapKey::Primary => Err(MapModelError::Configuration(
                "the primary map cannot be removed".to_string(),
            )),
            key => Ok(self.others.remove(&key)),
        }
    }

    /// 所有键（排序，主 map 在前）
    pub fn keys(&self) -> Vec<MapKey> {
        std::iter::once(MapKey::Primary)
            .chain(self.others.keys().cloned())
            .collect()
    }

    /// 除主 map 外的键
    pub fn other_keys(&self) -> Vec<MapKey> {
        self.others.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MapKey, &MapManager)> {
        std::iter::once((&PRIMARY_KEY, &self.primary)).chain(self.others.iter())
    }

    pub fn values(&self) -> impl Iterator<Item = &MapManager> {
        std::iter::once(&self.primary).chain(self.others.values())
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut MapManager> {
        std::iter::once(&mut self.primary).chain(self.others.values_mut())
    }

    pub fn len(&self) -> usize {
        self.others.len() + 1
    }

    /// 主 map 始终存在，永不为空
    pub fn is_empty(&self) -> bool {
        false
    }
}
