//! # 网格访问器
//!
//! 描述三维格点数组在完整网格中的位置：
//! - `origin`: 数组第一个元素对应的网格索引
//! - `all`: 各维尺寸
//! - `last`: 开区间上界 `origin + all`
//! - `focus`: 逻辑上使用的区域（普通网格等于 `all`）
//!
//! ## 依赖关系
//! - 被 `maps/map_manager.rs`, `maps/boxing.rs`, `maps/stats.rs` 使用
//! - 使用 `ndarray`

use ndarray::Array3;
use serde::Serialize;

/// 网格访问器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridAccessor {
    pub origin: [i64; 3],
    pub all: [usize; 3],
    pub focus: [usize; 3],
}

impl GridAccessor {
    pub fn new(origin: [i64; 3], all: [usize; 3]) -> Self {
        GridAccessor {
            origin,
            all,
            focus: all,
        }
    }

    /// 开区间上界
    pub fn last(&self) -> [i64; 3] {
        [
            self.origin[0] + self.all[0] as i64,
            self.origin[1] + self.all[1] as i64,
            self.origin[2] + self.all[2] as i64,
        ]
    }

    /// 格点总数
    pub fn size(&self) -> usize {
        self.all[0] * self.all[1] * self.all[2]
    }

    /// 网格索引是否落在数组内
    pub fn contains(&self, index: [i64; 3]) -> bool {
        let last = self.last();
        (0..3).all(|i| index[i] >= self.origin[i] && index[i] < last[i])
    }

    /// 网格索引转数组下标（不检查边界）
    pub fn local(&self, index: [i64; 3]) -> [usize; 3] {
        [
            (index[0] - self.origin[0]) as usize,
            (index[1] - self.origin[1]) as usize,
            (index[2] - self.origin[2]) as usize,
        ]
    }

    /// 周期性折回到数组内，`period` 为完整晶胞网格
    pub fn wrap(&self, index: [i64; 3], period: [usize; 3]) -> Option<[usize; 3]> {
        let mut local = [0usize; 3];
        for i in 0..3 {
            let n = period[i] as i64;
            if n <= 0 {
                return None;
            }
            let offset = (index[i] - self.origin[i]).rem_euclid(n);
            if offset >= self.all[i] as i64 {
                return None;
            }
            local[i] = offset as usize;
        }
        Some(local)
    }
}

/// 从数组中截取网格区间 `[first, last]`（闭区间）
///
/// 区间超出数组时，`period` 为 Some 则周期折回，否则越界格点填 0。
pub fn extract_block(
    data: &Array3<f64>,
    accessor: &GridAccessor,
    first: [i64; 3],
    last: [i64; 3],
    period: Option<[usize; 3]>,
) -> Array3<f64> {
    let shape = (
        (last[0] - first[0] + 1).max(0) as usize,
        (last[1] - first[1] + 1).max(0) as usize,
        (last[2] - first[2] + 1).max(0) as usize,
    );
    Array3::from_shape_fn(shape, |(i, j, k)| {
        let index = [first[0] + i as i64, first[1] + j as i64, first[2] + k as i64];
        if accessor.contains(index) {
            let l = accessor.local(index);
            data[[l[0], l[1], l[2]]]
        } else if let Some(p) = period {
            accessor
                .wrap(index, p)
                .map(|l| data[[l[0], l[1], l[2]]])
                .unwrap_or(0.0)
        } else {
            0.0
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessor_bounds() {
        let acc = GridAccessor::new([-2, 0, 5], [4, 3, 2]);
        assert_eq!(acc.last(), [2, 3, 7]);
        assert_eq!(acc.size(), 24);
        assert!(acc.contains([-2, 0, 5]));
        assert!(acc.contains([1, 2, 6]));
        assert!(!acc.contains([2, 0, 5]));
        assert_eq!(acc.local([0, 1, 6]), [2, 1, 1]);
    }

    #[test]
    fn test_wrap_full_cell() {
        let acc = GridAccessor::new([0, 0, 0], [4, 4, 4]);
        assert_eq!(acc.wrap([-1, 4, 9], [4, 4, 4]), Some([3, 0, 1]));
    }

    #[test]
    fn test_extract_block_inside_and_padded() {
        let data = Array3::from_shape_fn((3, 3, 3), |(i, j, k)| (i * 100 + j * 10 + k) as f64);
        let acc = GridAccessor::new([10, 10, 10], [3, 3, 3]);

        let block = extract_block(&data, &acc, [11, 11, 11], [12, 12, 12], None);
        assert_eq!(block.dim(), (2, 2, 2));
        assert_eq!(block[[0, 0, 0]], 111.0);
        assert_eq!(block[[1, 1, 1]], 222.0);

        let padded = extract_block(&data, &acc, [12, 12, 12], [13, 13, 13], None);
        assert_eq!(padded[[0, 0, 0]], 222.0);
        assert_eq!(padded[[1, 1, 1]], 0.0);

        let wrapped = extract_block(&data, &acc, [12, 12, 12], [13, 13, 13], Some([3, 3, 3]));
        // 索引 (13, 12, 12) 折回到数组下标 (0, 2, 2)
        assert_eq!(wrapped[[1, 0, 0]], 22.0);
    }
}
