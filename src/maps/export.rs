//! # Map 统计导出
//!
//! 将 `MapCounts` 与 `MapHistograms` 写入 CSV。
//!
//! ## 依赖关系
//! - 被 `commands/generate.rs` 调用
//! - 使用 `maps/stats.rs` 的统计结构
//! - 使用 `csv` 库写入 CSV 文件

use crate::error::{MapModelError, Result};
use crate::maps::stats::{Histogram, MapCounts, MapHistograms};

use std::path::Path;

fn flush<W: std::io::Write>(wtr: &mut csv::Writer<W>, output_path: &Path) -> Result<()> {
    wtr.flush().map_err(|e| MapModelError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })
}

/// 导出网格计数，每项一行 (quantity, x, y, z)
pub fn counts_to_csv(counts: &MapCounts, output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    wtr.write_record(["quantity", "x", "y", "z"])?;

    let triple = |name: &str, v: [String; 3]| [name.to_string(), v[0].clone(), v[1].clone(), v[2].clone()];
    let ints = |v: [i64; 3]| [v[0].to_string(), v[1].to_string(), v[2].to_string()];
    let sizes = |v: [usize; 3]| [v[0].to_string(), v[1].to_string(), v[2].to_string()];

    wtr.write_record(triple("origin", ints(counts.origin)))?;
    wtr.write_record(triple("last", ints(counts.last)))?;
    wtr.write_record(triple("focus", sizes(counts.focus)))?;
    wtr.write_record(triple("all", sizes(counts.all)))?;
    wtr.write_record([
        "min_max_mean".to_string(),
        format!("{:.6}", counts.min),
        format!("{:.6}", counts.max),
        format!("{:.6}", counts.mean),
    ])?;
    wtr.write_record([
        "d_min_corner".to_string(),
        format!("{:.4}", counts.d_min_corner),
        String::new(),
        String::new(),
    ])?;

    flush(&mut wtr, output_path)
}

/// 导出直方图，每格一行；半图不存在时对应列留空
pub fn histograms_to_csv(histograms: &MapHistograms, output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    wtr.write_record(["slot", "map_lower", "map_count", "half_lower", "half_1_count", "half_2_count"])?;

    let lower = |h: &Histogram, i: usize| format!("{:.6}", h.data_min + i as f64 * h.slot_width());
    for (i, &count) in histograms.h_map.slots.iter().enumerate() {
        let (half_lower, c1, c2) = match (&histograms.h_half_map_1, &histograms.h_half_map_2) {
            (Some(h1), Some(h2)) => (
                lower(h1, i),
                h1.slots.get(i).map(|c| c.to_string()).unwrap_or_default(),
                h2.slots.get(i).map(|c| c.to_string()).unwrap_or_default(),
            ),
            _ => (String::new(), String::new(), String::new()),
        };
        wtr.write_record([
            i.to_string(),
            lower(&histograms.h_map, i),
            count.to_string(),
            half_lower,
            c1,
            c2,
        ])?;
    }

    flush(&mut wtr, output_path)
}
