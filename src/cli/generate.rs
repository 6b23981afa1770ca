//! # generate 子命令 CLI 定义
//!
//! 合成数据参数被 `box` 和 `mask` 子命令复用。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs`, `cli/box_model.rs`, `cli/mask.rs` 使用
//! - 参数传递给 `commands/generate.rs`

use mapmodel::maps::GenerateOptions;

use clap::Args;
use std::path::PathBuf;

/// 合成模型与密度图的参数
#[derive(Args, Debug, Clone)]
pub struct SyntheticArgs {
    /// Number of residues in the generated helix
    #[arg(short = 'n', long, default_value_t = 10)]
    pub n_residues: usize,

    /// Residue number of the first residue
    #[arg(long, default_value_t = 1)]
    pub start_res: i32,

    /// Isotropic B-factor for all atoms (Å²)
    #[arg(long, default_value_t = 30.0)]
    pub b_iso: f64,

    /// Padding between the model and the cell edges (Å)
    #[arg(long, default_value_t = 5.0)]
    pub box_buffer: f64,

    /// Resolution of the generated map (Å)
    #[arg(short, long, default_value_t = 3.0)]
    pub d_min: f64,

    /// Full-cell gridding (three integers); chosen from the resolution if omitted
    #[arg(long, num_args = 3, value_names = ["NX", "NY", "NZ"])]
    pub gridding: Option<Vec<usize>>,

    /// Place the map origin at this grid point (three integers)
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    pub origin_shift: Option<Vec<i64>>,
}

impl SyntheticArgs {
    /// 转换为生成选项
    pub fn to_options(&self) -> GenerateOptions {
        GenerateOptions {
            n_residues: self.n_residues,
            start_res: self.start_res,
            b_iso: self.b_iso,
            box_buffer: self.box_buffer,
            d_min: self.d_min,
            gridding: self.gridding.as_deref().and_then(to_triple),
            origin_shift_grid_units: self.origin_shift.as_deref().and_then(to_triple),
        }
    }
}

fn to_triple<T: Copy>(values: &[T]) -> Option<[T; 3]> {
    match values {
        [a, b, c] => Some([*a, *b, *c]),
        _ => None,
    }
}

/// generate 子命令参数
#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub synthetic: SyntheticArgs,

    /// Write map counts to this CSV file
    #[arg(long)]
    pub counts_csv: Option<PathBuf>,

    /// Write map histograms to this CSV file
    #[arg(long)]
    pub histograms_csv: Option<PathBuf>,
}
