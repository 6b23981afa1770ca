//! # mask 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/mask.rs`

use super::generate::SyntheticArgs;

use clap::Args;

/// mask 子命令参数
#[derive(Args, Debug)]
pub struct MaskArgs {
    #[command(flatten)]
    pub synthetic: SyntheticArgs,

    /// Radius around each atom (Å)
    #[arg(short, long, default_value_t = 3.0)]
    pub radius: f64,

    /// Smooth the mask edge with a Gaussian
    #[arg(long, default_value_t = false)]
    pub soft_mask: bool,

    /// Soft mask radius (Å); defaults to the map resolution
    #[arg(long)]
    pub soft_mask_radius: Option<f64>,

    /// Set values outside the mask to the mean inside instead of zero
    #[arg(long, default_value_t = false)]
    pub mean_outside: bool,
}
