//! # box 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/box_model.rs`

use super::generate::SyntheticArgs;

use clap::Args;

/// box 子命令参数
#[derive(Args, Debug)]
pub struct BoxArgs {
    #[command(flatten)]
    pub synthetic: SyntheticArgs,

    /// Padding around the model (Å)
    #[arg(short, long, default_value_t = 3.0)]
    pub cushion: f64,

    /// Box only the model into a new P1 cell, without any map
    #[arg(long, default_value_t = false)]
    pub model_only: bool,

    /// Force wrapping on or off for all maps
    #[arg(long)]
    pub wrapping: Option<bool>,
}
