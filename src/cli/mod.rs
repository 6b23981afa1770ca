//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `generate`: 生成合成模型与密度图并输出统计
//! - `box`: 围绕模型截取盒子并检查坐标可还原
//! - `mask`: 在原子周围创建并应用 mask
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: generate, box_model, mask

pub mod box_model;
pub mod generate;
pub mod mask;

use clap::{Parser, Subcommand};

/// mapmodel - 密度图、模型与 NCS 的一致性管理
#[derive(Parser)]
#[command(name = "mapmodel")]
#[command(version)]
#[command(about = "Keep density maps, atomic models and NCS operators in one coordinate frame", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log level filter used when RUST_LOG is not set (e.g. info, debug)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Generate a synthetic model and map and report map statistics
    Generate(generate::GenerateArgs),

    /// Box all maps around the model and shift the origin to zero
    Box(box_model::BoxArgs),

    /// Create a mask around the model atoms and apply it to all maps
    Mask(mask::MaskArgs),
}
