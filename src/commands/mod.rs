//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `utils/` 和 mapmodel 库
//! - 子模块: generate, box_model, mask

pub mod box_model;
pub mod generate;
pub mod mask;

use crate::cli::Commands;
use mapmodel::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Generate(args) => generate::execute(args),
        Commands::Box(args) => box_model::execute(args),
        Commands::Mask(args) => mask::execute(args),
    }
}
