//! # mapmodel - 密度图与原子模型的一致性管理
//!
//! 在合成数据上演示聚合体的主要操作。
//!
//! ## 子命令
//! - `generate` - 生成模型与密度图并输出统计
//! - `box`      - 围绕模型截取盒子
//! - `mask`     - 在原子周围创建并应用 mask
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     └── mapmodel 库 (manager/, maps/, models/)
//!   └── utils/      (输出与进度提示)
//! ```

mod cli;
mod commands;
mod utils;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
