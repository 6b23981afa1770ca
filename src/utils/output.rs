//! # 美化输出工具
//!
//! 提供统一的终端输出样式，以及 map 统计的表格显示。
//!
//! ## 依赖关系
//! - 被所有 `commands/` 模块使用
//! - 使用 `colored`, `tabled` crate

use mapmodel::maps::MapCounts;
use mapmodel::models::Vec3;

use colored::Colorize;
use tabled::{Table, Tabled};

/// 打印成功消息
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 打印完成消息
pub fn print_done(msg: &str) {
    println!("{} {}", "[DONE]".green().bold(), msg);
}

/// 打印前后变化
pub fn print_change(label: &str, from: &str, to: &str) {
    println!(
        "{} {} {} {} {}",
        "[*]".blue().bold(),
        label,
        from.dimmed(),
        "->".cyan(),
        to
    );
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}

/// 格式化笛卡尔向量
pub fn format_vec3(v: Vec3) -> String {
    format!("({:.3}, {:.3}, {:.3})", v[0], v[1], v[2])
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Quantity")]
    quantity: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// 以表格显示网格计数
pub fn print_counts_table(counts: &MapCounts) {
    let rows = vec![
        CountRow {
            quantity: "origin",
            value: format!("{:?}", counts.origin),
        },
        CountRow {
            quantity: "last",
            value: format!("{:?}", counts.last),
        },
        CountRow {
            quantity: "focus",
            value: format!("{:?}", counts.focus),
        },
        CountRow {
            quantity: "all",
            value: format!("{:?}", counts.all),
        },
        CountRow {
            quantity: "min / max / mean",
            value: format!("{:.4} / {:.4} / {:.4}", counts.min, counts.max, counts.mean),
        },
        CountRow {
            quantity: "d_min at grid corner (Å)",
            value: format!("{:.3}", counts.d_min_corner),
        },
    ];
    println!("{}", Table::new(&rows));
}
