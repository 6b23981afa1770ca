//! # generate 命令实现
//!
//! 生成合成模型与密度图，构造聚合体并输出统计。
//!
//! ## 依赖关系
//! - 使用 `cli/generate.rs` 定义的参数
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::cli::generate::GenerateArgs;
use crate::utils::{output, progress};

use mapmodel::maps::export;
use mapmodel::{MapModelBase, MapModelManager, Result};

/// 执行 generate 命令
pub fn execute(args: GenerateArgs) -> Result<()> {
    output::print_header("Generating Synthetic Model and Map");

    let options = args.synthetic.to_options();
    let spinner = progress::create_spinner("Computing density...");
    let mmm = MapModelManager::generate(&options);
    spinner.finish_and_clear();
    let mmm = mmm?;

    if let Some(model) = mmm.model() {
        output::print_info(&format!(
            "Model: {} atoms in {} residues",
            model.n_atoms(),
            model.n_residues()
        ));
    }
    output::print_info(&format!("Crystal symmetry: {}", mmm.crystal_symmetry()));
    output::print_info(&format!(
        "Original origin (grid units): {:?}",
        mmm.original_origin_grid_units()
    ));

    let counts = mmm.counts();
    output::print_counts_table(&counts);

    if let Some(path) = &args.counts_csv {
        export::counts_to_csv(&counts, path)?;
        output::print_success(&format!("Map counts saved to '{}'", path.display()));
    }
    if let Some(path) = &args.histograms_csv {
        export::histograms_to_csv(&mmm.histograms(), path)?;
        output::print_success(&format!("Map histograms saved to '{}'", path.display()));
    }

    output::print_done("Generation complete");
    Ok(())
}
