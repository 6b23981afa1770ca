//! # mask 命令实现
//!
//! 生成数据后在原子周围创建 mask 并应用到所有 map，报告 mask 覆盖比例和均值。
//!
//! ## 依赖关系
//! - 使用 `cli/mask.rs` 定义的参数
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::cli::mask::MaskArgs;
use crate::utils::{output, progress};

use mapmodel::manager::MaskAroundAtomsOptions;
use mapmodel::maps::mask::mean_inside;
use mapmodel::{MapModelBase, MapModelError, MapModelManager, Result};

/// 执行 mask 命令
pub fn execute(args: MaskArgs) -> Result<()> {
    output::print_header("Masking Maps Around Atoms");

    let options = args.synthetic.to_options();
    let spinner = progress::create_spinner("Computing density...");
    let mmm = MapModelManager::generate(&options);
    spinner.finish_and_clear();
    let mut mmm = mmm?;
    let unmasked = mmm.map_data().clone();

    let mask_options = MaskAroundAtomsOptions {
        mask_atoms_atom_radius: args.radius,
        soft_mask: args.soft_mask,
        soft_mask_radius: args.soft_mask_radius,
        ..MaskAroundAtomsOptions::default()
    };
    mmm.mask_all_maps_around_atoms(&mask_options, args.mean_outside)?;

    let mask = mmm.get_map_manager(&mask_options.mask_key).ok_or_else(|| {
        MapModelError::MissingResource(format!("no mask with key '{}'", mask_options.mask_key))
    })?;
    let mask_data = mask.map_data();
    let n_inside = mask_data.iter().filter(|&&v| v > 0.5).count();
    output::print_info(&format!(
        "Mask covers {} of {} grid points ({:.1}%)",
        n_inside,
        mask_data.len(),
        100.0 * n_inside as f64 / mask_data.len().max(1) as f64
    ));

    match mean_inside(&unmasked, mask_data) {
        Some(mean) => output::print_info(&format!("Mean density inside mask: {:.4}", mean)),
        None => output::print_warning("Mask is empty"),
    }
    output::print_counts_table(&mmm.counts());
    output::print_done("Masking complete");
    Ok(())
}
