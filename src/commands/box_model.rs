//! # box 命令实现
//!
//! 生成数据后围绕模型截取所有 map，报告平移，并检查模型坐标能还原到原始框架。
//!
//! ## 依赖关系
//! - 使用 `cli/box_model.rs` 定义的参数
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::cli::box_model::BoxArgs;
use crate::utils::{output, progress};

use mapmodel::maps::{generate, shift_and_box_model, GenerateOptions};
use mapmodel::models::symmetry::{norm, sub};
use mapmodel::{MapModelBase, MapModelError, MapModelManagerBuilder, Result};

/// 坐标还原的容差（Å）
const RESTORE_TOLERANCE: f64 = 1e-5;

/// 执行 box 命令
pub fn execute(args: BoxArgs) -> Result<()> {
    let options = args.synthetic.to_options();
    if args.model_only {
        return box_model_only(&options, args.cushion);
    }

    output::print_header("Boxing Maps Around Model");

    let spinner = progress::create_spinner("Computing density...");
    let generated = generate::generate(&options);
    spinner.finish_and_clear();
    let (model, map_manager) = generated?;
    let original_sites = model.sites_cart();

    let mut builder = MapModelManagerBuilder::new().map_manager(map_manager).model(model);
    if let Some(wrapping) = args.wrapping {
        builder = builder.wrapping(wrapping);
    }
    let mut mmm = builder.build()?;
    let all_before = mmm.map_manager().all();
    let shift_before = mmm.shift_cart();

    mmm.box_all_maps_around_model_and_shift_origin(args.cushion)?;
    if let Some(w) = mmm.warning_message() {
        output::print_warning(w);
    }

    output::print_change(
        "Gridding:",
        &format!("{:?}", all_before),
        &format!("{:?}", mmm.map_manager().all()),
    );
    output::print_change(
        "Shift (Å):",
        &output::format_vec3(shift_before.shift_cart),
        &output::format_vec3(mmm.shift_cart().shift_cart),
    );
    output::print_info(&format!("Boxed crystal symmetry: {}", mmm.crystal_symmetry()));

    let model = mmm
        .model()
        .ok_or_else(|| MapModelError::MissingResource("model missing after boxing".to_string()))?;
    let max_deviation = model
        .sites_cart_in_original_frame()
        .iter()
        .zip(&original_sites)
        .map(|(a, b)| norm(sub(*a, *b)))
        .fold(0.0, f64::max);
    if max_deviation < RESTORE_TOLERANCE {
        output::print_success(&format!(
            "Original coordinates recovered (max deviation {:.2e} Å)",
            max_deviation
        ));
    } else {
        output::print_warning(&format!(
            "Original coordinates differ by up to {:.4} Å",
            max_deviation
        ));
    }

    output::print_counts_table(&mmm.counts());
    output::print_done("Boxing complete");
    Ok(())
}

/// 只把模型放入新的 P1 盒子
fn box_model_only(options: &GenerateOptions, cushion: f64) -> Result<()> {
    output::print_header("Boxing Model");

    let model = generate::generate_model(
        options.n_residues,
        options.start_res,
        options.b_iso,
        options.box_buffer,
    )?;
    let boxed = shift_and_box_model(&model, cushion)?;

    if let Some(cs) = boxed.crystal_symmetry() {
        output::print_info(&format!("Boxed crystal symmetry: {}", cs));
    }
    if let Some(shift) = boxed.shift_cart() {
        output::print_info(&format!("Shift (Å): {}", output::format_vec3(shift.shift_cart)));
    }
    output::print_done(&format!("Boxed {} atoms", boxed.n_atoms()));
    Ok(())
}
