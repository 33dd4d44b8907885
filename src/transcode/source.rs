use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    config::SourceConfig,
    dataset::{
        layout::prepare_result_dir,
        transforms::{SplitTransforms, discover_splits, transforms_file_name},
    },
    foundation::error::{ViewbakeError, ViewbakeResult},
    render::{
        backend::Renderer,
        compositor::{ChannelCompositor, RenderReport, ViewJob},
    },
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceReport {
    pub output_dir: PathBuf,
    /// One entry per split, in processing order.
    pub splits: Vec<(String, RenderReport)>,
}

impl SourceReport {
    pub fn rendered(&self) -> usize {
        self.splits.iter().map(|(_, r)| r.rendered.len()).sum()
    }

    pub fn failed(&self) -> usize {
        self.splits.iter().map(|(_, r)| r.failed.len()).sum()
    }
}

/// Render every view of every split into `{output_dir}/{view_key}/{channel}.{ext}`.
///
/// Inputs are checked before the output directory is touched. The transform files are copied to
/// the output root so the result is a self-contained per-view dataset.
#[tracing::instrument(
    skip_all,
    fields(cam_dir = %cfg.cam_dir.display(), output = %cfg.output_dir.display())
)]
pub fn render_sources(
    cfg: &SourceConfig,
    renderer: &mut dyn Renderer,
) -> ViewbakeResult<SourceReport> {
    if !cfg.scene_path.is_file() {
        return Err(ViewbakeError::config(format!(
            "scene file '{}' does not exist",
            cfg.scene_path.display()
        )));
    }
    check_outside(&cfg.cam_dir, &cfg.output_dir, "camera directory")?;
    check_outside(&cfg.scene_path, &cfg.output_dir, "scene file")?;

    let splits = discover_splits(&cfg.cam_dir, cfg.splits.as_deref())?;
    let compositor = ChannelCompositor::new(cfg.render.clone())?;
    let plan = splits
        .iter()
        .map(|s| view_jobs(s).map(|jobs| (s, jobs)))
        .collect::<ViewbakeResult<Vec<(&SplitTransforms, Vec<ViewJob>)>>>()?;
    let intrinsics = plan
        .iter()
        .map(|(s, _)| s.intrinsics(cfg.render.width, cfg.render.height))
        .collect::<ViewbakeResult<Vec<_>>>()?;

    prepare_result_dir(&cfg.output_dir)?;
    for (split, _) in &plan {
        let dst = cfg.output_dir.join(transforms_file_name(&split.name));
        std::fs::copy(&split.path, &dst).with_context(|| {
            format!("copy '{}' -> '{}'", split.path.display(), dst.display())
        })?;
    }

    let mut report = SourceReport {
        output_dir: cfg.output_dir.clone(),
        splits: Vec::with_capacity(plan.len()),
    };
    for ((split, jobs), intrinsics) in plan.iter().zip(&intrinsics) {
        tracing::info!(split = %split.name, views = jobs.len(), "rendering split");
        let r =
            compositor.render_split(&split.name, intrinsics, jobs, &cfg.output_dir, renderer)?;
        report.splits.push((split.name.clone(), r));
    }

    if report.failed() > 0 {
        tracing::warn!(
            rendered = report.rendered(),
            failed = report.failed(),
            "some views were skipped"
        );
    }
    Ok(report)
}

fn view_jobs(split: &SplitTransforms) -> ViewbakeResult<Vec<ViewJob>> {
    split
        .transforms
        .frames
        .iter()
        .enumerate()
        .map(|(index, frame)| {
            let key = frame.view_key().map_err(|e| e.at_view(&split.name, index))?;
            Ok(ViewJob {
                index,
                key,
                cam_to_world: frame.pose(),
            })
        })
        .collect()
}

/// The output root is wiped at the start of a run, so it must not hold any input.
fn check_outside(input: &Path, output_dir: &Path, what: &str) -> ViewbakeResult<()> {
    let inp =
        std::path::absolute(input).with_context(|| format!("resolve '{}'", input.display()))?;
    let out = std::path::absolute(output_dir)
        .with_context(|| format!("resolve '{}'", output_dir.display()))?;
    if inp.starts_with(&out) {
        return Err(ViewbakeError::config(format!(
            "output directory '{}' contains the {what} '{}'",
            output_dir.display(),
            input.display()
        )));
    }
    Ok(())
}
