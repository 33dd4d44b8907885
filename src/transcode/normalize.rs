use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    archive::CameraArchive,
    camera::{ProjectionMatrixPair, convert_view},
    config::NormalizeConfig,
    dataset::{
        layout::{
            IDR_ARCHIVE, IDR_IMAGE_DIR, IDR_MASK_DIR, IDR_SUFFIX, ViewSources, prepare_result_dir,
            sibling_result_dir,
        },
        transforms::{SplitTransforms, discover_splits},
    },
    foundation::error::{ViewbakeError, ViewbakeResult},
    scene::{
        Scene,
        bounds::{BoundingSphere, estimate_bounds},
    },
};

#[derive(Clone, Debug, PartialEq)]
pub struct NormalizeReport {
    pub result_dir: PathBuf,
    pub sphere: BoundingSphere,
    /// Total views; archive indices run `0..views`.
    pub views: usize,
    pub missing_masks: usize,
}

/// Per-view dataset -> sphere-normalized `{name}_idr` dataset.
///
/// Views are numbered with one counter across all splits, in split order and then frame order,
/// so `image/{i}.png`, `mask/{i}.png` and `world_mat_{i}` always describe the same view.
/// Every frame is resolved before the result directory is touched; a bad frame leaves no output.
#[tracing::instrument(skip_all, fields(source = %cfg.source_root.display()))]
pub fn normalize(cfg: &NormalizeConfig) -> ViewbakeResult<NormalizeReport> {
    let root = &cfg.source_root;
    if !root.is_dir() {
        return Err(ViewbakeError::config(format!(
            "source dataset '{}' does not exist",
            root.display()
        )));
    }
    let splits = discover_splits(root, cfg.splits.as_deref())?;
    let sphere = estimate_bounds(&Scene::load_obj(&cfg.scene_path)?)?;

    let plan = splits
        .iter()
        .map(|split| plan_split(cfg, split, &sphere))
        .collect::<ViewbakeResult<Vec<_>>>()?;

    let result_dir = sibling_result_dir(root, IDR_SUFFIX)?;
    prepare_result_dir(&result_dir)?;
    let image_dir = result_dir.join(IDR_IMAGE_DIR);
    let mask_dir = result_dir.join(IDR_MASK_DIR);
    for dir in [&image_dir, &mask_dir] {
        std::fs::create_dir_all(dir).with_context(|| format!("create '{}'", dir.display()))?;
    }

    let mut archive = CameraArchive::new();
    let mut missing_masks = 0usize;

    for (split, views) in splits.iter().zip(plan) {
        for view in views {
            let i = archive.push(view.pair);
            let image_dst = image_dir.join(format!("{i}.png"));
            std::fs::copy(&view.color, &image_dst).with_context(|| {
                format!("copy '{}' -> '{}'", view.color.display(), image_dst.display())
            })?;

            match &view.alpha {
                Some(alpha) => {
                    let mask_dst = mask_dir.join(format!("{i}.png"));
                    std::fs::copy(alpha, &mask_dst).with_context(|| {
                        format!("copy '{}' -> '{}'", alpha.display(), mask_dst.display())
                    })?;
                }
                None => {
                    tracing::warn!(
                        split = %split.name,
                        view = view.frame,
                        "no alpha image; mask {i} omitted"
                    );
                    missing_masks += 1;
                }
            }
            tracing::info!(
                split = %split.name,
                view = view.frame,
                index = i,
                "normalized '{}'",
                view.key.display()
            );
        }
    }

    archive.write_npz(&result_dir.join(IDR_ARCHIVE))?;

    Ok(NormalizeReport {
        result_dir,
        sphere,
        views: archive.len(),
        missing_masks,
    })
}

/// One view, fully resolved before anything is written.
struct PlannedView {
    frame: usize,
    key: PathBuf,
    color: PathBuf,
    alpha: Option<PathBuf>,
    pair: ProjectionMatrixPair,
}

/// Resolve every frame of a split: view key, color source and camera matrices.
fn plan_split(
    cfg: &NormalizeConfig,
    split: &SplitTransforms,
    sphere: &BoundingSphere,
) -> ViewbakeResult<Vec<PlannedView>> {
    let root = &cfg.source_root;
    let frames = &split.transforms.frames;
    if frames.is_empty() {
        tracing::warn!(split = %split.name, "split has no frames");
        return Ok(Vec::new());
    }
    let (width, height) = match cfg.resolution {
        Some(res) => res,
        None => probe_resolution(root, split)?,
    };
    let intrinsics = split.intrinsics(width, height)?;
    tracing::info!(
        split = %split.name,
        frames = frames.len(),
        focal = intrinsics.focal(),
        "planning split"
    );

    frames
        .iter()
        .enumerate()
        .map(|(frame_index, frame)| {
            let at = |e: ViewbakeError| e.at_view(&split.name, frame_index);

            let key = frame.view_key().map_err(at)?;
            let sources = ViewSources::probe(&root.join(&key));
            let color = sources.color.ok_or_else(|| {
                at(ViewbakeError::config(format!(
                    "missing color image for '{}'",
                    key.display()
                )))
            })?;
            let pair = convert_view(&intrinsics, &frame.pose(), Some(sphere)).map_err(at)?;
            Ok(PlannedView {
                frame: frame_index,
                key,
                color,
                alpha: sources.alpha,
                pair,
            })
        })
        .collect()
}

/// Size of the split's first color image.
fn probe_resolution(root: &Path, split: &SplitTransforms) -> ViewbakeResult<(u32, u32)> {
    let first = split
        .transforms
        .frames
        .first()
        .ok_or_else(|| ViewbakeError::config(format!("split '{}' has no frames", split.name)))?;
    let key = first.view_key().map_err(|e| e.at_view(&split.name, 0))?;
    let color = ViewSources::probe(&root.join(&key)).color.ok_or_else(|| {
        ViewbakeError::config(format!(
            "cannot infer the image size of split '{}': '{}' has no color image",
            split.name,
            key.display()
        ))
    })?;
    let dims = image::image_dimensions(&color)
        .with_context(|| format!("read image size of '{}'", color.display()))?;
    Ok(dims)
}
