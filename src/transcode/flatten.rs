use std::path::{Path, PathBuf};

use anyhow::Context as _;
use image::{DynamicImage, ImageBuffer, ImageFormat};

use crate::{
    channel::ChannelKind,
    config::FlattenConfig,
    dataset::{
        layout::{
            FLAT_SUFFIX, ViewSources, flat_file_name, list_view_dirs, prepare_result_dir,
            sibling_result_dir,
        },
        transforms::{SplitTransforms, discover_splits, transforms_file_name},
    },
    foundation::error::{ViewbakeError, ViewbakeResult},
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlattenReport {
    pub result_dir: PathBuf,
    pub splits: usize,
    pub views: usize,
    /// Views whose color image received the external alpha.
    pub merged: usize,
}

/// Per-view dataset -> flattened `{name}_blender` dataset.
///
/// Views are the sub-directories of each split directory, in name order.
#[tracing::instrument(skip_all, fields(source = %cfg.source_root.display()))]
pub fn flatten(cfg: &FlattenConfig) -> ViewbakeResult<FlattenReport> {
    let root = &cfg.source_root;
    if !root.is_dir() {
        return Err(ViewbakeError::config(format!(
            "source dataset '{}' does not exist",
            root.display()
        )));
    }
    let splits = discover_splits(root, None)?;
    let plan = splits
        .iter()
        .map(|s| list_view_dirs(&root.join(&s.name)).map(|views| (s, views)))
        .collect::<ViewbakeResult<Vec<(&SplitTransforms, Vec<String>)>>>()?;

    let result_dir = sibling_result_dir(root, FLAT_SUFFIX)?;
    prepare_result_dir(&result_dir)?;

    let mut report = FlattenReport {
        result_dir: result_dir.clone(),
        ..FlattenReport::default()
    };

    for (split, views) in plan {
        tracing::info!(split = %split.name, views = views.len(), "flattening split");
        let out_dir = result_dir.join(&split.name);
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("create '{}'", out_dir.display()))?;

        for (index, view) in views.iter().enumerate() {
            let view_dir = root.join(&split.name).join(view);
            let merged = flatten_view(&view_dir, view, &out_dir)
                .map_err(|e| e.at_view(&split.name, index))?;
            if merged {
                report.merged += 1;
            }
            report.views += 1;
            tracing::info!(split = %split.name, view = index, merged, "flattened '{view}'");
        }

        let json_name = transforms_file_name(&split.name);
        copy_file(&split.path, &out_dir.join(&json_name))?;
        report.splits += 1;
    }

    Ok(report)
}

/// Returns whether the color image was merged with an external alpha.
fn flatten_view(view_dir: &Path, view: &str, out_dir: &Path) -> ViewbakeResult<bool> {
    let sources = ViewSources::probe(view_dir);
    let mut merged = false;

    match (&sources.color, &sources.alpha) {
        (Some(color), Some(alpha)) => {
            let out = merge_color_alpha(color, alpha)?;
            let dst = out_dir.join(flat_file_name(view, ChannelKind::Color));
            out.save_with_format(&dst, ImageFormat::Png)
                .with_context(|| format!("write '{}'", dst.display()))?;
            merged = true;
        }
        (Some(color), None) => {
            copy_file(color, &out_dir.join(flat_file_name(view, ChannelKind::Color)))?;
        }
        (None, _) => {
            tracing::debug!("view '{view}' has no color image");
        }
    }

    for kind in [ChannelKind::Normal, ChannelKind::Depth, ChannelKind::Alpha] {
        match sources.get(kind) {
            Some(src) => copy_file(src, &out_dir.join(flat_file_name(view, kind)))?,
            None => tracing::debug!("view '{view}' has no {} image", kind.name()),
        }
    }

    Ok(merged)
}

fn copy_file(src: &Path, dst: &Path) -> ViewbakeResult<()> {
    std::fs::copy(src, dst)
        .with_context(|| format!("copy '{}' -> '{}'", src.display(), dst.display()))?;
    Ok(())
}

fn is_wide(img: &DynamicImage) -> bool {
    let c = img.color();
    c.bytes_per_pixel() / c.channel_count() > 1
}

/// Replace the color image's alpha (if any) with the last channel of the alpha image.
///
/// The result is RGBA8, or RGBA16 when either input has more than 8 bits per channel.
pub fn merge_color_alpha(color_path: &Path, alpha_path: &Path) -> ViewbakeResult<DynamicImage> {
    let color =
        image::open(color_path).with_context(|| format!("decode '{}'", color_path.display()))?;
    let alpha =
        image::open(alpha_path).with_context(|| format!("decode '{}'", alpha_path.display()))?;

    if color.width() != alpha.width() || color.height() != alpha.height() {
        return Err(ViewbakeError::config(format!(
            "color is {}x{} but alpha is {}x{}",
            color.width(),
            color.height(),
            alpha.width(),
            alpha.height()
        )));
    }
    let (w, h) = (color.width(), color.height());
    let size_error = || ViewbakeError::render("merged image size mismatch (unexpected)");

    if is_wide(&color) || is_wide(&alpha) {
        let a = last_channel_16(&alpha);
        let data: Vec<u16> = color
            .to_rgb16()
            .pixels()
            .zip(a)
            .flat_map(|(p, a)| [p[0], p[1], p[2], a])
            .collect();
        let buf = ImageBuffer::from_raw(w, h, data).ok_or_else(size_error)?;
        Ok(DynamicImage::ImageRgba16(buf))
    } else {
        let a = last_channel_8(&alpha);
        let data: Vec<u8> = color
            .to_rgb8()
            .pixels()
            .zip(a)
            .flat_map(|(p, a)| [p[0], p[1], p[2], a])
            .collect();
        let buf = ImageBuffer::from_raw(w, h, data).ok_or_else(size_error)?;
        Ok(DynamicImage::ImageRgba8(buf))
    }
}

fn last_channel_8(img: &DynamicImage) -> Vec<u8> {
    let c = img.color();
    if c.has_alpha() {
        img.to_rgba8().pixels().map(|p| p[3]).collect()
    } else if c.has_color() {
        img.to_rgb8().pixels().map(|p| p[2]).collect()
    } else {
        img.to_luma8().into_raw()
    }
}

fn last_channel_16(img: &DynamicImage) -> Vec<u16> {
    let c = img.color();
    if c.has_alpha() {
        img.to_rgba16().pixels().map(|p| p[3]).collect()
    } else if c.has_color() {
        img.to_rgb16().pixels().map(|p| p[2]).collect()
    } else {
        img.to_luma16().into_raw()
    }
}
