//! On-disk naming of the three dataset layouts.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    channel::ChannelKind,
    foundation::error::{ViewbakeError, ViewbakeResult},
};

/// Suffix of the flattened layout's root directory.
pub const FLAT_SUFFIX: &str = "_blender";
/// Suffix of the sphere-normalized layout's root directory.
pub const IDR_SUFFIX: &str = "_idr";
pub const IDR_IMAGE_DIR: &str = "image";
pub const IDR_MASK_DIR: &str = "mask";
pub const IDR_ARCHIVE: &str = "camera_sphere.npz";

/// Sibling of `source_root` named `{source name}{suffix}`.
pub fn sibling_result_dir(source_root: &Path, suffix: &str) -> ViewbakeResult<PathBuf> {
    let name = source_root
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            ViewbakeError::config(format!(
                "cannot derive a dataset name from '{}'",
                source_root.display()
            ))
        })?;
    let parent = source_root.parent().unwrap_or_else(|| Path::new(""));
    Ok(parent.join(format!("{name}{suffix}")))
}

/// Delete `dir` if it exists, then create it empty.
///
/// Not atomic: concurrent runs on the same path clobber each other.
pub fn prepare_result_dir(dir: &Path) -> ViewbakeResult<()> {
    if dir.exists() {
        tracing::warn!("result directory '{}' already exists, removing", dir.display());
        std::fs::remove_dir_all(dir)
            .with_context(|| format!("remove existing result directory '{}'", dir.display()))?;
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create result directory '{}'", dir.display()))?;
    Ok(())
}

/// Channel files of one per-view source directory. Presence is probed on disk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewSources {
    pub color: Option<PathBuf>,
    pub alpha: Option<PathBuf>,
    pub depth: Option<PathBuf>,
    pub normal: Option<PathBuf>,
}

impl ViewSources {
    pub fn probe(view_dir: &Path) -> Self {
        let find = |kind: ChannelKind| {
            let p = source_channel_path(view_dir, kind);
            p.is_file().then_some(p)
        };
        Self {
            color: find(ChannelKind::Color),
            alpha: find(ChannelKind::Alpha),
            depth: find(ChannelKind::Depth),
            normal: find(ChannelKind::Normal),
        }
    }

    pub fn get(&self, kind: ChannelKind) -> Option<&Path> {
        match kind {
            ChannelKind::Color => self.color.as_deref(),
            ChannelKind::Alpha => self.alpha.as_deref(),
            ChannelKind::Depth => self.depth.as_deref(),
            ChannelKind::Normal => self.normal.as_deref(),
        }
    }
}

/// `{view_dir}/{channel}.png`
pub fn source_channel_path(view_dir: &Path, kind: ChannelKind) -> PathBuf {
    view_dir.join(format!("{}.png", kind.name()))
}

/// Flattened name of a view's channel: color is `{view}.png`, the rest are `{view}_{channel}.png`.
pub fn flat_file_name(view: &str, kind: ChannelKind) -> String {
    match kind {
        ChannelKind::Color => format!("{view}.png"),
        other => format!("{view}_{}.png", other.name()),
    }
}

/// Sorted names of the view directories under `split_dir`.
pub fn list_view_dirs(split_dir: &Path) -> ViewbakeResult<Vec<String>> {
    if !split_dir.is_dir() {
        return Err(ViewbakeError::config(format!(
            "split directory '{}' does not exist",
            split_dir.display()
        )));
    }
    let mut views = Vec::new();
    for entry in
        std::fs::read_dir(split_dir).with_context(|| format!("list '{}'", split_dir.display()))?
    {
        let entry = entry.with_context(|| format!("list '{}'", split_dir.display()))?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            views.push(name.to_string());
        }
    }
    views.sort();
    Ok(views)
}
