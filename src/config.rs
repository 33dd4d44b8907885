use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    channel::ChannelKind,
    foundation::error::{ViewbakeError, ViewbakeResult},
};

/// On-disk encoding of one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelFormat {
    /// Linear 32-bit float OpenEXR.
    Exr,
    /// Quantized PNG at [`RenderConfig::png_bit_depth`].
    Png,
    /// Channel is not produced.
    None,
}

impl ChannelFormat {
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::Exr => Some("exr"),
            Self::Png => Some("png"),
            Self::None => None,
        }
    }
}

impl std::str::FromStr for ChannelFormat {
    type Err = ViewbakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exr" => Ok(Self::Exr),
            "png" => Ok(Self::Png),
            "none" => Ok(Self::None),
            other => Err(ViewbakeError::config(format!(
                "unknown channel format '{other}' (expected exr, png or none)"
            ))),
        }
    }
}

/// What the compositor does when the renderer fails on one view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the run and report the failing view.
    #[default]
    Halt,
    /// Record the failing view and continue with the next one.
    Skip,
}

/// Render-source configuration, passed by value into the compositor.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    /// Transparent film for color-only renders. Forced on when any other channel is requested.
    pub transparent_background: bool,
    pub color: ChannelFormat,
    pub alpha: ChannelFormat,
    pub depth: ChannelFormat,
    pub normal: ChannelFormat,
    /// Write color as RGBA with the matte in the alpha channel.
    pub color_rgba: bool,
    /// Re-pack the matte into RGB + A instead of a single gray channel.
    pub alpha_rgba: bool,
    /// Depth mapped to 0 for quantized output. Smaller values clip.
    pub depth_min: f32,
    /// Depth mapped to the maximum code for quantized output. Larger values clip.
    pub depth_max: f32,
    /// 8 or 16.
    pub png_bit_depth: u8,
    pub clip_start: f32,
    pub clip_end: f32,
    pub on_failure: FailurePolicy,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 800,
            transparent_background: false,
            color: ChannelFormat::Png,
            alpha: ChannelFormat::Png,
            depth: ChannelFormat::Exr,
            normal: ChannelFormat::Png,
            color_rgba: false,
            alpha_rgba: true,
            depth_min: 0.0,
            depth_max: 10.0,
            png_bit_depth: 8,
            clip_start: 0.1,
            clip_end: 100.0,
            on_failure: FailurePolicy::Halt,
        }
    }
}

impl RenderConfig {
    pub fn from_json_file(path: &Path) -> ViewbakeResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read render config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_slice(&bytes).map_err(|e| {
            ViewbakeError::serde(format!("parse render config '{}': {e}", path.display()))
        })?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ViewbakeResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ViewbakeError::config("render width/height must be non-zero"));
        }
        if !(self.depth_min.is_finite() && self.depth_max.is_finite())
            || self.depth_max <= self.depth_min
        {
            return Err(ViewbakeError::config(format!(
                "depth range must satisfy depth_min < depth_max (got {}..{})",
                self.depth_min, self.depth_max
            )));
        }
        if self.png_bit_depth != 8 && self.png_bit_depth != 16 {
            return Err(ViewbakeError::config(format!(
                "png bit depth must be 8 or 16 (got {})",
                self.png_bit_depth
            )));
        }
        if !(self.clip_start > 0.0 && self.clip_end > self.clip_start) {
            return Err(ViewbakeError::config(
                "clip range must satisfy 0 < clip_start < clip_end",
            ));
        }
        if ChannelKind::ALL
            .iter()
            .all(|&k| self.format(k) == ChannelFormat::None)
        {
            return Err(ViewbakeError::config(
                "at least one channel must have a format other than 'none'",
            ));
        }
        Ok(())
    }

    pub fn format(&self, kind: ChannelKind) -> ChannelFormat {
        match kind {
            ChannelKind::Color => self.color,
            ChannelKind::Alpha => self.alpha,
            ChannelKind::Depth => self.depth,
            ChannelKind::Normal => self.normal,
        }
    }

    /// Channels that will be written, in canonical order.
    pub fn requested(&self) -> Vec<ChannelKind> {
        ChannelKind::ALL
            .iter()
            .copied()
            .filter(|&k| self.format(k) != ChannelFormat::None)
            .collect()
    }
}

/// Inputs of a split-flattening run.
#[derive(Clone, Debug)]
pub struct FlattenConfig {
    /// Root of the per-view source dataset.
    pub source_root: PathBuf,
}

/// Inputs of a geometry-normalization run.
#[derive(Clone, Debug)]
pub struct NormalizeConfig {
    pub source_root: PathBuf,
    pub scene_path: PathBuf,
    /// Image size used for the intrinsics. Probed from each split's first color image when unset.
    pub resolution: Option<(u32, u32)>,
    /// Explicit split order. All discovered splits, sorted by name, when unset.
    pub splits: Option<Vec<String>>,
}

/// Inputs of a render-source generation run.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Directory holding the `transforms_{split}.json` files.
    pub cam_dir: PathBuf,
    pub output_dir: PathBuf,
    pub scene_path: PathBuf,
    pub render: RenderConfig,
    pub splits: Option<Vec<String>>,
}
