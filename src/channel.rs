//! Channel buffers and the per-channel post-processing table.
//!
//! Every rendered channel goes through one [`ChannelRule`] before encoding. Rules come from a
//! static table keyed by `(ChannelKind, ChannelFormat)`; the few fields that depend on the render
//! configuration (color/alpha packing, depth range) are resolved against a [`RenderConfig`].

use crate::{
    config::{ChannelFormat, RenderConfig},
    foundation::error::{ViewbakeError, ViewbakeResult},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelKind {
    Color,
    Alpha,
    Depth,
    Normal,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::Color,
        ChannelKind::Alpha,
        ChannelKind::Depth,
        ChannelKind::Normal,
    ];

    /// File stem used in every layout (`color.png`, `{view}_depth.png`, ...).
    pub fn name(self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Alpha => "alpha",
            Self::Depth => "depth",
            Self::Normal => "normal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// Raw renderer output for one channel: `f32`, row-major, `components` values per pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelBuffer {
    pub kind: ChannelKind,
    pub width: u32,
    pub height: u32,
    pub components: usize,
    pub data: Vec<f32>,
}

impl ChannelBuffer {
    pub fn new(
        kind: ChannelKind,
        width: u32,
        height: u32,
        components: usize,
        data: Vec<f32>,
    ) -> ViewbakeResult<Self> {
        if !(1..=4).contains(&components) {
            return Err(ViewbakeError::render(format!(
                "{} buffer must have 1-4 components (got {components})",
                kind.name()
            )));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(components))
            .ok_or_else(|| ViewbakeError::render("channel buffer size overflow"))?;
        if data.len() != expected {
            return Err(ViewbakeError::render(format!(
                "{} buffer has {} values, expected {width}x{height}x{components}",
                kind.name(),
                data.len()
            )));
        }
        Ok(Self {
            kind,
            width,
            height,
            components,
            data,
        })
    }

    /// A buffer with every component of every pixel set to `value`.
    pub fn filled(
        kind: ChannelKind,
        width: u32,
        height: u32,
        components: usize,
        value: f32,
    ) -> Self {
        Self {
            kind,
            width,
            height,
            components,
            data: vec![value; width as usize * height as usize * components],
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn pixel(&self, index: usize) -> &[f32] {
        let start = index * self.components;
        &self.data[start..start + self.components]
    }
}

/// Value transform applied to the color components of a channel before encoding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Remap {
    Identity,
    /// Linear map of `[min, max]` onto `[0, 1]`; values outside the range clip to the ends.
    Range { min: f32, max: f32 },
    /// `scale * x + offset`.
    Affine { scale: f32, offset: f32 },
}

impl Remap {
    pub fn apply(self, v: f32) -> f32 {
        match self {
            Self::Identity => v,
            Self::Range { min, max } => ((v - min) / (max - min)).clamp(0.0, 1.0),
            Self::Affine { scale, offset } => scale * v + offset,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Gray,
    Rgb,
    Rgba,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum RemapSpec {
    Identity,
    DepthRange,
    Affine { scale: f32, offset: f32 },
}

#[derive(Clone, Copy, Debug)]
enum LayoutSpec {
    Fixed(PixelLayout),
    /// RGBA when `color_rgba` is set, RGB otherwise.
    ColorToggle,
    /// RGB + A when `alpha_rgba` is set, gray otherwise.
    AlphaToggle,
}

#[derive(Clone, Copy, Debug)]
struct RuleTemplate {
    attach_alpha: bool,
    remap: RemapSpec,
    layout: LayoutSpec,
}

const fn tpl(attach_alpha: bool, remap: RemapSpec, layout: LayoutSpec) -> RuleTemplate {
    RuleTemplate {
        attach_alpha,
        remap,
        layout,
    }
}

const NORMAL_TO_UNIT: RemapSpec = RemapSpec::Affine {
    scale: 0.5,
    offset: 0.5,
};

#[rustfmt::skip]
const RULES: &[(ChannelKind, ChannelFormat, RuleTemplate)] = &[
    (ChannelKind::Color,  ChannelFormat::Exr, tpl(false, RemapSpec::Identity,   LayoutSpec::ColorToggle)),
    (ChannelKind::Color,  ChannelFormat::Png, tpl(false, RemapSpec::Identity,   LayoutSpec::ColorToggle)),
    (ChannelKind::Alpha,  ChannelFormat::Exr, tpl(true,  RemapSpec::Identity,   LayoutSpec::AlphaToggle)),
    (ChannelKind::Alpha,  ChannelFormat::Png, tpl(true,  RemapSpec::Identity,   LayoutSpec::AlphaToggle)),
    (ChannelKind::Depth,  ChannelFormat::Exr, tpl(true,  RemapSpec::Identity,   LayoutSpec::Fixed(PixelLayout::Rgba))),
    (ChannelKind::Depth,  ChannelFormat::Png, tpl(false, RemapSpec::DepthRange, LayoutSpec::Fixed(PixelLayout::Gray))),
    (ChannelKind::Normal, ChannelFormat::Exr, tpl(false, RemapSpec::Identity,   LayoutSpec::Fixed(PixelLayout::Rgb))),
    (ChannelKind::Normal, ChannelFormat::Png, tpl(true,  NORMAL_TO_UNIT,        LayoutSpec::Fixed(PixelLayout::Rgba))),
];

/// Fully resolved post-processing rule for one channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelRule {
    pub kind: ChannelKind,
    pub format: ChannelFormat,
    /// Alpha of the output comes from the matte pass.
    pub requires_alpha: bool,
    pub remap: Remap,
    pub layout: PixelLayout,
}

impl ChannelRule {
    /// `None` when the channel is disabled (`ChannelFormat::None`).
    pub fn resolve(kind: ChannelKind, cfg: &RenderConfig) -> Option<Self> {
        let format = cfg.format(kind);
        let (_, _, t) = RULES.iter().find(|(k, f, _)| *k == kind && *f == format)?;

        let layout = match t.layout {
            LayoutSpec::Fixed(l) => l,
            LayoutSpec::ColorToggle if cfg.color_rgba => PixelLayout::Rgba,
            LayoutSpec::ColorToggle => PixelLayout::Rgb,
            LayoutSpec::AlphaToggle if cfg.alpha_rgba => PixelLayout::Rgba,
            LayoutSpec::AlphaToggle => PixelLayout::Gray,
        };
        let remap = match t.remap {
            RemapSpec::Identity => Remap::Identity,
            RemapSpec::DepthRange => Remap::Range {
                min: cfg.depth_min,
                max: cfg.depth_max,
            },
            RemapSpec::Affine { scale, offset } => Remap::Affine { scale, offset },
        };
        let requires_alpha = t.attach_alpha || (kind == ChannelKind::Color && cfg.color_rgba);

        Some(Self {
            kind,
            format,
            requires_alpha,
            remap,
            layout,
        })
    }

    /// File name inside a view directory, e.g. `depth.exr`.
    pub fn file_name(&self) -> String {
        let ext = self.format.extension().unwrap_or("bin");
        format!("{}.{ext}", self.kind.name())
    }
}

/// Post-processed pixels, ready for encoding. Values are `f32` in the rule's layout.
#[derive(Clone, Debug, PartialEq)]
pub struct ComposedImage {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Vec<f32>,
}

/// Apply `rule` to `source`, taking the output alpha from `alpha` when the rule asks for it.
pub fn compose(
    rule: &ChannelRule,
    source: &ChannelBuffer,
    alpha: Option<&ChannelBuffer>,
) -> ViewbakeResult<ComposedImage> {
    let alpha = if rule.requires_alpha {
        let a = alpha.ok_or_else(|| {
            ViewbakeError::render(format!(
                "{} channel needs the matte pass, but the renderer returned none",
                rule.kind.name()
            ))
        })?;
        if a.width != source.width || a.height != source.height {
            return Err(ViewbakeError::render(format!(
                "matte is {}x{} but {} is {}x{}",
                a.width,
                a.height,
                rule.kind.name(),
                source.width,
                source.height
            )));
        }
        Some(a)
    } else {
        None
    };

    let out_ch = rule.layout.channels();
    let mut data = Vec::with_capacity(source.pixel_count() * out_ch);

    for i in 0..source.pixel_count() {
        let px = source.pixel(i);
        let value = |c: usize| rule.remap.apply(px[c.min(px.len() - 1)]);
        match rule.layout {
            PixelLayout::Gray => data.push(value(0)),
            PixelLayout::Rgb | PixelLayout::Rgba => {
                if px.len() >= 3 {
                    data.extend([value(0), value(1), value(2)]);
                } else {
                    let v = value(0);
                    data.extend([v, v, v]);
                }
            }
        }
        if rule.layout == PixelLayout::Rgba {
            let a = match alpha {
                Some(a) => a.pixel(i)[0],
                None if px.len() == 4 => px[3],
                None => 1.0,
            };
            data.push(a);
        }
    }

    Ok(ComposedImage {
        width: source.width,
        height: source.height,
        layout: rule.layout,
        data,
    })
}
