use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    camera::Intrinsics,
    channel::{ChannelKind, ChannelRule, compose},
    config::{FailurePolicy, RenderConfig},
    encode::write_channel,
    foundation::{
        error::{ViewbakeError, ViewbakeResult},
        math::Mat4,
    },
    render::backend::{ChannelBuffers, RenderRequest, Renderer},
};

/// One view to render: its index in the split, its output key and its camera-to-world pose.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewJob {
    pub index: usize,
    /// Relative directory under the output root, e.g. `train/r_0`.
    pub key: PathBuf,
    pub cam_to_world: Mat4,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderReport {
    /// Indices of views whose channels were all written.
    pub rendered: Vec<usize>,
    /// Views that failed under [`FailurePolicy::Skip`], with the reason.
    pub failed: Vec<(usize, String)>,
}

/// Drives the renderer once per view and writes every requested channel.
#[derive(Clone, Debug)]
pub struct ChannelCompositor {
    cfg: RenderConfig,
    rules: Vec<ChannelRule>,
    passes: Vec<ChannelKind>,
    transparent: bool,
}

impl ChannelCompositor {
    pub fn new(cfg: RenderConfig) -> ViewbakeResult<Self> {
        cfg.validate()?;

        let rules: Vec<ChannelRule> = cfg
            .requested()
            .into_iter()
            .filter_map(|k| ChannelRule::resolve(k, &cfg))
            .collect();

        let needs_matte = rules.iter().any(|r| r.requires_alpha);
        let mut passes: Vec<ChannelKind> = rules.iter().map(|r| r.kind).collect();
        if needs_matte && !passes.contains(&ChannelKind::Alpha) {
            passes.push(ChannelKind::Alpha);
            passes.sort();
        }

        // Matte, depth and normal maps are only defined over foreground pixels.
        let forced = needs_matte || rules.iter().any(|r| r.kind != ChannelKind::Color);
        if forced && !cfg.transparent_background {
            tracing::info!("enabling transparent background for matte-dependent channels");
        }
        let transparent = cfg.transparent_background || forced;

        Ok(Self {
            cfg,
            rules,
            passes,
            transparent,
        })
    }

    pub fn rules(&self) -> &[ChannelRule] {
        &self.rules
    }

    pub fn passes(&self) -> &[ChannelKind] {
        &self.passes
    }

    pub fn transparent_background(&self) -> bool {
        self.transparent
    }

    pub fn config(&self) -> &RenderConfig {
        &self.cfg
    }

    pub fn request(&self, intrinsics: &Intrinsics, job: &ViewJob) -> RenderRequest {
        RenderRequest {
            frame: job.index as u64,
            cam_to_world: job.cam_to_world,
            intrinsics: *intrinsics,
            clip_start: self.cfg.clip_start,
            clip_end: self.cfg.clip_end,
            transparent_background: self.transparent,
            passes: self.passes.clone(),
        }
    }

    /// Render every view of one split into `{output_dir}/{view.key}/{channel}.{ext}`.
    ///
    /// Views are rendered in order, one renderer call each, with no retries. Returned buffers must
    /// cover every requested pass at the requested resolution. A failing view never touches
    /// other views' files; its own partial directory is removed. Under
    /// [`FailurePolicy::Halt`] the first failure is returned with the split and view index.
    #[tracing::instrument(skip_all, fields(split = split, views = views.len()))]
    pub fn render_split(
        &self,
        split: &str,
        intrinsics: &Intrinsics,
        views: &[ViewJob],
        output_dir: &Path,
        renderer: &mut dyn Renderer,
    ) -> ViewbakeResult<RenderReport> {
        let mut report = RenderReport::default();
        let total = views.len();

        for job in views {
            let view_dir = output_dir.join(&job.key);
            let request = self.request(intrinsics, job);
            let result = renderer.render(&request).and_then(|buffers| {
                buffers.check_against(&request)?;
                self.write_view(&buffers, &view_dir)
            });

            match result {
                Ok(()) => {
                    tracing::info!(
                        split,
                        view = job.index,
                        total,
                        "rendered '{}'",
                        job.key.display()
                    );
                    report.rendered.push(job.index);
                }
                Err(err) => {
                    if view_dir.exists() {
                        if let Err(e) = std::fs::remove_dir_all(&view_dir) {
                            tracing::warn!(
                                split,
                                view = job.index,
                                "failed to remove partial view '{}': {e}",
                                view_dir.display()
                            );
                        }
                    }
                    match self.cfg.on_failure {
                        FailurePolicy::Halt => return Err(err.at_view(split, job.index)),
                        FailurePolicy::Skip => {
                            tracing::error!(split, view = job.index, "skipping view: {err}");
                            report.failed.push((job.index, err.to_string()));
                        }
                    }
                }
            }
        }

        Ok(report)
    }

    /// Post-process and encode every requested channel of one view.
    pub fn write_view(&self, buffers: &ChannelBuffers, view_dir: &Path) -> ViewbakeResult<()> {
        std::fs::create_dir_all(view_dir)
            .with_context(|| format!("create view directory '{}'", view_dir.display()))?;

        let matte = buffers.get(ChannelKind::Alpha);
        for rule in &self.rules {
            let source = buffers.get(rule.kind).ok_or_else(|| {
                ViewbakeError::render(format!("renderer returned no {} pass", rule.kind.name()))
            })?;
            let img = compose(rule, source, matte)?;
            write_channel(
                &view_dir.join(rule.file_name()),
                &img,
                rule.format,
                self.cfg.png_bit_depth,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelFormat;

    #[test]
    fn color_only_keeps_configured_background() {
        let cfg = RenderConfig {
            alpha: ChannelFormat::None,
            depth: ChannelFormat::None,
            normal: ChannelFormat::None,
            ..RenderConfig::default()
        };
        let c = ChannelCompositor::new(cfg).unwrap();
        assert!(!c.transparent_background());
        assert_eq!(c.passes(), [ChannelKind::Color]);
    }

    #[test]
    fn matte_pass_is_added_for_dependent_channels() {
        let cfg = RenderConfig {
            color: ChannelFormat::None,
            alpha: ChannelFormat::None,
            depth: ChannelFormat::Exr,
            normal: ChannelFormat::None,
            ..RenderConfig::default()
        };
        let c = ChannelCompositor::new(cfg).unwrap();
        assert!(c.transparent_background());
        assert_eq!(c.passes(), [ChannelKind::Alpha, ChannelKind::Depth]);
        // The matte is rendered but not written.
        assert_eq!(c.rules().len(), 1);
        let written: Vec<ChannelKind> = c.rules().iter().map(|r| r.kind).collect();
        assert_eq!(written, c.config().requested());
    }

    #[test]
    fn rgba_color_forces_transparency() {
        let cfg = RenderConfig {
            color_rgba: true,
            alpha: ChannelFormat::None,
            depth: ChannelFormat::None,
            normal: ChannelFormat::None,
            ..RenderConfig::default()
        };
        let c = ChannelCompositor::new(cfg).unwrap();
        assert!(c.transparent_background());
        assert_eq!(c.passes(), [ChannelKind::Color, ChannelKind::Alpha]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = RenderConfig {
            depth_min: 1.0,
            depth_max: 1.0,
            ..RenderConfig::default()
        };
        assert!(ChannelCompositor::new(cfg).is_err());
    }
}
