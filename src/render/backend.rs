use crate::{
    camera::Intrinsics,
    channel::{ChannelBuffer, ChannelKind},
    foundation::{
        error::{ViewbakeError, ViewbakeResult},
        math::Mat4,
    },
};

/// Everything the renderer needs for one view. Built fresh per view and never mutated.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderRequest {
    /// Frame number handed to the renderer; it may show up as a suffix in output file names.
    pub frame: u64,
    pub cam_to_world: Mat4,
    pub intrinsics: Intrinsics,
    pub clip_start: f32,
    pub clip_end: f32,
    pub transparent_background: bool,
    /// Passes to compute, in canonical channel order.
    pub passes: Vec<ChannelKind>,
}

impl RenderRequest {
    pub fn wants(&self, kind: ChannelKind) -> bool {
        self.passes.contains(&kind)
    }
}

/// Raw per-pass output of one render.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChannelBuffers {
    pub color: Option<ChannelBuffer>,
    pub alpha: Option<ChannelBuffer>,
    pub depth: Option<ChannelBuffer>,
    pub normal: Option<ChannelBuffer>,
}

impl ChannelBuffers {
    pub fn get(&self, kind: ChannelKind) -> Option<&ChannelBuffer> {
        match kind {
            ChannelKind::Color => self.color.as_ref(),
            ChannelKind::Alpha => self.alpha.as_ref(),
            ChannelKind::Depth => self.depth.as_ref(),
            ChannelKind::Normal => self.normal.as_ref(),
        }
    }

    /// Store `buf` in the slot named by its kind, replacing any previous buffer.
    pub fn insert(&mut self, buf: ChannelBuffer) {
        let slot = match buf.kind {
            ChannelKind::Color => &mut self.color,
            ChannelKind::Alpha => &mut self.alpha,
            ChannelKind::Depth => &mut self.depth,
            ChannelKind::Normal => &mut self.normal,
        };
        *slot = Some(buf);
    }

    /// Every requested pass is present at the requested resolution.
    pub fn check_against(&self, req: &RenderRequest) -> ViewbakeResult<()> {
        for &kind in &req.passes {
            let buf = self.get(kind).ok_or_else(|| {
                ViewbakeError::render(format!("renderer returned no {} pass", kind.name()))
            })?;
            if buf.width != req.intrinsics.width || buf.height != req.intrinsics.height {
                return Err(ViewbakeError::render(format!(
                    "{} pass is {}x{}, expected {}x{}",
                    kind.name(),
                    buf.width,
                    buf.height,
                    req.intrinsics.width,
                    req.intrinsics.height
                )));
            }
        }
        Ok(())
    }
}

/// Adapter over an external renderer.
///
/// The adapter owns whatever mutable scene state the renderer needs; `&mut self` keeps a single
/// adapter from rendering two views at once. One call renders every pass of one view.
pub trait Renderer {
    fn render(&mut self, request: &RenderRequest) -> ViewbakeResult<ChannelBuffers>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, request: &RenderRequest) -> ViewbakeResult<ChannelBuffers> {
        (**self).render(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(passes: Vec<ChannelKind>) -> RenderRequest {
        RenderRequest {
            frame: 0,
            cam_to_world: Mat4::identity(),
            intrinsics: Intrinsics::new(0.7, 4, 2).unwrap(),
            clip_start: 0.1,
            clip_end: 100.0,
            transparent_background: true,
            passes,
        }
    }

    #[test]
    fn insert_routes_by_kind() {
        let mut bufs = ChannelBuffers::default();
        bufs.insert(ChannelBuffer::filled(ChannelKind::Depth, 4, 2, 1, 3.0));
        assert!(bufs.get(ChannelKind::Depth).is_some());
        assert!(bufs.get(ChannelKind::Color).is_none());
    }

    #[test]
    fn check_reports_missing_and_mis_sized_passes() {
        let r = req(vec![ChannelKind::Color, ChannelKind::Depth]);
        let mut bufs = ChannelBuffers::default();
        bufs.insert(ChannelBuffer::filled(ChannelKind::Color, 4, 2, 3, 0.0));
        assert!(bufs.check_against(&r).unwrap_err().to_string().contains("depth"));

        bufs.insert(ChannelBuffer::filled(ChannelKind::Depth, 2, 2, 1, 0.0));
        assert!(bufs.check_against(&r).is_err());

        bufs.insert(ChannelBuffer::filled(ChannelKind::Depth, 4, 2, 1, 0.0));
        bufs.check_against(&r).unwrap();
        assert!(r.wants(ChannelKind::Depth));
        assert!(!r.wants(ChannelKind::Normal));
    }
}
