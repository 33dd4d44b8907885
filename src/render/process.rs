use std::{
    io::Write as _,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use anyhow::Context as _;

use crate::{
    channel::{ChannelBuffer, ChannelKind},
    foundation::{
        error::{ViewbakeError, ViewbakeResult},
        math::mat4_to_rows,
    },
    render::{
        backend::{ChannelBuffers, RenderRequest, Renderer},
        naming::normalize_frame_outputs,
    },
};

/// Request document written to the renderer's stdin.
#[derive(Debug, serde::Serialize)]
struct RequestPayload<'a> {
    scene: &'a Path,
    frame: u64,
    width: u32,
    height: u32,
    camera_angle_x: f32,
    clip_start: f32,
    clip_end: f32,
    transform_matrix: [[f32; 4]; 4],
    film_transparent: bool,
    passes: Vec<&'static str>,
    output_dir: &'a Path,
}

/// Runs an external renderer command once per view.
///
/// The command receives a JSON request on stdin and writes `{pass}{frame:04}.exr` files into the
/// request's `output_dir`: `color` as RGBA with the matte in A, `depth` with z in R, `normal` as
/// RGB. A non-zero exit status fails the view.
pub struct ProcessRenderer {
    program: PathBuf,
    args: Vec<String>,
    scene: PathBuf,
    scratch_dir: PathBuf,
}

impl ProcessRenderer {
    pub fn new(
        program: impl Into<PathBuf>,
        args: Vec<String>,
        scene: impl Into<PathBuf>,
        scratch_dir: impl Into<PathBuf>,
    ) -> ViewbakeResult<Self> {
        let scene = scene.into();
        if !scene.is_file() {
            return Err(ViewbakeError::config(format!(
                "scene file '{}' does not exist",
                scene.display()
            )));
        }
        Ok(Self {
            program: program.into(),
            args,
            scene,
            scratch_dir: scratch_dir.into(),
        })
    }

    fn reset_scratch(&self) -> ViewbakeResult<()> {
        if self.scratch_dir.exists() {
            std::fs::remove_dir_all(&self.scratch_dir).with_context(|| {
                format!("clear scratch directory '{}'", self.scratch_dir.display())
            })?;
        }
        std::fs::create_dir_all(&self.scratch_dir).with_context(|| {
            format!("create scratch directory '{}'", self.scratch_dir.display())
        })?;
        Ok(())
    }

    fn run(&self, request: &RenderRequest) -> ViewbakeResult<()> {
        // The matte travels in the color pass's alpha channel.
        let mut passes = Vec::new();
        if request.wants(ChannelKind::Color) || request.wants(ChannelKind::Alpha) {
            passes.push(ChannelKind::Color.name());
        }
        for kind in [ChannelKind::Depth, ChannelKind::Normal] {
            if request.wants(kind) {
                passes.push(kind.name());
            }
        }

        let payload = RequestPayload {
            scene: &self.scene,
            frame: request.frame,
            width: request.intrinsics.width,
            height: request.intrinsics.height,
            camera_angle_x: request.intrinsics.fov_x,
            clip_start: request.clip_start,
            clip_end: request.clip_end,
            transform_matrix: mat4_to_rows(&request.cam_to_world),
            film_transparent: request.transparent_background,
            passes,
            output_dir: &self.scratch_dir,
        };
        let body = serde_json::to_vec(&payload)
            .map_err(|e| ViewbakeError::serde(format!("encode render request: {e}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ViewbakeError::render(format!(
                    "failed to spawn renderer '{}': {e}",
                    self.program.display()
                ))
            })?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| ViewbakeError::render("failed to open renderer stdin"))?;
            stdin.write_all(&body).map_err(|e| {
                ViewbakeError::render(format!("failed to write request to renderer: {e}"))
            })?;
        }

        let output = child.wait_with_output().map_err(|e| {
            ViewbakeError::render(format!("failed to wait for renderer: {e}"))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ViewbakeError::render(format!(
                "renderer exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl Renderer for ProcessRenderer {
    #[tracing::instrument(skip_all, fields(frame = request.frame))]
    fn render(&mut self, request: &RenderRequest) -> ViewbakeResult<ChannelBuffers> {
        self.reset_scratch()?;
        self.run(request)?;

        let files = normalize_frame_outputs(&self.scratch_dir, request.frame)?;
        let mut buffers = ChannelBuffers::default();
        for (kind, path) in files {
            match kind {
                ChannelKind::Color => {
                    let (rgb, matte) = load_color(&path)?;
                    if request.wants(ChannelKind::Color) {
                        buffers.insert(rgb);
                    }
                    if request.wants(ChannelKind::Alpha) {
                        buffers.insert(matte);
                    }
                }
                ChannelKind::Depth if request.wants(kind) => {
                    buffers.insert(load_components(&path, kind, 1)?);
                }
                ChannelKind::Normal if request.wants(kind) => {
                    buffers.insert(load_components(&path, kind, 3)?);
                }
                _ => {}
            }
        }
        buffers.check_against(request)?;
        Ok(buffers)
    }
}

impl Drop for ProcessRenderer {
    fn drop(&mut self) {
        if self.scratch_dir.exists() {
            let _ = std::fs::remove_dir_all(&self.scratch_dir);
        }
    }
}

fn read_rgba32f(path: &Path) -> ViewbakeResult<image::Rgba32FImage> {
    let img = image::open(path).with_context(|| format!("decode '{}'", path.display()))?;
    Ok(img.into_rgba32f())
}

/// First `components` channels of every pixel.
fn load_components(
    path: &Path,
    kind: ChannelKind,
    components: usize,
) -> ViewbakeResult<ChannelBuffer> {
    let img = read_rgba32f(path)?;
    let (w, h) = img.dimensions();
    let data = img
        .pixels()
        .flat_map(|p| p.0.into_iter().take(components))
        .collect();
    ChannelBuffer::new(kind, w, h, components, data)
}

/// Split an RGBA color pass into its RGB color and its matte.
fn load_color(path: &Path) -> ViewbakeResult<(ChannelBuffer, ChannelBuffer)> {
    let img = read_rgba32f(path)?;
    let (w, h) = img.dimensions();
    let mut rgb = Vec::with_capacity(w as usize * h as usize * 3);
    let mut matte = Vec::with_capacity(w as usize * h as usize);
    for p in img.pixels() {
        let [r, g, b, a] = p.0;
        rgb.extend([r, g, b]);
        matte.push(a);
    }
    Ok((
        ChannelBuffer::new(ChannelKind::Color, w, h, 3, rgb)?,
        ChannelBuffer::new(ChannelKind::Alpha, w, h, 1, matte)?,
    ))
}
