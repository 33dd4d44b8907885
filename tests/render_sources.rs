use std::path::{Path, PathBuf};

use viewbake::{
    ChannelBuffer, ChannelBuffers, ChannelFormat, ChannelKind, FailurePolicy, RenderConfig,
    RenderRequest, Renderer, SourceConfig, ViewbakeError, ViewbakeResult, render_sources,
};

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "viewbake_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

/// Produces fixed 2x1 passes: gray color, full matte, depth 4 and 7, normal +Z.
#[derive(Default)]
struct ScriptedRenderer {
    requests: Vec<RenderRequest>,
    fail_frame: Option<u64>,
    /// Frame answered with 1x1 buffers regardless of the requested size.
    undersized_frame: Option<u64>,
    /// Directory created while rendering, to make a later channel write fail.
    obstacle: Option<(u64, PathBuf)>,
}

impl Renderer for ScriptedRenderer {
    fn render(&mut self, request: &RenderRequest) -> ViewbakeResult<ChannelBuffers> {
        self.requests.push(request.clone());
        if self.fail_frame == Some(request.frame) {
            return Err(ViewbakeError::render("scripted failure"));
        }
        if let Some((frame, path)) = &self.obstacle {
            if *frame == request.frame {
                std::fs::create_dir_all(path).unwrap();
            }
        }
        if self.undersized_frame == Some(request.frame) {
            let mut out = ChannelBuffers::default();
            for &kind in &request.passes {
                let channels = if kind == ChannelKind::Alpha || kind == ChannelKind::Depth {
                    1
                } else {
                    3
                };
                out.insert(ChannelBuffer::filled(kind, 1, 1, channels, 0.5));
            }
            return Ok(out);
        }

        let (w, h) = (request.intrinsics.width, request.intrinsics.height);
        let mut out = ChannelBuffers::default();
        for &kind in &request.passes {
            let buf = match kind {
                ChannelKind::Color => ChannelBuffer::filled(kind, w, h, 3, 0.5),
                ChannelKind::Alpha => ChannelBuffer::filled(kind, w, h, 1, 1.0),
                ChannelKind::Depth => ChannelBuffer::new(kind, w, h, 1, vec![4.0, 7.0])?,
                ChannelKind::Normal => {
                    ChannelBuffer::new(kind, w, h, 3, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0])?
                }
            };
            out.insert(buf);
        }
        Ok(out)
    }
}

fn write_cameras(cam_dir: &Path, frames: usize) {
    std::fs::create_dir_all(cam_dir).unwrap();
    let frames: Vec<_> = (0..frames)
        .map(|i| {
            serde_json::json!({
                "file_path": format!("./train/r_{i}"),
                "transform_matrix": [
                    [1.0, 0.0, 0.0, 0.0],
                    [0.0, 1.0, 0.0, 0.0],
                    [0.0, 0.0, 1.0, 4.0 + i as f32],
                    [0.0, 0.0, 0.0, 1.0]
                ]
            })
        })
        .collect();
    let doc = serde_json::json!({ "camera_angle_x": 0.69, "frames": frames });
    std::fs::write(
        cam_dir.join("transforms_train.json"),
        serde_json::to_vec(&doc).unwrap(),
    )
    .unwrap();
}

fn source_config(tmp: &Path, frames: usize, render: RenderConfig) -> SourceConfig {
    let cam_dir = tmp.join("cams");
    write_cameras(&cam_dir, frames);
    let scene = tmp.join("scene.obj");
    std::fs::write(&scene, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
    SourceConfig {
        cam_dir,
        output_dir: tmp.join("out"),
        scene_path: scene,
        render,
        splits: None,
    }
}

fn small_config() -> RenderConfig {
    RenderConfig {
        width: 2,
        height: 1,
        depth: ChannelFormat::Png,
        depth_min: 2.0,
        depth_max: 6.0,
        ..RenderConfig::default()
    }
}

#[test]
fn every_channel_lands_under_canonical_names() {
    let tmp = temp_dir("sources_channels");
    let cfg = source_config(&tmp, 1, small_config());
    let mut renderer = ScriptedRenderer::default();

    let report = render_sources(&cfg, &mut renderer).unwrap();
    assert_eq!(report.rendered(), 1);
    assert_eq!(report.failed(), 0);

    let view = cfg.output_dir.join("train/r_0");
    let mut names: Vec<String> = std::fs::read_dir(&view)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, ["alpha.png", "color.png", "depth.png", "normal.png"]);
    assert!(cfg.output_dir.join("transforms_train.json").is_file());

    let color = image::open(view.join("color.png")).unwrap();
    assert_eq!(color.as_rgb8().unwrap().get_pixel(0, 0).0, [128, 128, 128]);

    let alpha = image::open(view.join("alpha.png")).unwrap();
    assert_eq!(alpha.as_rgba8().unwrap().get_pixel(0, 0).0, [255, 255, 255, 255]);

    // Depth 4 in [2, 6] is the midpoint; 7 clips to the top code.
    let depth = image::open(view.join("depth.png")).unwrap();
    assert_eq!(depth.as_luma8().unwrap().as_raw(), &vec![128u8, 255]);

    let normal = image::open(view.join("normal.png")).unwrap();
    assert_eq!(normal.as_rgba8().unwrap().get_pixel(1, 0).0, [128, 128, 255, 255]);

    let req = &renderer.requests[0];
    assert!(req.transparent_background);
    assert_eq!(
        req.passes,
        [ChannelKind::Color, ChannelKind::Alpha, ChannelKind::Depth, ChannelKind::Normal]
    );
    assert_eq!((req.intrinsics.width, req.intrinsics.height), (2, 1));

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn sixteen_bit_depth_uses_full_code_range() {
    let tmp = temp_dir("sources_depth16");
    let render = RenderConfig {
        color: ChannelFormat::None,
        alpha: ChannelFormat::None,
        normal: ChannelFormat::None,
        png_bit_depth: 16,
        ..small_config()
    };
    let cfg = source_config(&tmp, 1, render);
    let mut renderer = ScriptedRenderer::default();
    render_sources(&cfg, &mut renderer).unwrap();

    let depth = image::open(cfg.output_dir.join("train/r_0/depth.png")).unwrap();
    assert_eq!(depth.as_luma16().unwrap().as_raw(), &vec![32768u16, 65535]);
    assert!(!cfg.output_dir.join("train/r_0/color.png").exists());

    let req = &renderer.requests[0];
    assert_eq!(req.passes, [ChannelKind::Depth]);
    assert!(req.transparent_background);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn skip_policy_keeps_going_after_a_failed_view() {
    let tmp = temp_dir("sources_skip");
    let render = RenderConfig {
        on_failure: FailurePolicy::Skip,
        ..small_config()
    };
    let cfg = source_config(&tmp, 3, render);
    let mut renderer = ScriptedRenderer {
        fail_frame: Some(1),
        ..ScriptedRenderer::default()
    };

    let report = render_sources(&cfg, &mut renderer).unwrap();
    let (_, train) = &report.splits[0];
    assert_eq!(train.rendered, [0, 2]);
    assert_eq!(train.failed.len(), 1);
    assert_eq!(train.failed[0].0, 1);
    assert_eq!(renderer.requests.len(), 3);

    assert!(cfg.output_dir.join("train/r_0/color.png").is_file());
    assert!(!cfg.output_dir.join("train/r_1").exists());
    assert!(cfg.output_dir.join("train/r_2/color.png").is_file());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn halt_policy_stops_at_the_failed_view() {
    let tmp = temp_dir("sources_halt");
    let cfg = source_config(&tmp, 3, small_config());
    let mut renderer = ScriptedRenderer {
        fail_frame: Some(1),
        ..ScriptedRenderer::default()
    };

    let err = render_sources(&cfg, &mut renderer).unwrap_err();
    assert_eq!(err.location(), Some(("train", 1)));
    assert!(err.to_string().contains("scripted failure"));
    // No retry, and nothing after the failure.
    assert_eq!(renderer.requests.len(), 2);
    assert!(cfg.output_dir.join("train/r_0/depth.png").is_file());
    assert!(!cfg.output_dir.join("train/r_2").exists());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn bad_inputs_fail_before_output_is_touched() {
    let tmp = temp_dir("sources_bad_inputs");
    let mut cfg = source_config(&tmp, 1, small_config());
    std::fs::create_dir_all(&cfg.output_dir).unwrap();
    std::fs::write(cfg.output_dir.join("keep.txt"), b"keep").unwrap();

    cfg.render.depth_min = 9.0;
    let mut renderer = ScriptedRenderer::default();
    assert!(matches!(
        render_sources(&cfg, &mut renderer),
        Err(ViewbakeError::Config(_))
    ));

    cfg.render = small_config();
    cfg.scene_path = tmp.join("missing.obj");
    assert!(render_sources(&cfg, &mut renderer).is_err());

    assert!(cfg.output_dir.join("keep.txt").is_file());
    assert!(renderer.requests.is_empty());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn scene_inside_output_is_rejected() {
    let tmp = temp_dir("sources_scene_in_output");
    let mut cfg = source_config(&tmp, 1, small_config());
    std::fs::create_dir_all(&cfg.output_dir).unwrap();
    let scene = cfg.output_dir.join("scene.obj");
    std::fs::copy(&cfg.scene_path, &scene).unwrap();
    cfg.scene_path = scene.clone();

    let mut renderer = ScriptedRenderer::default();
    let err = render_sources(&cfg, &mut renderer).unwrap_err();
    assert!(matches!(err, ViewbakeError::Config(_)));
    assert!(scene.is_file());
    assert!(renderer.requests.is_empty());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn wrong_size_buffers_fail_the_view() {
    let tmp = temp_dir("sources_wrong_size");
    let cfg = source_config(&tmp, 2, small_config());
    let mut renderer = ScriptedRenderer {
        undersized_frame: Some(0),
        ..ScriptedRenderer::default()
    };

    let err = render_sources(&cfg, &mut renderer).unwrap_err();
    assert_eq!(err.location(), Some(("train", 0)));
    assert!(err.to_string().contains("expected 2x1"));
    assert!(!cfg.output_dir.join("train/r_0").exists());
    assert_eq!(renderer.requests.len(), 1);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn failed_write_removes_the_partial_view() {
    let tmp = temp_dir("sources_partial_view");
    let render = RenderConfig {
        on_failure: FailurePolicy::Skip,
        ..small_config()
    };
    let cfg = source_config(&tmp, 3, render);
    let mut renderer = ScriptedRenderer {
        obstacle: Some((1, cfg.output_dir.join("train/r_1/depth.png"))),
        ..ScriptedRenderer::default()
    };

    let report = render_sources(&cfg, &mut renderer).unwrap();
    let (_, train) = &report.splits[0];
    assert_eq!(train.rendered, [0, 2]);
    assert_eq!(train.failed[0].0, 1);
    // color.png was written before depth.png failed; the whole view is gone.
    assert!(!cfg.output_dir.join("train/r_1").exists());
    assert!(cfg.output_dir.join("train/r_2/depth.png").is_file());

    std::fs::remove_dir_all(&tmp).ok();
}
