use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "viewbake", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render per-view color/alpha/depth/normal sources through an external renderer.
    Render(RenderArgs),
    /// Flatten a per-view dataset into `{name}_blender`.
    Flatten(FlattenArgs),
    /// Convert a per-view dataset into the sphere-normalized `{name}_idr` layout.
    Normalize(NormalizeArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Directory holding the `transforms_{split}.json` camera files.
    #[arg(long)]
    cam_dir: PathBuf,

    /// Output root. Deleted and recreated.
    #[arg(long)]
    output_dir: PathBuf,

    /// Scene file handed to the renderer.
    #[arg(long)]
    scene: PathBuf,

    /// Renderer program. Receives one JSON request per view on stdin.
    #[arg(long)]
    renderer: PathBuf,

    /// Extra argument for the renderer program (repeatable).
    #[arg(long = "renderer-arg", allow_hyphen_values = true)]
    renderer_args: Vec<String>,

    /// Render configuration JSON. Flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Splits to render, in order. Defaults to every split, sorted by name.
    #[arg(long, value_delimiter = ',')]
    splits: Option<Vec<String>>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Transparent film for color-only renders.
    #[arg(long)]
    transparent: Option<bool>,

    /// Color format: exr, png or none.
    #[arg(long)]
    color: Option<viewbake::ChannelFormat>,

    /// Alpha format: exr, png or none.
    #[arg(long)]
    alpha: Option<viewbake::ChannelFormat>,

    /// Depth format: exr, png or none.
    #[arg(long)]
    depth: Option<viewbake::ChannelFormat>,

    /// Normal format: exr, png or none.
    #[arg(long)]
    normal: Option<viewbake::ChannelFormat>,

    /// Write color as RGBA with the matte in A.
    #[arg(long)]
    color_rgba: Option<bool>,

    /// Write the matte as RGBA instead of gray.
    #[arg(long)]
    alpha_rgba: Option<bool>,

    #[arg(long)]
    depth_min: Option<f32>,

    #[arg(long)]
    depth_max: Option<f32>,

    /// PNG bits per channel (8 or 16).
    #[arg(long)]
    png_bit_depth: Option<u8>,

    #[arg(long, value_enum)]
    on_failure: Option<FailureChoice>,
}

#[derive(Parser, Debug)]
struct FlattenArgs {
    /// Root of the per-view dataset.
    #[arg(long)]
    source: PathBuf,
}

#[derive(Parser, Debug)]
struct NormalizeArgs {
    /// Root of the per-view dataset.
    #[arg(long)]
    source: PathBuf,

    /// OBJ scene used for the bounding sphere.
    #[arg(long)]
    scene: PathBuf,

    /// Image width for the intrinsics. Probed from the images when unset.
    #[arg(long, requires = "height")]
    width: Option<u32>,

    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Splits to convert, in order. Defaults to every split, sorted by name.
    #[arg(long, value_delimiter = ',')]
    splits: Option<Vec<String>>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FailureChoice {
    Halt,
    Skip,
}

impl From<FailureChoice> for viewbake::FailurePolicy {
    fn from(c: FailureChoice) -> Self {
        match c {
            FailureChoice::Halt => Self::Halt,
            FailureChoice::Skip => Self::Skip,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Flatten(args) => cmd_flatten(args),
        Command::Normalize(args) => cmd_normalize(args),
    }
}

fn render_config(args: &RenderArgs) -> anyhow::Result<viewbake::RenderConfig> {
    let mut cfg = match &args.config {
        Some(path) => viewbake::RenderConfig::from_json_file(path)?,
        None => viewbake::RenderConfig::default(),
    };

    macro_rules! override_field {
        ($($field:ident),* $(,)?) => {
            $(if let Some(v) = args.$field { cfg.$field = v; })*
        };
    }
    override_field!(
        width,
        height,
        color,
        alpha,
        depth,
        normal,
        color_rgba,
        alpha_rgba,
        depth_min,
        depth_max,
        png_bit_depth,
    );
    if let Some(v) = args.transparent {
        cfg.transparent_background = v;
    }
    if let Some(v) = args.on_failure {
        cfg.on_failure = v.into();
    }

    cfg.validate()?;
    Ok(cfg)
}

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("viewbake_render_{}", std::process::id()))
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let render = render_config(&args)?;
    let mut renderer = viewbake::ProcessRenderer::new(
        &args.renderer,
        args.renderer_args.clone(),
        &args.scene,
        scratch_dir(),
    )?;

    let cfg = viewbake::SourceConfig {
        cam_dir: args.cam_dir,
        output_dir: args.output_dir,
        scene_path: args.scene,
        render,
        splits: args.splits,
    };
    let report = viewbake::render_sources(&cfg, &mut renderer)?;

    eprintln!(
        "rendered {} views into {} ({} skipped)",
        report.rendered(),
        report.output_dir.display(),
        report.failed()
    );
    Ok(())
}

fn cmd_flatten(args: FlattenArgs) -> anyhow::Result<()> {
    let source_root = existing_dir(&args.source)?;
    let report = viewbake::flatten(&viewbake::FlattenConfig { source_root })?;
    eprintln!(
        "flattened {} views from {} splits into {}",
        report.views,
        report.splits,
        report.result_dir.display()
    );
    Ok(())
}

fn cmd_normalize(args: NormalizeArgs) -> anyhow::Result<()> {
    let source_root = existing_dir(&args.source)?;
    let cfg = viewbake::NormalizeConfig {
        source_root,
        scene_path: args.scene,
        resolution: args.width.zip(args.height),
        splits: args.splits,
    };
    let report = viewbake::normalize(&cfg)?;
    eprintln!(
        "normalized {} views into {} (sphere radius {:.4})",
        report.views,
        report.result_dir.display(),
        report.sphere.radius
    );
    Ok(())
}

/// Absolute form of a dataset root, so a trailing `.` still yields a sibling name.
fn existing_dir(path: &Path) -> anyhow::Result<PathBuf> {
    std::fs::canonicalize(path).with_context(|| format!("dataset root '{}'", path.display()))
}
