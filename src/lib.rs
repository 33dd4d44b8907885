#![forbid(unsafe_code)]

pub mod archive;
pub mod camera;
pub mod channel;
pub mod config;
pub mod dataset;
pub mod encode;
pub mod foundation;
pub mod render;
pub mod scene;
pub mod transcode;

pub use archive::CameraArchive;
pub use camera::{Intrinsics, ProjectionMatrixPair, convert_view};
pub use channel::{ChannelBuffer, ChannelKind, ChannelRule};
pub use config::{
    ChannelFormat, FailurePolicy, FlattenConfig, NormalizeConfig, RenderConfig, SourceConfig,
};
pub use foundation::error::{ViewbakeError, ViewbakeResult};
pub use foundation::math::{Mat4, Pt3, Real, Vec3};
pub use render::backend::{ChannelBuffers, RenderRequest, Renderer};
pub use render::compositor::{ChannelCompositor, RenderReport, ViewJob};
pub use render::process::ProcessRenderer;
pub use scene::bounds::{BoundingSphere, estimate_bounds};
pub use scene::{Scene, SceneObject};
pub use transcode::flatten::{FlattenReport, flatten};
pub use transcode::normalize::{NormalizeReport, normalize};
pub use transcode::source::{SourceReport, render_sources};
