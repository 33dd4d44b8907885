//! Pinhole intrinsics and the conversion of renderer camera poses into projection matrices.

use crate::{
    foundation::{
        error::{ViewbakeError, ViewbakeResult},
        math::{Mat4, Pt3, Real},
    },
    scene::bounds::BoundingSphere,
};

/// Maps the renderer's camera frame (looking down -Z, +Y up) to the target frame (looking down +Z,
/// +Y down). Specific to this pair of conventions.
#[rustfmt::skip]
pub const AXIS_FLIP: [[Real; 4]; 4] = [
    [1.0,  0.0,  0.0, 0.0],
    [0.0, -1.0,  0.0, 0.0],
    [0.0,  0.0, -1.0, 0.0],
    [0.0,  0.0,  0.0, 1.0],
];

pub fn axis_flip() -> Mat4 {
    crate::foundation::math::mat4_from_rows(&AXIS_FLIP)
}

/// Per-split pinhole intrinsics: horizontal field of view plus image size. Square pixels, no skew.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intrinsics {
    /// Horizontal field of view in radians.
    pub fov_x: Real,
    pub width: u32,
    pub height: u32,
}

impl Intrinsics {
    pub fn new(fov_x: Real, width: u32, height: u32) -> ViewbakeResult<Self> {
        if !(fov_x.is_finite() && fov_x > 0.0 && fov_x < std::f32::consts::PI) {
            return Err(ViewbakeError::config(format!(
                "camera_angle_x must be in (0, pi) radians (got {fov_x})"
            )));
        }
        if width == 0 || height == 0 {
            return Err(ViewbakeError::config("image width/height must be non-zero"));
        }
        Ok(Self {
            fov_x,
            width,
            height,
        })
    }

    pub fn focal(&self) -> Real {
        0.5 * self.width as Real / (0.5 * self.fov_x).tan()
    }

    pub fn principal_point(&self) -> (Real, Real) {
        (
            0.5 * (self.width as Real - 1.0),
            0.5 * (self.height as Real - 1.0),
        )
    }

    /// 4x4 homogeneous intrinsic matrix.
    pub fn matrix(&self) -> Mat4 {
        let f = self.focal();
        let (cx, cy) = self.principal_point();
        #[rustfmt::skip]
        let k = Mat4::new(
            f,   0.0, cx,  0.0,
            0.0, f,   cy,  0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        k
    }
}

/// Projection (`world_mat`) and sphere normalization (`scale_mat`) of one view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectionMatrixPair {
    pub world_mat: Mat4,
    pub scale_mat: Mat4,
}

/// `diag(r, r, r, 1)` with the sphere center as translation; identity without a sphere.
pub fn scale_matrix(sphere: Option<&BoundingSphere>) -> Mat4 {
    let Some(s) = sphere else {
        return Mat4::identity();
    };
    let mut m = Mat4::identity() * s.radius;
    m[(0, 3)] = s.center.x;
    m[(1, 3)] = s.center.y;
    m[(2, 3)] = s.center.z;
    m[(3, 3)] = 1.0;
    m
}

/// Convert a camera-to-world pose into the projection pair of the target convention.
///
/// `world_mat = (K * flip) * inverse(pose)`, evaluated in that order.
pub fn convert_view(
    intrinsics: &Intrinsics,
    cam_to_world: &Mat4,
    sphere: Option<&BoundingSphere>,
) -> ViewbakeResult<ProjectionMatrixPair> {
    let world_to_cam = cam_to_world
        .try_inverse()
        .filter(|m| m.iter().all(|v| v.is_finite()))
        .ok_or_else(|| ViewbakeError::geometry("camera pose is singular and cannot be inverted"))?;

    let world_mat = (intrinsics.matrix() * axis_flip()) * world_to_cam;
    Ok(ProjectionMatrixPair {
        world_mat,
        scale_mat: scale_matrix(sphere),
    })
}

/// Project a world point with `world_mat`. Returns pixel coordinates and depth along the target
/// camera's +Z axis, or `None` for points on the camera plane.
pub fn project(world_mat: &Mat4, p: &Pt3) -> Option<(Real, Real, Real)> {
    let h = world_mat * p.to_homogeneous();
    if h.z.abs() <= Real::EPSILON {
        return None;
    }
    Some((h.x / h.z, h.y / h.z, h.z))
}
