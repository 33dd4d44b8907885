use nalgebra::{Matrix4, Point3, Vector3};

/// Renderer-native precision. All camera math runs in 32-bit floats.
pub type Real = f32;

pub type Mat4 = Matrix4<Real>;
pub type Vec3 = Vector3<Real>;
pub type Pt3 = Point3<Real>;

/// Build a matrix from row-major nested arrays (the JSON `transform_matrix` layout).
pub fn mat4_from_rows(rows: &[[Real; 4]; 4]) -> Mat4 {
    Mat4::from_fn(|r, c| rows[r][c])
}

pub fn mat4_to_rows(m: &Mat4) -> [[Real; 4]; 4] {
    let mut rows = [[0.0; 4]; 4];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = m[(r, c)];
        }
    }
    rows
}

/// Apply a homogeneous transform to a point, without the perspective divide.
pub fn transform_point(m: &Mat4, p: &Pt3) -> Pt3 {
    let h = m * p.to_homogeneous();
    Pt3::new(h.x, h.y, h.z)
}
