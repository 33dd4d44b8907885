use crate::{
    foundation::{
        error::{ViewbakeError, ViewbakeResult},
        math::{Pt3, Real, Vec3, transform_point},
    },
    scene::Scene,
};

/// Inflation applied to the half-diagonal so geometry never touches the sphere boundary.
pub const RADIUS_MARGIN: Real = 1.01;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: Pt3,
    pub radius: Real,
}

impl BoundingSphere {
    pub fn contains(&self, p: &Pt3) -> bool {
        (p.coords - self.center.coords).norm() <= self.radius
    }
}

/// Bounding sphere of every mesh vertex in world space.
///
/// The sphere is the circumsphere of the world-space axis-aligned box, inflated by
/// [`RADIUS_MARGIN`]. A scene without mesh vertices is an error: a zero-radius sphere would
/// produce a degenerate `scale_mat` for every view.
#[tracing::instrument(skip(scene))]
pub fn estimate_bounds(scene: &Scene) -> ViewbakeResult<BoundingSphere> {
    let mut aabb0 = Vec3::repeat(Real::INFINITY);
    let mut aabb1 = Vec3::repeat(Real::NEG_INFINITY);
    let mut count = 0usize;

    for (obj, vertices) in scene.meshes() {
        for v in vertices {
            let w = transform_point(&obj.world, v);
            aabb0 = aabb0.inf(&w.coords);
            aabb1 = aabb1.sup(&w.coords);
            count += 1;
        }
    }

    if count == 0 {
        return Err(ViewbakeError::geometry(
            "scene has no mesh vertices; cannot compute a bounding sphere",
        ));
    }

    let center = Pt3::from((aabb0 + aabb1) / 2.0);
    let radius = 0.5 * (aabb1 - aabb0).norm() * RADIUS_MARGIN;
    if !(radius.is_finite() && radius > 0.0) {
        return Err(ViewbakeError::geometry(format!(
            "scene bounds are degenerate (radius {radius})"
        )));
    }

    tracing::info!(
        center = ?[center.x, center.y, center.z],
        radius,
        vertices = count,
        "scene bounds"
    );
    Ok(BoundingSphere { center, radius })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        foundation::math::Mat4,
        scene::{ObjectKind, SceneObject},
    };

    fn cube(half: Real) -> Vec<Pt3> {
        let mut out = Vec::new();
        for x in [-half, half] {
            for y in [-half, half] {
                for z in [-half, half] {
                    out.push(Pt3::new(x, y, z));
                }
            }
        }
        out
    }

    #[test]
    fn unit_cube_sphere() {
        let scene = Scene::new(vec![SceneObject::mesh("cube", Mat4::identity(), cube(1.0))]);
        let s = estimate_bounds(&scene).unwrap();
        assert_eq!(s.center, Pt3::origin());
        let expected = 0.5 * (12.0 as Real).sqrt() * RADIUS_MARGIN;
        assert!((s.radius - expected).abs() < 1e-6);
    }

    #[test]
    fn world_matrix_is_applied() {
        let world = Mat4::new_translation(&Vec3::new(10.0, 0.0, -4.0));
        let scene = Scene::new(vec![
            SceneObject::mesh("a", world, cube(0.5)),
            SceneObject::mesh("b", Mat4::identity(), cube(0.5)),
        ]);
        let s = estimate_bounds(&scene).unwrap();
        assert!((s.center - Pt3::new(5.0, 0.0, -2.0)).norm() < 1e-5);

        for (obj, vertices) in scene.meshes() {
            for v in vertices {
                let w = transform_point(&obj.world, v);
                assert!(s.contains(&w), "{w:?} outside sphere");
            }
        }
    }

    #[test]
    fn margin_is_exactly_one_percent() {
        let scene = Scene::new(vec![SceneObject::mesh(
            "seg",
            Mat4::identity(),
            vec![Pt3::new(0.0, 0.0, 0.0), Pt3::new(3.0, 4.0, 0.0)],
        )]);
        let s = estimate_bounds(&scene).unwrap();
        assert!((s.radius / RADIUS_MARGIN - 2.5).abs() < 1e-5);
    }

    #[test]
    fn scene_without_meshes_fails() {
        let scene = Scene::new(vec![SceneObject {
            name: "light".to_string(),
            world: Mat4::identity(),
            kind: ObjectKind::Light,
        }]);
        let err = estimate_bounds(&scene).unwrap_err();
        assert!(matches!(err, ViewbakeError::Geometry(_)));

        let empty_mesh = Scene::new(vec![SceneObject::mesh("m", Mat4::identity(), vec![])]);
        assert!(estimate_bounds(&empty_mesh).is_err());
    }

    #[test]
    fn single_point_is_degenerate() {
        let scene = Scene::new(vec![SceneObject::mesh(
            "p",
            Mat4::identity(),
            vec![Pt3::new(1.0, 1.0, 1.0)],
        )]);
        assert!(estimate_bounds(&scene).is_err());
    }
}
