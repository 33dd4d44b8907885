//! Scene geometry, loaded only to estimate bounds.

pub mod bounds;

use std::path::Path;

use anyhow::Context as _;

use crate::foundation::{
    error::{ViewbakeError, ViewbakeResult},
    math::{Mat4, Pt3},
};

#[derive(Clone, Debug, PartialEq)]
pub enum ObjectKind {
    /// Object-space vertex positions.
    Mesh { vertices: Vec<Pt3> },
    Camera,
    Light,
    Empty,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneObject {
    pub name: String,
    /// Object-to-world transform.
    pub world: Mat4,
    pub kind: ObjectKind,
}

impl SceneObject {
    pub fn mesh(name: impl Into<String>, world: Mat4, vertices: Vec<Pt3>) -> Self {
        Self {
            name: name.into(),
            world,
            kind: ObjectKind::Mesh { vertices },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
}

impl Scene {
    pub fn new(objects: Vec<SceneObject>) -> Self {
        Self { objects }
    }

    /// Load a Wavefront OBJ file. Each model becomes one mesh object placed at the origin.
    #[tracing::instrument]
    pub fn load_obj(path: &Path) -> ViewbakeResult<Self> {
        if !path.is_file() {
            return Err(ViewbakeError::config(format!(
                "scene file '{}' does not exist",
                path.display()
            )));
        }

        let (models, _materials) = tobj::load_obj(path, &tobj::LoadOptions::default())
            .with_context(|| format!("load obj scene '{}'", path.display()))?;

        let objects: Vec<SceneObject> = models
            .into_iter()
            .map(|m| {
                let vertices = m
                    .mesh
                    .positions
                    .chunks_exact(3)
                    .map(|p| Pt3::new(p[0], p[1], p[2]))
                    .collect();
                SceneObject::mesh(m.name, Mat4::identity(), vertices)
            })
            .collect();

        tracing::debug!(objects = objects.len(), "loaded scene");
        Ok(Self { objects })
    }

    pub fn meshes(&self) -> impl Iterator<Item = (&SceneObject, &[Pt3])> {
        self.objects.iter().filter_map(|o| match &o.kind {
            ObjectKind::Mesh { vertices } => Some((o, vertices.as_slice())),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "viewbake_{name}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn load_obj_reads_every_model() {
        let tmp = temp_dir("scene_load_obj");
        std::fs::create_dir_all(&tmp).unwrap();
        let path = tmp.join("two.obj");
        std::fs::write(
            &path,
            "o first\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n\
             o second\nv 0 0 5\nv 1 0 5\nv 0 1 5\nf 4 5 6\n",
        )
        .unwrap();

        let scene = Scene::load_obj(&path).unwrap();
        let meshes: Vec<_> = scene.meshes().collect();
        assert_eq!(meshes.len(), 2);
        assert_eq!(meshes[1].1[0], Pt3::new(0.0, 0.0, 5.0));

        std::fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn missing_scene_is_a_config_error() {
        let err = Scene::load_obj(Path::new("/definitely/not/here.obj")).unwrap_err();
        assert!(matches!(err, ViewbakeError::Config(_)));
    }

    #[test]
    fn meshes_skip_non_mesh_objects() {
        let scene = Scene::new(vec![
            SceneObject {
                name: "cam".to_string(),
                world: Mat4::identity(),
                kind: ObjectKind::Camera,
            },
            SceneObject::mesh("m", Mat4::identity(), vec![Pt3::origin()]),
        ]);
        assert_eq!(scene.meshes().count(), 1);
    }
}
