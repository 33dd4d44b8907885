use std::{fs::File, io::BufWriter, path::Path};

use anyhow::Context as _;
use ndarray::Array2;
use ndarray_npy::NpzWriter;

use crate::{
    camera::ProjectionMatrixPair,
    foundation::{
        error::{ViewbakeError, ViewbakeResult},
        math::Mat4,
    },
};

/// Per-view projection pairs, indexed densely from zero in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CameraArchive {
    pairs: Vec<ProjectionMatrixPair>,
}

impl CameraArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair and return its index.
    pub fn push(&mut self, pair: ProjectionMatrixPair) -> usize {
        self.pairs.push(pair);
        self.pairs.len() - 1
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[ProjectionMatrixPair] {
        &self.pairs
    }

    /// Archive entry names in write order: `world_mat_0, scale_mat_0, world_mat_1, ...`.
    pub fn entry_names(&self) -> Vec<String> {
        (0..self.pairs.len())
            .flat_map(|i| [format!("world_mat_{i}"), format!("scale_mat_{i}")])
            .collect()
    }

    /// Write an uncompressed `.npz` with one 4x4 `f32` array per entry.
    pub fn write_npz(&self, path: &Path) -> ViewbakeResult<()> {
        let file =
            File::create(path).with_context(|| format!("create archive '{}'", path.display()))?;
        let mut npz = NpzWriter::new(BufWriter::new(file));

        for (i, pair) in self.pairs.iter().enumerate() {
            for (name, m) in [
                (format!("world_mat_{i}"), &pair.world_mat),
                (format!("scale_mat_{i}"), &pair.scale_mat),
            ] {
                npz.add_array(name.as_str(), &to_array(m))
                    .map_err(|e| ViewbakeError::serde(format!("write '{name}': {e}")))?;
            }
        }

        npz.finish().map_err(|e| {
            ViewbakeError::serde(format!("finish archive '{}': {e}", path.display()))
        })?;
        Ok(())
    }
}

fn to_array(m: &Mat4) -> Array2<f32> {
    Array2::from_shape_fn((4, 4), |(r, c)| m[(r, c)])
}

#[cfg(test)]
mod tests {
    use ndarray_npy::NpzReader;

    use super::*;

    #[test]
    fn indices_are_dense_in_insertion_order() {
        let mut a = CameraArchive::new();
        let pair = ProjectionMatrixPair {
            world_mat: Mat4::identity(),
            scale_mat: Mat4::identity() * 2.0,
        };
        assert_eq!(a.push(pair), 0);
        assert_eq!(a.push(pair), 1);
        assert_eq!(
            a.entry_names(),
            ["world_mat_0", "scale_mat_0", "world_mat_1", "scale_mat_1"]
        );
    }

    #[test]
    fn npz_round_trips_matrices() {
        let dir = std::env::temp_dir().join(format!(
            "viewbake_archive_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("camera_sphere.npz");

        let mut world = Mat4::identity();
        world[(0, 3)] = 7.0;
        let mut a = CameraArchive::new();
        a.push(ProjectionMatrixPair {
            world_mat: world,
            scale_mat: Mat4::identity(),
        });
        a.write_npz(&path).unwrap();

        let mut npz = NpzReader::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(npz.len(), 2);
        let w: Array2<f32> = npz.by_name("world_mat_0").unwrap();
        assert_eq!(w.dim(), (4, 4));
        assert_eq!(w[[0, 3]], 7.0);
        assert_eq!(w[[3, 3]], 1.0);

        std::fs::remove_dir_all(&dir).ok();
    }
}
