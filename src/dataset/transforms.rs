use std::path::{Component, Path, PathBuf};

use anyhow::Context as _;

use crate::{
    camera::Intrinsics,
    foundation::{
        error::{ViewbakeError, ViewbakeResult},
        math::{Mat4, mat4_from_rows},
    },
};

const PREFIX: &str = "transforms_";
const SUFFIX: &str = ".json";

/// Renderer-native camera file of one split.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransformsFile {
    /// Horizontal field of view in radians.
    pub camera_angle_x: f32,
    pub frames: Vec<FrameEntry>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameEntry {
    /// Relative view path, e.g. `./train/r_0`.
    pub file_path: String,
    /// Camera-to-world, row-major.
    pub transform_matrix: [[f32; 4]; 4],
}

impl FrameEntry {
    pub fn pose(&self) -> Mat4 {
        mat4_from_rows(&self.transform_matrix)
    }

    /// `file_path` as a clean relative path: `./` segments dropped, no absolute or parent parts.
    pub fn view_key(&self) -> ViewbakeResult<PathBuf> {
        normalize_view_key(&self.file_path)
    }
}

pub fn normalize_view_key(file_path: &str) -> ViewbakeResult<PathBuf> {
    let mut key = PathBuf::new();
    for comp in Path::new(file_path).components() {
        match comp {
            Component::Normal(part) => key.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ViewbakeError::config(format!(
                    "frame file_path '{file_path}' must be relative and stay inside the dataset"
                )));
            }
        }
    }
    if key.as_os_str().is_empty() {
        return Err(ViewbakeError::config(format!(
            "frame file_path '{file_path}' is empty"
        )));
    }
    Ok(key)
}

/// `transforms_train.json` -> `train`.
pub fn split_name_from_file(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix(PREFIX)?
        .strip_suffix(SUFFIX)
        .filter(|s| !s.is_empty())
}

pub fn transforms_file_name(split: &str) -> String {
    format!("{PREFIX}{split}{SUFFIX}")
}

#[derive(Clone, Debug, PartialEq)]
pub struct SplitTransforms {
    pub name: String,
    /// Location of the `transforms_{name}.json` file.
    pub path: PathBuf,
    pub transforms: TransformsFile,
}

impl SplitTransforms {
    pub fn load(path: &Path) -> ViewbakeResult<Self> {
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ViewbakeError::config(format!("bad path '{}'", path.display())))?;
        let name = split_name_from_file(file_name).ok_or_else(|| {
            ViewbakeError::config(format!(
                "'{file_name}' is not named like transforms_{{split}}.json"
            ))
        })?;

        let bytes =
            std::fs::read(path).with_context(|| format!("read '{}'", path.display()))?;
        let transforms: TransformsFile = serde_json::from_slice(&bytes).map_err(|e| {
            ViewbakeError::config(format!("malformed camera file '{}': {e}", path.display()))
        })?;

        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            transforms,
        })
    }

    pub fn intrinsics(&self, width: u32, height: u32) -> ViewbakeResult<Intrinsics> {
        Intrinsics::new(self.transforms.camera_angle_x, width, height)
            .map_err(|e| ViewbakeError::config(format!("split '{}': {e}", self.name)))
    }
}

/// Load the camera files of `dir`.
///
/// Without `selection` every `transforms_*.json` is loaded, ordered by split name. With it, exactly
/// the named splits are loaded, in the given order. This order defines the global view numbering.
pub fn discover_splits(
    dir: &Path,
    selection: Option<&[String]>,
) -> ViewbakeResult<Vec<SplitTransforms>> {
    if !dir.is_dir() {
        return Err(ViewbakeError::config(format!(
            "camera directory '{}' does not exist",
            dir.display()
        )));
    }

    let mut found: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("list '{}'", dir.display()))? {
        let entry = entry.with_context(|| format!("list '{}'", dir.display()))?;
        let file_name = entry.file_name();
        let Some(split) = file_name.to_str().and_then(split_name_from_file) else {
            continue;
        };
        if entry.path().is_file() {
            found.push((split.to_string(), entry.path()));
        }
    }
    found.sort();

    let ordered: Vec<PathBuf> = match selection {
        None => found.into_iter().map(|(_, p)| p).collect(),
        Some(names) => names
            .iter()
            .map(|want| {
                found
                    .iter()
                    .find(|(name, _)| name == want)
                    .map(|(_, p)| p.clone())
                    .ok_or_else(|| {
                        ViewbakeError::config(format!(
                            "split '{want}' has no {} in '{}'",
                            transforms_file_name(want),
                            dir.display()
                        ))
                    })
            })
            .collect::<ViewbakeResult<_>>()?,
    };

    if ordered.is_empty() {
        return Err(ViewbakeError::config(format!(
            "no transforms_*.json files in '{}'",
            dir.display()
        )));
    }

    let splits = ordered
        .iter()
        .map(|p| SplitTransforms::load(p))
        .collect::<ViewbakeResult<Vec<_>>>()?;

    let names: Vec<&str> = splits.iter().map(|s| s.name.as_str()).collect();
    tracing::info!(splits = ?names, "found camera files in '{}'", dir.display());
    Ok(splits)
}
