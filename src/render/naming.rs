use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{channel::ChannelKind, foundation::error::ViewbakeResult};

/// Name the renderer gives a pass output: `{pass}{frame:04}.{ext}`.
pub fn frame_file_name(kind: ChannelKind, frame: u64, ext: &str) -> String {
    format!("{}{frame:04}.{ext}", kind.name())
}

/// Split `color0007.exr` into `("color", 7, "exr")`.
pub fn strip_frame_suffix(file_name: &str) -> Option<(&str, u64, &str)> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    let digits_at = stem
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    let (pass, digits) = stem.split_at(digits_at);
    if pass.is_empty() || ext.is_empty() {
        return None;
    }
    Some((pass, digits.parse().ok()?, ext))
}

/// Rename every `{pass}{frame}.{ext}` in `dir` whose frame number is `frame` to `{pass}.{ext}`.
///
/// Files of other frames, and files not named after a channel, are left alone. Returns the
/// canonical paths by channel.
pub fn normalize_frame_outputs(
    dir: &Path,
    frame: u64,
) -> ViewbakeResult<Vec<(ChannelKind, PathBuf)>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("list '{}'", dir.display()))? {
        let entry = entry.with_context(|| format!("list '{}'", dir.display()))?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some((pass, f, ext)) = strip_frame_suffix(name) else {
            continue;
        };
        let Some(kind) = ChannelKind::from_name(pass) else {
            continue;
        };
        if f != frame {
            continue;
        }
        let canonical = dir.join(format!("{pass}.{ext}"));
        std::fs::rename(entry.path(), &canonical).with_context(|| {
            format!("rename '{}' -> '{}'", entry.path().display(), canonical.display())
        })?;
        out.push((kind, canonical));
    }
    out.sort();
    Ok(out)
}
