pub mod assemble;
pub mod captions;
pub mod check;
pub mod locate;
pub mod schedule;
pub mod validate;

use std::path::{Path, PathBuf};

use slidecast_common::FrameRate;
use slidecast_project_model::MaterialFolder;

/// Scratch directory inside the material folder; skipped by discovery.
pub const WORK_DIR: &str = "_work";

pub fn load_folder(dir: &Path) -> anyhow::Result<MaterialFolder> {
    let folder = MaterialFolder::discover(dir)
        .map_err(|e| anyhow::anyhow!("Failed to read material folder: {e}"))?;
    for warning in &folder.warnings {
        tracing::warn!("{warning}");
    }
    Ok(folder)
}

pub fn work_dir(folder: &MaterialFolder) -> anyhow::Result<PathBuf> {
    let dir = folder.root.join(WORK_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Parse a frame rate given as `24` or `30000/1001`.
pub fn parse_fps(raw: &str) -> anyhow::Result<FrameRate> {
    let rate = match raw.split_once('/') {
        Some((num, den)) => FrameRate::new(num.trim().parse()?, den.trim().parse()?),
        None => FrameRate::whole(raw.trim().parse()?),
    };
    if !rate.is_valid() {
        anyhow::bail!("invalid frame rate: {raw}");
    }
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fps() {
        assert_eq!(parse_fps("24").unwrap(), FrameRate::FPS_24);
        assert_eq!(parse_fps("30000/1001").unwrap(), FrameRate::NTSC_30);
        assert!(parse_fps("29.97").is_err());
        assert!(parse_fps("0").is_err());
    }
}
