//! Material folder model.
//!
//! A material folder is the input of one assembly run: numbered slide images,
//! narration clips with matching stems, the talking-head clip, the author's
//! script, and optionally a previously generated subtitle file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Talking-head clip name inside a material folder.
pub const AVATAR_FILE: &str = "avatar_full.mp4";

/// Author's script name inside a material folder.
pub const SCRIPT_FILE: &str = "full_script.txt";

/// Generated subtitle file name inside a material folder.
pub const SUBTITLE_FILE: &str = "full_subtitle.srt";

/// Files that operating systems and VCS tooling drop into folders.
pub const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db", ".gitkeep", "desktop.ini"];

/// Extensions in order of preference when a stem has more than one file.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a"];

/// One slide and its narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidePair {
    pub stem: String,
    pub image: PathBuf,
    pub audio: PathBuf,
}

/// A discovered material folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialFolder {
    pub root: PathBuf,

    /// Slide/narration pairs in presentation order.
    pub pairs: Vec<SlidePair>,

    pub avatar: Option<PathBuf>,
    pub script: Option<PathBuf>,
    pub subtitle: Option<PathBuf>,

    /// Images or clips without a partner.
    pub warnings: Vec<String>,
}

impl MaterialFolder {
    /// Scan a folder and pair slides with narration clips by file stem.
    pub fn discover(root: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ProjectError::MissingInput { path: root });
        }

        let entries = std::fs::read_dir(&root).map_err(|e| ProjectError::IoError {
            path: root.clone(),
            source: e,
        })?;

        let mut images: BTreeMap<String, (usize, PathBuf)> = BTreeMap::new();
        let mut clips: BTreeMap<String, (usize, PathBuf)> = BTreeMap::new();
        let mut warnings = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| ProjectError::IoError {
                path: root.clone(),
                source: e,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if IGNORED_FILES.contains(&name) || name.starts_with('_') {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned) else {
                continue;
            };
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
                .unwrap_or_default();

            if let Some(rank) = IMAGE_EXTENSIONS.iter().position(|e| *e == ext) {
                keep_preferred(&mut images, &stem, rank, path, "image", &mut warnings);
            } else if let Some(rank) = AUDIO_EXTENSIONS.iter().position(|e| *e == ext) {
                keep_preferred(&mut clips, &stem, rank, path, "narration", &mut warnings);
            }
        }

        let mut pairs = Vec::new();
        for (stem, (_, image)) in &images {
            match clips.get(stem) {
                Some((_, audio)) => pairs.push(SlidePair {
                    stem: stem.clone(),
                    image: image.clone(),
                    audio: audio.clone(),
                }),
                None => warnings.push(format!("Image without narration: {}", display_name(image))),
            }
        }
        for (stem, (_, clip)) in &clips {
            if !images.contains_key(stem) {
                warnings.push(format!("Narration without image: {}", display_name(clip)));
            }
        }

        pairs.sort_by(|a, b| stem_sort_key(&a.stem).cmp(&stem_sort_key(&b.stem)));
        warnings.sort();

        let existing = |name: &str| {
            let path = root.join(name);
            path.is_file().then_some(path)
        };

        Ok(Self {
            avatar: existing(AVATAR_FILE),
            script: existing(SCRIPT_FILE),
            subtitle: existing(SUBTITLE_FILE),
            root,
            pairs,
            warnings,
        })
    }

    /// Problems that prevent a full assembly run.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = vec![];

        if self.pairs.is_empty() {
            errors.push("No slide/narration pairs found".to_string());
        }
        if self.avatar.is_none() {
            errors.push(format!("Avatar clip missing: {AVATAR_FILE}"));
        }
        if self.script.is_none() {
            errors.push(format!("Script missing: {SCRIPT_FILE}"));
        }

        errors
    }

    /// Read the author's script.
    pub fn read_script(&self) -> Result<String, ProjectError> {
        let path = self
            .script
            .clone()
            .ok_or_else(|| ProjectError::MissingInput {
                path: self.root.join(SCRIPT_FILE),
            })?;
        std::fs::read_to_string(&path).map_err(|e| ProjectError::IoError { path, source: e })
    }

    /// Talking-head clip, or `MissingInput`.
    pub fn require_avatar(&self) -> Result<&Path, ProjectError> {
        self.avatar
            .as_deref()
            .ok_or_else(|| ProjectError::MissingInput {
                path: self.root.join(AVATAR_FILE),
            })
    }

    /// Where the generated subtitle file belongs.
    pub fn subtitle_path(&self) -> PathBuf {
        self.root.join(SUBTITLE_FILE)
    }
}

/// Pure numeric stems first in numeric order, then everything else
/// lexicographically.
pub fn stem_sort_key(stem: &str) -> (u8, u64, String) {
    match stem.parse::<u64>() {
        Ok(n) => (0, n, stem.to_string()),
        Err(_) => (1, 0, stem.to_string()),
    }
}

/// Keep one file per stem, preferring the extension that ranks first, and
/// report the one left out.
fn keep_preferred(
    files: &mut BTreeMap<String, (usize, PathBuf)>,
    stem: &str,
    rank: usize,
    path: PathBuf,
    kind: &str,
    warnings: &mut Vec<String>,
) {
    match files.get_mut(stem) {
        None => {
            files.insert(stem.to_string(), (rank, path));
        }
        Some(kept) => {
            let (winner, loser) = if rank < kept.0 {
                let previous = std::mem::replace(kept, (rank, path));
                (kept.1.clone(), previous.1)
            } else {
                (kept.1.clone(), path)
            };
            warnings.push(format!(
                "Duplicate {kind} for slide {stem}: using {}, ignoring {}",
                display_name(&winner),
                display_name(&loser)
            ));
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Errors that can occur when working with material folders and artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Required input missing: {path}")]
    MissingInput { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<ProjectError> for slidecast_common::SlidecastError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::MissingInput { path } => Self::InputMissing { path },
            ProjectError::IoError { source, .. } => Self::Io(source),
            ProjectError::ParseError { source, .. } => Self::Json(source),
        }
    }
}
