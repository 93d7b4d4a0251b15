//! Locating the external executables on disk.
//!
//! Nothing here is cached: every lookup walks the install folder again, so a
//! tool becomes visible the moment provisioning finishes extracting it.

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ExportError, Result};

/// Extracted archives nest the binary a few folders deep (e.g. `ffmpeg/<build>/bin/`).
const MAX_SEARCH_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// FFmpeg, used for the video and mux stages
    Video,
    /// vgmstream, used to decode the audio track
    Audio,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::Video, ToolKind::Audio];

    pub fn display_name(&self) -> &'static str {
        match self {
            ToolKind::Video => "FFmpeg",
            ToolKind::Audio => "VGMStream",
        }
    }

    /// Folder under the tools root the archive is extracted into
    pub fn folder_name(&self) -> &'static str {
        match self {
            ToolKind::Video => "ffmpeg",
            ToolKind::Audio => "vgmstream",
        }
    }

    pub fn binary_name(&self) -> String {
        let stem = match self {
            ToolKind::Video => "ffmpeg",
            ToolKind::Audio => "vgmstream-cli",
        };
        format!("{}{}", stem, std::env::consts::EXE_SUFFIX)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Resolved executables. `None` means the tool is not installed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolPaths {
    pub video: Option<PathBuf>,
    pub audio: Option<PathBuf>,
}

impl ToolPaths {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(video: P, audio: Q) -> Self {
        Self {
            video: Some(video.into()),
            audio: Some(audio.into()),
        }
    }

    pub fn get(&self, kind: ToolKind) -> Option<&Path> {
        match kind {
            ToolKind::Video => self.video.as_deref(),
            ToolKind::Audio => self.audio.as_deref(),
        }
    }

    pub fn is_ready(&self) -> bool {
        ToolKind::ALL.iter().all(|kind| self.get(*kind).is_some())
    }

    pub fn missing(&self) -> Vec<ToolKind> {
        ToolKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind).is_none())
            .collect()
    }

    /// Return the executable for `kind`, failing unless it exists as a file.
    pub fn require(&self, kind: ToolKind) -> Result<&Path> {
        match self.get(kind) {
            Some(path) if path.is_file() => Ok(path),
            _ => Err(ExportError::ToolMissing {
                tool: kind.display_name().to_string(),
            }),
        }
    }
}

/// Probes the tools root for installed executables.
#[derive(Debug, Clone)]
pub struct ToolLocator {
    root: PathBuf,
}

impl ToolLocator {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn install_dir(&self, kind: ToolKind) -> PathBuf {
        self.root.join(kind.folder_name())
    }

    /// Find the executable for `kind` below its install folder.
    ///
    /// The walk is sorted by file name so the same tree always yields the
    /// same answer; when several copies exist the first is used.
    pub fn locate(&self, kind: ToolKind) -> Option<PathBuf> {
        let install_dir = self.install_dir(kind);
        if !install_dir.is_dir() {
            return None;
        }

        let binary = kind.binary_name();
        let mut matches = WalkDir::new(&install_dir)
            .max_depth(MAX_SEARCH_DEPTH)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && e.file_name() == binary.as_str())
            .map(|e| e.into_path());

        let found = matches.next()?;
        if let Some(other) = matches.next() {
            warn!(
                "Multiple {} executables below {}; using {} (also found {})",
                kind, install_dir.display(), found.display(), other.display()
            );
        }

        debug!("Resolved {} at {}", kind, found.display());
        Some(found)
    }

    pub fn locate_all(&self) -> ToolPaths {
        ToolPaths {
            video: self.locate(ToolKind::Video),
            audio: self.locate(ToolKind::Audio),
        }
    }
}
