use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::ExportConfig;

/// One raw video chunk to export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    pub id: Uuid,
    pub name: String,
}

/// Every file a job reads or writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    pub dir: PathBuf,
    pub raw: PathBuf,
    pub video: PathBuf,
    pub audio: PathBuf,
    pub merged: PathBuf,
}

impl TranscodeJob {
    pub fn new<S: Into<String>>(id: Uuid, name: S) -> Self {
        Self { id, name: name.into() }
    }

    /// Derive the job's files from the export settings.
    ///
    /// With the shared layout only the raw chunk is keyed by id; the
    /// intermediates and the merged file are keyed by the display name, so
    /// two jobs with the same name write to the same files.
    pub fn paths(&self, export: &ExportConfig) -> JobPaths {
        let dir = if export.isolate_jobs {
            export.output_dir.join(self.id.to_string())
        } else {
            export.output_dir.clone()
        };
        let name = sanitize_file_name(&self.name);

        JobPaths {
            raw: dir.join(format!("{}.{}", self.id, export.raw_extension)),
            video: dir.join(format!("{}-vid.mp4", name)),
            audio: dir.join(format!("{}.wav", name)),
            merged: dir.join(format!("{}-merged.mp4", name)),
            dir,
        }
    }
}

impl JobPaths {
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Replace characters that would escape the output directory or that common
/// filesystems reject.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "video".to_string(),
        _ => cleaned,
    }
}
