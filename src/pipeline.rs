use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info};

use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::job::{JobPaths, TranscodeJob};
use crate::media::{self, AudioCommandBuilder, CommandRunner, MediaCommand, VideoCommandBuilder};
use crate::tools::{ToolKind, ToolPaths};

/// Turns a raw chunk into a merged MP4 in three sequential tool runs:
/// encode video, decode audio, mux.
pub struct TranscodePipeline {
    export: ExportConfig,
    runner: Box<dyn CommandRunner>,
}

impl TranscodePipeline {
    pub fn new(export: ExportConfig, runner: Box<dyn CommandRunner>) -> Self {
        Self { export, runner }
    }

    pub fn paths(&self, job: &TranscodeJob) -> JobPaths {
        job.paths(&self.export)
    }

    /// Copy `source` to the job's raw input location, creating the output
    /// directory when needed.
    pub async fn stage_input<P: AsRef<Path>>(&self, job: &TranscodeJob, source: P) -> Result<PathBuf> {
        let source = source.as_ref();
        let paths = self.paths(job);

        fs::create_dir_all(paths.dir())
            .await
            .map_err(|e| ExportError::io("create directory", paths.dir(), e))?;

        if !is_same_file(source, &paths.raw).await {
            fs::copy(source, &paths.raw)
                .await
                .map_err(|e| ExportError::io("copy", source, e))?;
        }

        info!("Staged {} as {}", source.display(), paths.raw.display());
        Ok(paths.raw)
    }

    /// Run all three stages for `job` and return the merged output path.
    ///
    /// Both tools and the raw input are checked before anything is spawned.
    /// A stage only starts after the previous process has exited with 0.
    pub async fn run(&self, job: &TranscodeJob, tools: &ToolPaths) -> Result<PathBuf> {
        let ffmpeg = tools.require(ToolKind::Video)?;
        let vgmstream = tools.require(ToolKind::Audio)?;
        let paths = self.paths(job);

        fs::metadata(&paths.raw)
            .await
            .map_err(|e| ExportError::io("read input", &paths.raw, e))?;
        fs::create_dir_all(paths.dir())
            .await
            .map_err(|e| ExportError::io("create directory", paths.dir(), e))?;

        info!("Exporting {} ({})", job.name, job.id);

        let video = VideoCommandBuilder::new(ffmpeg, self.export.video.clone());
        let audio = AudioCommandBuilder::new(vgmstream);

        let stages = [
            video.encode_video(&paths.raw, &paths.video),
            audio.decode_to_wav(&paths.raw, &paths.audio),
            video.merge(&paths.video, &paths.audio, &paths.merged),
        ];

        for (index, command) in stages.iter().enumerate() {
            self.run_stage(index + 1, command).await?;
        }

        info!("Video export success: {}", paths.merged.display());
        Ok(paths.merged)
    }

    async fn run_stage(&self, stage: usize, command: &MediaCommand) -> Result<()> {
        info!("Stage {}: {}", stage, command.description);

        let exit_code = media::execute(self.runner.as_ref(), command).await?;
        if exit_code != 0 {
            error!("Stage {} ({}) exited with code {}", stage, command.description, exit_code);
            return Err(ExportError::StageFailed { stage, exit_code });
        }

        Ok(())
    }
}

/// Whether `a` and `b` name the same file, following `..` and symlinks.
/// Copying a file onto itself would truncate it.
async fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(left), Ok(right)) => left == right,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    /// Records every command and writes its output file, exiting with the
    /// code configured for that spawn.
    #[derive(Clone, Default)]
    struct FakeRunner {
        spawned: Arc<Mutex<Vec<MediaCommand>>>,
        fail_at: Option<(usize, i32)>,
    }

    impl FakeRunner {
        fn failing_at(spawn: usize, exit_code: i32) -> Self {
            Self {
                fail_at: Some((spawn, exit_code)),
                ..Self::default()
            }
        }

        fn spawn_count(&self) -> usize {
            self.spawned.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, command: &MediaCommand) -> Result<i32> {
            let spawn = {
                let mut spawned = self.spawned.lock().unwrap();
                spawned.push(command.clone());
                spawned.len()
            };

            if let Some((at, code)) = self.fail_at {
                if at == spawn {
                    return Ok(code);
                }
            }

            if let Some(output) = command.output_path() {
                std::fs::write(output, command.description.as_bytes()).unwrap();
            }
            Ok(0)
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        tools: ToolPaths,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let ffmpeg = dir.path().join("tools").join("ffmpeg");
            let vgmstream = dir.path().join("tools").join("vgmstream-cli");
            std::fs::create_dir_all(ffmpeg.parent().unwrap()).unwrap();
            std::fs::write(&ffmpeg, b"").unwrap();
            std::fs::write(&vgmstream, b"").unwrap();

            Self {
                tools: ToolPaths::new(ffmpeg, vgmstream),
                dir,
            }
        }

        fn export(&self) -> ExportConfig {
            ExportConfig {
                output_dir: self.dir.path().join("exported"),
                ..ExportConfig::default()
            }
        }

        fn source(&self) -> PathBuf {
            let source = self.dir.path().join("chunk.bin");
            std::fs::write(&source, b"raw chunk").unwrap();
            source
        }
    }

    #[tokio::test]
    async fn test_run_produces_merged_output() {
        let fixture = Fixture::new();
        let runner = FakeRunner::default();
        let pipeline = TranscodePipeline::new(fixture.export(), Box::new(runner.clone()));
        let job = TranscodeJob::new(Uuid::new_v4(), "intro");

        let raw = pipeline.stage_input(&job, fixture.source()).await.unwrap();
        assert_eq!(std::fs::read(&raw).unwrap(), b"raw chunk");

        let merged = pipeline.run(&job, &fixture.tools).await.unwrap();

        assert_eq!(merged, fixture.dir.path().join("exported").join("intro-merged.mp4"));
        assert!(merged.is_file());
        assert_eq!(runner.spawn_count(), 3);

        let spawned = runner.spawned.lock().unwrap();
        assert_eq!(spawned[0].binary_path, fixture.tools.video.clone().unwrap());
        assert_eq!(spawned[1].binary_path, fixture.tools.audio.clone().unwrap());
        assert_eq!(spawned[2].binary_path, fixture.tools.video.clone().unwrap());
        assert_eq!(spawned[2].output_path(), Some(merged.as_path()));
    }

    #[tokio::test]
    async fn test_missing_video_tool_spawns_nothing() {
        let fixture = Fixture::new();
        let runner = FakeRunner::default();
        let pipeline = TranscodePipeline::new(fixture.export(), Box::new(runner.clone()));
        let job = TranscodeJob::new(Uuid::new_v4(), "intro");
        pipeline.stage_input(&job, fixture.source()).await.unwrap();

        let tools = ToolPaths {
            video: Some(fixture.dir.path().join("nonexistent").join("ffmpeg")),
            audio: fixture.tools.audio.clone(),
        };
        let err = pipeline.run(&job, &tools).await.unwrap_err();

        assert!(matches!(err, ExportError::ToolMissing { ref tool } if tool == "FFmpeg"));
        assert_eq!(runner.spawn_count(), 0);
    }

    #[tokio::test]
    async fn test_unresolved_audio_tool_spawns_nothing() {
        let fixture = Fixture::new();
        let runner = FakeRunner::default();
        let pipeline = TranscodePipeline::new(fixture.export(), Box::new(runner.clone()));
        let job = TranscodeJob::new(Uuid::new_v4(), "intro");

        let tools = ToolPaths {
            video: fixture.tools.video.clone(),
            audio: None,
        };
        let err = pipeline.run(&job, &tools).await.unwrap_err();

        assert!(matches!(err, ExportError::ToolMissing { ref tool } if tool == "VGMStream"));
        assert_eq!(runner.spawn_count(), 0);
    }

    #[tokio::test]
    async fn test_audio_stage_failure_skips_mux() {
        let fixture = Fixture::new();
        let runner = FakeRunner::failing_at(2, 1);
        let pipeline = TranscodePipeline::new(fixture.export(), Box::new(runner.clone()));
        let job = TranscodeJob::new(Uuid::new_v4(), "intro");
        pipeline.stage_input(&job, fixture.source()).await.unwrap();

        let err = pipeline.run(&job, &fixture.tools).await.unwrap_err();

        assert!(matches!(err, ExportError::StageFailed { stage: 2, exit_code: 1 }));
        assert_eq!(runner.spawn_count(), 2);
        assert!(!pipeline.paths(&job).merged.exists());
    }

    #[tokio::test]
    async fn test_missing_raw_input_is_io_error() {
        let fixture = Fixture::new();
        let runner = FakeRunner::default();
        let pipeline = TranscodePipeline::new(fixture.export(), Box::new(runner.clone()));
        let job = TranscodeJob::new(Uuid::new_v4(), "intro");

        let err = pipeline.run(&job, &fixture.tools).await.unwrap_err();

        assert!(matches!(err, ExportError::Io { operation: "read input", .. }));
        assert_eq!(runner.spawn_count(), 0);
    }

    #[tokio::test]
    async fn test_staging_raw_file_through_alias_keeps_contents() {
        let fixture = Fixture::new();
        let pipeline = TranscodePipeline::new(fixture.export(), Box::new(FakeRunner::default()));
        let job = TranscodeJob::new(Uuid::new_v4(), "intro");
        let raw = pipeline.stage_input(&job, fixture.source()).await.unwrap();

        let alias = fixture
            .dir
            .path()
            .join("exported")
            .join("..")
            .join("exported")
            .join(raw.file_name().unwrap());
        let staged = pipeline.stage_input(&job, &alias).await.unwrap();

        assert_eq!(staged, raw);
        assert_eq!(std::fs::read(&raw).unwrap(), b"raw chunk");
    }

    #[tokio::test]
    async fn test_staging_missing_source_is_io_error() {
        let fixture = Fixture::new();
        let pipeline = TranscodePipeline::new(fixture.export(), Box::new(FakeRunner::default()));
        let job = TranscodeJob::new(Uuid::new_v4(), "intro");

        let err = pipeline
            .stage_input(&job, fixture.dir.path().join("missing.bin"))
            .await
            .unwrap_err();

        assert!(matches!(err, ExportError::Io { operation: "copy", .. }));
    }

    #[tokio::test]
    async fn test_intermediates_are_kept() {
        let fixture = Fixture::new();
        let pipeline = TranscodePipeline::new(fixture.export(), Box::new(FakeRunner::default()));
        let job = TranscodeJob::new(Uuid::new_v4(), "outro");
        pipeline.stage_input(&job, fixture.source()).await.unwrap();

        pipeline.run(&job, &fixture.tools).await.unwrap();

        let paths = pipeline.paths(&job);
        assert!(paths.raw.is_file());
        assert!(paths.video.is_file());
        assert!(paths.audio.is_file());
    }
}
