use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::VideoEncodeConfig;

/// A single external tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCommand {
    pub binary_path: PathBuf,
    pub args: Vec<String>,
    pub description: String,
    /// File the command is expected to write
    pub output: Option<PathBuf>,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<P: Into<PathBuf>, S: Into<String>>(binary_path: P, description: S) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
            output: None,
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output = Some(path.as_ref().to_path_buf());
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file behind a flag, e.g. `-o <path>`
    pub fn output_flag<P: AsRef<Path>>(self, flag: &str, path: P) -> Self {
        self.arg(flag).output(path)
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Set video codec
    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Copy video stream
    pub fn copy_video(self) -> Self {
        self.video_codec("copy")
    }

    /// Select a stream, e.g. `0:v:0`
    pub fn map<S: Into<String>>(self, spec: S) -> Self {
        self.arg("-map").arg(spec)
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_deref()
    }
}

impl fmt::Display for MediaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.binary_path.display())?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Builds the FFmpeg invocations of the export pipeline
pub struct VideoCommandBuilder {
    binary_path: PathBuf,
    encode: VideoEncodeConfig,
}

impl VideoCommandBuilder {
    pub fn new<P: Into<PathBuf>>(binary_path: P, encode: VideoEncodeConfig) -> Self {
        Self {
            binary_path: binary_path.into(),
            encode,
        }
    }

    /// Re-encode the raw chunk into an MP4.
    ///
    /// An audio track is kept even though the mux stage drops it; some raw
    /// containers carry audio FFmpeg refuses to silently discard.
    pub fn encode_video<P: AsRef<Path>>(&self, raw_path: P, video_path: P) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Video encoding")
            .overwrite()
            .input(raw_path)
            .video_codec(&self.encode.video_codec)
            .arg("-crf").arg(self.encode.crf.to_string())
            .arg("-preset").arg(&self.encode.preset)
            .audio_codec(&self.encode.audio_codec)
            .arg("-b:a").arg(&self.encode.audio_bitrate)
            .output(video_path)
    }

    /// Combine the first video stream of `video_path` with the first audio
    /// stream of `audio_path`
    pub fn merge<P: AsRef<Path>>(&self, video_path: P, audio_path: P, output_path: P) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio/video merge")
            .overwrite()
            .input(video_path)
            .input(audio_path)
            .copy_video()
            .audio_codec(&self.encode.audio_codec)
            .map("0:v:0")
            .map("1:a:0")
            .output(output_path)
    }
}

/// Builds vgmstream invocations
pub struct AudioCommandBuilder {
    binary_path: PathBuf,
}

impl AudioCommandBuilder {
    pub fn new<P: Into<PathBuf>>(binary_path: P) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Decode the audio stream of the raw chunk to a WAV file
    pub fn decode_to_wav<P: AsRef<Path>>(&self, raw_path: P, wav_path: P) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio decoding")
            .output_flag("-o", wav_path)
            .arg(raw_path.as_ref().to_string_lossy().to_string())
    }
}

/// 7-Zip console extraction of `archive` into `destination`
pub fn sevenzip_extract<P: Into<PathBuf>>(binary_path: P, archive: &Path, destination: &Path) -> MediaCommand {
    MediaCommand::new(binary_path, "Archive extraction")
        .arg("x")
        .arg(archive.to_string_lossy().to_string())
        .arg(format!("-o{}", destination.display()))
        .arg("-y")
}
