use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, ExportError};

fn default_raw_extension() -> String {
    "vp6".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub tools: ToolsConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Folder that holds the ffmpeg/ and vgmstream/ installations
    pub root: PathBuf,
    /// Archive with a static FFmpeg build (.7z or .zip)
    pub ffmpeg_url: String,
    /// Archive with the vgmstream command line decoder (.zip or .7z)
    pub vgmstream_url: String,
    /// Standalone 7-Zip console extractor, fetched only for .7z archives
    pub sevenzip_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory receiving raw chunks, intermediates and merged output
    pub output_dir: PathBuf,
    /// Extension given to the raw chunk written to disk
    #[serde(default = "default_raw_extension")]
    pub raw_extension: String,
    /// Place every job under `<output_dir>/<id>/` instead of sharing one folder
    #[serde(default)]
    pub isolate_jobs: bool,
    pub video: VideoEncodeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoEncodeConfig {
    pub video_codec: String,
    /// Constant rate factor (0-51, lower = better quality)
    pub crf: u32,
    /// Encoding speed (ultrafast, fast, medium, slow, veryslow)
    pub preset: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: ToolsConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("videoexporter_utils"),
            ffmpeg_url: "https://www.gyan.dev/ffmpeg/builds/ffmpeg-git-essentials.7z".to_string(),
            vgmstream_url: "https://github.com/vgmstream/vgmstream-releases/releases/download/nightly/vgmstream-win64.zip".to_string(),
            sevenzip_url: "https://www.7-zip.org/a/7zr.exe".to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("exported"),
            raw_extension: default_raw_extension(),
            isolate_jobs: false,
            video: VideoEncodeConfig::default(),
        }
    }
}

impl Default for VideoEncodeConfig {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            crf: 18,
            preset: "slow".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ExportError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ExportError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ExportError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ExportError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
