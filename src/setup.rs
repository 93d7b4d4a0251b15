use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::ToolsConfig;
use crate::error::{ExportError, Result};
use crate::media::{self, CommandRunner};
use crate::tools::{ToolKind, ToolLocator, ToolPaths};

/// Decides whether a missing tool may be downloaded and installed
#[cfg_attr(test, mockall::automock)]
pub trait ConsentPrompt: Send + Sync {
    fn confirm(&self, tool: ToolKind) -> bool;
}

/// Installs everything without asking
#[derive(Debug, Default)]
pub struct AlwaysConsent;

impl ConsentPrompt for AlwaysConsent {
    fn confirm(&self, _tool: ToolKind) -> bool {
        true
    }
}

/// Asks on the terminal, defaulting to no
#[derive(Debug, Default)]
pub struct TerminalConsent;

impl ConsentPrompt for TerminalConsent {
    fn confirm(&self, tool: ToolKind) -> bool {
        print!("{} is not installed\nDo you wish to set it up? [y/N] ", tool);
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    SevenZip,
}

impl ArchiveFormat {
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
        if path.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else if path.ends_with(".7z") {
            Some(ArchiveFormat::SevenZip)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::SevenZip => "7z",
        }
    }
}

/// Makes sure ffmpeg and vgmstream are installed below the tools root
pub struct Provisioner {
    client: Client,
    config: ToolsConfig,
    locator: ToolLocator,
    runner: Box<dyn CommandRunner>,
    consent: Box<dyn ConsentPrompt>,
}

impl Provisioner {
    pub fn new(
        config: ToolsConfig,
        runner: Box<dyn CommandRunner>,
        consent: Box<dyn ConsentPrompt>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("vidxport/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(client, config, runner, consent))
    }

    /// Use a preconfigured HTTP client, e.g. one with custom proxy settings
    pub fn with_client(
        client: Client,
        config: ToolsConfig,
        runner: Box<dyn CommandRunner>,
        consent: Box<dyn ConsentPrompt>,
    ) -> Self {
        let locator = ToolLocator::new(&config.root);

        Self {
            client,
            config,
            locator,
            runner,
            consent,
        }
    }

    /// Current tool locations, without installing anything
    pub fn status(&self) -> ToolPaths {
        self.locator.locate_all()
    }

    /// Install whatever is missing, one tool after the other.
    ///
    /// Tools that are already present are left alone, so this is safe to call
    /// on every startup. A declined prompt is not an error: the tool simply
    /// stays unresolved in the returned paths.
    pub async fn ensure(&self) -> Result<ToolPaths> {
        let root = self.locator.root();
        async_fs::create_dir_all(root)
            .await
            .map_err(|e| ExportError::io("create directory", root, e))?;

        for kind in ToolKind::ALL {
            if let Some(path) = self.locator.locate(kind) {
                debug!("{} already installed at {}", kind, path.display());
                continue;
            }

            if !self.consent.confirm(kind) {
                warn!("{} is not installed and setup was declined", kind);
                continue;
            }

            self.install(kind).await?;
        }

        let paths = self.locator.locate_all();
        for kind in ToolKind::ALL {
            match paths.get(kind) {
                Some(_) => info!("{}: Ready", kind),
                None => warn!("{}: Missing", kind),
            }
        }

        Ok(paths)
    }

    fn url_for(&self, kind: ToolKind) -> &str {
        match kind {
            ToolKind::Video => &self.config.ffmpeg_url,
            ToolKind::Audio => &self.config.vgmstream_url,
        }
    }

    async fn install(&self, kind: ToolKind) -> Result<()> {
        let url = self.url_for(kind);
        let format = ArchiveFormat::from_url(url).ok_or_else(|| {
            ExportError::Config(format!("Unsupported archive type for {}: {}", kind, url))
        })?;

        let archive = self
            .locator
            .root()
            .join(format!("{}.{}", kind.folder_name(), format.extension()));
        let destination = self.locator.install_dir(kind);

        info!("Installing {} from {}", kind, url);
        self.download(url, &archive).await?;

        match format {
            ArchiveFormat::Zip => extract_zip(&archive, &destination).await?,
            ArchiveFormat::SevenZip => self.extract_7z(&archive, &destination).await?,
        }

        if self.locator.locate(kind).is_none() {
            warn!(
                "{} was extracted to {} but {} was not found inside",
                archive.display(),
                destination.display(),
                kind.binary_name()
            );
        }
        Ok(())
    }

    /// Stream `url` to `dest`, going through a `.part` file so an interrupted
    /// download never looks complete.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let download_error = |reason: String| ExportError::Download {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(download_error(format!("HTTP {}", response.status())));
        }

        let total = response.content_length();
        let pb = match total {
            Some(len) => ProgressBar::new(len).with_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .map(|style| style.progress_chars("#>-"))
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            ),
            None => ProgressBar::new_spinner(),
        };

        let part = part_path(dest);
        let written = async {
            let mut file = async_fs::File::create(&part)
                .await
                .map_err(|e| ExportError::io("create", &part, e))?;

            let mut stream = response.bytes_stream();
            let mut downloaded: u64 = 0;
            let mut last_reported = 0;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| download_error(e.to_string()))?;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| ExportError::io("write", &part, e))?;

                downloaded += chunk.len() as u64;
                pb.set_position(downloaded);
                if let Some(len) = total.filter(|len| *len > 0) {
                    let percent = downloaded * 100 / len;
                    if percent >= last_reported + 10 {
                        debug!("Downloading progress: {}%", percent);
                        last_reported = percent;
                    }
                }
            }

            file.flush()
                .await
                .map_err(|e| ExportError::io("write", &part, e))?;
            Ok::<u64, ExportError>(downloaded)
        }
        .await;

        let downloaded = match written {
            Ok(downloaded) => downloaded,
            Err(e) => {
                pb.abandon();
                if let Err(remove_err) = async_fs::remove_file(&part).await {
                    warn!("Could not remove {}: {}", part.display(), remove_err);
                }
                return Err(e);
            }
        };

        async_fs::rename(&part, dest)
            .await
            .map_err(|e| ExportError::io("rename", &part, e))?;

        pb.finish_and_clear();
        info!("Downloaded {} ({} bytes) to {}", url, downloaded, dest.display());
        Ok(())
    }

    /// Extract a .7z archive with the standalone 7-Zip console binary,
    /// fetching the binary first when it is not in the tools root yet.
    async fn extract_7z(&self, archive: &Path, destination: &Path) -> Result<()> {
        let extractor = self
            .locator
            .root()
            .join(format!("7zr{}", std::env::consts::EXE_SUFFIX));

        if !extractor.is_file() {
            self.download(&self.config.sevenzip_url, &extractor).await?;
            make_executable(&extractor)?;
        }

        let command = media::sevenzip_extract(&extractor, archive, destination);
        let exit_code = media::execute(self.runner.as_ref(), &command).await?;
        if exit_code != 0 {
            return Err(ExportError::Extraction {
                archive: archive.to_path_buf(),
                reason: format!("7-Zip exited with code {}", exit_code),
            });
        }

        Ok(())
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}

/// Unpack a zip archive into `destination` on a blocking thread
pub async fn extract_zip(archive: &Path, destination: &Path) -> Result<()> {
    let archive = archive.to_path_buf();
    let destination = destination.to_path_buf();
    let extraction_error = |archive: &Path, reason: String| ExportError::Extraction {
        archive: archive.to_path_buf(),
        reason,
    };

    info!("Extracting {} to {}", archive.display(), destination.display());

    let task_archive = archive.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = std::fs::File::open(&task_archive)
            .map_err(|e| ExportError::io("open", &task_archive, e))?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| extraction_error(&task_archive, e.to_string()))?;
        zip.extract(&destination)
            .map_err(|e| extraction_error(&task_archive, e.to_string()))
    })
    .await
    .map_err(|e| extraction_error(&archive, e.to_string()))?
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| ExportError::io("set permissions on", path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
