use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a raw video chunk into an MP4 with merged audio
    Transcode {
        /// Raw chunk extracted from the game archive
        #[arg(short, long)]
        input: PathBuf,

        /// Chunk id the raw file is stored under
        #[arg(long)]
        id: Uuid,

        /// Base name for the exported files
        #[arg(short, long)]
        name: String,

        /// ffmpeg executable (resolved from the tools folder when omitted)
        #[arg(long)]
        video_tool: Option<PathBuf>,

        /// vgmstream-cli executable (resolved from the tools folder when omitted)
        #[arg(long)]
        audio_tool: Option<PathBuf>,

        /// Output directory for exported files
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Download and install ffmpeg and vgmstream if they are missing
    Provision {
        /// Folder the tools are installed into
        #[arg(short, long)]
        tools_dir: Option<PathBuf>,

        /// Install missing tools without asking
        #[arg(short, long)]
        yes: bool,
    },
}
