//! vidxport - Raw video chunk export
//!
//! Turns raw game video chunks into playable MP4 files by running ffmpeg and
//! vgmstream as external tools, and installs both tools on first use.

pub mod cli;
pub mod config;
pub mod error;
pub mod job;
pub mod media;
pub mod pipeline;
pub mod setup;
pub mod tools;
