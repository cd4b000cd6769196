//! Audiorip - extract the audio track of a video file as MP3
//!
//! A source picked by the user is resolved to a local file, a destination is
//! planned in the music directory, and ffmpeg is run as a single background
//! job whose outcome is handed to the notifiers.

pub mod cli;
pub mod config;
pub mod error;
pub mod job;
pub mod media;
pub mod notify;
pub mod output;
pub mod runner;
pub mod source;
pub mod workflow;
