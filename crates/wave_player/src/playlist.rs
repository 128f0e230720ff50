//! The track list, and the file which remembers where we were in it.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

#[derive(Debug)]
pub struct Playlist {
    tracks: Vec<PathBuf>,
    current: usize,
}

impl Playlist {
    pub fn new(tracks: Vec<PathBuf>) -> Result<Self> {
        anyhow::ensure!(!tracks.is_empty(), "The playlist is empty");
        Ok(Playlist { tracks, current: 0 })
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &Path {
        &self.tracks[self.current]
    }

    pub fn is_last(&self) -> bool {
        self.current + 1 == self.tracks.len()
    }

    /// Move to `index`, returning false and staying put if it is out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.tracks.len() {
            return false;
        }
        self.current = index;
        true
    }

    /// Move forward one track, wrapping to the first.
    pub fn next(&mut self) -> usize {
        self.current = (self.current + 1) % self.tracks.len();
        self.current
    }

    /// Move back one track, wrapping to the last.
    pub fn prev(&mut self) -> usize {
        self.current = self.current.checked_sub(1).unwrap_or(self.tracks.len() - 1);
        self.current
    }
}

/// Persists the current track number as a decimal integer in a text file.
#[derive(Debug)]
pub struct TrackIndexStore {
    path: PathBuf,
}

impl TrackIndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TrackIndexStore { path: path.into() }
    }

    /// The saved index, or 0 if there isn't a usable one for a playlist of `len` tracks.
    pub fn load(&self, len: usize) -> usize {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No saved track index at {}; starting at the first track", self.path.display());
                return 0;
            }
            Err(e) => {
                warn!("Unable to read {}: {e}; starting at the first track", self.path.display());
                return 0;
            }
        };

        match text.trim().parse::<usize>() {
            Ok(i) if i < len => i,
            Ok(i) => {
                warn!("Saved track index {i} is past the end of a {len} track playlist; starting at the first track");
                0
            }
            Err(_) => {
                warn!(
                    "{} holds {:?}, which is not a track index; starting at the first track",
                    self.path.display(),
                    text.trim()
                );
                0
            }
        }
    }

    pub fn save(&self, index: usize) -> Result<()> {
        std::fs::write(&self.path, format!("{index}\n"))
            .with_context(|| format!("While saving the track index to {}", self.path.display()))
    }
}
