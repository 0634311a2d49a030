// Error handling for the simulated player

use std::fmt;

/// Player command error types.
///
/// Every rejection is synchronous at the command boundary; errors are never
/// delivered through a listener callback. Races inherent to the concurrency
/// model (a pause arriving just as a song finishes) are defined outcomes, not
/// errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    /// Seek target lies outside the song's duration
    InvalidProgress { requested: u64, duration: u64 },

    /// `play()` was called while a playback episode is already active
    AlreadyPlaying,

    /// A command that needs a song was issued before any song was assigned
    NoSongSet,
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlayerError::InvalidProgress {
                requested,
                duration,
            } => write!(
                f,
                "Invalid progress: {} ms is outside the song duration of {} ms",
                requested, duration
            ),
            PlayerError::AlreadyPlaying => write!(f, "Player is already playing"),
            PlayerError::NoSongSet => write!(f, "No song set"),
        }
    }
}

impl std::error::Error for PlayerError {}

/// Result type alias for player commands
pub type Result<T> = std::result::Result<T, PlayerError>;
