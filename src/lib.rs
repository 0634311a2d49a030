// Simulated audio playback library
// Tracks elapsed wall-clock time against a declared song duration and emits
// lifecycle callbacks; no audio is ever decoded or rendered.
//
// A player is either STOPPED or PLAYING. Entering PLAYING spawns a background
// thread that sleeps for the remaining duration of the song, simulating its
// playback. Commands issued while PLAYING (pause, seek, song change)
// interrupt that thread and block the caller until the interruption has been
// acknowledged on the background thread. Commands issued while STOPPED run
// their callbacks on the calling thread before returning.

pub mod callback;
pub mod error;
pub mod player;
pub mod song;

mod episode;
mod state;

// Re-exports
pub use callback::PlayerListener;
pub use error::{PlayerError, Result};
pub use player::{Player, RepeatMode};
pub use song::Song;
