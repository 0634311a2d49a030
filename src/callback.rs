// Listener surface for player lifecycle events

use crate::song::Song;

/// Callbacks the player invokes as playback moves through its lifecycle.
///
/// All methods default to no-ops so hosts implement only what they consume.
/// Episode-start notifications (`on_playback_started`, and `on_sought_to`
/// with `playing == true`) run on the background playback thread before it
/// takes the player lock; every other callback runs while that lock is held.
/// Implementations should return quickly and must not call back into the
/// `Player` from inside a callback.
pub trait PlayerListener: Send + Sync {
    /// A playback episode began at `progress` milliseconds into the song.
    fn on_playback_started(&self, _progress: u64) {}

    /// Playback stopped at `progress` milliseconds in response to `pause()`.
    fn on_paused(&self, _progress: u64) {}

    /// A seek was applied. `playing` is true when playback continues from
    /// the new position, false when the player is stopped.
    fn on_sought_to(&self, _progress: u64, _playing: bool) {}

    /// The active song was replaced.
    fn on_song_changed(&self) {}

    /// The song played through its full duration. Under
    /// [`RepeatMode::Playlist`](crate::RepeatMode::Playlist) the returned
    /// song, if any, is played next; otherwise the return value is ignored.
    fn on_finished(&self) -> Option<Song> {
        None
    }
}
