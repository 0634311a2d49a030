// Shared player state, guarded by the single lock in `Shared`

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::callback::PlayerListener;
use crate::episode::Episode;
use crate::player::RepeatMode;
use crate::song::Song;

/// The one lock/condvar pair serializing every facade command against the
/// playback episode's own finish and interruption handling, plus the listener
/// receiving lifecycle callbacks.
pub(crate) struct Shared {
    pub(crate) core: Mutex<Core>,
    pub(crate) cond: Condvar,
    pub(crate) listener: Arc<dyn PlayerListener>,
}

pub(crate) struct Core {
    pub(crate) state: State,
    pub(crate) repeat: RepeatMode,
    /// Interruption directed at the currently playing episode. Written under
    /// the lock by facade commands, consumed under the lock at the episode's
    /// decision point. Never overwritten while unconsumed.
    pub(crate) pending: Option<Interruption>,
}

/// Replaced wholesale on every transition, never mutated in place. Exactly one
/// `State` is current at any instant.
pub(crate) enum State {
    Stopped { song: Option<Song>, progress: u64 },
    Playing(Arc<Episode>),
}

/// Reason a playback episode is being cancelled. At most one per episode.
pub(crate) enum Interruption {
    Pause,
    Seek(u64),
    SongChange(Song),
}
