// Immutable song descriptor supplied by an external catalog

/// A song the player can simulate. Songs are plain values with a lifetime
/// independent of the player; the player only references the active one and
/// never owns catalog storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub artist: String,
    /// Declared playback length in milliseconds.
    pub duration_ms: u64,
}

impl Song {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            duration_ms,
        }
    }
}
