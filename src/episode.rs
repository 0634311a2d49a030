// One playback episode: a background thread that sleeps for the remaining
// song duration and then decides between natural finish and interruption

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use parking_lot::MutexGuard;

use crate::player::RepeatMode;
use crate::song::Song;
use crate::state::{Core, Interruption, Shared, State};

/// A single live playback timer. Immutable after construction except for the
/// write-once start timestamp and the terminal `done` flag; a transition out
/// of this episode publishes a brand-new `State`, never mutates this one.
pub(crate) struct Episode {
    song: Song,
    start_progress: u64,
    /// Written once by the episode thread right before it starts waiting.
    /// Progress queries read it without taking the player lock.
    started_at: OnceCell<Instant>,
    done: AtomicBool,
}

impl Episode {
    /// Spawns the episode thread and returns the handle that becomes the new
    /// `Playing` state. The thread announces itself to the listener, waits
    /// out the remaining duration, and retires through exactly one of the
    /// terminal paths in `run`.
    pub(crate) fn spawn(
        shared: Arc<Shared>,
        song: Song,
        start_progress: u64,
        sought: bool,
    ) -> Arc<Episode> {
        let episode = Arc::new(Episode {
            song,
            start_progress,
            started_at: OnceCell::new(),
            done: AtomicBool::new(false),
        });
        let handle = Arc::clone(&episode);
        thread::spawn(move || handle.run(shared, sought));
        episode
    }

    pub(crate) fn song(&self) -> &Song {
        &self.song
    }

    /// True once the episode thread has finished its terminal transition and
    /// every associated callback has returned.
    pub(crate) fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Point-in-time progress estimate, clamped to the song duration.
    /// Lock-free: reads only the published start timestamp.
    pub(crate) fn progress(&self) -> u64 {
        match self.started_at.get() {
            Some(started) => {
                let elapsed = started.elapsed().as_millis() as u64;
                (self.start_progress + elapsed).min(self.song.duration_ms)
            }
            None => self.start_progress,
        }
    }

    fn run(self: Arc<Self>, shared: Arc<Shared>, sought: bool) {
        log::info!("Playing {} from {} ms", self.song.id, self.start_progress);
        if sought {
            shared.listener.on_sought_to(self.start_progress, true);
        } else {
            shared.listener.on_playback_started(self.start_progress);
        }

        let started = Instant::now();
        let remaining = self.song.duration_ms.saturating_sub(self.start_progress);
        let deadline = started + Duration::from_millis(remaining);
        let _ = self.started_at.set(started);

        let mut core = shared.core.lock();
        loop {
            // A pending interruption always wins over the timer, even when
            // both are in flight: it is checked first on every wake, so a
            // clean timeout never drops a pause/seek/song-change that was
            // recorded before we got here.
            if let Some(reason) = core.pending.take() {
                self.interrupted(&mut core, &shared, reason);
                break;
            }
            if Instant::now() >= deadline {
                log::info!("Playback completed for {}", self.song.id);
                finish_playback(&shared, &mut core, self.song.clone());
                break;
            }
            let _ = shared.cond.wait_until(&mut core, deadline);
        }
        self.done.store(true, Ordering::Release);
        shared.cond.notify_all();
    }

    fn interrupted(
        &self,
        core: &mut MutexGuard<'_, Core>,
        shared: &Arc<Shared>,
        reason: Interruption,
    ) {
        match reason {
            Interruption::Pause => {
                let progress = self.progress();
                log::info!("Paused {} at {} ms", self.song.id, progress);
                core.state = State::Stopped {
                    song: Some(self.song.clone()),
                    progress,
                };
                shared.listener.on_paused(progress);
            }
            Interruption::Seek(progress) => {
                if progress >= self.song.duration_ms {
                    // Seeking at or past the end finishes the song.
                    finish_playback(shared, core, self.song.clone());
                } else {
                    log::debug!("Seek hand-off: {} resumes at {} ms", self.song.id, progress);
                    core.state = State::Playing(Episode::spawn(
                        Arc::clone(shared),
                        self.song.clone(),
                        progress,
                        true,
                    ));
                }
            }
            Interruption::SongChange(song) => {
                log::info!("Song changed: {} -> {}", self.song.id, song.id);
                shared.listener.on_song_changed();
                core.state = State::Playing(Episode::spawn(Arc::clone(shared), song, 0, false));
            }
        }
    }
}

/// Natural-finish policy, shared between the episode's timer path and the
/// facade's synchronous path for zero-length or fully-played songs. Runs
/// inside the critical section; a repeat or playlist continuation is spawned
/// before the lock is released, so the state is never `Playing` without a
/// live episode.
pub(crate) fn finish_playback(shared: &Arc<Shared>, core: &mut MutexGuard<'_, Core>, song: Song) {
    let next = shared.listener.on_finished();
    match core.repeat {
        RepeatMode::Song => {
            log::debug!("Repeating {}", song.id);
            core.state = State::Playing(Episode::spawn(Arc::clone(shared), song, 0, false));
        }
        RepeatMode::Playlist => match next {
            Some(next) => {
                log::debug!("Continuing playlist with {}", next.id);
                core.state = State::Playing(Episode::spawn(Arc::clone(shared), next, 0, false));
            }
            None => {
                core.state = State::Stopped {
                    song: Some(song),
                    progress: 0,
                };
            }
        },
        RepeatMode::None => {
            core.state = State::Stopped {
                song: Some(song),
                progress: 0,
            };
        }
    }
}
