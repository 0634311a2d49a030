// Player facade: single authoritative owner of the playback state

use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::callback::PlayerListener;
use crate::episode::{finish_playback, Episode};
use crate::error::{PlayerError, Result};
use crate::song::Song;
use crate::state::{Core, Interruption, Shared, State};

/// Policy consulted only at natural finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    /// Stop when the song finishes.
    #[default]
    None,
    /// Restart the same song from the top.
    Song,
    /// Continue with the song the listener returns from `on_finished`, if
    /// any; the collaborator owns the playlist itself.
    Playlist,
}

/// Simulated audio player.
///
/// A player is either stopped or playing. Entering the playing state spawns a
/// background thread that sleeps for the remaining duration of the song.
/// Commands issued while playing (pause, seek, song change) interrupt that
/// thread and block the caller until the interruption has been acknowledged;
/// the corresponding callbacks run on the background thread. Commands issued
/// while stopped run their callbacks on the calling thread before returning.
///
/// All methods are safe to call from any number of threads. Commands never
/// interleave with each other or with the terminal callbacks of a playback
/// episode: one lock serializes everything, and the blocking waits happen on
/// a condvar tied to that lock, re-checked against the specific episode being
/// waited on.
pub struct Player {
    shared: Arc<Shared>,
}

impl Player {
    pub fn new(listener: Arc<dyn PlayerListener>) -> Self {
        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(Core {
                    state: State::Stopped {
                        song: None,
                        progress: 0,
                    },
                    repeat: RepeatMode::None,
                    pending: None,
                }),
                cond: Condvar::new(),
                listener,
            }),
        }
    }

    /// Starts playback of the assigned song at the stored progress.
    ///
    /// Returns immediately once the episode is spawned; use
    /// `on_playback_started` to learn when the thread actually starts. A song
    /// whose stored progress already equals its duration (including a
    /// zero-length song) finishes synchronously on the calling thread instead
    /// of spawning an episode.
    pub fn play(&self) -> Result<()> {
        let mut core = self.shared.core.lock();
        let (song, progress) = match &core.state {
            State::Playing(_) => return Err(PlayerError::AlreadyPlaying),
            State::Stopped { song: None, .. } => return Err(PlayerError::NoSongSet),
            State::Stopped {
                song: Some(song),
                progress,
            } => (song.clone(), *progress),
        };
        log::info!("Starting playback of {} at {} ms", song.id, progress);
        if progress >= song.duration_ms {
            finish_playback(&self.shared, &mut core, song);
        } else {
            core.state = State::Playing(Episode::spawn(
                Arc::clone(&self.shared),
                song,
                progress,
                false,
            ));
        }
        Ok(())
    }

    /// Assigns `song` and starts it from the top.
    ///
    /// If the player is already playing, the live episode is interrupted and
    /// replaced; two episodes never coexist. The call blocks until the old
    /// episode has handed off, not until the new one finishes.
    pub fn play_song(&self, song: Song) -> Result<()> {
        let mut core = self.shared.core.lock();
        loop {
            let current = match &core.state {
                State::Stopped { .. } => None,
                State::Playing(episode) => Some(Arc::clone(episode)),
            };
            match current {
                None => {
                    log::info!("Starting playback of {} from the top", song.id);
                    if song.duration_ms == 0 {
                        core.state = State::Stopped {
                            song: Some(song.clone()),
                            progress: 0,
                        };
                        finish_playback(&self.shared, &mut core, song.clone());
                    } else {
                        core.state = State::Playing(Episode::spawn(
                            Arc::clone(&self.shared),
                            song.clone(),
                            0,
                            false,
                        ));
                    }
                    return Ok(());
                }
                Some(episode) => {
                    if self.await_retirement_if_pending(&mut core, &episode) {
                        continue;
                    }
                    log::info!("Replacing current playback with {}", song.id);
                    core.pending = Some(Interruption::SongChange(song.clone()));
                    self.shared.cond.notify_all();
                    self.wait_for_retirement(&mut core, &episode);
                    return Ok(());
                }
            }
        }
    }

    /// Pauses playback, blocking until the live episode acknowledges.
    ///
    /// Pausing an already-stopped player is a no-op, not an error: the
    /// command may legitimately race a natural finish.
    pub fn pause(&self) -> Result<()> {
        let mut core = self.shared.core.lock();
        loop {
            let episode = match &core.state {
                State::Stopped { .. } => return Ok(()),
                State::Playing(episode) => Arc::clone(episode),
            };
            if self.await_retirement_if_pending(&mut core, &episode) {
                continue;
            }
            log::info!("Pausing playback");
            core.pending = Some(Interruption::Pause);
            self.shared.cond.notify_all();
            self.wait_for_retirement(&mut core, &episode);
            return Ok(());
        }
    }

    /// Seeks to `progress` milliseconds within the current song.
    ///
    /// Validated against the song duration before any state changes. While
    /// stopped the seek applies immediately and `on_sought_to(progress,
    /// false)` fires before this returns; while playing the live episode is
    /// interrupted and a replacement spawned at the target, which announces
    /// itself with `on_sought_to(progress, true)`. Seeking at or past the end
    /// of a playing song finishes it.
    pub fn seek_to(&self, progress: u64) -> Result<()> {
        enum Target {
            Stopped(Song),
            Playing(Arc<Episode>),
        }

        let mut core = self.shared.core.lock();
        loop {
            let target = match &core.state {
                State::Stopped { song: None, .. } => return Err(PlayerError::NoSongSet),
                State::Stopped {
                    song: Some(song), ..
                } => Target::Stopped(song.clone()),
                State::Playing(episode) => Target::Playing(Arc::clone(episode)),
            };
            match target {
                Target::Stopped(song) => {
                    if progress > song.duration_ms {
                        return Err(PlayerError::InvalidProgress {
                            requested: progress,
                            duration: song.duration_ms,
                        });
                    }
                    log::info!("Seeking to {} ms while stopped", progress);
                    core.state = State::Stopped {
                        song: Some(song),
                        progress,
                    };
                    self.shared.listener.on_sought_to(progress, false);
                    return Ok(());
                }
                Target::Playing(episode) => {
                    if progress > episode.song().duration_ms {
                        return Err(PlayerError::InvalidProgress {
                            requested: progress,
                            duration: episode.song().duration_ms,
                        });
                    }
                    if self.await_retirement_if_pending(&mut core, &episode) {
                        continue;
                    }
                    log::info!("Seeking to {} ms", progress);
                    core.pending = Some(Interruption::Seek(progress));
                    self.shared.cond.notify_all();
                    self.wait_for_retirement(&mut core, &episode);
                    return Ok(());
                }
            }
        }
    }

    /// Replaces the active song.
    ///
    /// While stopped the change applies immediately at progress 0 and
    /// `on_song_changed` fires before this returns. While playing the live
    /// episode is interrupted and a replacement starts the new song from the
    /// top.
    pub fn change_song(&self, song: Song) -> Result<()> {
        let mut core = self.shared.core.lock();
        loop {
            let current = match &core.state {
                State::Stopped { .. } => None,
                State::Playing(episode) => Some(Arc::clone(episode)),
            };
            match current {
                None => {
                    log::info!("Song changed to {} while stopped", song.id);
                    core.state = State::Stopped {
                        song: Some(song.clone()),
                        progress: 0,
                    };
                    self.shared.listener.on_song_changed();
                    return Ok(());
                }
                Some(episode) => {
                    if self.await_retirement_if_pending(&mut core, &episode) {
                        continue;
                    }
                    core.pending = Some(Interruption::SongChange(song.clone()));
                    self.shared.cond.notify_all();
                    self.wait_for_retirement(&mut core, &episode);
                    return Ok(());
                }
            }
        }
    }

    /// Current progress in milliseconds. While playing this is a
    /// point-in-time estimate derived from the episode's published start
    /// timestamp, monotonic only up to scheduler jitter.
    pub fn get_progress(&self) -> u64 {
        match &self.shared.core.lock().state {
            State::Stopped { progress, .. } => *progress,
            State::Playing(episode) => episode.progress(),
        }
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) {
        log::debug!("Repeat mode set to {:?}", mode);
        self.shared.core.lock().repeat = mode;
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.shared.core.lock().repeat
    }

    /// The song currently assigned, playing or not.
    pub fn current_song(&self) -> Option<Song> {
        match &self.shared.core.lock().state {
            State::Stopped { song, .. } => song.clone(),
            State::Playing(episode) => Some(episode.song().clone()),
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.shared.core.lock().state, State::Playing(_))
    }

    /// Waits for a previously issued, still-unconsumed interruption to be
    /// acknowledged. Returns true if it waited, in which case the caller must
    /// re-evaluate the player state: a replacement episode may already be
    /// live. A pending reason is never overwritten.
    fn await_retirement_if_pending(
        &self,
        core: &mut MutexGuard<'_, Core>,
        episode: &Episode,
    ) -> bool {
        if core.pending.is_none() {
            return false;
        }
        self.wait_for_retirement(core, episode);
        true
    }

    /// Blocks until the given episode has terminated. The condvar wait
    /// releases the lock while parked; wakeups (including spurious ones) are
    /// re-checked against this specific episode, so a replacement taking over
    /// the playing state does not end the wait early.
    fn wait_for_retirement(&self, core: &mut MutexGuard<'_, Core>, episode: &Episode) {
        while !episode.is_done() {
            self.shared.cond.wait(core);
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        // Retire any live episode so its thread does not keep simulating
        // into the void; a normal pause, callbacks included.
        let _ = self.pause();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::callback::recording::{Event, RecordingListener};

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn song(id: &str, duration_ms: u64) -> Song {
        Song::new(id, format!("Title {}", id), "Test Artist", duration_ms)
    }

    fn fixture() -> (Player, Arc<RecordingListener>) {
        init_logs();
        let listener = Arc::new(RecordingListener::new());
        (Player::new(listener.clone()), listener)
    }

    #[test]
    fn seek_while_stopped_is_synchronous() {
        let (player, listener) = fixture();
        player.change_song(song("a", 1000)).unwrap();
        player.seek_to(300).unwrap();
        assert_eq!(player.get_progress(), 300);
        assert_eq!(
            listener.events(),
            vec![Event::SongChanged, Event::SoughtTo(300, false)]
        );
    }

    #[test]
    fn pause_stops_at_elapsed_progress() {
        let (player, listener) = fixture();
        player.play_song(song("a", 1000)).unwrap();
        thread::sleep(Duration::from_millis(80));
        player.pause().unwrap();
        let progress = player.get_progress();
        assert!(progress >= 50, "paused at {} ms, before the delay", progress);
        assert!(progress <= 1000);
        assert_eq!(listener.count(|e| matches!(e, Event::Paused(_))), 1);
        assert!(!player.is_playing());
    }

    #[test]
    fn pause_is_idempotent() {
        let (player, listener) = fixture();
        player.play_song(song("a", 500)).unwrap();
        thread::sleep(Duration::from_millis(30));
        player.pause().unwrap();
        player.pause().unwrap();
        assert_eq!(listener.count(|e| matches!(e, Event::Paused(_))), 1);
    }

    #[test]
    fn zero_duration_song_finishes_synchronously() {
        let (player, listener) = fixture();
        player.play_song(song("a", 0)).unwrap();
        assert!(!player.is_playing());
        assert_eq!(listener.events(), vec![Event::Finished]);
        assert_eq!(player.get_progress(), 0);
    }

    #[test]
    fn repeat_song_restarts_without_a_command() {
        let (player, listener) = fixture();
        player.set_repeat_mode(RepeatMode::Song);
        player.play_song(song("a", 60)).unwrap();
        assert!(listener.wait_for(Duration::from_secs(2), |e| *e == Event::Finished));
        assert!(listener.wait_for_count(Duration::from_secs(2), 2, |e| {
            *e == Event::Started(0)
        }));
        assert!(player.is_playing());
        player.set_repeat_mode(RepeatMode::None);
        player.pause().unwrap();
    }

    #[test]
    fn seek_while_playing_continues_from_target() {
        let (player, listener) = fixture();
        player.play_song(song("a", 2000)).unwrap();
        player.seek_to(1500).unwrap();
        assert!(listener.wait_for(Duration::from_millis(400), |e| {
            *e == Event::SoughtTo(1500, true)
        }));
        // finish arrives after the remaining ~500 ms, well before the full
        // 2000 ms would have elapsed
        assert!(listener.wait_for(Duration::from_millis(1200), |e| *e == Event::Finished));
        assert_eq!(listener.count(|e| *e == Event::Finished), 1);
        assert!(!player.is_playing());
    }

    #[test]
    fn pause_racing_natural_finish_yields_one_outcome() {
        let (player, listener) = fixture();
        player.play_song(song("a", 60)).unwrap();
        thread::sleep(Duration::from_millis(58));
        player.pause().unwrap();
        let paused = listener.count(|e| matches!(e, Event::Paused(_)));
        let finished = listener.count(|e| *e == Event::Finished);
        assert_eq!(
            paused + finished,
            1,
            "expected one terminal callback, got {} paused / {} finished",
            paused,
            finished
        );
        assert!(!player.is_playing());
    }

    #[test]
    fn seek_beyond_duration_is_rejected() {
        let (player, listener) = fixture();
        player.change_song(song("a", 1000)).unwrap();
        let err = player.seek_to(1001).unwrap_err();
        assert_eq!(
            err,
            PlayerError::InvalidProgress {
                requested: 1001,
                duration: 1000
            }
        );
        assert_eq!(player.get_progress(), 0);
        assert_eq!(listener.count(|e| matches!(e, Event::SoughtTo(..))), 0);
    }

    #[test]
    fn seek_beyond_duration_while_playing_is_rejected() {
        let (player, _listener) = fixture();
        player.play_song(song("a", 500)).unwrap();
        let err = player.seek_to(501).unwrap_err();
        assert_eq!(
            err,
            PlayerError::InvalidProgress {
                requested: 501,
                duration: 500
            }
        );
        assert!(player.is_playing());
        player.pause().unwrap();
    }

    #[test]
    fn commands_without_a_song_are_rejected() {
        let (player, listener) = fixture();
        assert_eq!(player.play().unwrap_err(), PlayerError::NoSongSet);
        assert_eq!(player.seek_to(0).unwrap_err(), PlayerError::NoSongSet);
        // pause is always a safe no-op
        player.pause().unwrap();
        assert!(listener.events().is_empty());
    }

    #[test]
    fn play_while_playing_is_rejected() {
        let (player, _listener) = fixture();
        player.play_song(song("a", 500)).unwrap();
        assert_eq!(player.play().unwrap_err(), PlayerError::AlreadyPlaying);
        player.pause().unwrap();
    }

    #[test]
    fn change_song_while_playing_hands_off_to_new_episode() {
        let (player, listener) = fixture();
        player.play_song(song("a", 5000)).unwrap();
        thread::sleep(Duration::from_millis(40));
        player.change_song(song("b", 5000)).unwrap();
        assert_eq!(player.current_song().unwrap().id, "b");
        assert_eq!(listener.count(|e| *e == Event::SongChanged), 1);
        assert!(listener.wait_for_count(Duration::from_millis(400), 2, |e| {
            *e == Event::Started(0)
        }));
        // the change announcement precedes the replacement's start
        let events = listener.events();
        let changed = events
            .iter()
            .position(|e| *e == Event::SongChanged)
            .unwrap();
        let second_start = events
            .iter()
            .enumerate()
            .filter(|(_, e)| **e == Event::Started(0))
            .map(|(i, _)| i)
            .nth(1)
            .unwrap();
        assert!(changed < second_start);
        player.pause().unwrap();
    }

    #[test]
    fn natural_finish_rewinds_and_play_restarts() {
        let (player, listener) = fixture();
        player.play_song(song("a", 80)).unwrap();
        assert!(listener.wait_for(Duration::from_secs(2), |e| *e == Event::Finished));
        assert!(!player.is_playing());
        assert_eq!(player.get_progress(), 0);
        player.play().unwrap();
        assert!(listener.wait_for_count(Duration::from_millis(400), 2, |e| {
            *e == Event::Started(0)
        }));
        player.pause().unwrap();
    }

    #[test]
    fn play_at_full_progress_redelivers_finish() {
        let (player, listener) = fixture();
        player.change_song(song("a", 1000)).unwrap();
        player.seek_to(1000).unwrap();
        player.play().unwrap();
        assert!(!player.is_playing());
        assert_eq!(listener.count(|e| *e == Event::Finished), 1);
        assert_eq!(listener.count(|e| matches!(e, Event::Started(_))), 0);
        assert_eq!(player.get_progress(), 0);
    }

    #[test]
    fn playlist_mode_continues_with_listener_supplied_song() {
        let (player, listener) = fixture();
        player.set_repeat_mode(RepeatMode::Playlist);
        listener.queue_next(song("b", 5000));
        player.play_song(song("a", 60)).unwrap();
        assert!(listener.wait_for(Duration::from_secs(2), |e| *e == Event::Finished));
        assert!(listener.wait_for_count(Duration::from_secs(2), 2, |e| {
            *e == Event::Started(0)
        }));
        assert_eq!(player.current_song().unwrap().id, "b");
        player.pause().unwrap();
    }

    #[test]
    fn playlist_mode_stops_when_listener_has_nothing_queued() {
        let (player, listener) = fixture();
        player.set_repeat_mode(RepeatMode::Playlist);
        player.play_song(song("a", 60)).unwrap();
        assert!(listener.wait_for(Duration::from_secs(2), |e| *e == Event::Finished));
        thread::sleep(Duration::from_millis(20));
        assert!(!player.is_playing());
        assert_eq!(listener.count(|e| matches!(e, Event::Started(_))), 1);
    }

    #[test]
    fn play_song_while_playing_swaps_without_overlap() {
        let (player, listener) = fixture();
        player.play_song(song("a", 5000)).unwrap();
        thread::sleep(Duration::from_millis(30));
        player.play_song(song("b", 5000)).unwrap();
        assert!(player.is_playing());
        assert_eq!(player.current_song().unwrap().id, "b");
        assert_eq!(listener.count(|e| *e == Event::SongChanged), 1);
        player.pause().unwrap();
        assert_eq!(listener.count(|e| matches!(e, Event::Paused(_))), 1);
    }

    #[test]
    fn progress_tracks_wall_clock_while_playing() {
        let (player, _listener) = fixture();
        player.play_song(song("a", 2000)).unwrap();
        thread::sleep(Duration::from_millis(100));
        let p1 = player.get_progress();
        thread::sleep(Duration::from_millis(100));
        let p2 = player.get_progress();
        assert!(p1 > 0);
        assert!(p2 >= p1);
        assert!(p2 <= 2000);
        player.pause().unwrap();
    }

    #[test]
    fn concurrent_commands_stay_consistent() {
        let (player, listener) = fixture();
        let player = Arc::new(player);
        player.play_song(song("a", 400)).unwrap();
        let mut handles = Vec::new();
        for i in 0..4u64 {
            let p = Arc::clone(&player);
            handles.push(thread::spawn(move || {
                thread::sleep(Duration::from_millis(10 * i));
                let _ = p.seek_to(100 + i * 10);
                let _ = p.pause();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(!player.is_playing());
        assert!(player.get_progress() <= 400);
        // at most one natural finish can exist for the whole run
        assert!(listener.count(|e| *e == Event::Finished) <= 1);
    }

    #[test]
    fn drop_while_playing_retires_the_episode() {
        let (player, listener) = fixture();
        player.play_song(song("a", 5000)).unwrap();
        thread::sleep(Duration::from_millis(20));
        drop(player);
        assert_eq!(listener.count(|e| matches!(e, Event::Paused(_))), 1);
    }
}
