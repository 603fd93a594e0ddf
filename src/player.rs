/// Playback control surface used by the chapter editor
///
/// The actual decoder/renderer sits behind [`PlayerEngine`]. This module keeps
/// the editor-side behaviour: seek step sizes per modifier key, playback rate
/// presets, the pause re-applied after seeking while paused, and the periodic
/// progress refresh that stays quiet while the user drags the position control.
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::chapters::format_offset;
use crate::config::PlaybackConfig;

/// Operations the editor needs from a media player. Times are milliseconds.
pub trait PlayerEngine: Send {
    fn time(&self) -> u64;
    fn set_time(&mut self, offset: u64);
    /// Total media length, 0 when nothing is loaded
    fn duration(&self) -> u64;
    fn is_playing(&self) -> bool;
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn rate(&self) -> f32;
    fn set_rate(&mut self, rate: f32);
}

/// Coarse playback speed, as shown on the rate button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackRate {
    Slow,
    Normal,
    Fast,
}

impl PlaybackRate {
    pub fn classify(rate: f32) -> Self {
        if rate < 0.75 {
            PlaybackRate::Slow
        } else if rate > 1.25 {
            PlaybackRate::Fast
        } else {
            PlaybackRate::Normal
        }
    }
}

/// Modifier key held while clicking a control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modifier {
    #[default]
    None,
    Shift,
    Control,
}

/// Seek distances in milliseconds for each modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekSteps {
    pub plain: u64,
    pub shift: u64,
    pub control: u64,
}

impl SeekSteps {
    /// Skip buttons: 10 s, 30 s with shift, 5 s with control
    pub fn jump() -> Self {
        Self { plain: 10_000, shift: 30_000, control: 5_000 }
    }

    /// Frame buttons: 0.5 s, 1 s with shift, 0.1 s with control
    pub fn frame() -> Self {
        Self { plain: 500, shift: 1_000, control: 100 }
    }

    pub fn step(&self, modifier: Modifier) -> u64 {
        match modifier {
            Modifier::None => self.plain,
            Modifier::Shift => self.shift,
            Modifier::Control => self.control,
        }
    }
}

/// Editor-side wrapper around a player engine
pub struct PlayerController<E: PlayerEngine> {
    engine: E,
    settle_delay: Duration,
    fast_rate: f32,
    slow_rate: f32,
    jump: SeekSteps,
    frame: SeekSteps,
    pause_after_time_change: bool,
}

impl<E: PlayerEngine> PlayerController<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            settle_delay: Duration::from_millis(50),
            fast_rate: 2.0,
            slow_rate: 0.5,
            jump: SeekSteps::jump(),
            frame: SeekSteps::frame(),
            pause_after_time_change: false,
        }
    }

    /// Controller using the `[playback]` settings
    pub fn from_config(engine: E, config: &PlaybackConfig) -> Self {
        let mut controller = Self::new(engine)
            .with_settle_delay(config.settle_delay())
            .with_rates(config.slow_rate, config.fast_rate);
        controller.jump = config.jump;
        controller.frame = config.frame;
        controller
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_rates(mut self, slow: f32, fast: f32) -> Self {
        self.slow_rate = slow;
        self.fast_rate = fast;
        self
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    pub fn jump_steps(&self) -> SeekSteps {
        self.jump
    }

    pub fn frame_steps(&self) -> SeekSteps {
        self.frame
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn play_pause(&mut self) {
        if self.engine.is_playing() {
            self.engine.pause();
        } else {
            self.engine.play();
        }
    }

    pub fn stop(&mut self) {
        if self.engine.is_playing() {
            self.engine.stop();
        }
    }

    pub fn time(&self) -> u64 {
        self.engine.time()
    }

    pub fn time_formatted(&self) -> String {
        format_offset(self.engine.time())
    }

    /// Fraction of the media already played, 0 when nothing is loaded
    pub fn progress(&self) -> f64 {
        match self.engine.duration() {
            0 => 0.0,
            duration => self.engine.time() as f64 / duration as f64,
        }
    }

    /// Move to `offset`, clamped to the media length.
    ///
    /// Some engines only apply a new position while playing, so a paused
    /// player is started for the jump. Unless `resume` is set it is paused
    /// again once the engine has had `settle_delay` to catch up.
    pub async fn seek(&mut self, offset: u64, resume: bool) {
        let duration = self.engine.duration();
        let target = if duration > 0 { offset.min(duration) } else { offset };
        let was_paused = !self.engine.is_playing();

        if was_paused {
            if !resume {
                self.pause_after_time_change = true;
            }
            self.engine.play();
        }

        debug!("⏩ Seeking to {}", format_offset(target));
        self.engine.set_time(target);

        if was_paused && !resume {
            tokio::time::sleep(self.settle_delay).await;
            self.engine.pause();
            self.pause_after_time_change = false;
        }
    }

    /// Relative seek; negative deltas stop at the start
    pub async fn seek_by(&mut self, delta: i64) {
        let target = (self.engine.time() as i64).saturating_add(delta).max(0) as u64;
        self.seek(target, false).await;
    }

    /// Seek by a step in either direction
    pub async fn step(&mut self, steps: SeekSteps, modifier: Modifier, forward: bool) {
        let distance = steps.step(modifier) as i64;
        self.seek_by(if forward { distance } else { -distance }).await;
    }

    /// Skip buttons
    pub async fn skip(&mut self, modifier: Modifier, forward: bool) {
        self.step(self.jump, modifier, forward).await;
    }

    /// Frame buttons
    pub async fn frame_step(&mut self, modifier: Modifier, forward: bool) {
        self.step(self.frame, modifier, forward).await;
    }

    /// Seek to a fraction of the media length
    pub async fn seek_progress(&mut self, progress: f64) {
        let offset = (progress.clamp(0.0, 1.0) * self.engine.duration() as f64).round() as u64;
        self.seek(offset, false).await;
    }

    /// Engine notification that the position changed
    pub fn on_time_changed(&mut self) {
        if self.pause_after_time_change {
            self.engine.pause();
            self.pause_after_time_change = false;
        }
    }

    pub fn rate(&self) -> PlaybackRate {
        PlaybackRate::classify(self.engine.rate())
    }

    /// Rate button: shift speeds up, control slows down, plain click restores normal speed
    pub fn apply_rate(&mut self, modifier: Modifier) {
        let rate = match modifier {
            Modifier::Shift => self.fast_rate,
            Modifier::Control => self.slow_rate,
            Modifier::None => 1.0,
        };
        self.engine.set_rate(rate);
    }
}

/// Periodic position refresh, suspended while the user is scrubbing
#[derive(Debug, Clone)]
pub struct ProgressMonitor {
    scrubbing: Arc<AtomicBool>,
    sender: watch::Sender<f64>,
    interval: Duration,
}

impl ProgressMonitor {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(0.0);
        Self {
            scrubbing: Arc::new(AtomicBool::new(false)),
            sender,
            interval: Duration::from_millis(50),
        }
    }

    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self::new().with_interval(config.refresh_interval())
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.sender.subscribe()
    }

    pub fn set_scrubbing(&self, scrubbing: bool) {
        self.scrubbing.store(scrubbing, Ordering::SeqCst);
    }

    pub fn is_scrubbing(&self) -> bool {
        self.scrubbing.load(Ordering::SeqCst)
    }

    /// Read the engine position and publish it, unless scrubbing
    pub fn refresh<E: PlayerEngine>(&self, engine: &E) -> Option<f64> {
        if self.is_scrubbing() {
            return None;
        }
        let progress = match engine.duration() {
            0 => 0.0,
            duration => engine.time() as f64 / duration as f64,
        };
        self.sender.send_replace(progress);
        Some(progress)
    }

    /// Refresh every `interval` until all subscribers are gone
    pub async fn run<E: PlayerEngine>(&self, engine: Arc<Mutex<E>>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        while !self.sender.is_closed() {
            ticker.tick().await;
            let engine = engine.lock().await;
            self.refresh(&*engine);
        }
    }
}

impl Default for ProgressMonitor {
    fn default() -> Self {
        Self::new()
    }
}
