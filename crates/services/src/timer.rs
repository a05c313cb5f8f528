//! Per-question countdown with urgency escalation and a single expiry event.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::error::AudioError;

/// Short audible cue played once at start and once per elapsed second.
pub trait TickSound: Send + Sync {
    /// # Errors
    ///
    /// Returns `AudioError` when the tone cannot be produced. Callers skip the tone.
    fn tick(&self) -> Result<(), AudioError>;

    /// Cut any tone that is still sounding.
    fn silence(&self);
}

/// Tick sound for environments without audio output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentTick;

impl TickSound for SilentTick {
    fn tick(&self) -> Result<(), AudioError> {
        Ok(())
    }

    fn silence(&self) {}
}

fn play(sound: &dyn TickSound) {
    if let Err(err) = sound.tick() {
        debug!(error = %err, "tick sound skipped");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    Warning,
    Critical,
}

/// Remaining-seconds thresholds for visual escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub warning: u32,
    pub critical: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: 5,
            critical: 3,
        }
    }
}

impl Thresholds {
    /// Critical supersedes warning.
    #[must_use]
    pub fn urgency(&self, remaining: u32) -> Urgency {
        if remaining <= self.critical {
            Urgency::Critical
        } else if remaining <= self.warning {
            Urgency::Warning
        } else {
            Urgency::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    pub remaining: u32,
    pub duration: u32,
    pub urgency: Urgency,
}

impl TimerTick {
    /// Fraction of the countdown still left, in `0.0..=1.0`.
    #[must_use]
    pub fn progress(&self) -> f32 {
        if self.duration == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.remaining as f32 / self.duration as f32;
        ratio.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEventKind {
    Tick(TimerTick),
    Expired,
}

/// Event tagged with the countdown it came from.
///
/// Events whose generation no longer matches the timer's are stale and must be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub generation: u64,
    pub kind: TimerEventKind,
}

#[derive(Debug, Clone, Copy)]
struct CountdownState {
    remaining: u32,
    duration: u32,
    thresholds: Thresholds,
}

impl CountdownState {
    fn new(duration: u32, thresholds: Thresholds) -> Self {
        Self {
            remaining: duration,
            duration,
            thresholds,
        }
    }

    fn tick(&mut self) -> TimerTick {
        self.remaining = self.remaining.saturating_sub(1);
        TimerTick {
            remaining: self.remaining,
            duration: self.duration,
            urgency: self.thresholds.urgency(self.remaining),
        }
    }
}

/// One countdown at a time; starting a new one stops the previous.
pub struct CountdownTimer {
    sound: Arc<dyn TickSound>,
    events: mpsc::UnboundedSender<TimerEvent>,
    thresholds: Thresholds,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl CountdownTimer {
    /// Create a stopped timer and the receiver its events are delivered on.
    #[must_use]
    pub fn new(
        sound: Arc<dyn TickSound>,
        thresholds: Thresholds,
    ) -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let timer = Self {
            sound,
            events,
            thresholds,
            generation: 0,
            task: None,
        };
        (timer, rx)
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn is_ticking(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Initial tick for `duration_secs`, shaped like the per-second ones.
    #[must_use]
    pub fn initial_tick(&self, duration_secs: u32) -> TimerTick {
        TimerTick {
            remaining: duration_secs,
            duration: duration_secs,
            urgency: self.thresholds.urgency(duration_secs),
        }
    }

    /// Start a fresh countdown. Must be called from within a tokio runtime.
    pub fn start(&mut self, duration_secs: u32) {
        self.stop();
        self.generation += 1;
        let generation = self.generation;
        let mut state = CountdownState::new(duration_secs.max(1), self.thresholds);
        let sound = Arc::clone(&self.sound);
        let events = self.events.clone();

        play(sound.as_ref());
        self.task = Some(tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let tick = state.tick();
                play(sound.as_ref());
                let sent = events.send(TimerEvent {
                    generation,
                    kind: TimerEventKind::Tick(tick),
                });
                if sent.is_err() {
                    return;
                }
                if tick.remaining == 0 {
                    let _ = events.send(TimerEvent {
                        generation,
                        kind: TimerEventKind::Expired,
                    });
                    return;
                }
            }
        }));
    }

    /// Cancel the countdown and silence the tone. Safe to call at any time.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.generation += 1;
        }
        self.sound.silence();
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
