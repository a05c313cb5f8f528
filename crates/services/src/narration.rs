use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::NarrationError;
use crate::settings::VoiceHint;

/// A line of text plus the voice it should be spoken with.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice: VoiceHint,
}

/// Speech output capability. Calls should return quickly; playback is the port's business.
pub trait NarrationPort: Send + Sync {
    /// # Errors
    ///
    /// Returns `NarrationError` when speech cannot be produced. Callers log and move on.
    fn speak(&self, utterance: &Utterance) -> Result<(), NarrationError>;

    /// Stop whatever is currently being spoken.
    fn cancel(&self);
}

/// Port used when no speech output exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNarration;

impl NarrationPort for NoopNarration {
    fn speak(&self, _utterance: &Utterance) -> Result<(), NarrationError> {
        Ok(())
    }

    fn cancel(&self) {}
}

/// Pick the voice for `lang` among `available` language tags.
///
/// Exact tag first, then the same primary language (`es-MX` for `es-ES`), else `None`
/// so the port can use its default voice.
#[must_use]
pub fn select_voice<'a>(available: &[&'a str], lang: &str) -> Option<&'a str> {
    if let Some(exact) = available.iter().find(|tag| tag.eq_ignore_ascii_case(lang)) {
        return Some(*exact);
    }
    let primary = lang.split(['-', '_']).next().unwrap_or(lang);
    available
        .iter()
        .find(|tag| {
            tag.split(['-', '_'])
                .next()
                .is_some_and(|p| p.eq_ignore_ascii_case(primary))
        })
        .copied()
}

/// Single narration channel: each request supersedes the one before it.
pub struct Narrator {
    port: Arc<dyn NarrationPort>,
    voice: VoiceHint,
    settle: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Narrator {
    /// `settle` is added to every delay so a cancelled utterance has time to end.
    #[must_use]
    pub fn new(port: Arc<dyn NarrationPort>, voice: VoiceHint, settle: Duration) -> Self {
        Self {
            port,
            voice,
            settle,
            pending: None,
        }
    }

    /// Speak `text` after `delay`, cancelling anything pending or audible.
    pub fn say_after(&mut self, text: impl Into<String>, delay: Duration) {
        self.cancel();
        let utterance = Utterance {
            text: text.into(),
            voice: self.voice.clone(),
        };
        let port = Arc::clone(&self.port);
        let wait = delay + self.settle;
        self.pending = Some(tokio::spawn(async move {
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            if let Err(err) = port.speak(&utterance) {
                debug!(error = %err, "narration skipped");
            }
        }));
    }

    /// Drop the pending utterance and silence the port. Safe to call at any time.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        self.port.cancel();
    }
}

impl Drop for Narrator {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        spoken: Mutex<Vec<String>>,
    }

    impl NarrationPort for Recording {
        fn speak(&self, utterance: &Utterance) -> Result<(), NarrationError> {
            self.spoken.lock().unwrap().push(utterance.text.clone());
            Ok(())
        }

        fn cancel(&self) {}
    }

    struct Mute;

    impl NarrationPort for Mute {
        fn speak(&self, _utterance: &Utterance) -> Result<(), NarrationError> {
            Err(NarrationError::Unavailable)
        }

        fn cancel(&self) {}
    }

    #[test]
    fn voice_selection_prefers_exact_then_primary_language() {
        let voices = ["en-US", "es-MX", "es-ES"];
        assert_eq!(select_voice(&voices, "es-ES"), Some("es-ES"));
        assert_eq!(select_voice(&voices, "es-AR"), Some("es-MX"));
        assert_eq!(select_voice(&voices, "fr-FR"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn speaks_after_delay_plus_settle() {
        let port = Arc::new(Recording::default());
        let mut narrator = Narrator::new(port.clone(), VoiceHint::default(), Duration::from_millis(100));
        narrator.say_after("hello", Duration::from_millis(500));

        tokio::time::sleep(Duration::from_millis(550)).await;
        assert!(port.spoken.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*port.spoken.lock().unwrap(), vec!["hello".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_request_supersedes_pending_one() {
        let port = Arc::new(Recording::default());
        let mut narrator = Narrator::new(port.clone(), VoiceHint::default(), Duration::ZERO);
        narrator.say_after("first", Duration::from_millis(500));
        narrator.say_after("second", Duration::from_millis(300));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(*port.spoken.lock().unwrap(), vec!["second".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let port = Arc::new(Recording::default());
        let mut narrator = Narrator::new(port.clone(), VoiceHint::default(), Duration::ZERO);
        narrator.cancel();
        narrator.say_after("never", Duration::from_millis(200));
        narrator.cancel();
        narrator.cancel();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(port.spoken.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn speech_failures_are_swallowed() {
        let mut narrator = Narrator::new(Arc::new(Mute), VoiceHint::default(), Duration::ZERO);
        narrator.say_after("lost", Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
