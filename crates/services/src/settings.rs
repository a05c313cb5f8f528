use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("seconds per question must be > 0")]
    InvalidQuestionSeconds,

    #[error("points per correct answer must be > 0")]
    InvalidPoints,

    #[error("critical threshold must not exceed the warning threshold")]
    InvalidThresholds,
}

/// Language and prosody hint handed to the narration port.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceHint {
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
}

impl Default for VoiceHint {
    fn default() -> Self {
        Self {
            lang: "es-ES".into(),
            rate: 1.0,
            pitch: 1.2,
        }
    }
}

/// Tunables for a quiz round.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSettings {
    question_secs: u32,
    points_per_correct: u32,
    warning_secs: u32,
    critical_secs: u32,
    prompt_delay: Duration,
    feedback_delay: Duration,
    final_delay: Duration,
    speak_settle: Duration,
    reveal_delay: Duration,
    voice: VoiceHint,
    builtin_fallback: bool,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            question_secs: 10,
            points_per_correct: 10,
            warning_secs: 5,
            critical_secs: 3,
            prompt_delay: Duration::from_millis(500),
            feedback_delay: Duration::from_millis(300),
            final_delay: Duration::from_millis(500),
            speak_settle: Duration::from_millis(100),
            reveal_delay: Duration::from_millis(300),
            voice: VoiceHint::default(),
            builtin_fallback: true,
        }
    }
}

impl QuizSettings {
    /// Override the countdown length and the score per correct answer.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if either value is zero.
    pub fn with_round(mut self, question_secs: u32, points_per_correct: u32) -> Result<Self, SettingsError> {
        if question_secs == 0 {
            return Err(SettingsError::InvalidQuestionSeconds);
        }
        if points_per_correct == 0 {
            return Err(SettingsError::InvalidPoints);
        }
        self.question_secs = question_secs;
        self.points_per_correct = points_per_correct;
        Ok(self)
    }

    /// Override the visual escalation thresholds.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidThresholds` when critical is above warning.
    pub fn with_thresholds(mut self, warning_secs: u32, critical_secs: u32) -> Result<Self, SettingsError> {
        if critical_secs > warning_secs {
            return Err(SettingsError::InvalidThresholds);
        }
        self.warning_secs = warning_secs;
        self.critical_secs = critical_secs;
        Ok(self)
    }

    #[must_use]
    pub fn with_voice(mut self, voice: VoiceHint) -> Self {
        self.voice = voice;
        self
    }

    /// Disable the hard-coded last-resort bank.
    #[must_use]
    pub fn with_builtin_fallback(mut self, enabled: bool) -> Self {
        self.builtin_fallback = enabled;
        self
    }

    /// Zero every narration and reveal delay.
    #[must_use]
    pub fn without_delays(mut self) -> Self {
        self.prompt_delay = Duration::ZERO;
        self.feedback_delay = Duration::ZERO;
        self.final_delay = Duration::ZERO;
        self.speak_settle = Duration::ZERO;
        self.reveal_delay = Duration::ZERO;
        self
    }

    #[must_use]
    pub fn question_secs(&self) -> u32 {
        self.question_secs
    }

    #[must_use]
    pub fn points_per_correct(&self) -> u32 {
        self.points_per_correct
    }

    #[must_use]
    pub fn warning_secs(&self) -> u32 {
        self.warning_secs
    }

    #[must_use]
    pub fn critical_secs(&self) -> u32 {
        self.critical_secs
    }

    #[must_use]
    pub fn prompt_delay(&self) -> Duration {
        self.prompt_delay
    }

    #[must_use]
    pub fn feedback_delay(&self) -> Duration {
        self.feedback_delay
    }

    #[must_use]
    pub fn final_delay(&self) -> Duration {
        self.final_delay
    }

    #[must_use]
    pub fn speak_settle(&self) -> Duration {
        self.speak_settle
    }

    #[must_use]
    pub fn reveal_delay(&self) -> Duration {
        self.reveal_delay
    }

    #[must_use]
    pub fn voice(&self) -> &VoiceHint {
        &self.voice
    }

    #[must_use]
    pub fn builtin_fallback(&self) -> bool {
        self.builtin_fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_round_protocol() {
        let settings = QuizSettings::default();
        assert_eq!(settings.question_secs(), 10);
        assert_eq!(settings.points_per_correct(), 10);
        assert_eq!(settings.warning_secs(), 5);
        assert_eq!(settings.critical_secs(), 3);
        assert_eq!(settings.voice().lang, "es-ES");
        assert!(settings.builtin_fallback());
    }

    #[test]
    fn zero_values_are_rejected() {
        assert_eq!(
            QuizSettings::default().with_round(0, 10).unwrap_err(),
            SettingsError::InvalidQuestionSeconds
        );
        assert_eq!(
            QuizSettings::default().with_round(10, 0).unwrap_err(),
            SettingsError::InvalidPoints
        );
        assert!(QuizSettings::default().with_thresholds(3, 5).is_err());
    }
}
