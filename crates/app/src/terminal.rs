//! Terminal stand-ins for the speech and audio capabilities.

use std::io::Write;

use services::{AudioError, NarrationError, NarrationPort, TickSound, Utterance, select_voice};

/// Voices the terminal narrator can "speak" with.
const VOICES: [&str; 2] = ["es-ES", "en-GB"];

/// Prints each utterance on its own line, tagged with the chosen voice.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalNarration;

impl NarrationPort for TerminalNarration {
    fn speak(&self, utterance: &Utterance) -> Result<(), NarrationError> {
        let voice = select_voice(&VOICES, &utterance.voice.lang).unwrap_or(VOICES[1]);
        let mut out = std::io::stdout().lock();
        writeln!(out, "\n  ({voice}) {}", utterance.text)
            .and_then(|()| out.flush())
            .map_err(|e| NarrationError::Output(e.to_string()))
    }

    fn cancel(&self) {}
}

/// Rings the terminal bell once per tick; silent unless enabled.
#[derive(Debug, Clone, Copy)]
pub struct BellTick {
    enabled: bool,
}

impl BellTick {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl TickSound for BellTick {
    fn tick(&self) -> Result<(), AudioError> {
        if !self.enabled {
            return Ok(());
        }
        let mut err = std::io::stderr().lock();
        err.write_all(b"\x07")
            .and_then(|()| err.flush())
            .map_err(|e| AudioError::Device(e.to_string()))
    }

    fn silence(&self) {}
}
