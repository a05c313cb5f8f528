use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use quiz_core::Clock;
use quiz_core::model::{AnswerLabel, Question, SourceTier};

use crate::error::SessionError;
use crate::narration::{NarrationPort, Narrator};
use crate::persistence::PersistenceGateway;
use crate::question_source::{LoadStatus, QuestionSource};
use crate::settings::QuizSettings;
use crate::timer::{CountdownTimer, Thresholds, TickSound, TimerEvent, TimerEventKind, TimerTick};

use super::report::FinalReport;
use super::round::{AnswerOutcome, Round};

//
// ─── VIEWS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    InProgress,
    Finished,
}

/// The question currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    /// 1-based position in the working set.
    pub number: usize,
    pub total: usize,
    pub text: String,
    pub options: Vec<(AnswerLabel, String)>,
    pub score: u32,
    pub tick: TimerTick,
}

impl QuestionView {
    fn of(round: &Round, tick: TimerTick) -> Self {
        let question = round.current();
        Self {
            number: round.current_index() + 1,
            total: round.question_count(),
            text: question.text().to_string(),
            options: question
                .options()
                .iter()
                .map(|(label, text)| (label, text.to_string()))
                .collect(),
            score: round.score(),
            tick,
        }
    }
}

/// How a question was resolved and what to reveal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    /// `None` when the countdown expired.
    pub chosen: Option<AnswerLabel>,
    pub correct: AnswerLabel,
    pub correct_text: String,
    pub is_correct: bool,
    pub score: u32,
    /// Delay before the correct option is highlighted.
    pub reveal_after: Duration,
    /// No further question follows; advancing finishes the session.
    pub is_last: bool,
}

impl AnswerFeedback {
    fn new(outcome: AnswerOutcome, question: &Question, reveal_after: Duration, is_last: bool) -> Self {
        Self {
            chosen: outcome.chosen,
            correct: outcome.correct,
            correct_text: question.correct_text().to_string(),
            is_correct: outcome.is_correct,
            score: outcome.score,
            reveal_after,
            is_last,
        }
    }

    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.chosen.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Tick(TimerTick),
    /// The countdown ran out before an answer was submitted.
    TimedOut(AnswerFeedback),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Advanced {
    Question(QuestionView),
    Finished(FinalReport),
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

enum Phase {
    Idle,
    InProgress(Round),
    Finished(FinalReport),
}

/// Quiz state machine: `Idle -> InProgress -> Finished -> Idle`.
///
/// Owns the single countdown and the single narration channel. Both are
/// stopped before any transition that leaves a question.
pub struct QuizSession {
    settings: QuizSettings,
    source: Arc<QuestionSource>,
    gateway: Arc<PersistenceGateway>,
    narrator: Narrator,
    timer: CountdownTimer,
    timer_events: mpsc::UnboundedReceiver<TimerEvent>,
    clock: Clock,
    phase: Phase,
    /// Instant the current question's countdown runs out.
    deadline: Option<Instant>,
    run_id: Uuid,
    tier: Option<SourceTier>,
}

impl QuizSession {
    #[must_use]
    pub fn new(
        settings: QuizSettings,
        source: Arc<QuestionSource>,
        gateway: Arc<PersistenceGateway>,
        narration: Arc<dyn NarrationPort>,
        sound: Arc<dyn TickSound>,
    ) -> Self {
        let narrator = Narrator::new(narration, settings.voice().clone(), settings.speak_settle());
        let thresholds = Thresholds {
            warning: settings.warning_secs(),
            critical: settings.critical_secs(),
        };
        let (timer, timer_events) = CountdownTimer::new(sound, thresholds);
        let clock = gateway.clock();
        Self {
            settings,
            source,
            gateway,
            narrator,
            timer,
            timer_events,
            clock,
            phase: Phase::Idle,
            deadline: None,
            run_id: Uuid::nil(),
            tier: None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match self.phase {
            Phase::Idle => SessionPhase::Idle,
            Phase::InProgress(_) => SessionPhase::InProgress,
            Phase::Finished(_) => SessionPhase::Finished,
        }
    }

    /// Identifier of the current or last run, nil before the first start.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Tier the working set of the current or last run came from.
    #[must_use]
    pub fn source_tier(&self) -> Option<SourceTier> {
        self.tier
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        match &self.phase {
            Phase::Idle => 0,
            Phase::InProgress(round) => round.score(),
            Phase::Finished(report) => report.score,
        }
    }

    /// Working set in play order, empty unless a session is running.
    #[must_use]
    pub fn working_set(&self) -> &[Question] {
        match &self.phase {
            Phase::InProgress(round) => round.questions(),
            _ => &[],
        }
    }

    /// Whether the current question has been resolved and `advance` is allowed.
    ///
    /// A question whose countdown has run out counts as resolved even before
    /// its expiry event is observed.
    #[must_use]
    pub fn can_advance(&self) -> bool {
        matches!(&self.phase, Phase::InProgress(round) if round.is_answered() || self.deadline_passed())
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    #[must_use]
    pub fn report(&self) -> Option<&FinalReport> {
        match &self.phase {
            Phase::Finished(report) => Some(report),
            _ => None,
        }
    }

    /// Draw a fresh permutation of the bank and present its first question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyStarted` outside `Idle`,
    /// `SessionError::LoadInProgress` while another load is running, and
    /// `SessionError::EmptyBank` when no valid question is available.
    pub async fn start(&mut self) -> Result<QuestionView, SessionError> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(SessionError::AlreadyStarted);
        }

        let bank = match self.source.ensure_loaded().await {
            Ok(LoadStatus::Loaded(bank)) => bank,
            Ok(LoadStatus::InProgress) => return Err(SessionError::LoadInProgress),
            Err(err) => {
                warn!(error = %err, "cannot start session");
                return Err(SessionError::EmptyBank);
            }
        };

        let mut questions = bank.questions().to_vec();
        questions.shuffle(&mut rand::rng());
        let round = Round::new(questions, self.clock.now()).ok_or(SessionError::EmptyBank)?;

        self.run_id = Uuid::new_v4();
        self.tier = Some(bank.tier());
        info!(
            run_id = %self.run_id,
            tier = %bank.tier(),
            questions = round.question_count(),
            "session started"
        );

        let tick = self.timer.initial_tick(self.settings.question_secs());
        let view = QuestionView::of(&round, tick);
        self.phase = Phase::InProgress(round);
        self.present(&view);
        Ok(view)
    }

    /// Answer the current question. Ignored once it is resolved or outside a session.
    ///
    /// An answer landing at or after the deadline scores nothing: the question
    /// is expired instead and the timed-out feedback is returned.
    pub fn submit_answer(&mut self, label: AnswerLabel) -> Option<AnswerFeedback> {
        let late = self.deadline_passed();
        let Phase::InProgress(round) = &mut self.phase else {
            return None;
        };
        if round.is_answered() {
            debug!(run_id = %self.run_id, "answer ignored; question already resolved");
            return None;
        }
        if late {
            debug!(run_id = %self.run_id, %label, "answer arrived after the deadline");
            return self.expire();
        }

        self.narrator.cancel();
        self.timer.stop();
        self.deadline = None;
        let outcome = round.answer(label, self.settings.points_per_correct())?;

        let reveal_after = if outcome.is_correct {
            Duration::ZERO
        } else {
            self.settings.reveal_delay()
        };
        let feedback = AnswerFeedback::new(outcome, round.current(), reveal_after, round.is_last());
        let line = if feedback.is_correct {
            "Correct! You know me so well.".to_string()
        } else {
            format!("We need to talk. The answer was {}", feedback.correct_text)
        };
        self.narrator.say_after(line, self.settings.feedback_delay());
        debug!(
            run_id = %self.run_id,
            question = round.current_index(),
            correct = feedback.is_correct,
            score = feedback.score,
            "answer submitted"
        );
        Some(feedback)
    }

    /// Wait for the next countdown event of the current question.
    ///
    /// Events from a stopped countdown are skipped. Cancel safe, so it can sit in a
    /// `select!` next to user input. Pends forever while no countdown runs.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            let event = self.timer_events.recv().await?;
            if event.generation != self.timer.generation() {
                continue;
            }
            match event.kind {
                TimerEventKind::Tick(tick) => return Some(SessionEvent::Tick(tick)),
                TimerEventKind::Expired => {
                    if let Some(feedback) = self.expire() {
                        return Some(SessionEvent::TimedOut(feedback));
                    }
                }
            }
        }
    }

    fn expire(&mut self) -> Option<AnswerFeedback> {
        let Phase::InProgress(round) = &mut self.phase else {
            return None;
        };
        let outcome = round.expire()?;
        self.timer.stop();
        self.deadline = None;

        let feedback = AnswerFeedback::new(outcome, round.current(), Duration::ZERO, round.is_last());
        self.narrator.say_after(
            format!("Time's up! The answer is: {}", feedback.correct_text),
            self.settings.feedback_delay(),
        );
        debug!(run_id = %self.run_id, question = round.current_index(), "question timed out");
        Some(feedback)
    }

    /// Leave a resolved question: load the next one, or finish after the last.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` outside a session and
    /// `SessionError::NotAnswered` while the current question is unresolved.
    pub async fn advance(&mut self) -> Result<Advanced, SessionError> {
        if !matches!(self.phase, Phase::InProgress(_)) {
            return Err(SessionError::NotStarted);
        }
        if !self.can_advance() {
            return Err(SessionError::NotAnswered);
        }
        if self.deadline_passed() {
            self.expire();
        }
        let Phase::InProgress(round) = &mut self.phase else {
            return Err(SessionError::NotStarted);
        };

        self.timer.stop();
        self.narrator.cancel();

        if round.advance() {
            let tick = self.timer.initial_tick(self.settings.question_secs());
            let view = QuestionView::of(round, tick);
            self.present(&view);
            return Ok(Advanced::Question(view));
        }

        let Phase::InProgress(round) = std::mem::replace(&mut self.phase, Phase::Idle) else {
            return Err(SessionError::NotStarted);
        };
        let report = self.finish(round).await;
        self.phase = Phase::Finished(report.clone());
        Ok(Advanced::Finished(report))
    }

    /// Return to `Idle` so the next `start` draws a new permutation.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFinished` unless the session is finished.
    pub fn restart(&mut self) -> Result<(), SessionError> {
        if !matches!(self.phase, Phase::Finished(_)) {
            return Err(SessionError::NotFinished);
        }
        self.timer.stop();
        self.narrator.cancel();
        self.deadline = None;
        self.phase = Phase::Idle;
        Ok(())
    }

    fn present(&mut self, view: &QuestionView) {
        self.narrator
            .say_after(view.text.clone(), self.settings.prompt_delay());
        let secs = self.settings.question_secs().max(1);
        self.deadline = Some(Instant::now() + Duration::from_secs(u64::from(secs)));
        self.timer.start(secs);
    }

    async fn finish(&mut self, round: Round) -> FinalReport {
        self.timer.stop();
        self.deadline = None;
        self.narrator.cancel();

        let score = round.score();
        let total_seconds = self.clock.elapsed_secs(round.started_at());
        let record = match self.gateway.record_attempt(score, Some(total_seconds)).await {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(run_id = %self.run_id, error = %err, "attempt was not persisted");
                None
            }
        };
        let stats = self.gateway.stats().await;
        let report = FinalReport::new(
            score,
            round.max_score(self.settings.points_per_correct()),
            stats,
            record,
            total_seconds,
        );
        info!(
            run_id = %self.run_id,
            score,
            tier = %report.tier,
            backing = ?self.gateway.backing(),
            "session finished"
        );
        self.narrator
            .say_after(report.narration(), self.settings.final_delay());
        report
    }
}
