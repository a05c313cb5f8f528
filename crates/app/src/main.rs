use std::fmt;
use std::io::Write;
use std::sync::Arc;

use quiz_core::model::AnswerLabel;
use services::{
    Advanced, AnswerFeedback, Clock, FinalReport, QuestionFile, QuestionView, QuizServices,
    QuizSession, QuizSettings, RemoteBackend, SessionEvent, SessionPhase, TimerTick, Urgency,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod terminal;

use terminal::{BellTick, TerminalNarration};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidSeconds { raw: String },
    InvalidLimit { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidSeconds { raw } => write!(f, "invalid --seconds value: {raw}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quiz [play]     [--db <sqlite_url>] [--questions <path|url>] [--seconds <n>] [--offline] [--bell]");
    eprintln!("  quiz history    [--db <sqlite_url>] [--limit <n>] [--offline]");
    eprintln!("  quiz clear-history [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://quiz.sqlite3");
    eprintln!("  --questions questions.json");
    eprintln!("  --seconds 10");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_QUESTIONS_FILE, QUIZ_REMOTE_URL, QUIZ_REMOTE_KEY, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    History,
    ClearHistory,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "history" => Some(Self::History),
            "clear-history" => Some(Self::ClearHistory),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    questions: String,
    seconds: u32,
    limit: u32,
    offline: bool,
    bell: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("sqlite://quiz.sqlite3".into()), normalize_sqlite_url);
        let mut questions =
            std::env::var("QUIZ_QUESTIONS_FILE").unwrap_or_else(|_| "questions.json".into());
        let mut seconds = QuizSettings::default().question_secs();
        let mut limit = 10;
        let mut offline = false;
        let mut bell = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--questions" => questions = require_value(args, "--questions")?,
                "--seconds" => {
                    let value = require_value(args, "--seconds")?;
                    seconds = value
                        .parse::<u32>()
                        .ok()
                        .filter(|s| *s > 0)
                        .ok_or(ArgsError::InvalidSeconds { raw: value })?;
                }
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    limit = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidLimit { raw: value.clone() })?;
                }
                "--offline" => offline = true,
                "--bell" => bell = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            questions,
            seconds,
            limit,
            offline,
            bell,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

//
// ─── INTERACTIVE LOOP ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Start,
    Answer(AnswerLabel),
    Next,
    Restart,
    Help,
    Quit,
}

impl Input {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if let Ok(label) = line.parse::<AnswerLabel>() {
            return Some(Self::Answer(label));
        }
        match line.to_ascii_lowercase().as_str() {
            "" | "s" | "start" => Some(Self::Start),
            "a" => Some(Self::Answer(AnswerLabel::A)),
            "b" => Some(Self::Answer(AnswerLabel::B)),
            "c" => Some(Self::Answer(AnswerLabel::C)),
            "n" | "next" => Some(Self::Next),
            "r" | "restart" => Some(Self::Restart),
            "h" | "help" | "?" => Some(Self::Help),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

fn print_controls() {
    println!("  [enter] start   [a/b/c] answer   [n] next   [r] restart   [q] quit");
}

fn render_question(view: &QuestionView) {
    println!();
    println!("Question {}/{}   score {}", view.number, view.total, view.score);
    println!("  {}", view.text);
    for (label, text) in &view.options {
        println!("    {label}) {text}");
    }
    render_tick(&view.tick);
}

fn render_tick(tick: &TimerTick) {
    let marker = match tick.urgency {
        Urgency::Normal => "",
        Urgency::Warning => " !",
        Urgency::Critical => " !!",
    };
    let filled = usize::try_from(tick.remaining).unwrap_or(0);
    let empty = usize::try_from(tick.duration.saturating_sub(tick.remaining)).unwrap_or(0);
    print!(
        "\r  [{}{}] {:>2}s{marker}   ",
        "#".repeat(filled),
        ".".repeat(empty),
        tick.remaining
    );
    let _ = std::io::stdout().flush();
}

fn render_feedback(feedback: &AnswerFeedback) {
    println!();
    if feedback.timed_out() {
        println!("  Time's up. Correct answer: {}) {}", feedback.correct, feedback.correct_text);
    } else if feedback.is_correct {
        println!("  Correct! Score {}", feedback.score);
    } else {
        println!("  Wrong. Correct answer: {}) {}", feedback.correct, feedback.correct_text);
    }
    if feedback.is_last {
        println!("  [n] see results");
    } else {
        println!("  [n] next question");
    }
}

fn render_report(report: &FinalReport) {
    println!();
    println!("Final score: {} / {}", report.score, report.max_score);
    println!("  {}", report.message());
    println!("  {}", report.attempt_label());
    println!("  Time: {}s", report.total_seconds);
    if !report.is_persisted() {
        println!("  (this attempt could not be saved)");
    }
    println!("  [r] play again   [q] quit");
}

/// Returns `false` when the user asked to quit.
async fn handle_input(session: &mut QuizSession, input: Input) -> bool {
    match input {
        Input::Quit => return false,
        Input::Help => print_controls(),
        Input::Start => match session.phase() {
            SessionPhase::Idle => match session.start().await {
                Ok(view) => render_question(&view),
                Err(err) => println!("  {err}"),
            },
            SessionPhase::InProgress if session.can_advance() => advance(session).await,
            _ => {}
        },
        Input::Answer(label) => match session.submit_answer(label) {
            Some(feedback) => render_feedback(&feedback),
            None => debug!(%label, "answer ignored"),
        },
        Input::Next => advance(session).await,
        Input::Restart => match session.restart() {
            Ok(()) => match session.start().await {
                Ok(view) => render_question(&view),
                Err(err) => println!("  {err}"),
            },
            Err(err) => println!("  {err}"),
        },
    }
    true
}

async fn advance(session: &mut QuizSession) {
    match session.advance().await {
        Ok(Advanced::Question(view)) => render_question(&view),
        Ok(Advanced::Finished(report)) => render_report(&report),
        Err(err) => println!("\n  {err}"),
    }
}

async fn play(services: &QuizServices, bell: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = services.session(Arc::new(TerminalNarration), Arc::new(BellTick::new(bell)));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Quiz: how well do you know me?");
    print_controls();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Input::parse(&line) {
                    Some(input) => {
                        if !handle_input(&mut session, input).await {
                            break;
                        }
                    }
                    None => print_controls(),
                }
            }
            Some(event) = session.next_event() => match event {
                SessionEvent::Tick(tick) => render_tick(&tick),
                SessionEvent::TimedOut(feedback) => render_feedback(&feedback),
            },
        }
    }
    Ok(())
}

async fn history(services: &QuizServices, limit: u32) -> Result<(), Box<dyn std::error::Error>> {
    let gateway = services.gateway();
    let stats = gateway.stats().await;
    println!(
        "{} attempts   best {}   worst {}   average {}",
        stats.count,
        stats.max,
        stats.min,
        stats.average_display()
    );
    for attempt in gateway.recent_attempts(limit).await? {
        let secs = attempt
            .total_seconds
            .map_or_else(String::new, |s| format!("  {s}s"));
        println!(
            "  {}  {:>3}{secs}",
            attempt.recorded_at.format("%Y-%m-%d %H:%M"),
            attempt.score
        );
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Play,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Play,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite in the binary glue; services only see `Storage`.
    prepare_sqlite_file(&parsed.db_url)?;
    let settings = QuizSettings::default().with_round(parsed.seconds, 10)?;
    let remote = if parsed.offline || cmd == Command::ClearHistory {
        None
    } else {
        RemoteBackend::from_env()
    };
    let services = QuizServices::new_sqlite(
        &parsed.db_url,
        settings,
        Clock::system(),
        remote,
        Some(QuestionFile::parse(&parsed.questions)),
    )
    .await?;

    match cmd {
        Command::Play => play(&services, parsed.bell).await,
        Command::History => history(&services, parsed.limit).await,
        Command::ClearHistory => {
            services.gateway().clear_local_history().await?;
            println!("local attempt history cleared");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = args.iter().map(|s| (*s).to_string());
        Args::parse(&mut iter)
    }

    #[test]
    fn input_keys_map_to_actions() {
        assert_eq!(Input::parse("b"), Some(Input::Answer(AnswerLabel::B)));
        assert_eq!(Input::parse(" C "), Some(Input::Answer(AnswerLabel::C)));
        assert_eq!(Input::parse(""), Some(Input::Start));
        assert_eq!(Input::parse("n"), Some(Input::Next));
        assert_eq!(Input::parse("Q"), Some(Input::Quit));
        assert_eq!(Input::parse("d"), None);
    }

    #[test]
    fn flags_are_parsed() {
        let args = parse(&["--db", "sqlite::memory:", "--seconds", "15", "--offline", "--bell"]).unwrap();
        assert_eq!(args.db_url, "sqlite::memory:");
        assert_eq!(args.seconds, 15);
        assert!(args.offline);
        assert!(args.bell);
    }

    #[test]
    fn bad_flags_are_rejected() {
        assert!(matches!(parse(&["--seconds", "0"]), Err(ArgsError::InvalidSeconds { .. })));
        assert!(matches!(parse(&["--db"]), Err(ArgsError::MissingValue { flag: "--db" })));
        assert!(matches!(parse(&["--nope"]), Err(ArgsError::UnknownArg(_))));
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite://data/quiz.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/quiz.sqlite3"));
    }
}
