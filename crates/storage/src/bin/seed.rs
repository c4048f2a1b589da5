use std::fmt;

use chrono::{DateTime, Duration, Utc};
use kioku_core::model::{
    ItemId, KanjiItem, ReviewableItem, SessionResult, SessionSummary, Stage, UserId, Verdict,
    VocabularyItem,
};
use kioku_core::scheduler;
use storage::repository::Storage;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    user_id: UserId,
    summaries: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidSummaries { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user-id value: {raw}"),
            ArgsError::InvalidSummaries { raw } => write!(f, "invalid --summaries value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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

fn parse_now(raw: String) -> Result<DateTime<Utc>, ArgsError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ArgsError::InvalidNow { raw })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("KIOKU_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3?mode=rwc".into());
        let mut user_id = std::env::var("KIOKU_USER_ID")
            .ok()
            .and_then(|value| value.parse::<UserId>().ok())
            .unwrap_or_else(|| UserId::new(1));
        let mut summaries = std::env::var("KIOKU_SUMMARIES")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(1);
        let mut now = match std::env::var("KIOKU_NOW") {
            Ok(raw) => Some(parse_now(raw)?),
            Err(_) => None,
        };

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--user-id" => {
                    let value = require_value(&mut args, "--user-id")?;
                    user_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                }
                "--summaries" => {
                    let value = require_value(&mut args, "--summaries")?;
                    summaries = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidSummaries { raw: value.clone() })?;
                }
                "--now" => {
                    now = Some(parse_now(require_value(&mut args, "--now")?)?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            user_id,
            summaries,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3?mode=rwc)");
    eprintln!("  --user-id <id>            Learner to track the sample items for (default: 1)");
    eprintln!("  --summaries <n>           Number of past session summaries to append (default: 1)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  KIOKU_DB_URL, KIOKU_USER_ID, KIOKU_SUMMARIES, KIOKU_NOW");
    eprintln!("Logging is controlled by RUST_LOG (default: info).");
}

fn vocab(id: u64, word: &str, reading: &str, meanings: &[&str]) -> ReviewableItem {
    ReviewableItem::Vocabulary(VocabularyItem {
        id: ItemId::new(id),
        word: word.to_owned(),
        reading: reading.to_owned(),
        meanings: meanings.iter().map(|m| (*m).to_owned()).collect(),
        alternatives: Vec::new(),
    })
}

fn kanji(id: u64, character: &str, readings: &[&str], meanings: &[&str]) -> ReviewableItem {
    ReviewableItem::Kanji(KanjiItem {
        id: ItemId::new(id),
        character: character.to_owned(),
        readings: readings.iter().map(|r| (*r).to_owned()).collect(),
        meanings: meanings.iter().map(|m| (*m).to_owned()).collect(),
    })
}

fn sample_items() -> Result<Vec<ReviewableItem>, kioku_core::Error> {
    let samples = vec![
        vocab(1, "水", "みず", &["water"]),
        vocab(2, "東京", "とうきょう", &["Tokyo"]),
        vocab(3, "先生", "せんせい", &["teacher"]),
        vocab(4, "お茶", "おちゃ", &["tea"]),
        kanji(1, "日", &["にち", "じつ", "ひ"], &["day", "sun"]),
        kanji(2, "山", &["やま", "さん"], &["mountain"]),
        kanji(3, "人", &["ひと", "じん", "にん"], &["person"]),
    ];
    let mut out = Vec::with_capacity(samples.len());
    for item in samples {
        out.push(item.validate()?);
    }
    Ok(out)
}

/// Past session over the first few items, completed `days_ago` days before `now`.
fn sample_summary(
    items: &[ReviewableItem],
    now: DateTime<Utc>,
    days_ago: i64,
) -> Result<SessionSummary, kioku_core::Error> {
    let started_at = now - Duration::days(days_ago) - Duration::minutes(10);
    let mut results = Vec::new();
    for (i, item) in items.iter().take(3).enumerate() {
        let verdict = Verdict::from_bool(i % 3 != 2);
        let update = scheduler::calculate(Stage::MIN, verdict, started_at);
        results.push(SessionResult {
            key: item.key(),
            correct: verdict.is_correct(),
            new_stage: update.new_stage,
            next_due: update.next_due,
            round: 1,
        });
    }
    Ok(SessionSummary::from_results(
        started_at,
        started_at + Duration::minutes(5),
        &results,
        Vec::new(),
    )?)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let items = sample_items()?;
    for item in &items {
        storage.items.upsert_item(item).await?;
        let record = storage
            .progress
            .track_item(args.user_id, item.key(), now)
            .await?;
        tracing::debug!(key = %record.key, stage = %record.stage, "tracked item");
    }

    for i in 0..args.summaries {
        let summary = sample_summary(&items, now, i64::from(i) * 2 + 1)?;
        let id = storage
            .session_summaries
            .append_summary(args.user_id, &summary)
            .await?;
        tracing::debug!(id, accuracy = summary.accuracy(), "appended session summary");
    }

    tracing::info!(
        user = %args.user_id,
        items = items.len(),
        summaries = args.summaries,
        db = %args.db_url,
        "seed complete"
    );
    println!(
        "Seeded {} items for user {} with {} session summaries into {}",
        items.len(),
        args.user_id,
        args.summaries,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
