use std::time::Duration;

use chrono::NaiveDateTime;
use clap::Subcommand;
use medimind_core::storage::Database;
use medimind_core::{local_now, Config, MealSlot, PollingDriver, ReminderEngine, UserAction};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

use super::{load_engine, parse_datetime, print_event};

#[derive(Subcommand)]
pub enum ReminderAction {
    /// Print the current alarm state as JSON
    Status,
    /// Run one evaluation pass
    Tick {
        /// Evaluate as of this local time instead of now
        #[arg(long, value_parser = parse_datetime)]
        at: Option<NaiveDateTime>,
    },
    /// Acknowledge the active alarm as taken
    Taken {
        /// Medication ID (defaults to the active alarm)
        #[arg(long, requires = "meal")]
        id: Option<String>,
        #[arg(long, requires = "id")]
        meal: Option<MealSlot>,
        #[arg(long, value_parser = parse_datetime)]
        at: Option<NaiveDateTime>,
    },
    /// Snooze the active alarm for five minutes
    Snooze {
        /// Medication ID (defaults to the active alarm)
        #[arg(long, requires = "meal")]
        id: Option<String>,
        #[arg(long, requires = "id")]
        meal: Option<MealSlot>,
        #[arg(long, value_parser = parse_datetime)]
        at: Option<NaiveDateTime>,
    },
    /// Answer the caregiver call
    Answer {
        #[arg(long, value_parser = parse_datetime)]
        at: Option<NaiveDateTime>,
    },
    /// Decline the caregiver call
    Decline {
        #[arg(long, value_parser = parse_datetime)]
        at: Option<NaiveDateTime>,
    },
    /// Poll until Ctrl-C, printing events as JSON lines.
    ///
    /// Reads t (taken), s (snooze), a (answer) or d (decline) from stdin.
    Watch,
}

/// Map a line typed during `watch` to an action.
fn parse_action(line: &str) -> Option<UserAction> {
    match line.trim().to_ascii_lowercase().as_str() {
        "t" | "taken" => Some(UserAction::TakeActive),
        "s" | "snooze" => Some(UserAction::SnoozeActive),
        "a" | "answer" => Some(UserAction::AnswerCall),
        "d" | "decline" => Some(UserAction::DeclineCall),
        _ => None,
    }
}

fn targeted(
    id: Option<String>,
    meal: Option<MealSlot>,
    specific: fn(String, MealSlot) -> UserAction,
    active: UserAction,
) -> UserAction {
    match (id, meal) {
        (Some(id), Some(meal)) => specific(id, meal),
        _ => active,
    }
}

pub fn run(action: ReminderAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let engine = load_engine(&db, &config);

    let (user_action, at) = match action {
        ReminderAction::Status => {
            println!("{}", serde_json::to_string_pretty(&engine.snapshot(local_now()))?);
            return Ok(());
        }
        ReminderAction::Watch => return watch_loop(&db, engine, &config),
        ReminderAction::Tick { at } => (None, at),
        ReminderAction::Taken { id, meal, at } => (
            Some(targeted(
                id,
                meal,
                |medication_id, meal_slot| UserAction::MarkTaken {
                    medication_id,
                    meal_slot,
                },
                UserAction::TakeActive,
            )),
            at,
        ),
        ReminderAction::Snooze { id, meal, at } => (
            Some(targeted(
                id,
                meal,
                |medication_id, meal_slot| UserAction::Snooze {
                    medication_id,
                    meal_slot,
                },
                UserAction::SnoozeActive,
            )),
            at,
        ),
        ReminderAction::Answer { at } => (Some(UserAction::AnswerCall), at),
        ReminderAction::Decline { at } => (Some(UserAction::DeclineCall), at),
    };

    let now = at.unwrap_or_else(local_now);
    let mut driver = PollingDriver::new(engine, &db, print_event, config.caregiver.clone());
    let event = match user_action {
        Some(action) => driver.apply(action, now)?,
        None => driver.tick_at(now)?,
    };

    let (engine, _, _) = driver.into_parts();
    db.store_engine(&engine)?;
    if event.is_none() {
        println!("{}", serde_json::to_string(&engine.snapshot(now))?);
    }
    Ok(())
}

fn watch_loop(
    db: &Database,
    engine: ReminderEngine,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    let interval = Duration::from_secs(config.reminders.tick_interval_secs);

    runtime.block_on(async {
        let (action_tx, action_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(read_actions(action_tx));
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(true);
            }
        });

        let mut driver = PollingDriver::new(engine, db, print_event, config.caregiver.clone())
            .with_tick_interval(interval);
        driver.run(action_rx, shutdown_rx).await;
    });
    // The stdin reader may still be parked on a blocking read.
    runtime.shutdown_background();
    Ok(())
}

async fn read_actions(tx: mpsc::Sender<UserAction>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        let Some(action) = parse_action(&line) else {
            tracing::warn!(input = %line.trim(), "unrecognized input, expected t, s, a or d");
            continue;
        };
        if tx.send(action).await.is_err() {
            break;
        }
    }
}
