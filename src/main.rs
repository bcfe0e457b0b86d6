use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use calendar_sqlite::models::parse_timestamp;
use calendar_sqlite::{CalendarConfig, CalendarService, Lifecycle};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "calendar-seed", version, about = "Seed and inspect the sample calendar database")]
struct Cli {
    /// Database file (overrides CALENDAR_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the schema and the online meeting room
    Init,
    /// Load sample data in a single transaction
    Seed {
        /// JSON seed file (overrides CALENDAR_SEED_FILE)
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// List users
    Users,
    /// List meeting rooms
    Rooms,
    /// Events a user takes part in
    Agenda {
        #[arg(long)]
        email: String,
        #[arg(long, value_parser = timestamp)]
        from: Option<NaiveDateTime>,
        #[arg(long, value_parser = timestamp)]
        to: Option<NaiveDateTime>,
    },
    /// Hourly slots where every listed user is free
    FreeSlots {
        #[arg(long = "email", required = true)]
        emails: Vec<String>,
        #[arg(long, default_value_t = 60)]
        duration: i64,
        #[arg(long, value_parser = timestamp)]
        from: NaiveDateTime,
        #[arg(long, value_parser = timestamp)]
        to: NaiveDateTime,
        #[arg(long, default_value_t = 9)]
        start_hour: u32,
        #[arg(long, default_value_t = 17)]
        end_hour: u32,
    },
    /// Delete an event and its attendee links
    Cancel {
        #[arg(long)]
        id: i64,
    },
}

fn timestamp(value: &str) -> std::result::Result<NaiveDateTime, String> {
    parse_timestamp(value).map_err(|e| e.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = CalendarConfig::from_env().context("loading .env")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Command::Seed { data: Some(path) } = &cli.command {
        config.seed_file = Some(path.clone());
    }

    let mut service = CalendarService::new(config);
    service
        .start()
        .await
        .with_context(|| format!("opening {}", service.config().db_path.display()))?;

    let outcome = run(&service, cli.command).await;
    service.stop().await?;
    outcome
}

async fn run(service: &CalendarService, command: Command) -> Result<()> {
    match command {
        Command::Init => {
            println!("initialized {}", service.config().db_path.display());
        }
        Command::Seed { .. } => {
            let report = service.seed().await.context("seeding failed, nothing was written")?;
            print_json(&report)?;
        }
        Command::Users => {
            let store = service.lock().await?;
            print_json(&store.all_users()?)?;
        }
        Command::Rooms => {
            let store = service.lock().await?;
            print_json(&store.all_meeting_rooms()?)?;
        }
        Command::Agenda { email, from, to } => {
            let store = service.lock().await?;
            let Some(user) = store.user_by_email(&email)? else {
                bail!("no user with email {email}");
            };
            print_json(&store.user_events(user.id, from, to)?)?;
        }
        Command::FreeSlots {
            emails,
            duration,
            from,
            to,
            start_hour,
            end_hour,
        } => {
            let store = service.lock().await?;
            let mut ids = Vec::with_capacity(emails.len());
            for email in &emails {
                match store.user_by_email(email)? {
                    Some(user) => ids.push(user.id),
                    None => bail!("no user with email {email}"),
                }
            }
            let slots = store.common_free_slots(&ids, duration, from, to, start_hour, end_hour)?;
            print_json(&slots)?;
        }
        Command::Cancel { id } => {
            let store = service.lock().await?;
            if !store.cancel_event(id)? {
                bail!("no event with id {id}");
            }
            println!("cancelled event {id}");
        }
    }
    Ok(())
}
