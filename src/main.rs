use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod aggregate;
mod classify;
mod config;
mod db;
mod error;
mod models;
mod narrative;
mod normalize;
mod report;
mod sessions;

use config::AnalysisConfig;
use models::AttendanceRecord;
use sessions::{DateWindow, SessionFilter};

#[derive(Parser)]
#[command(name = "arena-insights")]
#[command(about = "Class occupancy and profitability indicators for arena attendance", long_about = None)]
struct Cli {
    /// TOML file with analysis settings
    #[arg(long, global = true, env = "ARENA_INSIGHTS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ScopeArgs {
    /// Read attendance from a CSV export instead of Postgres
    #[arg(long)]
    csv: Option<PathBuf>,
    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Keep a single class type ("all" keeps every type)
    #[arg(long, default_value = "all")]
    class_type: String,
    /// Keep a single time slot such as 06h ("all" keeps every slot)
    #[arg(long, default_value = "all")]
    time: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a sample week of attendance
    Seed,
    /// Import attendance rows from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List sessions, newest first
    Sessions {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Filter by instructor, class type or time slot
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Show coordinator and student list for each session
        #[arg(long)]
        detail: bool,
    },
    /// List sessions operating at a loss
    Alerts {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Show KPIs, time-slot performance, instructor hours and daily stats
    Stats {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long)]
        json: bool,
    },
    /// Print the period diagnosis
    Analysis {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Day-by-day students against paid hours for one month
    Evolution {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Month to show (YYYY-MM)
        #[arg(long, value_parser = parse_month)]
        month: NaiveDate,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn parse_month(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d")
        .map_err(|_| format!("expected YYYY-MM, got {value}"))
}

fn selection(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(value.to_string())
    }
}

impl ScopeArgs {
    fn window(&self) -> anyhow::Result<Option<DateWindow>> {
        let window = match (self.from, self.to) {
            (None, None) => None,
            (from, to) => Some(DateWindow::new(
                from.unwrap_or(NaiveDate::MIN),
                to.unwrap_or(NaiveDate::MAX),
            )?),
        };
        Ok(window)
    }

    fn filter(&self, window: Option<DateWindow>, config: &AnalysisConfig) -> SessionFilter {
        SessionFilter {
            window,
            class_type: selection(&self.class_type),
            time_slot: selection(&self.time),
            excluded_class_types: config.excluded_class_types.clone(),
        }
    }

    fn label(&self) -> String {
        let types = selection(&self.class_type).unwrap_or_else(|| "all class types".to_string());
        let slots = selection(&self.time).unwrap_or_else(|| "all time slots".to_string());
        let period = match (self.from, self.to) {
            (None, None) => "the full history".to_string(),
            (Some(from), None) => format!("{from} onwards"),
            (None, Some(to)) => format!("up to {to}"),
            (Some(from), Some(to)) => format!("{from} to {to}"),
        };
        format!("{types}, {slots}, {period}")
    }

    async fn load(&self) -> anyhow::Result<Vec<AttendanceRecord>> {
        match &self.csv {
            Some(path) => db::load_csv(path)
                .with_context(|| format!("failed to read {}", path.display())),
            None => {
                let pool = connect().await?;
                db::fetch_attendance(&pool).await
            }
        }
    }
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_sessions(
    scope: &ScopeArgs,
    window: Option<DateWindow>,
    config: &AnalysisConfig,
) -> anyhow::Result<Vec<models::Session>> {
    let rows = scope.load().await?;
    let sessions = sessions::group_sessions(&rows, &scope.filter(window, config));
    info!(rows = rows.len(), sessions = sessions.len(), "built sessions");
    Ok(sessions)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arena_insights=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AnalysisConfig::load(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&connect().await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(&connect().await?).await?;
            println!("Seed data inserted ({inserted} rows).");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&connect().await?, &csv).await?;
            println!("Inserted {inserted} attendance rows from {}.", csv.display());
        }
        Commands::Sessions {
            scope,
            search,
            page,
            detail,
        } => {
            let sessions = load_sessions(&scope, scope.window()?, &config).await?;
            let ordered = report::history(&sessions);
            let matches = report::search_sessions(&ordered, search.as_deref().unwrap_or(""));
            let page = report::paginate(&matches, page, config.page_size);

            if page.items.is_empty() {
                println!("No sessions found.");
                return Ok(());
            }

            println!(
                "Sessions {} ({} total, page {} of {}):",
                scope.label(),
                page.total_items,
                page.page,
                page.total_pages
            );
            for session in page.items {
                if detail {
                    print!("{}", report::session_detail(session));
                } else {
                    println!("- {}", report::session_line(session));
                }
            }
        }
        Commands::Alerts { scope } => {
            let sessions = load_sessions(&scope, scope.window()?, &config).await?;
            let alerts = report::alert_history(&sessions);

            if alerts.is_empty() {
                println!("No session needs attention.");
                return Ok(());
            }

            println!("{} sessions need attention:", alerts.len());
            for session in alerts {
                println!("- {}", report::session_line(session));
            }
        }
        Commands::Stats { scope, json } => {
            let sessions = load_sessions(&scope, scope.window()?, &config).await?;
            let snapshot = aggregate::build_snapshot(&sessions, &config);

            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                return Ok(());
            }

            let kpis = &snapshot.kpis;
            println!("Presences: {}", kpis.total_presences);
            println!("Unique students: {}", kpis.unique_students);
            println!("Sessions: {} ({} in alert)", kpis.session_count, kpis.alert_count);
            match kpis.status {
                Some(status) => println!("Students per instructor: {:.2} ({status})", kpis.mean_ratio),
                None => println!("Students per instructor: no data"),
            }

            println!("Time slots:");
            for slot in &aggregate::slots_by_label(&snapshot.time_slots) {
                println!(
                    "- {} mean {:.2} across {} sessions, {} alerts",
                    slot.time_slot, slot.mean_ratio, slot.session_count, slot.alert_count
                );
            }

            println!("Instructor hours:");
            for instructor in snapshot.instructors.iter().take(config.ranking_size) {
                println!(
                    "- {} {} hours, {} presences",
                    instructor.name, instructor.session_count, instructor.total_attendees
                );
            }

            println!("Days:");
            for day in &snapshot.daily {
                println!(
                    "- {} {} sessions, mean {:.2}, {} alerts",
                    day.session_date, day.session_count, day.mean_ratio, day.alert_count
                );
            }
        }
        Commands::Analysis { scope } => {
            let sessions = load_sessions(&scope, scope.window()?, &config).await?;
            let snapshot = aggregate::build_snapshot(&sessions, &config);
            println!("{}", narrative::build_narrative(&snapshot));
        }
        Commands::Evolution { scope, month } => {
            let window = DateWindow::month_of(month);
            let sessions = load_sessions(&scope, Some(window), &config).await?;
            let evolution = aggregate::daily_evolution(&sessions, window);

            println!(
                "{} ({} to {}):",
                month.format("%B %Y"),
                window.from(),
                window.to()
            );
            for day in &evolution {
                println!("{}", report::evolution_line(day));
            }
        }
        Commands::Report { scope, out } => {
            let sessions = load_sessions(&scope, scope.window()?, &config).await?;
            let snapshot = aggregate::build_snapshot(&sessions, &config);
            let narrative = narrative::build_narrative(&snapshot);
            let report = report::build_report(
                &scope.label(),
                &snapshot,
                &sessions,
                &narrative,
                config.ranking_size,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
