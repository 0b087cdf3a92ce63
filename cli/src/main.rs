mod commands;
mod config;
mod supabase;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    NewActivity, SignIn, cmd_login, cmd_logout, cmd_plan_set, cmd_plan_show, cmd_theme_set,
    cmd_theme_show, cmd_weight_chart, cmd_weight_delete, cmd_weight_history, cmd_weight_log,
    cmd_whoami, cmd_workout_add, cmd_workout_delete, cmd_workout_edit, cmd_workout_list,
    cmd_workout_stats, json_error,
};
use crate::config::Config;
use crate::supabase::SupabaseClient;
use fatnomo_core::auth::SessionStore;
use fatnomo_core::backend::Backend;
use fatnomo_core::db::Database;

const LOG_VAR: &str = "FATNOMO_LOG";

#[derive(Parser)]
#[command(
    name = "fatnomo",
    version,
    about = "Track body weight, plan your week, and log workouts"
)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in (creates a local account on first use)
    Login {
        /// Account email
        email: String,
        /// Password (hosted backend only; prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Body weight tracking
    Weight {
        #[command(subcommand)]
        command: WeightCommands,
    },
    /// Weekly plan in half-hour slots
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Workout activities and weekly calories
    Workout {
        #[command(subcommand)]
        command: WorkoutCommands,
    },
    /// Theme preference
    Theme {
        #[command(subcommand)]
        command: ThemeCommands,
    },
}

#[derive(Subcommand)]
enum WeightCommands {
    /// Log weight in kg (replaces the entry for that date if there is one)
    Log {
        /// Weight in kg, e.g. 75.5 or 75,5
        value: String,
        /// Date (YYYY-MM-DD, today or yesterday; default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// List entries, newest first
    History,
    /// Show progress and stats
    Chart,
    /// Delete an entry by ID (or ID prefix)
    Delete {
        /// Entry ID
        id: String,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Show the plan from the current time slot onward
    Show {
        /// Show a single day (monday-sunday, mon-sun or today)
        #[arg(short, long)]
        day: Option<String>,
        /// Show every slot from 00:00
        #[arg(short, long)]
        all: bool,
    },
    /// Set the text of one slot (empty text clears it)
    Set {
        /// Day (monday-sunday, mon-sun or today)
        day: String,
        /// Slot start, HH:MM on the hour or half hour, or "now"
        slot: String,
        /// Plan text
        #[arg(default_value = "")]
        content: String,
    },
}

#[derive(Subcommand)]
enum WorkoutCommands {
    /// List activities with weekly calories
    List,
    /// Add an activity
    Add {
        /// Activity name
        name: String,
        #[arg(long)]
        reps: Option<String>,
        #[arg(long)]
        sets: Option<String>,
        /// Current working weight
        #[arg(long)]
        weight: Option<String>,
        /// Sessions per week
        #[arg(long)]
        times: Option<String>,
        /// Calories burned per session
        #[arg(long)]
        calories: Option<String>,
    },
    /// Change one field of an activity (empty value clears it)
    Edit {
        /// Activity ID (or ID prefix)
        id: String,
        /// activity, reps, sets, current_weight, times_per_week or calories
        field: String,
        /// New value
        #[arg(default_value = "")]
        value: String,
    },
    /// Delete an activity
    Delete {
        /// Activity ID (or ID prefix)
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Total weekly calories
    Stats {
        /// Keep running and print the total whenever it changes
        #[arg(short, long)]
        watch: bool,
    },
}

#[derive(Subcommand)]
enum ThemeCommands {
    /// Show the stored theme
    Show,
    /// Store a theme: light, dark or system
    Set { theme: String },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(e) = run(cli).await {
        if json {
            println!("{}", json_error(&format!("{e:#}")));
        } else {
            eprintln!("Error: {e:#}");
        }
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let store = SessionStore::open(&config.session_path)?;

    if let Some(hosted) = &config.hosted {
        tracing::debug!(url = %hosted.url, "using hosted backend");
        let token = store.session().map(|s| s.access_token);
        let client = SupabaseClient::new(hosted, token)?;
        execute(&client, &store, cli).await
    } else {
        tracing::debug!(path = %config.db_path.display(), "using embedded store");
        let db = Database::open(&config.db_path)?;
        execute(&db, &store, cli).await
    }
}

async fn execute<B: Backend + SignIn>(backend: &B, store: &SessionStore, cli: Cli) -> Result<()> {
    let json = cli.json;
    match cli.command {
        Commands::Login { email, password } => {
            cmd_login(backend, store, &email, password, json).await
        }
        Commands::Logout => cmd_logout(store, json).await,
        Commands::Whoami => cmd_whoami(store, json).await,
        Commands::Weight { command } => match command {
            WeightCommands::Log { value, date } => {
                cmd_weight_log(backend, store, &value, date, json).await
            }
            WeightCommands::History => cmd_weight_history(backend, store, json).await,
            WeightCommands::Chart => cmd_weight_chart(backend, store, json).await,
            WeightCommands::Delete { id } => cmd_weight_delete(backend, store, &id, json).await,
        },
        Commands::Plan { command } => match command {
            PlanCommands::Show { day, all } => cmd_plan_show(backend, store, day, all, json).await,
            PlanCommands::Set { day, slot, content } => {
                cmd_plan_set(backend, store, &day, &slot, &content, json).await
            }
        },
        Commands::Workout { command } => match command {
            WorkoutCommands::List => cmd_workout_list(backend, store, json).await,
            WorkoutCommands::Add {
                name,
                reps,
                sets,
                weight,
                times,
                calories,
            } => {
                let activity = NewActivity {
                    name,
                    reps,
                    sets,
                    current_weight: weight,
                    times_per_week: times,
                    calories,
                };
                cmd_workout_add(backend, store, &activity, json).await
            }
            WorkoutCommands::Edit { id, field, value } => {
                cmd_workout_edit(backend, store, &id, &field, &value, json).await
            }
            WorkoutCommands::Delete { id, yes } => {
                cmd_workout_delete(backend, store, &id, yes, json).await
            }
            WorkoutCommands::Stats { watch } => {
                cmd_workout_stats(backend, store, watch, json).await
            }
        },
        Commands::Theme { command } => match command {
            ThemeCommands::Show => cmd_theme_show(backend, store, json).await,
            ThemeCommands::Set { theme } => cmd_theme_set(backend, store, &theme, json).await,
        },
    }
}
