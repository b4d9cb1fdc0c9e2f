use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io;
use std::path::PathBuf;

use habit_tracker::config::{init_tracing, LogArgs, StoreArgs};
use habit_tracker::export::write_history_csv;
use habit_tracker::entry::format_day;
use habit_tracker::{Frequency, HabitDetails, HabitStore};

use chrono::NaiveDate;

/// habit-tracker - track habits, streaks and XP from the command line
#[derive(Parser, Debug)]
#[command(name = "habit-tracker", version)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    log: LogArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database schema
    Init,

    /// Register a user
    AddUser {
        email: String,
        #[arg(long, default_value = "")]
        name: String,
    },

    /// Create a habit for a user
    AddHabit {
        #[arg(long)]
        user: String,
        title: String,
        #[arg(long, default_value = "General")]
        category: String,
        #[arg(long, default_value = "daily")]
        frequency: String,
        /// Goal per day; makes the habit quantitative
        #[arg(long)]
        goal: Option<f64>,
        #[arg(long)]
        unit: Option<String>,
    },

    /// Flip completion of a binary habit (defaults to today)
    Toggle {
        #[arg(long)]
        user: String,
        habit: String,
        #[arg(long)]
        date: Option<String>,
    },

    /// Record progress for a quantitative habit (defaults to today)
    Progress {
        #[arg(long)]
        user: String,
        habit: String,
        value: f64,
        #[arg(long)]
        date: Option<String>,
    },

    /// List a user's habits with streaks
    List {
        #[arg(long)]
        user: String,
    },

    /// Show a user's dashboard
    Dashboard {
        #[arg(long)]
        user: String,
    },

    /// Export a user's completion history as CSV (stdout when no file given)
    Export {
        #[arg(long)]
        user: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Explicit date, or the tracker's today in canonical form
fn format_or_today(date: Option<String>, today: NaiveDate) -> String {
    date.unwrap_or_else(|| format_day(today))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log.log_level);

    let tracker = cli
        .store
        .open_tracker()
        .with_context(|| format!("Failed to open database {:?}", cli.store.database))?;

    match cli.command {
        Command::Init => {
            println!("✓ Database ready: {:?}", cli.store.database);
        }

        Command::AddUser { email, name } => {
            let user = tracker.register_user(&email, &name)?;
            println!("✓ User created: {} ({})", user.id, user.email);
            if user.is_admin {
                println!("  🛡️  Admin access granted");
            }
        }

        Command::AddHabit {
            user,
            title,
            category,
            frequency,
            goal,
            unit,
        } => {
            let frequency = Frequency::parse(&frequency)
                .with_context(|| format!("Unknown frequency: {}", frequency))?;

            let details = HabitDetails {
                title,
                category,
                frequency,
                is_quantity: goal.is_some(),
                goal_value: goal,
                unit,
                ..Default::default()
            };

            let habit = tracker.create_habit(&user, details)?;
            println!("✓ Habit created: {} ({})", habit.habit.id, habit.habit.title);
        }

        Command::Toggle { user, habit, date } => {
            let date = format_or_today(date, tracker.today());
            let outcome = tracker.toggle_completion(&habit, &date, &user)?;

            let mark = if outcome.habit.completed_today { "✅" } else { "⬜" };
            println!(
                "{} {} on {} | streak: {}",
                mark, outcome.habit.habit.title, date, outcome.habit.streak
            );
            if let Some(user) = outcome.user {
                println!("⭐ +XP → {} xp, level {}", user.xp(), user.level());
            }
        }

        Command::Progress {
            user,
            habit,
            value,
            date,
        } => {
            let date = format_or_today(date, tracker.today());
            let outcome = tracker.set_progress(&habit, &date, value, &user)?;

            let view = &outcome.habit;
            println!(
                "📈 {} on {}: {} / {} {} | streak: {}",
                view.habit.title,
                date,
                value,
                view.habit.goal_value.unwrap_or_default(),
                view.habit.unit.as_deref().unwrap_or(""),
                view.streak
            );
            if let Some(user) = outcome.user {
                println!("⭐ Goal met! {} xp, level {}", user.xp(), user.level());
            }
        }

        Command::List { user } => {
            let habits = tracker.habits(&user)?;
            println!("📋 {} habit(s)", habits.len());
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            for view in habits {
                let mark = if view.completed_today { "✅" } else { "⬜" };
                println!(
                    "{} {:<24} {:<10} 🔥 {:>3}  {}",
                    mark,
                    view.habit.title,
                    view.habit.frequency.as_str(),
                    view.streak,
                    view.habit.id
                );
            }
        }

        Command::Dashboard { user } => {
            let profile = tracker.user(&user)?;
            let summary = tracker.dashboard(&user)?;

            println!("👋 {} | level {} ({} xp)", profile.name, profile.level(), profile.xp());
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            println!(
                "✓ Today: {}/{} habits ({:.0}%)",
                summary.completed_today, summary.total_habits, summary.completion_percent
            );
            println!("🔥 Overall streak: {} day(s)", summary.overall_streak);
            println!("🏆 Best habit streak: {} day(s)", summary.best_streak);
            println!("⚡ Habits on a 7+ day streak: {}", summary.habits_on_fire);
        }

        Command::Export { user, output } => {
            tracker.user(&user)?;
            let habits = tracker.store().list_habits(&user)?;

            let rows = match output {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("Failed to create {:?}", path))?;
                    let rows = write_history_csv(&habits, file)?;
                    println!("✓ Exported {} entries to {:?}", rows, path);
                    rows
                }
                None => write_history_csv(&habits, io::stdout().lock())?,
            };
            tracing::debug!(rows, "history exported");
        }
    }

    Ok(())
}
