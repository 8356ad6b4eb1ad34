use anyhow::{anyhow, Context, Result};
use base64::Engine as _;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wayfarer_core::catalog::Catalog;
use wayfarer_core::character::Character;
use wayfarer_core::database::Database;
use wayfarer_core::optimizer::{
    GearOptimizer, Goal, Metric, MetricSet, OptimizerOptions, SortKey, Target,
};
use wayfarer_core::travel::{TravelConfig, TravelOptimizer};
use wayfarer_core::{decode_gearset, encode_gearset};

mod server;

#[derive(Parser)]
#[command(
    name = "wayfarer",
    version = "0.1.0",
    about = "Gear planner and optimizer backend for step-based idle games",
    long_about = None
)]
struct Cli {
    /// Path to SQLite database file
    #[arg(long, global = true)]
    database: Option<std::path::PathBuf>,

    /// Path to the catalog JSON file
    #[arg(long, global = true, default_value = "./catalog.json")]
    catalog: std::path::PathBuf,

    /// Path to log file
    #[arg(long, global = true, default_value = "/tmp/wayfarer.log")]
    log_file: std::path::PathBuf,

    /// Verbosity level (repeat for more verbose output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API server
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8700)]
        port: u16,
    },

    /// Import a character export file into a session
    ImportCharacter {
        /// Character export JSON file
        #[arg(long)]
        file: std::path::PathBuf,
        /// Session uuid to import into
        #[arg(long)]
        session: String,
    },

    /// Find the best gear loadout for an activity
    OptimizeActivity {
        /// Activity name as it appears in the catalog
        #[arg(long)]
        activity: String,
        /// Character export JSON file
        #[arg(long)]
        character: std::path::PathBuf,
        /// Sort priority as metric:goal, repeatable up to three times
        /// (e.g. --sort xp_per_step:max --sort steps:min)
        #[arg(long = "sort")]
        sorts: Vec<String>,
        /// Item to farm; enables the steps_per_target_drop metric
        #[arg(long)]
        target_item: Option<String>,
        #[arg(long, default_value_t = 100)]
        max_iterations: usize,
    },

    /// Find the best gear loadout for a crafting recipe
    OptimizeRecipe {
        /// Recipe name as it appears in the catalog
        #[arg(long)]
        recipe: String,
        /// Character export JSON file
        #[arg(long)]
        character: std::path::PathBuf,
        /// Sort priority as metric:goal, repeatable up to three times
        /// (e.g. --sort expected_steps_per_item:min)
        #[arg(long = "sort")]
        sorts: Vec<String>,
        #[arg(long, default_value_t = 100)]
        max_iterations: usize,
    },

    /// Plan the cheapest travel route between locations
    OptimizeTravel {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Intermediate stop, repeatable
        #[arg(long = "stop")]
        stops: Vec<String>,
        /// Character export JSON file
        #[arg(long)]
        character: std::path::PathBuf,
        /// Travel gear configuration (TOML)
        #[arg(long)]
        travel_config: std::path::PathBuf,
    },

    /// Show aggregated stats for a gearset export string
    GearsetStats {
        /// Share-format export string
        export: String,
        /// Skill to aggregate stats for
        #[arg(long)]
        skill: String,
        #[arg(long)]
        location: Option<String>,
        /// Character export JSON file; includes collectible and custom
        /// stat bonuses when given
        #[arg(long)]
        character: Option<std::path::PathBuf>,
    },

    /// Summarize the coin value of a character's items
    InventoryValue {
        /// Character export JSON file
        #[arg(long)]
        character: std::path::PathBuf,
    },

    /// List and review submitted bug reports
    ReviewBugReports {
        /// Only show reports not yet reviewed
        #[arg(long)]
        unreviewed: bool,
        /// Mark the given report id as reviewed
        #[arg(long)]
        mark: Option<String>,
        /// Reviewer name recorded with --mark
        #[arg(long, default_value = "cli")]
        reviewer: String,
        /// Review notes recorded with --mark
        #[arg(long)]
        notes: Option<String>,
        /// Write attached screenshots to this directory as PNG files
        #[arg(long)]
        screenshot_dir: Option<std::path::PathBuf>,
    },

    /// Show API usage statistics
    ApiStats {
        /// Window in days
        #[arg(long, default_value_t = 7)]
        days: i64,
        /// Show the access history of one session instead of totals
        #[arg(long)]
        session: Option<String>,
        /// Most recent rows to show with --session
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
}

fn setup_logging(
    verbose: u8,
    log_file: &std::path::Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter_level = match verbose {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let filter = EnvFilter::from_default_env().add_directive(filter_level.into());

    let file_appender = tracing_appender::rolling::never(
        log_file.parent().unwrap_or(std::path::Path::new(".")),
        log_file.file_name().unwrap_or(std::ffi::OsStr::new("wayfarer.log")),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::Layer::new().with_writer(std::io::stderr).with_ansi(true))
        .with(fmt::Layer::new().with_writer(non_blocking).with_ansi(false));

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(guard)
}

fn parse_sort_key(raw: &str) -> Result<SortKey> {
    let (metric, goal) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("sort key '{}' must be metric:goal", raw))?;
    let metric = match metric {
        "xp_per_step" => Metric::XpPerStep,
        "steps" => Metric::Steps,
        "steps_per_reward_roll" => Metric::StepsPerRewardRoll,
        "rewards_per_completion" => Metric::RewardsPerCompletion,
        "steps_per_target_drop" => Metric::StepsPerTargetDrop,
        "crafts_per_material" => Metric::CraftsPerMaterial,
        "expected_steps_per_item" => Metric::ExpectedStepsPerItem,
        "steps_per_chest" => Metric::StepsPerChest,
        other => return Err(anyhow!("unknown metric '{}'", other)),
    };
    let goal = match goal {
        "min" | "minimize" => Goal::Minimize,
        "max" | "maximize" => Goal::Maximize,
        other => return Err(anyhow!("unknown goal '{}'", other)),
    };
    Ok(SortKey { metric, goal })
}

fn print_loadout(catalog: &Catalog, gearset: &wayfarer_core::Gearset) {
    for (slot, entry) in &gearset.slots {
        let name = catalog
            .item_by_uuid(&entry.uuid, entry.quality)
            .map(|i| i.name.as_str())
            .unwrap_or(entry.uuid.as_str());
        println!("  {:10} {}", slot.to_string(), name);
    }
}

fn db_path(cli_path: &Option<std::path::PathBuf>) -> std::path::PathBuf {
    cli_path
        .clone()
        .unwrap_or_else(|| std::path::PathBuf::from("./wayfarer.sqlite"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = setup_logging(cli.verbose, &cli.log_file)?;

    match cli.command {
        Commands::Serve { host, port } => {
            let db = Database::new(&db_path(&cli.database))?;
            let catalog = Catalog::load(&cli.catalog)
                .with_context(|| format!("loading catalog {}", cli.catalog.display()))?;
            server::serve(server::AppState { db, catalog }, &host, port).await?;
        }

        Commands::ImportCharacter { file, session } => {
            let db = Database::new(&db_path(&cli.database))?;
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let config: serde_json::Value = serde_json::from_str(&raw)?;
            // Validate the shape before storing anything.
            let character: Character = serde_json::from_value(config.clone())
                .with_context(|| "character export has an unexpected shape")?;
            db.set_character_config(&session, &config)?;
            info!("Imported character '{}' into session {}", character.name, session);
            println!("Imported '{}' into session {}", character.name, session);
        }

        Commands::OptimizeActivity {
            activity,
            character,
            sorts,
            target_item,
            max_iterations,
        } => {
            let catalog = Catalog::load(&cli.catalog)?;
            let character = Character::load(&character)?;
            let activity = catalog.activity(&activity)?;

            let priorities = if sorts.is_empty() {
                if target_item.is_some() {
                    vec![SortKey {
                        metric: Metric::StepsPerTargetDrop,
                        goal: Goal::Minimize,
                    }]
                } else {
                    vec![SortKey {
                        metric: Metric::XpPerStep,
                        goal: Goal::Maximize,
                    }]
                }
            } else {
                sorts
                    .iter()
                    .map(|s| parse_sort_key(s))
                    .collect::<Result<Vec<_>>>()?
            };

            let options = OptimizerOptions {
                priorities,
                target_item: target_item.clone(),
                max_iterations,
            };
            let optimizer =
                GearOptimizer::new(&catalog, &character, Target::Activity(activity), options)?;

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
            spinner.set_message(format!("Optimizing {}", activity.name));
            spinner.enable_steady_tick(std::time::Duration::from_millis(100));
            let result = optimizer.optimize()?;
            spinner.finish_and_clear();

            println!("Best loadout for {} ({} iterations):", activity.name, result.iterations);
            print_loadout(&catalog, &result.gearset);
            if let MetricSet::Activity(m) = result.metrics {
                println!(
                    "steps: {:.0}  xp/step: {:.3}  steps/reward roll: {:.1}",
                    m.steps, m.xp_per_step, m.steps_per_reward_roll
                );
                if let Some(target) = &target_item {
                    println!(
                        "steps per {}: {:.1}",
                        target,
                        m.steps_per_target_drop(activity, target)
                    );
                }
            }
            println!("export: {}", encode_gearset(&result.gearset)?);
        }

        Commands::OptimizeRecipe {
            recipe,
            character,
            sorts,
            max_iterations,
        } => {
            let catalog = Catalog::load(&cli.catalog)?;
            let character = Character::load(&character)?;
            let recipe = catalog.recipe(&recipe)?;

            let priorities = if sorts.is_empty() {
                vec![SortKey {
                    metric: Metric::ExpectedStepsPerItem,
                    goal: Goal::Minimize,
                }]
            } else {
                sorts
                    .iter()
                    .map(|s| parse_sort_key(s))
                    .collect::<Result<Vec<_>>>()?
            };

            let options = OptimizerOptions {
                priorities,
                target_item: None,
                max_iterations,
            };
            let optimizer =
                GearOptimizer::new(&catalog, &character, Target::Recipe(recipe), options)?;

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
            spinner.set_message(format!("Optimizing {}", recipe.name));
            spinner.enable_steady_tick(std::time::Duration::from_millis(100));
            let result = optimizer.optimize()?;
            spinner.finish_and_clear();

            println!("Best loadout for {} ({} iterations):", recipe.name, result.iterations);
            print_loadout(&catalog, &result.gearset);
            if let MetricSet::Crafting(m) = result.metrics {
                println!(
                    "steps: {:.0}  steps/item: {:.1}  crafts/material: {:.3}  steps/chest: {:.0}",
                    m.steps, m.expected_steps_per_item, m.crafts_per_material, m.steps_per_chest
                );
            }
            println!("export: {}", encode_gearset(&result.gearset)?);
        }

        Commands::OptimizeTravel {
            from,
            to,
            stops,
            character,
            travel_config,
        } => {
            let catalog = Catalog::load(&cli.catalog)?;
            let character = Character::load(&character)?;
            let config = TravelConfig::load(&travel_config)?;
            let optimizer = TravelOptimizer::new(&catalog, &character, &config)?;

            let plan = optimizer.route_via(&from, &stops, &to)?;
            println!("{} -> {} ({} steps):", from, to, plan.total_steps);
            for leg in &plan.legs {
                println!(
                    "  {} -> {}  {} steps  [{}]",
                    leg.from, leg.to, leg.steps, leg.gearset
                );
            }
        }

        Commands::GearsetStats {
            export,
            skill,
            location,
            character,
        } => {
            let catalog = Catalog::load(&cli.catalog)?;
            let gearset = decode_gearset(&export)?;
            let items: Vec<_> = gearset
                .items(&catalog)
                .into_iter()
                .map(|(_, item)| item)
                .collect();
            let mut totals =
                wayfarer_core::stats::aggregate(&items, &skill, location.as_deref());
            if let Some(path) = &character {
                let character = Character::load(path)?;
                totals.extend(&wayfarer_core::stats::character_stats(
                    &character,
                    &catalog,
                    &skill,
                    location.as_deref(),
                ));
            }

            println!("Stats for '{}' with {} items equipped:", skill, items.len());
            let mut entries: Vec<_> = totals.0.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (name, value) in entries {
                println!("  {:24} {:+.4}", name, value);
            }
        }

        Commands::InventoryValue { character } => {
            let catalog = Catalog::load(&cli.catalog)?;
            let character = Character::load(&character)?;
            println!("Inventory value for {}:", character.name);
            println!("  total:      {}", character.total_value(&catalog));
            println!("  duplicates: {}", character.duplicate_value(&catalog));
            println!("  equipped:   {}", character.equipment_value(&catalog));
        }

        Commands::ReviewBugReports {
            unreviewed,
            mark,
            reviewer,
            notes,
            screenshot_dir,
        } => {
            let db = Database::new(&db_path(&cli.database))?;
            if let Some(id) = mark {
                db.mark_report_reviewed(&id, &reviewer, notes.as_deref())?;
                println!("Marked {} as reviewed by {}", id, reviewer);
                return Ok(());
            }

            let filter = if unreviewed { Some(false) } else { None };
            let reports = db.get_bug_reports(filter)?;
            if reports.is_empty() {
                println!("No bug reports.");
                return Ok(());
            }
            for report in reports {
                let status = if report.reviewed { "reviewed" } else { "open" };
                println!(
                    "[{}] {}  {}  session {} (snapshot {})",
                    status,
                    report.timestamp.format("%Y-%m-%d %H:%M"),
                    report.id,
                    report.original_session_uuid,
                    report.snapshot_session_uuid
                );
                println!("    {}", report.description);
                if let Some(version) = &report.app_version {
                    println!("    app version: {}", version);
                }
                if let Some(by) = &report.reviewed_by {
                    println!("    reviewed by {}: {}", by, report.notes.as_deref().unwrap_or("-"));
                }
                if let Some(dir) = &screenshot_dir {
                    std::fs::create_dir_all(dir)?;
                    for (n, data) in report.screenshots.iter().enumerate() {
                        // Screenshots arrive as data URLs or bare base64.
                        let payload = data.rsplit_once(',').map(|(_, b)| b).unwrap_or(data);
                        let bytes = base64::engine::general_purpose::STANDARD
                            .decode(payload)
                            .with_context(|| format!("screenshot {} of {}", n, report.id))?;
                        let path = dir.join(format!("{}-{}.png", report.id, n));
                        std::fs::write(&path, bytes)?;
                        println!("    wrote {}", path.display());
                    }
                }
            }
        }

        Commands::ApiStats { days, session, limit } => {
            let db = Database::new(&db_path(&cli.database))?;
            if let Some(uuid) = session {
                let history = db.session_access_history(&uuid, limit)?;
                if history.is_empty() {
                    println!("No access logs for session {}.", uuid);
                    return Ok(());
                }
                println!("Access history for session {}:", uuid);
                for entry in &history {
                    println!(
                        "  {}  {:6} {}",
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        entry.method,
                        entry.endpoint
                    );
                }
                return Ok(());
            }
            let stats = db.api_stats(days)?;
            println!("API usage over the last {} days:", days);
            println!("  requests: {}  sessions: {}", stats.total_requests, stats.unique_sessions);
            println!("  by endpoint:");
            for (endpoint, count) in &stats.requests_by_endpoint {
                println!("    {:6} {}", count, endpoint);
            }
            println!("  by day:");
            for (day, count) in &stats.requests_by_day {
                println!("    {} {}", day, count);
            }
            println!("  top sessions:");
            for (session, count) in &stats.top_sessions {
                println!("    {:6} {}", count, session);
            }
        }
    }

    Ok(())
}
