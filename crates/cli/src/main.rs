mod commands;
mod config;
mod logging;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use crate::commands::Ctx;
use crate::config::BrmsConfig;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Sort order for scenario results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum SortArg {
    Asc,
    Desc,
}

/// Scenario workbench for JDM decision rules.
#[derive(Parser)]
#[command(name = "brms", version, about = "Scenario workbench for JDM decision rules")]
struct Cli {
    /// Configuration file (default: ./brms.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Use an in-process service instead of the configured API. Rule maps
    /// are inferred from the graph, nothing is persisted and every
    /// evaluation returns an empty result.
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a rule against a context and optionally save it as a scenario
    Simulate {
        /// Path to the JDM rule file
        rule: PathBuf,
        /// JSON object of input values
        #[arg(long)]
        context: PathBuf,
        /// JSON object of expected results to store with a saved scenario
        #[arg(long)]
        expected: Option<PathBuf>,
        /// Save the simulation as a scenario with this title
        #[arg(long)]
        save: Option<String>,
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Manage the saved scenarios of a rule
    Scenarios {
        #[command(subcommand)]
        command: ScenarioCommands,
    },

    /// Report fields that are misconnected between the rule map and the graph
    Check {
        /// Path to the JDM rule file
        rule: PathBuf,
        /// Compare against this rule map JSON instead of the stored one
        #[arg(long)]
        rule_map: Option<PathBuf>,
    },

    /// Batch testing through CSV files
    Csv {
        #[command(subcommand)]
        command: CsvCommands,
    },

    /// Search field definitions
    Fields {
        /// Search text
        query: String,
    },
}

#[derive(Subcommand)]
enum ScenarioCommands {
    /// List saved scenarios
    List {
        rule: PathBuf,
        /// Page to show, starting at 1
        #[arg(long, default_value = "1")]
        page: usize,
    },
    /// Re-run every saved scenario and compare with expected results
    Run {
        rule: PathBuf,
        /// Only show scenarios whose results differ
        #[arg(long)]
        errors_only: bool,
        /// Sort by scenario title
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
        /// Write the full results as CSV to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Rename a scenario
    Rename {
        rule: PathBuf,
        id: String,
        title: String,
    },
    /// Delete a scenario
    Delete {
        rule: PathBuf,
        id: String,
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum CsvCommands {
    /// Print an empty CSV with one column per input and result output
    Template {
        rule: PathBuf,
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Export saved scenarios as CSV
    Export {
        rule: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Evaluate every CSV row against the rule
    Test {
        rule: PathBuf,
        csv: PathBuf,
        /// Write the results as CSV to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Save every CSV row as a scenario
    Import {
        rule: PathBuf,
        csv: PathBuf,
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_json, cli.quiet);

    let config = match BrmsConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&msg, cli.output, cli.quiet);
            process::exit(1);
        }
    };

    tracing::debug!(api = %config.api.url, rule_dir = %config.rules.rule_dir, offline = cli.offline, "configuration loaded");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to start runtime: {}", e), cli.output, cli.quiet);
            process::exit(1);
        }
    };

    let ctx = Ctx::new(config, cli.offline, cli.output, cli.quiet);
    runtime.block_on(run(cli.command, &ctx));
}

async fn run(command: Commands, ctx: &Ctx) {
    match command {
        Commands::Simulate {
            rule,
            context,
            expected,
            save,
            yes,
        } => {
            commands::simulate::cmd_simulate(
                ctx,
                &rule,
                &context,
                expected.as_deref(),
                save.as_deref(),
                yes,
            )
            .await;
        }
        Commands::Scenarios { command } => match command {
            ScenarioCommands::List { rule, page } => {
                commands::scenarios::cmd_list(ctx, &rule, page).await;
            }
            ScenarioCommands::Run {
                rule,
                errors_only,
                sort,
                report,
            } => {
                commands::scenarios::cmd_run(ctx, &rule, errors_only, sort, report.as_deref())
                    .await;
            }
            ScenarioCommands::Rename { rule, id, title } => {
                commands::scenarios::cmd_rename(ctx, &rule, &id, &title).await;
            }
            ScenarioCommands::Delete { rule, id, yes } => {
                commands::scenarios::cmd_delete(ctx, &rule, &id, yes).await;
            }
        },
        Commands::Check { rule, rule_map } => {
            commands::check::cmd_check(ctx, &rule, rule_map.as_deref()).await;
        }
        Commands::Csv { command } => match command {
            CsvCommands::Template { rule, out } => {
                commands::csv::cmd_template(ctx, &rule, out.as_deref()).await;
            }
            CsvCommands::Export { rule, out } => {
                commands::csv::cmd_export(ctx, &rule, out.as_deref()).await;
            }
            CsvCommands::Test { rule, csv, report } => {
                commands::csv::cmd_test(ctx, &rule, &csv, report.as_deref()).await;
            }
            CsvCommands::Import { rule, csv, yes } => {
                commands::csv::cmd_import(ctx, &rule, &csv, yes).await;
            }
        },
        Commands::Fields { query } => {
            commands::fields::cmd_fields(ctx, &query).await;
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
