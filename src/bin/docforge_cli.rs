//! DocForge CLI - Inspect a project's composed configuration
//!
//! Commands: check, rule-files, priorities, plugins
//! Outputs JSON to stdout
//! Returns non-zero on composition failure

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use docforge_core::{
    registry::PluginCatalog, BuildSession, ComposeError, ConfigComposer, PipelineError,
};

#[derive(Parser)]
#[command(name = "docforge-cli")]
#[command(about = "DocForge CLI - Document Build Composer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short = 'f', long = "configfile", default_value = "docforge.yml", global = true)]
    configfile: PathBuf,

    /// Directory holding the installed rule files and themes
    #[arg(long, default_value = docforge_core::registry::DEFAULT_DATA_DIR, global = true)]
    data_dir: PathBuf,

    /// Print verbose output to the console
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose and validate the configuration
    Check,

    /// List the rule files handed to the build engine
    RuleFiles,

    /// Show priorities and ruleorder directives for the given rules
    Priorities {
        /// Rule names
        #[arg(required = true)]
        rules: Vec<String>,
    },

    /// List loadable and active plugin identifiers
    Plugins,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("docforge_core=debug")
    } else {
        EnvFilter::new("docforge_core=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn print_json(value: &serde_json::Value) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn failure(error: &PipelineError) -> ExitCode {
    let violations = match error {
        PipelineError::Compose(e) => e.violations().to_vec(),
        _ => Vec::new(),
    };
    let output = serde_json::json!({
        "success": false,
        "error": error.to_string(),
        "violations": violations,
    });
    println!("{output}");
    match error {
        PipelineError::Compose(ComposeError::Io { .. }) => ExitCode::FAILURE,
        _ => ExitCode::from(2),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let composer = ConfigComposer::new(PluginCatalog::new(&cli.data_dir));
    let session = match BuildSession::from_file(&cli.configfile, &composer) {
        Ok(session) => session,
        Err(e) => return failure(&e),
    };

    match cli.command {
        Commands::Check => print_json(&serde_json::json!({
            "success": true,
            "plan": session.plan(),
            "config": session.config(),
        })),

        Commands::RuleFiles => print_json(&serde_json::json!(session.plan().rule_files)),

        Commands::Priorities { rules } => {
            let resolver = session.resolver();
            let priorities: serde_json::Map<String, serde_json::Value> = rules
                .iter()
                .map(|r| (r.clone(), serde_json::json!(resolver.priority(r))))
                .collect();
            print_json(&serde_json::json!({
                "priorities": priorities,
                "ruleorder": resolver.directives(&rules),
            }))
        }

        Commands::Plugins => print_json(&serde_json::json!({
            "available": composer.catalog().identifiers().collect::<Vec<_>>(),
            "active": session.plan().plugins,
        })),
    }
}
