use {
    anyhow::Result,
    clap::Subcommand,
    std::path::{Path, PathBuf},
};

use chatrelay_config::{
    RelayConfig, find_config_file,
    validate::{self, Severity, ValidationResult},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the effective configuration (file, env overrides, defaults) as TOML.
    Show,
}

pub fn handle_config(action: ConfigAction, config_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => check(config_path, verbose),
        ConfigAction::Show => {
            let config = crate::load_config(config_path)?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        },
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(config_path: Option<&Path>, verbose: bool) -> Result<()> {
    let path: Option<PathBuf> = config_path.map(Path::to_path_buf).or_else(find_config_file);
    let result = match path {
        Some(ref path) => validate::validate_file(path),
        None => validate::validate(&RelayConfig::default()),
    };

    if let Some(ref path) = result.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults.\n");
    }

    print_diagnostics(&result, verbose);

    if result.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_diagnostics(result: &ValidationResult, verbose: bool) {
    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
            Severity::Info => (CYAN, "info"),
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }
}
