//! Command-line interface for `ArchesETL`, exporting geospatial datasets to Arches
//! resource import files.
//!
//! This binary is a thin façade over [`archesetl_core`]: it parses arguments with
//! [`clap`], configures [`tracing`] logging and delegates to the core operations.
//!
//! # Available Commands
//!
//! - `export` - Write datasets to an `.arches` / `.relations` pair
//! - `init` - Create a starter conflig for a dataset
//! - `add-group` - Append a mapping group to a conflig
//! - `drivers` - List the dataset formats and their support status

mod display;

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{Level, info, warn};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use archesetl_core::ArchesEtlError;
use archesetl_core::authority::AuthorityPolicyKind;
use archesetl_core::drivers::get_drivers;
use archesetl_core::operations;
use archesetl_core::relations::DEFAULT_RELATION_TYPE;
use archesetl_core::types::{DatasetSpec, ExportRequest};
use archesetl_core::utils::{parse_mapping_entry, per_dataset, sibling_config_path};

#[derive(Parser)]
#[command(
    name = "archesetl",
    version,
    about = "Export geospatial datasets to Arches resource files",
    long_about = "ArchesETL turns point, line, polygon and table datasets into pipe-delimited\n\
                  .arches attribute files and .relations files, driven by a JSON conflig."
)]
/// Command-line arguments and options for the `ArchesETL` CLI.
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug (DEBUG level) logging output with detailed diagnostics.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the `ArchesETL` CLI.
#[derive(Subcommand)]
enum Commands {
    /// Exports datasets into one `.arches` file and its `.relations` companion.
    ///
    /// `--config` and `--relate-field` may be given once for all datasets or
    /// once per dataset. Without `--config`, each dataset uses the conflig
    /// next to it (`<name>.conflig`).
    Export {
        /// Datasets to export, in order.
        #[arg(value_name = "DATASET", required = true)]
        datasets: Vec<PathBuf>,

        /// Conflig for the datasets.
        #[arg(short, long = "config", value_name = "CONFLIG")]
        configs: Vec<PathBuf>,

        /// Field whose shared values relate resources to each other.
        #[arg(short, long = "relate-field", value_name = "FIELD")]
        relate_fields: Vec<String>,

        /// Directory holding authority documents. Values are not reconciled without it.
        #[arg(short, long, value_name = "DIR")]
        authority_dir: Option<PathBuf>,

        /// How authority-backed entities are recognized: `index` (entities listed in
        /// `ENTITY_TYPE_X_ADOC.csv`) or `suffix` (entities whose code contains `.E55`).
        #[arg(long, value_name = "POLICY", default_value_t = AuthorityPolicyKind::Index)]
        authority_policy: AuthorityPolicyKind,

        /// Directory for `<first dataset>.arches` and `.relations`.
        #[arg(short, long, value_name = "DIR", conflicts_with = "output")]
        out_dir: Option<PathBuf>,

        /// Explicit `.arches` path.
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Append to an existing export, continuing its ids.
        #[arg(long)]
        append: bool,

        /// Relation type written to `.relations` rows.
        #[arg(long, value_name = "TYPE", default_value = DEFAULT_RELATION_TYPE)]
        relation_type: String,

        /// Driver used to read the datasets (e.g., "`CSV`", "`GeoJSON`"); inferred from the extension by default.
        #[arg(long, value_name = "DRIVER")]
        driver: Option<String>,

        /// Open the `.arches` file in `$VISUAL` / `$EDITOR` when done.
        #[arg(long)]
        open: bool,
    },

    /// Creates a starter conflig for a dataset and lists its fields.
    Init {
        /// Dataset the conflig is for.
        #[arg(value_name = "DATASET")]
        dataset: PathBuf,

        /// Resource type written to every row (e.g., `HERITAGE_RESOURCE.E18`).
        #[arg(short = 't', long, value_name = "TYPE")]
        resource_type: String,

        /// Directory for the conflig; next to the dataset by default.
        #[arg(short, long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Driver used to read the dataset.
        #[arg(long, value_name = "DRIVER")]
        driver: Option<String>,

        /// Replace an existing conflig.
        #[arg(long)]
        force: bool,
    },

    /// Appends a mapping group to a conflig.
    AddGroup {
        /// Conflig to extend.
        #[arg(value_name = "CONFLIG")]
        config: PathBuf,

        /// Field mapping of the new group.
        #[arg(short, long = "entry", value_name = "FIELD=ENTITY", required = true)]
        entries: Vec<String>,
    },

    /// Lists all dataset drivers and their support status.
    Drivers,
}

/// Entry point for the `ArchesETL` command-line interface.
///
/// Parses arguments, configures logging and dispatches to the command handler.
/// Failures are reported with a recovery suggestion and a non-zero exit code.
fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(cli.verbose, cli.debug) {
        eprintln!("Error: failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        },
    }
}

fn init_logging(verbose: bool, debug: bool) -> Result<()> {
    let log_level = if debug {
        Level::DEBUG
    } else if verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // Bridge logs from the `log` crate to the `tracing` ecosystem.
    LogTracer::init()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<ArchesEtlError>() {
        Some(etl) => {
            eprintln!("Error: {}", etl.user_message());
            if let Some(suggestion) = etl.recovery_suggestion() {
                eprintln!("\nSuggestion: {suggestion}");
            }
        },
        None => eprintln!("Error: {err:#}"),
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Export {
            datasets,
            configs,
            relate_fields,
            authority_dir,
            authority_policy,
            out_dir,
            output,
            append,
            relation_type,
            driver,
            open,
        } => {
            let specs = dataset_specs(&datasets, &configs, &relate_fields)?;
            let mut request = ExportRequest::new(specs)
                .with_authority_policy(authority_policy)
                .with_append(append)
                .with_relation_type(relation_type);
            if let Some(dir) = authority_dir {
                request = request.with_authority_dir(dir);
            }
            if let Some(dir) = out_dir {
                request = request.with_out_dir(dir);
            }
            if let Some(path) = output {
                request = request.with_output(path);
            }
            if let Some(name) = driver {
                request = request.with_driver(name);
            }
            handle_export(&request, open)
        },
        Commands::Init {
            dataset,
            resource_type,
            out_dir,
            driver,
            force,
        } => handle_init(&dataset, &resource_type, out_dir.as_deref(), driver.as_deref(), force),
        Commands::AddGroup { config, entries } => handle_add_group(&config, &entries),
        Commands::Drivers => {
            handle_drivers();
            Ok(())
        },
    }
}

/// Pairs each dataset with its conflig and join field.
fn dataset_specs(
    datasets: &[PathBuf],
    configs: &[PathBuf],
    relate_fields: &[String],
) -> Result<Vec<DatasetSpec>> {
    let configs = per_dataset("--config", configs, datasets.len())?;
    let relate_fields = per_dataset("--relate-field", relate_fields, datasets.len())?;

    Ok(datasets
        .iter()
        .zip(configs)
        .zip(relate_fields)
        .map(|((dataset, config), relate_field)| {
            let config = config.unwrap_or_else(|| sibling_config_path(dataset));
            let spec = DatasetSpec::new(dataset, config);
            match relate_field {
                Some(field) => spec.with_relate_field(field),
                None => spec,
            }
        })
        .collect())
}

fn handle_export(request: &ExportRequest, open: bool) -> Result<()> {
    info!("Exporting {} dataset(s)", request.datasets.len());
    let summary = operations::export(request)?;
    display::display_export_summary(&summary);

    if open {
        open_in_editor(&summary.arches_path);
    }
    Ok(())
}

/// Hands `path` to `$VISUAL` or `$EDITOR`; without either, only logs the path.
fn open_in_editor(path: &Path) {
    let editor = std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .ok()
        .filter(|e| !e.trim().is_empty());

    let Some(editor) = editor else {
        warn!("Neither VISUAL nor EDITOR is set; open {} manually", path.display());
        return;
    };

    match Command::new(&editor).arg(path).status() {
        Ok(status) if status.success() => {},
        Ok(status) => warn!("{editor} exited with {status}"),
        Err(err) => warn!("Could not start {editor}: {err}"),
    }
}

fn handle_init(
    dataset: &Path,
    resource_type: &str,
    out_dir: Option<&Path>,
    driver: Option<&str>,
    force: bool,
) -> Result<()> {
    info!("Creating conflig for {}", dataset.display());
    let template = operations::create_config_template(dataset, out_dir, resource_type, driver, force)?;
    display::display_template(&template);
    Ok(())
}

fn handle_add_group(config: &Path, entries: &[String]) -> Result<()> {
    let entries = entries
        .iter()
        .map(|entry| parse_mapping_entry(entry))
        .collect::<archesetl_core::Result<Vec<_>>>()?;
    let group = operations::add_group(config, &entries)?;
    display::display_group(config, &group);
    Ok(())
}

/// Handles the `drivers` subcommand by displaying the full driver registry.
fn handle_drivers() {
    display::display_drivers(&get_drivers());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_export_arguments() {
        let cli = Cli::try_parse_from([
            "archesetl",
            "export",
            "barns.csv",
            "mills.csv",
            "-c",
            "shared.conflig",
            "--authority-policy",
            "suffix",
            "--append",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Export {
                datasets,
                configs,
                authority_policy,
                append,
                relation_type,
                ..
            } => {
                assert_eq!(datasets.len(), 2);
                assert_eq!(configs, vec![PathBuf::from("shared.conflig")]);
                assert_eq!(authority_policy, AuthorityPolicyKind::Suffix);
                assert!(append);
                assert_eq!(relation_type, DEFAULT_RELATION_TYPE);
            },
            _ => panic!("Expected export command"),
        }
    }

    #[test]
    fn test_out_dir_conflicts_with_output() {
        let result = Cli::try_parse_from([
            "archesetl",
            "export",
            "barns.csv",
            "--out-dir",
            "out",
            "--output",
            "all.arches",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_dataset_specs_defaults_to_sibling_conflig() -> Result<()> {
        let specs = dataset_specs(
            &[PathBuf::from("data/barns.csv"), PathBuf::from("data/mills.geojson")],
            &[],
            &["SITE".to_string()],
        )?;

        assert_eq!(specs[0].config, PathBuf::from("data/barns.conflig"));
        assert_eq!(specs[1].config, PathBuf::from("data/mills.conflig"));
        assert_eq!(specs[1].relate_field.as_deref(), Some("SITE"));
        Ok(())
    }

    #[test]
    fn test_dataset_specs_rejects_mismatched_counts() {
        let result = dataset_specs(
            &[PathBuf::from("a.csv"), PathBuf::from("b.csv"), PathBuf::from("c.csv")],
            &[PathBuf::from("a.conflig"), PathBuf::from("b.conflig")],
            &[],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_authority_policy_defaults_and_rejects_unknown() {
        let cli = Cli::try_parse_from(["archesetl", "export", "barns.csv"]).unwrap();
        match cli.command {
            Commands::Export {
                authority_policy, ..
            } => assert_eq!(authority_policy, AuthorityPolicyKind::Index),
            _ => panic!("Expected export command"),
        }

        let result = Cli::try_parse_from([
            "archesetl",
            "export",
            "barns.csv",
            "--authority-policy",
            "guess",
        ]);
        let err = result.err().unwrap().to_string();
        assert!(err.contains("expected 'index' or 'suffix'"));
    }
}
