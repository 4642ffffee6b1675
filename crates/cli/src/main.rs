mod bundle;
mod serve;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use vl_analyze::{negotiate, TabProfile};
use vl_core::TenantContext;
use vl_recon::{compare, load_benchmark_csv, CompareConfig};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Vantage Ledger calculation toolchain.
#[derive(Parser)]
#[command(name = "vl", version, about = "Vantage Ledger calculation toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a calculation over a bundle of plan, entities and rows
    Run {
        /// Path to the bundle JSON file
        bundle: PathBuf,
        /// Period id to calculate (defaults to the bundle's period_id)
        #[arg(long)]
        period: Option<String>,
        /// Rule set id to apply (defaults to the bundle's rule_set_id)
        #[arg(long)]
        rule_set: Option<String>,
    },

    /// Classify uploaded tab profiles into content units
    Analyze {
        /// Path to the tab-profiles JSON file
        file: PathBuf,
    },

    /// Compare calculation results against a benchmark CSV
    Compare {
        /// Path to the calculation results JSON file
        results: PathBuf,
        /// Path to the benchmark CSV file
        benchmark: PathBuf,
        /// Path to the column-mapping JSON file
        #[arg(long)]
        mapping: PathBuf,
    },

    /// Start the Vantage Ledger HTTP API server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
        /// Bundle JSON files to pre-load into the in-memory store
        #[arg()]
        bundles: Vec<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            bundle,
            period,
            rule_set,
        } => {
            cmd_run(
                &bundle,
                period.as_deref(),
                rule_set.as_deref(),
                cli.output,
                cli.quiet,
            );
        }
        Commands::Analyze { file } => {
            cmd_analyze(&file, cli.output);
        }
        Commands::Compare {
            results,
            benchmark,
            mapping,
        } => {
            cmd_compare(&results, &benchmark, &mapping, cli.output, cli.quiet);
        }
        Commands::Serve { port, bundles } => {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("error: failed to create tokio runtime: {}", e);
                    process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(serve::start_server(port, bundles)) {
                eprintln!("Server error: {}", e);
                process::exit(1);
            }
        }
    }
}

fn cmd_run(
    bundle_path: &Path,
    period: Option<&str>,
    rule_set: Option<&str>,
    output: OutputFormat,
    quiet: bool,
) {
    let bundle = match bundle::load_bundle(bundle_path) {
        Ok(b) => b,
        Err(e) => {
            report_error(&e, output, quiet);
            process::exit(1);
        }
    };

    let period_id = period
        .map(str::to_string)
        .or_else(|| bundle.period_id.clone());
    let rule_set_id = rule_set
        .map(str::to_string)
        .or_else(|| bundle.rule_set_id.clone());
    let (Some(period_id), Some(rule_set_id)) = (period_id, rule_set_id) else {
        report_error(
            "bundle names no period_id/rule_set_id and none were passed via --period/--rule-set",
            output,
            quiet,
        );
        process::exit(1);
    };

    let ctx = TenantContext::new(bundle.tenant_id.clone());
    let store = bundle.into_store();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to create tokio runtime: {}", e), output, quiet);
            process::exit(1);
        }
    };
    match rt.block_on(vl_eval::run(&store, &ctx, &period_id, &rule_set_id)) {
        Ok(outcome) => match output {
            OutputFormat::Json => print_json(&outcome),
            OutputFormat::Text => {
                if !quiet {
                    println!(
                        "batch {}: {} entities, {} results, total payout {}",
                        outcome.batch_id,
                        outcome.entity_count,
                        outcome.result_count,
                        outcome.total_payout
                    );
                    for line in &outcome.log {
                        println!("  note: {}", line);
                    }
                }
                for result in &outcome.results {
                    println!("{}\t{}", result.external_id, result.total_payout);
                }
            }
        },
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    }
}

fn cmd_analyze(file: &Path, output: OutputFormat) {
    let profiles: Vec<TabProfile> = match read_json(file) {
        Ok(p) => p,
        Err(e) => {
            report_error(&e, output, false);
            process::exit(1);
        }
    };
    let proposal = negotiate(&profiles);
    match output {
        OutputFormat::Json => print_json(&proposal),
        OutputFormat::Text => {
            for unit in &proposal.content_units {
                println!(
                    "{}\t{}\t{:.2}\t{:?}",
                    unit.id,
                    unit.domain.slug(),
                    unit.confidence,
                    unit.claim
                );
            }
            println!(
                "overall confidence {:.2}{}",
                proposal.overall_confidence,
                if proposal.requires_human_review {
                    " (needs human review)"
                } else {
                    ""
                }
            );
        }
    }
}

fn cmd_compare(
    results_path: &Path,
    benchmark: &Path,
    mapping: &Path,
    output: OutputFormat,
    quiet: bool,
) {
    let results: Vec<vl_storage::CalculationResultRecord> = match read_json(results_path) {
        Ok(r) => r,
        Err(e) => {
            report_error(&e, output, quiet);
            process::exit(1);
        }
    };
    let config: CompareConfig = match read_json(mapping) {
        Ok(c) => c,
        Err(e) => {
            report_error(&e, output, quiet);
            process::exit(1);
        }
    };
    let rows = match load_benchmark_csv(benchmark, &config) {
        Ok(rows) => rows,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    let comparison = compare(&results, &rows, &config);
    match output {
        OutputFormat::Json => print_json(&comparison),
        OutputFormat::Text => {
            let s = &comparison.summary;
            if !quiet {
                println!(
                    "exact {} tolerance {} false_green {} mismatch {} file_only {} vl_only {}",
                    s.exact, s.tolerance, s.false_green, s.mismatch, s.file_only, s.vl_only
                );
            }
            for finding in &comparison.findings {
                println!(
                    "{}\t{}\tfile={:?}\tvl={:?}",
                    finding.finding_type, finding.external_id, finding.file_total, finding.vl_total
                );
            }
        }
    }
    // Findings mean the reconciliation gate did not pass.
    if !comparison.findings.is_empty() {
        process::exit(2);
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading file '{}': {}", path.display(), e))?;
    serde_json::from_str(&data)
        .map_err(|e| format!("error parsing JSON in '{}': {}", path.display(), e))
}

fn print_json<T: serde::Serialize>(value: &T) {
    let pretty = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("serialization error: {}", e));
    println!("{}", pretty);
}

fn report_error(message: &str, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": message }));
        }
        OutputFormat::Text => {
            if !quiet {
                eprintln!("error: {}", message);
            }
        }
    }
}
