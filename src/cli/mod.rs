//! fairbalance CLI Module
//!
//! Command-line interface for subgroup balancing, situation testing and
//! fairness reporting.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::balance::{BalanceAction, CombinationSpace, SubgroupBalancer};
use crate::dataset::{load_dataset, write_dataset, Dataset};
use crate::pipeline::{FairBalancePipeline, PipelineConfig, PipelineReport, StageMetrics};
use crate::preprocessing::MinMaxScaler;
use crate::situation::RemovalPolicy;
use crate::synthetic::SynthesisStrategy;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(&format!("{:<22}", key)), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "fairbalance")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Subgroup rebalancing with situation testing and fairness metrics")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Input CSV file
    #[arg(short, long)]
    pub data: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Label column name
    #[arg(long)]
    pub label: Option<String>,

    /// Comma-separated protected attributes
    #[arg(long, value_delimiter = ',')]
    pub protected: Option<Vec<String>>,

    /// Disable min-max scaling
    #[arg(long)]
    pub no_scale: bool,
}

/// Balancing options
#[derive(Args, Debug, Clone)]
pub struct BalanceArgs {
    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of nearest neighbors
    #[arg(short, long)]
    pub k: Option<usize>,

    /// Strategy used to fill classes up to the target (smote, crossover)
    #[arg(long)]
    pub generation_strategy: Option<String>,

    /// Keep failing subgroups unchanged instead of aborting
    #[arg(long)]
    pub skip_failed: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Balance, situation-test and report fairness before and after
    Run {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        balance: BalanceArgs,

        /// Output file for the final dataset
        #[arg(short, long)]
        output: PathBuf,

        /// Output file for the JSON report
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Keep inconsistent records and only report them
        #[arg(long)]
        flag_only: bool,
    },

    /// Balance subgroups only
    Balance {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        balance: BalanceArgs,

        /// Output file for the balanced dataset
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show subgroup counts, the target and the planned actions
    Info {
        #[command(flatten)]
        data: DataArgs,
    },
}

// ─── Configuration ─────────────────────────────────────────────────────────────

fn parse_strategy(name: &str) -> anyhow::Result<SynthesisStrategy> {
    match name {
        "smote" => Ok(SynthesisStrategy::Smote),
        "crossover" => Ok(SynthesisStrategy::Crossover),
        _ => anyhow::bail!("Invalid synthesis strategy: {}", name),
    }
}

/// Config file (or defaults) with command-line overrides applied
pub fn resolve_config(data: &DataArgs, balance: Option<&BalanceArgs>) -> anyhow::Result<PipelineConfig> {
    let mut config = match &data.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(label) = &data.label {
        config.label_column = label.clone();
    }
    if let Some(protected) = &data.protected {
        config.protected_attributes = protected.clone();
    }
    if data.no_scale {
        config.scale_features = false;
    }
    if let Some(args) = balance {
        if let Some(seed) = args.seed {
            config.seed = Some(seed);
        }
        if let Some(k) = args.k {
            config.k_neighbors = k;
        }
        if let Some(strategy) = &args.generation_strategy {
            config.generation_strategy = parse_strategy(strategy)?;
        }
        if args.skip_failed {
            config.skip_failed_subgroups = true;
        }
    }

    config.validate()?;
    Ok(config)
}

fn load(path: &Path, config: &PipelineConfig) -> anyhow::Result<Dataset> {
    step_run("Loading data");
    let start = Instant::now();
    let dataset = load_dataset(path, &config.label_column, None)?;
    step_done(&format!(
        "{} rows × {} features in {:?}",
        dataset.len(),
        dataset.schema().n_features(),
        start.elapsed()
    ));
    Ok(dataset)
}

fn save(dataset: &Dataset, path: &Path) -> anyhow::Result<()> {
    step_run(&format!("Saving → {}", path.display()));
    write_dataset(dataset, path)?;
    step_done(&format!("{} rows", dataset.len()));
    Ok(())
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(
    data: &DataArgs,
    balance: &BalanceArgs,
    output: &Path,
    report_path: Option<&Path>,
    flag_only: bool,
) -> anyhow::Result<()> {
    section("Run");

    let mut config = resolve_config(data, Some(balance))?;
    if flag_only {
        config.removal_policy = RemovalPolicy::Flag;
    }
    let dataset = load(&data.data, &config)?;

    step_run("Balancing and situation testing");
    let start = Instant::now();
    let pipeline = FairBalancePipeline::new(config);
    let result = pipeline.run(&dataset)?;
    step_done(&format!("{:?}", start.elapsed()));

    save(&result.dataset, output)?;
    if let Some(path) = report_path {
        step_run(&format!("Writing report → {}", path.display()));
        result.report.save(path)?;
        step_done("");
    }

    print_summary(&result.report);
    Ok(())
}

pub fn cmd_balance(data: &DataArgs, balance: &BalanceArgs, output: &Path) -> anyhow::Result<()> {
    section("Balance");

    let config = resolve_config(data, Some(balance))?;
    let dataset = load(&data.data, &config)?;
    let dataset = if config.scale_features {
        MinMaxScaler::new().fit_transform(&dataset)?
    } else {
        dataset
    };

    step_run("Balancing subgroups");
    let start = Instant::now();
    let balancer = SubgroupBalancer::new(config.balancer_config());
    let (balanced, report) = balancer.balance_with_report(&dataset, &config.protected_attributes)?;
    step_done(&format!("{:?}", start.elapsed()));

    save(&balanced, output)?;

    println!();
    println!("  {:<22} {}", muted("Target"), report.target.to_string().white().bold());
    println!("  {:<22} {}", muted("Synthesized"), report.total_synthesized().to_string().white());
    println!("  {:<22} {}", muted("Removed"), report.total_removed().to_string().white());
    for skipped in report.skipped() {
        println!(
            "  {} {} {}",
            "skipped".yellow(),
            skipped.key.white(),
            dim(skipped.skipped.as_deref().unwrap_or(""))
        );
    }
    println!();
    Ok(())
}

pub fn cmd_info(data: &DataArgs) -> anyhow::Result<()> {
    section("Info");

    let config = resolve_config(data, None)?;
    let dataset = load(&data.data, &config)?;
    let dataset = if config.scale_features {
        MinMaxScaler::new().fit_transform(&dataset)?
    } else {
        dataset
    };

    let space = CombinationSpace::from_dataset(&dataset, &config.protected_attributes)?;
    let plan = SubgroupBalancer::new(config.balancer_config()).plan(&dataset, &space)?;

    println!();
    println!(
        "  {:<40} {:>6} {:>6}  {}",
        muted("Subgroup"),
        muted("pos"),
        muted("neg"),
        muted("action")
    );
    println!("  {}", dim(&"─".repeat(70)));
    for planned in &plan.subgroups {
        let action = planned.action.to_string();
        let action = match planned.action {
            BalanceAction::Empty | BalanceAction::Retain => dim(&action),
            _ => accent(&action),
        };
        println!(
            "  {:<40} {:>6} {:>6}  {}",
            planned.subgroup.key,
            planned.subgroup.positives,
            planned.subgroup.negatives,
            action
        );
    }
    println!("  {}", dim(&"─".repeat(70)));
    println!("  {:<22} {}", muted("Target"), plan.target.to_string().white().bold());
    println!("  {:<22} {}", muted("Combinations"), space.len().to_string().white());
    if !plan.unassigned.is_empty() {
        println!("  {:<22} {}", muted("Unassigned rows"), plan.unassigned.len().to_string().yellow());
    }
    println!();
    Ok(())
}

fn stage_lines(label: &str, metrics: &StageMetrics) {
    for group in &metrics.fairness {
        line_box(&kv(
            &format!("{} {}", label, group.attribute),
            &format!(
                "EOD {:+.4}  AOD {:+.4}",
                group.equal_opportunity_difference, group.average_odds_difference
            ),
        ));
    }
    if let Some(audit) = &metrics.audit {
        line_box(&kv(
            &format!("{} model", label),
            &format!(
                "acc {:.4}  f1 {:.4}  awi {:.4}",
                audit.performance.accuracy, audit.performance.f1, audit.inconsistency_rate
            ),
        ));
    }
}

fn print_summary(report: &PipelineReport) {
    println!();
    line_box_top();
    line_box_center(&"fairbalance summary".white().bold().to_string());
    line_box_sep();
    line_box(&kv("Rows in / balanced / out", &format!(
        "{} / {} / {}",
        report.input_rows, report.balanced_rows, report.final_rows
    )));
    line_box(&kv("Subgroup target", &report.balance.target.to_string()));
    line_box(&kv("Synthesized / removed", &format!(
        "{} / {}",
        report.balance.total_synthesized(),
        report.balance.total_removed()
    )));
    line_box(&kv("Inconsistent", &format!(
        "{} ({:.2}%)",
        report.situation.inconsistent,
        report.situation.rate * 100.0
    )));
    line_box_sep();
    stage_lines("before", &report.before);
    stage_lines("after", &report.after);
    line_box_bottom();
    println!();
}
