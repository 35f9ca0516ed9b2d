use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Strata workspace automation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bench suite once per global allocator and compare
    Bench {
        /// Run quickly (lower sample size/time)
        #[arg(long, default_value_t = false)]
        quick: bool,

        /// Generate report only (skip running benchmarks)
        #[arg(long, default_value_t = false)]
        report_only: bool,

        /// Restrict the run to these allocator features
        #[arg(long = "alloc", value_name = "FEATURE")]
        allocs: Vec<String>,
    },
}

const ALLOCATORS: &[&str] = &["alloc-system", "alloc-mimalloc", "alloc-snmalloc", "alloc-jemalloc"];

/// workload -> baseline -> throughput (ops/s)
type Results = BTreeMap<String, BTreeMap<String, f64>>;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Bench {
            quick,
            report_only,
            allocs,
        } => {
            let selected = select_allocators(&allocs)?;
            if !report_only {
                run_benchmarks(&selected, quick)?;
            }
            generate_report(&selected)?;
        }
    }

    Ok(())
}

fn select_allocators(requested: &[String]) -> Result<Vec<&'static str>> {
    if requested.is_empty() {
        return Ok(ALLOCATORS.to_vec());
    }
    requested
        .iter()
        .map(|name| {
            ALLOCATORS
                .iter()
                .copied()
                .find(|known| *known == name.as_str() || baseline_name(known) == name.as_str())
                .with_context(|| format!("unknown allocator `{name}`; expected one of {ALLOCATORS:?}"))
        })
        .collect()
}

fn run_benchmarks(allocs: &[&str], quick: bool) -> Result<()> {
    println!("Compiling benchmarks...");
    let status = Command::new("cargo")
        .args(["build", "--bench", "suite", "--release"])
        .status()?;
    if !status.success() {
        bail!("failed to compile benchmarks");
    }

    for alloc in allocs {
        println!("\n>>> Benchmarking with feature: {alloc}");
        let start = Instant::now();

        let mut cmd = Command::new("cargo");
        cmd.env("CARGO_INCREMENTAL", "0")
            .args(["bench", "--bench", "suite", "--no-default-features", "--features", *alloc])
            .arg("--")
            .arg("--save-baseline")
            .arg(baseline_name(alloc));

        if quick {
            cmd.args(["--measurement-time", "0.1", "--noplot", "--sample-size", "10"]);
        }

        let status = cmd.status().with_context(|| format!("failed to run bench for {alloc}"))?;
        if status.success() {
            println!("Finished {alloc} in {:.2?}", start.elapsed());
        } else {
            eprintln!("Warning: benchmark failed for {alloc}");
        }
    }

    Ok(())
}

fn baseline_name(alloc: &str) -> &str {
    alloc.trim_start_matches("alloc-")
}

fn generate_report(allocs: &[&str]) -> Result<()> {
    println!("\n>>> Generating Report...");
    let criterion_dir = Path::new("target/criterion");
    if !criterion_dir.exists() {
        eprintln!("No criterion output found at {}", criterion_dir.display());
        return Ok(());
    }

    let mut results = Results::new();
    collect_results(criterion_dir, &mut results)?;

    let report_path = Path::new("benchmark_results/report.md");
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(report_path, render_report(&results, allocs)?)?;
    fs::write(
        report_path.with_extension("json"),
        serde_json::to_string_pretty(&results)?,
    )?;

    println!("Report written to {}", report_path.display());
    Ok(())
}

fn render_report(results: &Results, allocs: &[&str]) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "# Comparative Benchmark Report\n")?;

    write!(out, "| Workload |")?;
    for alloc in allocs {
        write!(out, " {} (ops/s) | vs system |", baseline_name(alloc))?;
    }
    writeln!(out)?;
    write!(out, "|---|")?;
    for _ in allocs {
        write!(out, "---|---|")?;
    }
    writeln!(out)?;

    for (workload, by_alloc) in results {
        write!(out, "| {workload} |")?;
        let system = by_alloc.get("system").copied().unwrap_or(0.0);
        for alloc in allocs {
            match by_alloc.get(baseline_name(alloc)) {
                Some(&ops) => {
                    let rel = if system > 0.0 { ops / system } else { 0.0 };
                    write!(out, " {} | **{rel:.2}x** |", format_ops(ops))?;
                }
                None => write!(out, " N/A | - |")?,
            }
        }
        writeln!(out)?;
    }
    Ok(out)
}

fn format_ops(ops: f64) -> String {
    if ops > 1_000_000.0 {
        format!("{:.2}M", ops / 1_000_000.0)
    } else if ops > 1_000.0 {
        format!("{:.2}K", ops / 1_000.0)
    } else {
        format!("{ops:.0}")
    }
}

/// Walks `target/criterion`, reading `<group>/<bench>/<baseline>/estimates.json`.
fn collect_results(dir: &Path, results: &mut Results) -> Result<()> {
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_results(&path, results)?;
            continue;
        }
        if path.file_name().and_then(|s| s.to_str()) != Some("estimates.json") {
            continue;
        }
        let Some(baseline_dir) = path.parent() else { continue };
        let Some(workload_dir) = baseline_dir.parent() else { continue };
        let (Some(baseline), Some(workload)) = (file_name(baseline_dir), workload_label(workload_dir)) else {
            continue;
        };
        if baseline == "report" || baseline == "new" || baseline == "base" || workload.contains("report") {
            continue;
        }

        let elements = read_json(&workload_dir.join("benchmark.json"))
            .ok()
            .and_then(|json| json.get("throughput")?.get("Elements")?.as_f64());
        let estimates = read_json(&path)?;
        let Some(time_ns) = estimates
            .get("mean")
            .and_then(|m| m.get("point_estimate"))
            .and_then(serde_json::Value::as_f64)
            .filter(|t| *t > 0.0)
        else {
            continue;
        };

        let metric = elements.unwrap_or(1.0) * 1e9 / time_ns;
        results.entry(workload).or_default().insert(baseline, metric);
    }
    Ok(())
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()?.to_str().map(str::to_owned)
}

/// `group/bench` so that identically named functions in different groups
/// stay apart.
fn workload_label(bench_dir: &Path) -> Option<String> {
    let bench = file_name(bench_dir)?;
    match bench_dir.parent().and_then(file_name) {
        Some(group) if group != "criterion" => Some(format!("{group}/{bench}")),
        _ => Some(bench),
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}
