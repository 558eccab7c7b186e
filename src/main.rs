// File: main.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use log::{warn, LevelFilter};
use simple_logger::SimpleLogger;

use wafprobe::cli::Cli;
use wafprobe::config::ScanConfig;
use wafprobe::orchestrator::{Orchestrator, RunOutput, RunStatus};
use wafprobe::report::{split_samples, ReportFormat, ReportGenerator};
use wafprobe::samples::{list_samples, SampleClass};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(&cli.log_level);

    if let Err(err) = run(cli).await {
        eprintln!("{} {err}", "✗".red().bold());
        std::process::exit(1);
    }
}

fn init_logger(level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Warn,
    };
    SimpleLogger::new().with_level(level).init().ok();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ScanConfig::from_cli(&cli)?;
    let samples = list_samples(&cli.directory)?;

    let black_count = samples
        .iter()
        .filter(|s| s.class == SampleClass::Black)
        .count();
    let white_count = samples.len() - black_count;

    println!(
        "Found {} black and {} white samples ({} total)",
        black_count,
        white_count,
        samples.len()
    );
    println!(
        "Target: {}://{}",
        config.protocol.scheme(),
        config.target.authority()
    );
    println!("Workers: {}", config.workers);
    if config.retry.loss_rate > 0.0 {
        println!("Simulated loss rate: {}", config.retry.loss_rate);
    }
    println!("Starting run...\n");

    let orchestrator = Orchestrator::new(config)?;
    let handle = orchestrator.start(samples);

    let stopper = handle.stopper();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("stop requested, letting in-flight samples finish");
            stopper.stop();
        }
    });

    let output = handle.wait().await?;

    if cli.output.is_some() || cli.split.is_some() {
        print_mismatches(&output);
    }
    print_summary(&output);

    if let Some(path) = &cli.output {
        ReportGenerator::generate_report(&output.verdicts, path, ReportFormat::Csv)
            .with_context(|| format!("failed to write CSV report to {}", path.display()))?;
        println!("\nCSV report saved to {}", path.display());
    }
    if let Some(path) = &cli.json {
        ReportGenerator::generate_report(&output.verdicts, path, ReportFormat::Json)
            .with_context(|| format!("failed to write JSON report to {}", path.display()))?;
        println!("\nJSON report saved to {}", path.display());
    }
    if let Some(dir) = &cli.split {
        let (expected, unexpected) = split_samples(&output.verdicts, dir)
            .with_context(|| format!("failed to split samples into {}", dir.display()))?;
        println!("\nSamples partitioned:");
        println!("  {} -> {}/expected/", expected, dir.display());
        println!("  {} -> {}/unexpected/", unexpected, dir.display());
    }

    Ok(())
}

fn print_mismatches(output: &RunOutput) {
    let mismatches: Vec<_> = output.verdicts.iter().filter(|v| !v.correct).collect();
    if mismatches.is_empty() {
        return;
    }
    println!("\nSamples not behaving as expected:");
    println!("{}", "-".repeat(60));
    for verdict in mismatches {
        let observed = if verdict.outcome.status != 0 {
            verdict.outcome.status.to_string()
        } else {
            verdict.outcome.reason.clone()
        };
        let expectation = if verdict.expected_blocked {
            "should be blocked"
        } else {
            "should pass"
        };
        println!(
            "{} {} ({} sample, {} but got {})",
            "✗".red().bold(),
            verdict.sample.name,
            verdict.sample.class.label(),
            expectation,
            observed
        );
    }
}

fn print_summary(output: &RunOutput) {
    let stats = &output.stats;
    let completed = stats.completed().max(1);

    println!("\n{}", "=".repeat(60));
    match output.status {
        RunStatus::Aborted => println!("{}", "Run stopped early!".yellow().bold()),
        _ => println!("{}", "Run complete!".green().bold()),
    }
    println!("Total samples: {}", stats.total());
    if stats.completed() != stats.total() {
        println!("Completed: {}", stats.completed());
    }
    println!(
        "Matched expectation: {} ({:.1}%)",
        stats.correct(),
        stats.correct() as f64 / completed as f64 * 100.0
    );
    println!(
        "Did not match: {} ({:.1}%)",
        stats.incorrect(),
        stats.incorrect() as f64 / completed as f64 * 100.0
    );
    println!(
        "Detection rate: {:.1}% ({}/{} black samples blocked)",
        stats.detection_rate(),
        stats.black_correct(),
        stats.black_total()
    );
    println!(
        "False positive rate: {:.1}% ({}/{} white samples blocked)",
        stats.false_positive_rate(),
        stats.white_incorrect(),
        stats.white_total()
    );
    println!("Elapsed: {:.2}s", stats.elapsed().as_secs_f64());
    println!("Throughput: {:.2} samples/s", stats.samples_per_second());
    println!("{}", "=".repeat(60));
}
