mod reports;
mod scenarios;
mod script;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Instant;

use scenarios::{ScenarioResult, expand_scenarios, get_scenario, list_scenarios};
use script::{ScriptRun, parse_script, run_script};

#[derive(Debug, Parser)]
#[command(name = "escaperoom-tester", version = "0.1.0")]
#[command(
    about = "Replays push-stream scripts and property scenarios against the escape room screens"
)]
struct Args {
    /// Puzzle screen to mount for --script (1-9)
    #[arg(long)]
    puzzle: Option<u8>,

    /// JSON-lines script of deltas, snapshots and host events
    #[arg(long)]
    script: Option<PathBuf>,

    /// Scenarios to run (comma-separated, or "all"); smoke when nothing else is requested
    #[arg(long)]
    scenarios: Option<String>,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    if args.report == "console" {
        announce_banner();
    }

    let start_time = Instant::now();
    let script_run = replay_script(&args)?;
    let results = run_scenarios(&args, &scenario_keys(&args));
    write_reports(&args, script_run.as_ref(), &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }
    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut out = open_output(args.output.as_deref())?;
    writeln!(out, "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(out, "  {key:15} - {description}")?;
    }
    out.flush()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🚪 Escape Room Screens Tester".bright_cyan().bold());
    println!("{}", "=============================".cyan());
}

fn scenario_keys(args: &Args) -> Vec<String> {
    match (&args.scenarios, &args.script) {
        (Some(list), _) => expand_scenarios(list),
        (None, None) => vec!["smoke".to_string()],
        (None, Some(_)) => Vec::new(),
    }
}

fn replay_script(args: &Args) -> Result<Option<ScriptRun>> {
    let Some(path) = &args.script else {
        return Ok(None);
    };
    let Some(puzzle_id) = args.puzzle else {
        bail!("--script needs --puzzle to pick the screen");
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let steps = parse_script(&text).with_context(|| format!("parsing {}", path.display()))?;
    if args.verbose {
        println!("▶️  {} steps against puzzle {puzzle_id}", steps.len());
    }
    run_script(puzzle_id, &steps).map(Some)
}

fn run_scenarios(args: &Args, keys: &[String]) -> Vec<ScenarioResult> {
    let mut results = Vec::new();
    for key in keys {
        let Some(scenario) = get_scenario(key) else {
            eprintln!("⚠️  Unknown scenario: {}", key.yellow());
            continue;
        };
        let result = scenario.run();
        if args.verbose {
            let mark = if result.passed { "✅" } else { "❌" };
            println!("{mark} {key} - {:?}", result.duration);
        }
        results.push(result);
    }
    results
}

fn write_reports(
    args: &Args,
    script: Option<&ScriptRun>,
    results: &[ScenarioResult],
    start_time: Instant,
) -> Result<()> {
    let mut out = open_output(args.output.as_deref())?;

    match args.report.as_str() {
        "json" => reports::generate_json_report(&mut out, script, results)?,
        "markdown" => {
            if script.is_none() && results.is_empty() {
                writeln!(
                    out,
                    "# Escape Room Screen Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                reports::generate_markdown_report(&mut out, script, results)?;
            }
        }
        _ => {
            let duration = start_time.elapsed();
            if script.is_none() && results.is_empty() {
                writeln!(out, "No scenarios executed.")?;
            } else {
                reports::generate_console_report(&mut out, script, results, duration)?;
            }
            writeln!(out)?;
            writeln!(out, "🏁 Total time: {duration:?}")?;
        }
    }

    out.flush()?;
    Ok(())
}

/// Buffered report sink: the `--output` file when given, stdout otherwise.
fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    let Some(path) = path else {
        return Ok(Box::new(BufWriter::new(stdout())));
    };
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}
