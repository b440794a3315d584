use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use serde::Serialize;
use twox_hash::XxHash64;

use crate::scenarios::ScenarioResult;
use crate::script::ScriptRun;

/// Stable digest of what a script run rendered, for comparing runs.
#[must_use]
pub fn observed_digest(run: &ScriptRun) -> String {
    let bytes = serde_json::to_vec(&run.observed).unwrap_or_default();
    format!("{:016x}", XxHash64::oneshot(0, &bytes))
}

#[derive(Serialize)]
struct ScriptSection<'a> {
    puzzle_id: u8,
    digest: String,
    #[serde(flatten)]
    run: &'a ScriptRun,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    script: Option<ScriptSection<'a>>,
    scenarios: &'a [ScenarioResult],
}

pub fn generate_json_report(
    out: &mut dyn Write,
    script: Option<&ScriptRun>,
    results: &[ScenarioResult],
) -> Result<()> {
    let report = JsonReport {
        generated_at: Utc::now().to_rfc3339(),
        script: script.map(|run| ScriptSection {
            puzzle_id: run.observed.puzzle_id,
            digest: observed_digest(run),
            run,
        }),
        scenarios: results,
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

fn success_rate(results: &[ScenarioResult]) -> f64 {
    if results.is_empty() {
        return 100.0;
    }
    let passed = results.iter().filter(|r| r.passed).count();
    #[allow(clippy::cast_precision_loss)]
    let rate = (passed as f64 / results.len() as f64) * 100.0;
    rate
}

pub fn generate_console_report(
    out: &mut dyn Write,
    script: Option<&ScriptRun>,
    results: &[ScenarioResult],
    total_duration: Duration,
) -> Result<()> {
    if let Some(run) = script {
        writeln!(out)?;
        writeln!(
            out,
            "{}",
            format!("📜 Script replay: puzzle {}", run.observed.puzzle_id)
                .bright_cyan()
                .bold()
        )?;
        writeln!(out, "Steps: {}", run.steps)?;
        writeln!(out, "Solved: {}", run.observed.terminal)?;
        writeln!(out, "Snapshot requests: {:?}", run.snapshot_requests)?;
        writeln!(out, "Sounds played:")?;
        for url in &run.observed.audio.played {
            writeln!(out, "   • {url}")?;
        }
        writeln!(out, "Notifications: {:?}", run.observed.outbound.notifications)?;
        writeln!(out, "Navigations: {:?}", run.observed.outbound.navigations)?;
        writeln!(out, "Rendered state:")?;
        writeln!(
            out,
            "{}",
            serde_json::to_string_pretty(&run.observed.surface)?
        )?;
        writeln!(out, "Digest: {}", observed_digest(run).green())?;
    }

    if results.is_empty() {
        return Ok(());
    }
    let passed = results.iter().filter(|r| r.passed).count();
    writeln!(out)?;
    writeln!(out, "{}", "📊 Scenario Results Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "==========================".cyan())?;
    writeln!(out, "Total scenarios: {}", results.len())?;
    writeln!(out, "Passed: {}", passed.to_string().green())?;
    writeln!(out, "Failed: {}", (results.len() - passed).to_string().red())?;
    writeln!(out, "Success rate: {:.1}%", success_rate(results))?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        writeln!(out, "{} {}", status, result.scenario_name.bold())?;
        writeln!(out, "   Time: {:?}", result.duration)?;
        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.red())?;
            }
        }
    }
    Ok(())
}

pub fn generate_markdown_report(
    out: &mut dyn Write,
    script: Option<&ScriptRun>,
    results: &[ScenarioResult],
) -> Result<()> {
    writeln!(out, "# Escape Room Screen Test Results\n")?;
    writeln!(out, "_Generated {}_\n", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"))?;

    if let Some(run) = script {
        writeln!(out, "## Script replay (puzzle {})\n", run.observed.puzzle_id)?;
        writeln!(out, "- **Steps**: {}", run.steps)?;
        writeln!(out, "- **Solved**: {}", run.observed.terminal)?;
        writeln!(out, "- **Sounds**: {}", run.observed.audio.played.len())?;
        writeln!(
            out,
            "- **Navigations**: {}",
            run.observed.outbound.navigations.join(", ")
        )?;
        writeln!(out, "- **Digest**: `{}`\n", observed_digest(run))?;
    }

    if results.is_empty() {
        return Ok(());
    }
    let passed = results.iter().filter(|r| r.passed).count();
    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total scenarios**: {}", results.len())?;
    writeln!(out, "- **Passed**: {passed}")?;
    writeln!(out, "- **Failed**: {}", results.len() - passed)?;
    writeln!(out, "- **Success rate**: {:.1}%\n", success_rate(results))?;

    writeln!(out, "## Detailed Results\n")?;
    for result in results {
        let status = if result.passed { "✅" } else { "❌" };
        writeln!(out, "### {} {}\n", status, result.scenario_name)?;
        writeln!(out, "- **Time**: {:?}", result.duration)?;
        if !result.failures.is_empty() {
            writeln!(out, "- **Failures**:")?;
            for failure in &result.failures {
                writeln!(out, "  - {failure}")?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}
