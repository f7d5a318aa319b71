//! cps CLI - Critical Path Schedule engine
//!
//! Command-line interface for loading a task CSV, running the critical
//! path method, and reporting or exporting the result.

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cps_core::{Calendar, DEFAULT_WORKDAY_END_HOUR, DEFAULT_WORKDAY_START_HOUR};

const DATETIME_HINTS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d"];

fn default_workday_start() -> String {
    format!("{DEFAULT_WORKDAY_START_HOUR:02}:00")
}

fn default_workday_end() -> String {
    format!("{DEFAULT_WORKDAY_END_HOUR:02}:00")
}

#[derive(Parser)]
#[command(name = "cps")]
#[command(author, version, about = "Critical path scheduling engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a task CSV, run the critical path method, and report the result
    Calculate {
        /// Path to the task CSV file
        #[arg(value_name = "FILE")]
        csv_path: PathBuf,

        /// Override project start (ISO-8601 datetime)
        #[arg(long, value_name = "DATETIME")]
        project_start: Option<String>,

        /// Start of the workday (HH:MM)
        #[arg(long, default_value_t = default_workday_start())]
        workday_start: String,

        /// End of the workday (HH:MM)
        #[arg(long, default_value_t = default_workday_end())]
        workday_end: String,

        /// Weekend days, e.g. "sat sun" or "5 6" (default: Saturday/Sunday)
        #[arg(long, num_args = 0.., value_name = "DAYS")]
        weekend: Vec<String>,

        /// Optional CSV destination for the calculated schedule
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn parse_workday_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .with_context(|| format!("time values must use HH:MM format; received {value:?}"))
}

fn parse_project_start(value: &str) -> Result<NaiveDateTime> {
    for pattern in DATETIME_HINTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, pattern) {
            return Ok(dt);
        }
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap());
    }
    anyhow::bail!("datetime values must use ISO-8601 format (YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS]), received {value:?}")
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Calculate {
            csv_path,
            project_start,
            workday_start,
            workday_end,
            weekend,
            output,
        }) => run_calculate(&csv_path, project_start.as_deref(), &workday_start, &workday_end, &weekend, output.as_deref()),
        None => {
            println!("cps - Critical Path Schedule engine");
            println!();
            println!("Usage: cps <COMMAND>");
            println!();
            println!("Commands:");
            println!("  calculate   Load a task CSV, run the critical path method, and report the result");
            println!();
            println!("See 'cps calculate --help' for options.");
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_calculate(
    csv_path: &std::path::Path,
    project_start: Option<&str>,
    workday_start: &str,
    workday_end: &str,
    weekend: &[String],
    output: Option<&std::path::Path>,
) -> Result<()> {
    tracing::debug!(path = %csv_path.display(), "loading task csv");
    let tasks = cps_io::load_tasks_from_path(csv_path)
        .with_context(|| format!("failed to load tasks from {}", csv_path.display()))?;

    let workday_start = parse_workday_time(workday_start)?;
    let workday_end = parse_workday_time(workday_end)?;
    let weekend_days = cps_core::parse_weekend(weekend).context("invalid --weekend specification")?;
    let calendar = Calendar::new(workday_start, workday_end, weekend_days)
        .context("invalid workday window")?;
    tracing::debug!(calendar = %calendar.describe(), "calendar configured");

    let project_start = project_start.map(parse_project_start).transpose()?;

    let result = cps_solver::calculate_schedule(tasks, project_start, Some(calendar.clone()))
        .context("failed to calculate schedule")?;

    println!("cps calculation complete:");
    println!("  Calendar: {}", calendar.describe());
    println!("  Tasks processed: {}", result.tasks.len());
    println!("  Project start:  {}", result.project_start);
    println!("  Project finish: {}", result.project_finish);

    let duration_hours = calendar.work_hours_between(result.project_start, result.project_finish);
    let duration_days = duration_hours / calendar.hours_per_day();
    println!("  Working duration: {duration_hours:.2} hours ({duration_days:.2} days)");

    let critical_count = result.critical_path().len();
    println!("  Critical tasks: {critical_count}");

    if !result.cycle_resolutions.is_empty() {
        println!("  Dependency cycles detected and resolved:");
        for resolution in &result.cycle_resolutions {
            tracing::warn!(
                cycle = %resolution.formatted_cycle(),
                removed_from = resolution.removed_from_task_uid,
                "dependency cycle broken"
            );
            println!("    Cycle: {}", resolution.formatted_cycle());
            let dependency = &resolution.removed_dependency;
            println!(
                "      Removed dependency: {} <- {} [{} lag {} days]",
                resolution.removed_from_task_uid,
                dependency.predecessor_uid,
                dependency.relation_type,
                dependency.lag_days
            );
        }
    }

    if !result.dependency_issues.is_empty() {
        println!("  Invalid dependencies removed:");
        for issue in &result.dependency_issues {
            tracing::warn!(issue = %issue.formatted(), "dependency issue");
            println!("    {}", issue.formatted());
        }
    }

    if let Some(output_path) = output {
        cps_io::write_csv_to_path(output_path, &result.to_rows())
            .with_context(|| format!("failed to write schedule to {}", output_path.display()))?;
        println!("  Detailed schedule written to {}", output_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_project_start_accepts_date_only() {
        let dt = parse_project_start("2024-06-03").unwrap();
        assert_eq!(dt.to_string(), "2024-06-03 00:00:00");
    }

    #[test]
    fn parse_project_start_accepts_full_datetime() {
        let dt = parse_project_start("2024-06-03T08:30:00").unwrap();
        assert_eq!(dt.to_string(), "2024-06-03 08:30:00");
    }

    #[test]
    fn parse_project_start_rejects_garbage() {
        assert!(parse_project_start("not-a-date").is_err());
    }

    #[test]
    fn parse_workday_time_accepts_hh_mm() {
        assert_eq!(parse_workday_time("08:00").unwrap(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    }

    #[test]
    fn parse_workday_time_rejects_bad_format() {
        assert!(parse_workday_time("8am").is_err());
    }
}
