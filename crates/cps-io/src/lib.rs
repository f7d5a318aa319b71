//! # cps-io
//!
//! CSV ingest/export (C8) and XLSX export (C9) adapters for the cps
//! scheduling engine. This crate owns all file-format knowledge; the
//! solver and core crates never see a path or a byte stream.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cps_io::load_tasks_from_path;
//!
//! let tasks = load_tasks_from_path("schedule.csv").unwrap();
//! let result = cps_solver::calculate_schedule(tasks, None, None).unwrap();
//! cps_io::write_csv_to_path("out.csv", &result.to_rows()).unwrap();
//! ```

pub mod csv;
pub mod dependency;
pub mod xlsx;

use std::fs::File;
use std::path::Path;

use cps_core::{ScheduleRow, TaskSpec};
use thiserror::Error;

pub use csv::CsvAdapterError;
pub use xlsx::XlsxAdapterError;

/// Top-level error for path-based convenience wrappers, layering file
/// access on top of the format-specific adapter errors.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Csv(#[from] CsvAdapterError),
    #[error(transparent)]
    Xlsx(#[from] XlsxAdapterError),
}

/// Loads task specs from a CSV file on disk.
pub fn load_tasks_from_path(path: impl AsRef<Path>) -> Result<Vec<TaskSpec>, AdapterError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| AdapterError::Open {
        path: path.display().to_string(),
        source,
    })?;
    Ok(csv::load_tasks(file)?)
}

/// Writes a schedule's row projection to a CSV file on disk.
pub fn write_csv_to_path(path: impl AsRef<Path>, rows: &[ScheduleRow]) -> Result<(), AdapterError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| AdapterError::Open {
        path: path.display().to_string(),
        source,
    })?;
    csv::write_schedule(file, rows)?;
    Ok(())
}

/// Writes a schedule's row projection to an XLSX workbook on disk.
pub fn write_xlsx_to_path(path: impl AsRef<Path>, rows: &[ScheduleRow]) -> Result<(), AdapterError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| AdapterError::Open {
        path: path.display().to_string(),
        source,
    })?;
    xlsx::write_schedule(file, rows)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cps_core::{DependencySpec, RelationType, TaskSpec as Task};

    #[test]
    fn round_trips_a_small_schedule_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("in.csv");
        std::fs::write(
            &input_path,
            "uid,name,duration_days,predecessors\n1,Design,1,\n2,Build,2,1\n",
        )
        .unwrap();

        let tasks = load_tasks_from_path(&input_path).unwrap();
        assert_eq!(tasks.len(), 2);

        let result = cps_solver::calculate_schedule(
            tasks,
            Some(
                chrono::NaiveDate::from_ymd_opt(2024, 6, 3)
                    .unwrap()
                    .and_hms_opt(8, 0, 0)
                    .unwrap(),
            ),
            None,
        )
        .unwrap();

        let output_path = dir.path().join("out.csv");
        write_csv_to_path(&output_path, &result.to_rows()).unwrap();
        let reloaded = load_tasks_from_path(&output_path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded[0].name, "Design");
    }

    #[test]
    fn writes_a_readable_xlsx_file() {
        let dir = tempfile::tempdir().unwrap();
        let t1 = Task::new(1, "Design", 1.0);
        let t2 = Task::new(2, "Build", 1.0).depends_on(DependencySpec::new(1, RelationType::FinishToStart, 0.0));
        let result = cps_solver::calculate_schedule(
            vec![t1, t2],
            Some(
                chrono::NaiveDate::from_ymd_opt(2024, 6, 3)
                    .unwrap()
                    .and_hms_opt(8, 0, 0)
                    .unwrap(),
            ),
            None,
        )
        .unwrap();
        let output_path = dir.path().join("out.xlsx");
        write_xlsx_to_path(&output_path, &result.to_rows()).unwrap();
        assert!(output_path.exists());
    }

    #[test]
    fn missing_file_reports_path_in_error() {
        let err = load_tasks_from_path("/nonexistent/does-not-exist.csv").unwrap_err();
        assert!(matches!(err, AdapterError::Open { .. }));
    }
}
