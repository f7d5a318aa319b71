//! CSV ingest/export adapter (C8).

use std::collections::HashMap;
use std::io::{Read, Write};

use chrono::NaiveDateTime;
use cps_core::{ConstraintType, Id, ScheduleRow, TaskSpec};
use thiserror::Error;

use crate::dependency::parse_csv_predecessors;

const DATE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d"];

#[derive(Debug, Error)]
pub enum CsvAdapterError {
    #[error("row {row}: {source}")]
    Csv { row: usize, source: ::csv::Error },
    #[error("row {row}: missing or unparsable uid")]
    MissingUid { row: usize },
    #[error("row {row}: invalid duration {value:?}")]
    InvalidDuration { row: usize, value: String },
    #[error("row {row}: invalid datetime {value:?}")]
    InvalidDateTime { row: usize, value: String },
    #[error("row {row}: {source}")]
    InvalidDependency {
        row: usize,
        #[source]
        source: cps_core::ScheduleError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }
    chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y")
}

/// First non-empty value among `keys`, matched case-insensitively against
/// the row's header names.
fn first_of<'a>(row: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    for key in keys {
        if let Some(value) = row.get(*key) {
            if !value.trim().is_empty() {
                return Some(value.as_str());
            }
        }
    }
    None
}

/// Loads task specs from a CSV reader, tolerating the ingest contract's
/// column-name fallbacks. Tasks are returned sorted by `uid`.
pub fn load_tasks<R: Read>(reader: R) -> Result<Vec<TaskSpec>, CsvAdapterError> {
    let mut csv_reader = ::csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();

    let mut tasks = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let row_number = index + 2; // header is row 1
        let record = record.map_err(|source| CsvAdapterError::Csv { row: row_number, source })?;
        let row: HashMap<String, String> = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();

        let uid: Id = first_of(&row, &["uid", "UID", "Unique ID"])
            .and_then(|v| v.trim().parse().ok())
            .ok_or(CsvAdapterError::MissingUid { row: row_number })?;

        let name = first_of(&row, &["name", "Name", "Task Name"]).unwrap_or("").to_string();

        let duration_text = first_of(&row, &["duration_days", "DurationDays", "Duration"]).unwrap_or("0");
        let duration_days: f64 = duration_text.trim().parse().map_err(|_| CsvAdapterError::InvalidDuration {
            row: row_number,
            value: duration_text.to_string(),
        })?;

        let predecessors_text = first_of(&row, &["predecessors", "Predecessors"]).unwrap_or("");
        let dependencies = parse_csv_predecessors(predecessors_text)
            .map_err(|source| CsvAdapterError::InvalidDependency { row: row_number, source })?;

        let constraint_date_text = first_of(&row, &["constraint_date"]).unwrap_or("");
        let constraint_date = if constraint_date_text.is_empty() {
            None
        } else {
            Some(parse_datetime(constraint_date_text).ok_or_else(|| CsvAdapterError::InvalidDateTime {
                row: row_number,
                value: constraint_date_text.to_string(),
            })?)
        };

        let mut task = TaskSpec {
            uid,
            name,
            duration_days,
            dependencies,
            is_milestone: first_of(&row, &["is_milestone"]).map(parse_bool).unwrap_or(false),
            outline_level: first_of(&row, &["outline_level"]).and_then(|v| v.trim().parse().ok()),
            constraint_type: first_of(&row, &["constraint_type"]).and_then(ConstraintType::parse_lenient),
            constraint_date,
            calendar_name: first_of(&row, &["calendar", "Calendar"]).map(str::to_string),
            original_start: first_of(&row, &["start"]).and_then(parse_datetime),
            original_finish: first_of(&row, &["finish"]).and_then(parse_datetime),
        };
        task.is_milestone = task.is_milestone || duration_days.abs() < cps_core::EPSILON_HOURS;
        tasks.push(task);
    }

    tasks.sort_by_key(|t| t.uid);
    Ok(tasks)
}

fn stringify_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Writes the output projection (§4.7/§4.8) to a CSV writer: one row per
/// scheduled task, `total_float_hours`/`duration_days` at 3 decimal places.
pub fn write_schedule<W: Write>(writer: W, rows: &[ScheduleRow]) -> Result<(), CsvAdapterError> {
    let mut csv_writer = ::csv::Writer::from_writer(writer);
    csv_writer.write_record([
        "uid",
        "name",
        "earliest_start",
        "earliest_finish",
        "latest_start",
        "latest_finish",
        "total_float_hours",
        "is_critical",
        "duration_days",
        "is_milestone",
        "constraint_type",
        "constraint_date",
    ])?;

    for row in rows {
        csv_writer.write_record([
            row.uid.to_string(),
            row.name.clone(),
            row.earliest_start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            row.earliest_finish.format("%Y-%m-%dT%H:%M:%S").to_string(),
            row.latest_start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            row.latest_finish.format("%Y-%m-%dT%H:%M:%S").to_string(),
            format!("{:.3}", row.total_float_hours),
            stringify_bool(row.is_critical).to_string(),
            format!("{:.3}", row.duration_days),
            stringify_bool(row.is_milestone).to_string(),
            row.constraint_type.map(|c| c.to_string()).unwrap_or_default(),
            row.constraint_date
                .map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string())
                .unwrap_or_default(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

impl From<::csv::Error> for CsvAdapterError {
    fn from(source: ::csv::Error) -> Self {
        CsvAdapterError::Csv { row: 1, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn loads_a_minimal_task_row() {
        let data = "uid,name,duration_days\n1,Design,1.0\n";
        let tasks = load_tasks(data.as_bytes()).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].uid, 1);
        assert_eq!(tasks[0].name, "Design");
    }

    #[test]
    fn falls_back_to_duration_column() {
        let data = "uid,name,Duration\n1,Design,2.0\n";
        let tasks = load_tasks(data.as_bytes()).unwrap();
        assert_eq!(tasks[0].duration_days, 2.0);
    }

    #[test]
    fn parses_semicolon_predecessors() {
        let data = "uid,name,duration_days,predecessors\n1,A,1,\n2,B,1,1:SS:0.5\n";
        let tasks = load_tasks(data.as_bytes()).unwrap();
        assert_eq!(tasks[1].dependencies.len(), 1);
        assert_eq!(tasks[1].dependencies[0].lag_days, 0.5);
    }

    #[test]
    fn sorts_by_uid() {
        let data = "uid,name,duration_days\n3,C,1\n1,A,1\n2,B,1\n";
        let tasks = load_tasks(data.as_bytes()).unwrap();
        assert_eq!(tasks.iter().map(|t| t.uid).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn missing_uid_is_fatal() {
        let data = "name,duration_days\nA,1\n";
        assert!(matches!(
            load_tasks(data.as_bytes()),
            Err(CsvAdapterError::MissingUid { .. })
        ));
    }

    #[test]
    fn zero_duration_is_a_milestone() {
        let data = "uid,name,duration_days\n1,Kickoff,0\n";
        let tasks = load_tasks(data.as_bytes()).unwrap();
        assert!(tasks[0].is_milestone);
    }

    #[test]
    fn writes_expected_header_and_row_shape() {
        let rows = vec![ScheduleRow {
            uid: 1,
            name: "Design".to_string(),
            earliest_start: chrono::NaiveDate::from_ymd_opt(2024, 6, 3)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            earliest_finish: chrono::NaiveDate::from_ymd_opt(2024, 6, 3)
                .unwrap()
                .and_hms_opt(17, 0, 0)
                .unwrap(),
            latest_start: chrono::NaiveDate::from_ymd_opt(2024, 6, 3)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            latest_finish: chrono::NaiveDate::from_ymd_opt(2024, 6, 3)
                .unwrap()
                .and_hms_opt(17, 0, 0)
                .unwrap(),
            total_float_hours: 0.0,
            is_critical: true,
            duration_days: 1.0,
            is_milestone: false,
            constraint_type: None,
            constraint_date: None,
        }];
        let mut buffer = Vec::new();
        write_schedule(&mut buffer, &rows).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("uid,name,earliest_start"));
        assert!(text.contains("1,Design,2024-06-03T08:00:00"));
        assert!(text.contains("true"));
    }
}
