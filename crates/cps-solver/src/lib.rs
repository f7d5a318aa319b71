//! # cps-solver
//!
//! Dependency graph normalization, the CPM forward/backward pass, and
//! duration/hierarchy preprocessing for the cps scheduling engine.
//!
//! The single entry point is [`calculate_schedule`], which wires the
//! normalizer (C2), the forward/backward pass (C3/C4), float (C5), and
//! result assembly (C7) together.
//!
//! ## Example
//!
//! ```rust
//! use cps_core::{DependencySpec, RelationType, TaskSpec};
//! use cps_solver::calculate_schedule;
//!
//! let t1 = TaskSpec::new(1, "Design", 1.0);
//! let t2 = TaskSpec::new(2, "Build", 2.0)
//!     .depends_on(DependencySpec::new(1, RelationType::FinishToStart, 0.0));
//!
//! let result = calculate_schedule(vec![t1, t2], None, None).unwrap();
//! assert_eq!(result.tasks.len(), 2);
//! ```

pub mod cpm;
pub mod dag;
pub mod duration;

use chrono::NaiveDateTime;

use cps_core::{Calendar, ScheduleError, ScheduleResult};

/// Infers a project start as the minimum `constraint_date` or
/// `original_start` over the task set, when the caller doesn't supply one.
fn infer_project_start(tasks: &[cps_core::TaskSpec]) -> Option<NaiveDateTime> {
    tasks
        .iter()
        .flat_map(|t| [t.constraint_date, t.original_start])
        .flatten()
        .min()
}

/// Runs the full core pipeline (C2 through C7): normalizes the dependency
/// graph, runs the forward and backward passes, and assembles the result.
///
/// `project_start` defaults to the earliest constraint/original-start date
/// across the input, falling back to `now()`. `calendar` defaults to an
/// 08:00-17:00 workday with a Saturday/Sunday weekend.
pub fn calculate_schedule(
    task_specs: Vec<cps_core::TaskSpec>,
    project_start: Option<NaiveDateTime>,
    calendar: Option<Calendar>,
) -> Result<ScheduleResult, ScheduleError> {
    let calendar = calendar.unwrap_or_default();
    let project_start =
        project_start.or_else(|| infer_project_start(&task_specs)).unwrap_or_else(|| {
            chrono::Local::now().naive_local()
        });
    let project_start = calendar.align_start(project_start);

    let graph = dag::normalize(task_specs)?;

    let mut scheduled = cpm::forward_pass(&graph.order, &graph.tasks, &calendar, project_start);
    cpm::backward_pass(&graph.order, &mut scheduled, &graph.tasks, &calendar);

    let project_finish = scheduled
        .values()
        .map(|t| t.latest_finish)
        .max()
        .expect("normalize rejects empty input");

    let tasks = graph
        .order
        .iter()
        .map(|uid| scheduled.remove(uid).expect("every ordered uid was scheduled"))
        .collect();

    Ok(ScheduleResult {
        project_start,
        project_finish,
        tasks,
        cycle_resolutions: graph.cycle_resolutions,
        dependency_issues: graph.dependency_issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cps_core::{DependencySpec, RelationType, TaskSpec};
    use pretty_assertions::assert_eq;

    fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn end_to_end_two_task_chain() {
        let t1 = TaskSpec::new(1, "Design", 1.0);
        let t2 = TaskSpec::new(2, "Build", 1.0)
            .depends_on(DependencySpec::new(1, RelationType::FinishToStart, 0.0));
        let result = calculate_schedule(vec![t1, t2], Some(dt(2024, 6, 3, 8)), None).unwrap();
        assert_eq!(result.tasks.len(), 2);
        assert_eq!(result.project_start, dt(2024, 6, 3, 8));
        assert_eq!(result.project_finish, dt(2024, 6, 4, 17));
        assert_eq!(result.critical_path().len(), 2);
    }

    #[test]
    fn project_start_inferred_from_constraints() {
        let mut t1 = TaskSpec::new(1, "Only", 1.0);
        t1.constraint_date = Some(dt(2024, 6, 10, 8));
        t1.constraint_type = Some(cps_core::ConstraintType::MustStartOn);
        let result = calculate_schedule(vec![t1], None, None).unwrap();
        assert_eq!(result.project_start, dt(2024, 6, 10, 8));
    }

    #[test]
    fn cycle_resolution_still_produces_a_schedule() {
        let t1 = TaskSpec::new(1, "A", 1.0)
            .depends_on(DependencySpec::new(3, RelationType::FinishToStart, 0.0));
        let t2 = TaskSpec::new(2, "B", 1.0)
            .depends_on(DependencySpec::new(1, RelationType::FinishToStart, 0.0));
        let t3 = TaskSpec::new(3, "C", 1.0)
            .depends_on(DependencySpec::new(2, RelationType::FinishToStart, 0.0));
        let result = calculate_schedule(vec![t1, t2, t3], Some(dt(2024, 6, 3, 8)), None).unwrap();
        assert_eq!(result.cycle_resolutions.len(), 1);
        assert_eq!(result.tasks.len(), 3);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            calculate_schedule(vec![], None, None),
            Err(ScheduleError::EmptyInput)
        ));
    }
}
