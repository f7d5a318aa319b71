//! Critical Path Method forward/backward pass (C3, C4) and float (C5).
//!
//! Operates on the already-normalized, acyclic task map produced by
//! [`crate::dag::normalize`], with all calendar arithmetic delegated to
//! [`cps_core::Calendar`].

use std::collections::HashMap;

use cps_core::{Calendar, ConstraintType, Id, RelationType, ScheduledTask, TaskSpec};
use chrono::NaiveDateTime;

/// `(successor_uid, dependency)` pairs, keyed by predecessor uid.
type SuccessorIndex = HashMap<Id, Vec<(Id, cps_core::DependencySpec)>>;

fn build_successors(tasks: &HashMap<Id, TaskSpec>) -> SuccessorIndex {
    let mut index: SuccessorIndex = HashMap::new();
    let mut uids: Vec<Id> = tasks.keys().copied().collect();
    uids.sort_unstable();
    for uid in uids {
        let task = &tasks[&uid];
        for dep in &task.dependencies {
            index
                .entry(dep.predecessor_uid)
                .or_default()
                .push((uid, dep.clone()));
        }
    }
    index
}

fn apply_constraint(
    spec: &TaskSpec,
    calendar: &Calendar,
    mut start: NaiveDateTime,
    mut finish: NaiveDateTime,
) -> (NaiveDateTime, NaiveDateTime) {
    let Some(constraint_type) = spec.constraint_type else {
        return (start, finish);
    };
    let Some(constraint_date) = spec.constraint_date else {
        return (start, finish);
    };
    match constraint_type {
        ConstraintType::MustStartOn => {
            start = calendar.align_start(constraint_date);
            finish = calendar.add_work_duration(start, spec.duration_days);
        }
        ConstraintType::StartNoEarlierThan => {
            start = start.max(calendar.align_start(constraint_date));
            finish = calendar.add_work_duration(start, spec.duration_days);
        }
        ConstraintType::MustFinishOn => {
            finish = calendar.align_finish(constraint_date);
            start = calendar.subtract_work_duration(finish, spec.duration_days);
        }
        ConstraintType::FinishNoEarlierThan => {
            let candidate_finish = calendar.align_finish(constraint_date);
            let candidate_start = calendar.subtract_work_duration(candidate_finish, spec.duration_days);
            start = start.max(candidate_start);
            finish = calendar.add_work_duration(start, spec.duration_days);
        }
    }
    (start, finish)
}

/// Forward pass (C3): earliest start/finish for every task in topological
/// order, `order[i]`'s predecessors all having been scheduled already.
pub fn forward_pass(
    order: &[Id],
    tasks: &HashMap<Id, TaskSpec>,
    calendar: &Calendar,
    project_start: NaiveDateTime,
) -> HashMap<Id, ScheduledTask> {
    let mut scheduled: HashMap<Id, ScheduledTask> = HashMap::with_capacity(tasks.len());

    for &uid in order {
        let spec = &tasks[&uid];
        let mut start = calendar.align_start(project_start);
        let mut finish = calendar.add_work_duration(start, spec.duration_days);

        for dependency in &spec.dependencies {
            let pred = &scheduled[&dependency.predecessor_uid];
            let lag = dependency.lag_days;
            match dependency.relation_type {
                RelationType::FinishToStart => {
                    let candidate = calendar.add_work_duration(pred.earliest_finish, lag);
                    start = start.max(calendar.align_start(candidate));
                    finish = calendar.add_work_duration(start, spec.duration_days);
                }
                RelationType::StartToStart => {
                    let candidate = calendar.add_work_duration(pred.earliest_start, lag);
                    start = start.max(calendar.align_start(candidate));
                    finish = calendar.add_work_duration(start, spec.duration_days);
                }
                RelationType::FinishToFinish => {
                    let candidate_finish =
                        calendar.align_finish(calendar.add_work_duration(pred.earliest_finish, lag));
                    start = calendar.align_start(
                        calendar.subtract_work_duration(candidate_finish, spec.duration_days),
                    );
                    finish = calendar.add_work_duration(start, spec.duration_days);
                }
                RelationType::StartToFinish => {
                    let candidate_finish =
                        calendar.align_finish(calendar.add_work_duration(pred.earliest_start, lag));
                    start = calendar.align_start(
                        calendar.subtract_work_duration(candidate_finish, spec.duration_days),
                    );
                    finish = calendar.add_work_duration(start, spec.duration_days);
                }
            }
        }

        let (start, finish) = apply_constraint(spec, calendar, start, finish);

        scheduled.insert(
            uid,
            ScheduledTask {
                spec: spec.clone(),
                earliest_start: start,
                earliest_finish: finish,
                latest_start: start,
                latest_finish: finish,
                total_float_hours: 0.0,
            },
        );
    }

    scheduled
}

/// Backward pass (C4) followed by float/criticality (C5), mutating the
/// scheduled tasks produced by [`forward_pass`] in place.
pub fn backward_pass(
    order: &[Id],
    scheduled: &mut HashMap<Id, ScheduledTask>,
    tasks: &HashMap<Id, TaskSpec>,
    calendar: &Calendar,
) {
    let successors = build_successors(tasks);
    let project_finish = scheduled
        .values()
        .map(|t| t.earliest_finish)
        .max()
        .expect("at least one task is scheduled");

    for &uid in order.iter().rev() {
        let duration_days = tasks[&uid].duration_days;
        let successor_records = successors.get(&uid);

        let latest_finish_limit = match successor_records {
            Some(records) if !records.is_empty() => records
                .iter()
                .map(|(succ_uid, dependency)| {
                    let succ = &scheduled[succ_uid];
                    let lag = dependency.lag_days;
                    let candidate_finish = match dependency.relation_type {
                        RelationType::FinishToStart => {
                            calendar.subtract_work_duration(succ.latest_start, lag)
                        }
                        RelationType::StartToStart => {
                            let candidate_start =
                                calendar.subtract_work_duration(succ.latest_start, lag);
                            calendar.add_work_duration(candidate_start, duration_days)
                        }
                        RelationType::FinishToFinish => {
                            calendar.subtract_work_duration(succ.latest_finish, lag)
                        }
                        RelationType::StartToFinish => {
                            let candidate_start =
                                calendar.subtract_work_duration(succ.latest_finish, lag);
                            calendar.add_work_duration(candidate_start, duration_days)
                        }
                    };
                    calendar.align_finish(candidate_finish)
                })
                .min()
                .expect("non-empty successor records"),
            _ => project_finish,
        };

        let latest_start =
            calendar.align_start(calendar.subtract_work_duration(latest_finish_limit, duration_days));
        let latest_finish = calendar
            .add_work_duration(latest_start, duration_days)
            .min(latest_finish_limit);

        let entry = scheduled.get_mut(&uid).expect("uid came from the map");
        entry.latest_start = latest_start;
        entry.latest_finish = latest_finish;
        entry.total_float_hours = calendar.work_hours_between(entry.earliest_start, latest_start);
    }
}
