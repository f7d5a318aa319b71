//! Duration/lag string parsing and WBS hierarchy aggregation (C6).
//!
//! These helpers run ahead of [`crate::dag::normalize`] when an adapter
//! hands the solver raw duration strings and an outline-level hierarchy
//! instead of pre-resolved `f64` days.

use std::collections::{HashMap, HashSet};

use cps_core::{Id, TaskSpec};

/// A nominal 8-hour workday is used purely as the conversion constant for
/// the duration grammar below; it is independent of the runtime
/// [`cps_core::Calendar`], whose `hours_per_day` may differ.
const NOMINAL_HOURS_PER_DAY: f64 = 8.0;
const NOMINAL_DAYS_PER_WEEK: f64 = 5.0;
const NOMINAL_DAYS_PER_MONTH: f64 = 20.0;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DurationParseError {
    #[error("empty duration string")]
    Empty,
    #[error("invalid duration string: {0:?}")]
    InvalidFormat(String),
    #[error("unsupported duration unit: {0:?}")]
    UnsupportedUnit(String),
}

/// Parses `N`, `N.dd`, or `N<unit>` (unit ∈ h|d|w|mo, case-insensitive),
/// tolerating a single trailing `?` and surrounding whitespace. Returns
/// the duration in days (dividing the nominal-hours result by 8).
pub fn parse_duration_days(value: &str) -> Result<f64, DurationParseError> {
    parse_duration_hours(value).map(|hours| hours / NOMINAL_HOURS_PER_DAY)
}

fn parse_duration_hours(value: &str) -> Result<f64, DurationParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::Empty);
    }
    let trimmed = trimmed.strip_suffix('?').unwrap_or(trimmed).trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let lower = trimmed.to_ascii_lowercase();
    let (magnitude_text, unit) = split_magnitude_and_unit(&lower)
        .ok_or_else(|| DurationParseError::InvalidFormat(value.to_string()))?;
    let magnitude: f64 = magnitude_text
        .parse()
        .map_err(|_| DurationParseError::InvalidFormat(value.to_string()))?;

    let hours = match unit {
        "" | "h" => magnitude,
        "d" => magnitude * NOMINAL_HOURS_PER_DAY,
        "w" => magnitude * NOMINAL_DAYS_PER_WEEK * NOMINAL_HOURS_PER_DAY,
        "mo" => magnitude * NOMINAL_DAYS_PER_MONTH * NOMINAL_HOURS_PER_DAY,
        other => return Err(DurationParseError::UnsupportedUnit(other.to_string())),
    };
    Ok(hours)
}

/// Splits a lowercased, trimmed duration string into its numeric prefix
/// and trailing unit suffix (`h`, `d`, `w`, or `mo`; empty if bare).
fn split_magnitude_and_unit(text: &str) -> Option<(&str, &str)> {
    for unit in ["mo", "h", "d", "w"] {
        if let Some(stripped) = text.strip_suffix(unit) {
            if !stripped.is_empty() {
                return Some((stripped.trim(), unit));
            }
        }
    }
    if !text.is_empty() {
        return Some((text, ""));
    }
    None
}

/// Parses a signed lag specification (`+2d`, `-0.25d`, `+4h`) into days.
pub fn parse_lag_days(value: &str) -> Result<f64, DurationParseError> {
    let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let (sign, rest) = match cleaned.chars().next() {
        Some('+') => (1.0, &cleaned[1..]),
        Some('-') => (-1.0, &cleaned[1..]),
        _ => (1.0, cleaned.as_str()),
    };
    parse_duration_days(rest).map(|days| sign * days)
}

/// Canonical display form for a duration in days: an integer `Nd` when
/// within tolerance of a whole day, else a trimmed two-decimal `Nd`.
pub fn format_duration_days(days: f64) -> String {
    if (days - days.round()).abs() < cps_core::EPSILON_HOURS {
        format!("{}d", days.round() as i64)
    } else {
        let text = format!("{days:.2}");
        let trimmed = text.trim_end_matches('0').trim_end_matches('.');
        format!("{trimmed}d")
    }
}

/// A node in the outline-level hierarchy built from an ordered task list:
/// `children` are tasks whose `outline_level` is exactly one deeper and
/// which appear contiguously under this task before the next sibling or
/// shallower task.
struct HierarchyNode {
    children: Vec<Id>,
}

fn build_hierarchy(tasks: &[TaskSpec]) -> HashMap<Id, HierarchyNode> {
    let mut nodes: HashMap<Id, HierarchyNode> = tasks
        .iter()
        .map(|t| (t.uid, HierarchyNode { children: Vec::new() }))
        .collect();
    let mut stack: Vec<(i32, Id)> = Vec::new();
    for task in tasks {
        let level = task.outline_level.unwrap_or(0);
        while let Some(&(top_level, _)) = stack.last() {
            if top_level >= level {
                stack.pop();
            } else {
                break;
            }
        }
        if let Some(&(_, parent_uid)) = stack.last() {
            nodes.get_mut(&parent_uid).unwrap().children.push(task.uid);
        }
        stack.push((level, task.uid));
    }
    nodes
}

/// Dependency-derived effective duration (C6 bullet 2): for tasks at
/// `targeted_levels`, `effective = max(base, sum of effective(unique
/// predecessors))`; all other tasks keep their own base duration.
pub fn effective_durations(tasks: &[TaskSpec], targeted_levels: &HashSet<i32>) -> HashMap<Id, f64> {
    let mut effective: HashMap<Id, f64> = tasks.iter().map(|t| (t.uid, t.duration_days)).collect();
    let by_uid: HashMap<Id, &TaskSpec> = tasks.iter().map(|t| (t.uid, t)).collect();

    for task in tasks {
        let level = task.outline_level.unwrap_or(-1);
        if !targeted_levels.contains(&level) {
            continue;
        }
        let unique_preds: HashSet<Id> = task
            .dependencies
            .iter()
            .map(|d| d.predecessor_uid)
            .collect();
        let sum_pred: f64 = unique_preds
            .iter()
            .filter_map(|uid| by_uid.contains_key(uid).then(|| effective[uid]))
            .sum();
        let base = task.duration_days;
        effective.insert(task.uid, base.max(sum_pred));
    }
    effective
}

/// Bottom-up hierarchy aggregation with a cycle guard (C6 bullet 3):
/// `computed(task) = sum(computed(child))` when the task has hierarchy
/// children, else its own `base`. All relation contributions are
/// currently 1.0 (reserved for future FF/SS differentiation).
pub fn aggregate_hierarchy(tasks: &[TaskSpec]) -> HashMap<Id, f64> {
    let nodes = build_hierarchy(tasks);
    let base: HashMap<Id, f64> = tasks.iter().map(|t| (t.uid, t.duration_days)).collect();
    let mut computed: HashMap<Id, f64> = HashMap::with_capacity(tasks.len());
    let mut in_progress: HashSet<Id> = HashSet::new();

    fn visit(
        uid: Id,
        nodes: &HashMap<Id, HierarchyNode>,
        base: &HashMap<Id, f64>,
        computed: &mut HashMap<Id, f64>,
        in_progress: &mut HashSet<Id>,
    ) -> f64 {
        if let Some(&value) = computed.get(&uid) {
            return value;
        }
        if !in_progress.insert(uid) {
            // Re-entered this node on the current path: short-circuit to
            // its own base duration rather than recurse unboundedly.
            return base[&uid];
        }
        let node = &nodes[&uid];
        let value = if node.children.is_empty() {
            base[&uid]
        } else {
            node.children
                .iter()
                .map(|&child| visit(child, nodes, base, computed, in_progress))
                .sum()
        };
        in_progress.remove(&uid);
        computed.insert(uid, value);
        value
    }

    for &uid in base.keys() {
        visit(uid, &nodes, &base, &mut computed, &mut in_progress);
    }
    computed
}

/// Parent sanity check (C6 bullet 4): returns the set of task uids whose
/// user-supplied `base` should be blanked because it disagrees with the
/// aggregated child sum by more than 0.01 day.
pub fn parents_needing_blank_base(tasks: &[TaskSpec]) -> HashSet<Id> {
    let nodes = build_hierarchy(tasks);
    let computed = aggregate_hierarchy(tasks);
    let base: HashMap<Id, f64> = tasks.iter().map(|t| (t.uid, t.duration_days)).collect();

    let mut blanked = HashSet::new();
    for task in tasks {
        let node = &nodes[&task.uid];
        if node.children.is_empty() {
            continue;
        }
        let child_sum = computed[&task.uid];
        if (base[&task.uid] - child_sum).abs() > 0.01 {
            blanked.insert(task.uid);
        }
    }
    blanked
}

#[cfg(test)]
mod tests {
    use super::*;
    use cps_core::DependencySpec;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_bare_number_as_days() {
        assert_eq!(parse_duration_days("1").unwrap(), 1.0);
    }

    #[test]
    fn parses_hours_suffix() {
        assert_eq!(parse_duration_days("4h").unwrap(), 0.5);
    }

    #[test]
    fn parses_week_and_month_suffixes() {
        assert_eq!(parse_duration_days("1w").unwrap(), 5.0);
        assert_eq!(parse_duration_days("1mo").unwrap(), 20.0);
    }

    #[test]
    fn trims_trailing_question_mark() {
        assert_eq!(parse_duration_days("2d?").unwrap(), 2.0);
    }

    #[test]
    fn rejects_empty_string() {
        assert_eq!(parse_duration_days(""), Err(DurationParseError::Empty));
    }

    #[test]
    fn rejects_non_numeric_leading_token() {
        assert!(matches!(
            parse_duration_days("abc"),
            Err(DurationParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn parse_lag_supports_sign() {
        assert_eq!(parse_lag_days("-1d").unwrap(), -1.0);
        assert_eq!(parse_lag_days("+0.25d").unwrap(), 0.25);
        assert_eq!(parse_lag_days("2h").unwrap(), 0.25);
    }

    #[test]
    fn format_duration_round_trips_integral_days() {
        assert_eq!(format_duration_days(3.0), "3d");
        assert_eq!(format_duration_days(2.0000000001), "2d");
    }

    #[test]
    fn format_duration_trims_fractional_zeros() {
        assert_eq!(format_duration_days(1.5), "1.5d");
    }

    fn task(uid: Id, level: i32, duration: f64) -> TaskSpec {
        let mut t = TaskSpec::new(uid, format!("T{uid}"), duration);
        t.outline_level = Some(level);
        t
    }

    #[test]
    fn hierarchy_aggregation_sums_children() {
        let tasks = vec![task(1, 0, 0.0), task(2, 1, 2.0), task(3, 1, 3.0)];
        let computed = aggregate_hierarchy(&tasks);
        assert_eq!(computed[&1], 5.0);
    }

    #[test]
    fn hierarchy_aggregation_leaf_keeps_base() {
        let tasks = vec![task(1, 0, 4.0)];
        let computed = aggregate_hierarchy(&tasks);
        assert_eq!(computed[&1], 4.0);
    }

    #[test]
    fn parent_sanity_blanks_mismatched_base() {
        let tasks = vec![task(1, 0, 10.0), task(2, 1, 2.0), task(3, 1, 3.0)];
        let blanked = parents_needing_blank_base(&tasks);
        assert!(blanked.contains(&1));
    }

    #[test]
    fn parent_sanity_keeps_matching_base() {
        let tasks = vec![task(1, 0, 5.0), task(2, 1, 2.0), task(3, 1, 3.0)];
        let blanked = parents_needing_blank_base(&tasks);
        assert!(!blanked.contains(&1));
    }

    #[test]
    fn effective_duration_pulls_up_from_predecessors() {
        let mut targeted = HashSet::new();
        targeted.insert(0);
        let t1 = task(1, 0, 1.0);
        let mut t2 = task(2, 0, 1.0);
        t2.dependencies
            .push(DependencySpec::new(1, cps_core::RelationType::FinishToStart, 0.0));
        let effective = effective_durations(&[t1, t2], &targeted);
        assert_eq!(effective[&2], 1.0);
    }
}
