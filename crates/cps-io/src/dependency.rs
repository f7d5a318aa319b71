//! Dependency-string parsing shared by the CSV `predecessors` column and
//! the standalone dependency-string adapter contract (SPEC_FULL.md §6).

use cps_core::{DependencySpec, Id, RelationType, ScheduleError};
use cps_solver::duration::parse_lag_days;

/// Parses the CSV `predecessors` column: semicolon-separated entries of
/// the form `UID` or `UID:TYPE:LAG_DAYS`. A chunk count other than 1 or 3
/// is rejected.
pub fn parse_csv_predecessors(raw: &str) -> Result<Vec<DependencySpec>, ScheduleError> {
    let mut deps = Vec::new();
    for entry in raw.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
        let dependency = match parts.as_slice() {
            [uid] => {
                let predecessor_uid = parse_uid(uid)?;
                DependencySpec::new(predecessor_uid, RelationType::default(), 0.0)
            }
            [uid, relation, lag] => {
                let predecessor_uid = parse_uid(uid)?;
                let relation_type = relation
                    .parse::<RelationType>()
                    .map_err(|_| ScheduleError::UnsupportedRelation((*relation).to_string()))?;
                let lag_days: f64 = lag
                    .parse()
                    .map_err(|_| ScheduleError::InvalidDependencyFormat(entry.to_string()))?;
                DependencySpec::new(predecessor_uid, relation_type, lag_days)
            }
            _ => return Err(ScheduleError::InvalidDependencyFormat(entry.to_string())),
        };
        deps.push(dependency);
    }
    Ok(deps)
}

fn parse_uid(text: &str) -> Result<Id, ScheduleError> {
    text.parse()
        .map_err(|_| ScheduleError::InvalidDependencyFormat(text.to_string()))
}

/// Parses the standalone dependency-string contract: tokens split on
/// `[,;\n]`, each of the form `<UID>[<TYPE>][<±lag unit>]` where TYPE
/// defaults to FS and lag follows the duration grammar (`h|d|w|mo`).
pub fn parse_dependency_string(raw: &str) -> Result<Vec<DependencySpec>, ScheduleError> {
    let mut deps = Vec::new();
    for token in raw.split(|c| c == ',' || c == ';' || c == '\n') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        deps.push(parse_dependency_token(token)?);
    }
    Ok(deps)
}

fn parse_dependency_token(token: &str) -> Result<DependencySpec, ScheduleError> {
    let digits_end = token
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(token.len());
    if digits_end == 0 {
        return Err(ScheduleError::InvalidDependencyFormat(token.to_string()));
    }
    let predecessor_uid = parse_uid(&token[..digits_end])?;
    let mut rest = &token[digits_end..];

    let relation_type = ["FS", "SS", "FF", "SF"]
        .into_iter()
        .find(|code| rest.len() >= 2 && rest[..2].eq_ignore_ascii_case(code))
        .map(|code| {
            rest = &rest[2..];
            code.parse::<RelationType>().expect("known relation code")
        })
        .unwrap_or_default();

    let rest = rest.trim();
    let lag_days = if rest.is_empty() {
        0.0
    } else {
        parse_lag_days(rest).map_err(|_| ScheduleError::InvalidDependencyFormat(token.to_string()))?
    };

    Ok(DependencySpec::new(predecessor_uid, relation_type, lag_days))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_predecessor_bare_uid_defaults_to_fs() {
        let deps = parse_csv_predecessors("5").unwrap();
        assert_eq!(deps, vec![DependencySpec::new(5, RelationType::FinishToStart, 0.0)]);
    }

    #[test]
    fn csv_predecessor_with_type_and_lag() {
        let deps = parse_csv_predecessors("5:SS:2").unwrap();
        assert_eq!(deps, vec![DependencySpec::new(5, RelationType::StartToStart, 2.0)]);
    }

    #[test]
    fn csv_predecessor_rejects_wrong_chunk_count() {
        assert!(parse_csv_predecessors("5:SS").is_err());
    }

    #[test]
    fn csv_predecessor_handles_multiple_semicolon_separated_entries() {
        let deps = parse_csv_predecessors("1;2:FF:-1").unwrap();
        assert_eq!(deps.len(), 2);
    }

    #[test]
    fn dependency_string_token_with_type_and_lag() {
        let deps = parse_dependency_string("3SS+2h").unwrap();
        assert_eq!(deps, vec![DependencySpec::new(3, RelationType::StartToStart, 0.25)]);
    }

    #[test]
    fn dependency_string_token_bare_uid() {
        let deps = parse_dependency_string("7").unwrap();
        assert_eq!(deps, vec![DependencySpec::new(7, RelationType::FinishToStart, 0.0)]);
    }

    #[test]
    fn dependency_string_multiple_tokens() {
        let deps = parse_dependency_string("1, 2FF-1d; 3\n4SS").unwrap();
        assert_eq!(deps.len(), 4);
    }

    #[test]
    fn dependency_string_rejects_missing_uid() {
        assert!(parse_dependency_string("FS+2d").is_err());
    }
}
