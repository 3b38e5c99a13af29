// Reading the ballots from the export of the voting form.
//
// Each preference column is named `<role> Candidates [<candidate>]` and each
// cell holds the preference given to that candidate.

use std::collections::{BTreeMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;

use crate::committee::io_common::Table;
use crate::committee::io_members::normalize_usercode;
use crate::committee::*;

pub const VOTES_USERNAME_COLUMN: &str = "What is your UC usercode (abc123)";

/// The ballots of a session, grouped by role label.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SurveyBallots {
    /// The candidates of each role, in column order.
    pub candidates: BTreeMap<String, Vec<String>>,
    /// The rankings of each role, most preferred first.
    pub ballots: BTreeMap<String, Vec<Vec<String>>>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
struct PositionColumn {
    index: usize,
    role: String,
    candidate: String,
}

/// Splits a preference column name into the role and the candidate.
pub fn parse_position(column: &str) -> Option<(String, String)> {
    lazy_static! {
        static ref POSITION_COL_RX: Regex =
            Regex::new(r"^(.+)?[cC]andidates\s+\[(.+)?\]").unwrap();
    }
    let caps = POSITION_COL_RX.captures(column)?;
    let role = caps.get(1)?.as_str().trim().to_string();
    let candidate = caps.get(2)?.as_str().replace('\t', " ");
    if role.is_empty() {
        return None;
    }
    Some((role, candidate))
}

/// The preference in a cell. A list such as `2;1` keeps the smallest number.
pub fn parse_preference(value: &str) -> Option<u32> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let prefs: Result<Vec<u32>, _> = value.split(';').map(|p| p.trim().parse::<u32>()).collect();
    prefs.ok()?.into_iter().min().filter(|p| *p >= 1)
}

fn position_columns(header: &[String]) -> Vec<PositionColumn> {
    header
        .iter()
        .enumerate()
        .filter_map(|(index, col)| {
            parse_position(col).map(|(role, candidate)| PositionColumn {
                index,
                role,
                candidate,
            })
        })
        .collect()
}

// The rankings of one voter, for every role they voted for.
fn read_ballot(
    columns: &[PositionColumn],
    row: &[String],
    voter: &str,
) -> BTreeMap<String, Vec<String>> {
    let mut ranks: BTreeMap<String, BTreeMap<u32, String>> = BTreeMap::new();
    let mut spoiled: HashSet<&str> = HashSet::new();
    for pc in columns.iter() {
        let pref = match parse_preference(Table::cell(row, pc.index)) {
            Some(p) => p,
            None => continue,
        };
        if spoiled.contains(pc.role.as_str()) {
            continue;
        }
        let role_ranks = ranks.entry(pc.role.clone()).or_default();
        if role_ranks.contains_key(&pref) {
            warn!(
                "read_ballot: voter {}: preference {} given twice for {}, ignoring this ballot for {}",
                voter, pref, pc.role, pc.role
            );
            ranks.remove(&pc.role);
            spoiled.insert(pc.role.as_str());
        } else {
            role_ranks.insert(pref, pc.candidate.clone());
        }
    }
    ranks
        .into_iter()
        .map(|(role, role_ranks)| (role, role_ranks.into_values().collect()))
        .collect()
}

/// Reads the ballots of the members. Only the first response of each member is kept.
pub fn read_ballots(
    table: &Table,
    members: &HashSet<String>,
    voter_column: &str,
    path: &str,
) -> VoteResult<SurveyBallots> {
    let voter_idx = table
        .column_index(voter_column)
        .context(MissingColumnSnafu {
            column: voter_column,
            path,
        })?;
    let columns = position_columns(&table.header);
    debug!("read_ballots: {} preference columns", columns.len());

    let mut survey = SurveyBallots::default();
    for pc in columns.iter() {
        let candidates = survey.candidates.entry(pc.role.clone()).or_default();
        if !candidates.contains(&pc.candidate) {
            candidates.push(pc.candidate.clone());
        }
    }

    let mut voters: HashSet<String> = HashSet::new();
    let mut non_members = 0;
    let mut repeats = 0;
    for (lineno, row) in table.rows.iter().enumerate() {
        let voter = normalize_usercode(Table::cell(row, voter_idx));
        if !members.contains(&voter) {
            debug!("read_ballots: line {}: {:?} is not a member", lineno + 2, voter);
            non_members += 1;
            continue;
        }
        if !voters.insert(voter.clone()) {
            debug!("read_ballots: line {}: {:?} already voted", lineno + 2, voter);
            repeats += 1;
            continue;
        }
        for (role, ranking) in read_ballot(&columns, row, &voter) {
            survey.ballots.entry(role).or_default().push(ranking);
        }
    }
    info!(
        "Read the votes of {} members from {} ({} responses from non-members, {} repeated responses ignored)",
        voters.len(),
        path,
        non_members,
        repeats
    );
    Ok(survey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::committee::io_common::parse_csv_table;

    fn members(codes: &[&str]) -> HashSet<String> {
        codes.iter().map(|s| s.to_string()).collect()
    }

    fn vs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn position_columns_names() {
        assert_eq!(
            parse_position("President Candidates [Alice Smith]"),
            Some(("President".to_string(), "Alice Smith".to_string()))
        );
        assert_eq!(
            parse_position("Ordinary Member candidates  [Bob\tJones]"),
            Some(("Ordinary Member".to_string(), "Bob Jones".to_string()))
        );
        assert_eq!(parse_position("Timestamp"), None);
        assert_eq!(parse_position("Candidates [Alice]"), None);
        assert_eq!(parse_position("President Candidates []"), None);
    }

    #[test]
    fn preferences() {
        assert_eq!(parse_preference("2"), Some(2));
        assert_eq!(parse_preference(" 3 "), Some(3));
        assert_eq!(parse_preference("3;1"), Some(1));
        assert_eq!(parse_preference(""), None);
        assert_eq!(parse_preference("0"), None);
        assert_eq!(parse_preference("1;x"), None);
        assert_eq!(parse_preference("first"), None);
    }

    #[test]
    fn ballots_members_only_first_response() {
        let content = "Timestamp,What is your UC usercode (abc123),Chair Candidates [Ann],Chair Candidates [Bo],Chair Candidates [Cy]
t1,abc12,2,1,3
t2,xyz99,1,2,3
t3,ABC12 ,1,2,3
t4,def34,,1,
";
        let table = parse_csv_table(content.as_bytes(), "votes.csv").unwrap();
        let survey = read_ballots(
            &table,
            &members(&["abc12", "def34"]),
            VOTES_USERNAME_COLUMN,
            "votes.csv",
        )
        .unwrap();
        assert_eq!(survey.candidates["Chair"], vs(&["Ann", "Bo", "Cy"]));
        assert_eq!(
            survey.ballots["Chair"],
            vec![vs(&["Bo", "Ann", "Cy"]), vs(&["Bo"])]
        );
    }

    #[test]
    fn repeated_preference_spoils_the_role() {
        let content = "Voter,A Candidates [x],A Candidates [y],A Candidates [z],B Candidates [x],B Candidates [w]
abc12,1,1,2,2,1
";
        let table = parse_csv_table(content.as_bytes(), "votes.csv").unwrap();
        let survey = read_ballots(&table, &members(&["abc12"]), "Voter", "votes.csv").unwrap();
        // The ballot for A is ignored, the ballot for B counts.
        assert!(!survey.ballots.contains_key("A"));
        assert_eq!(survey.ballots["B"], vec![vs(&["w", "x"])]);
        assert_eq!(survey.candidates["A"], vs(&["x", "y", "z"]));
    }

    #[test]
    fn gaps_in_preferences_are_closed() {
        let content = "Voter,R Candidates [a],R Candidates [b],R Candidates [c]
abc12,5,,2
";
        let table = parse_csv_table(content.as_bytes(), "votes.csv").unwrap();
        let survey = read_ballots(&table, &members(&["abc12"]), "Voter", "votes.csv").unwrap();
        assert_eq!(survey.ballots["R"], vec![vs(&["c", "a"])]);
    }

    #[test]
    fn missing_voter_column() {
        let table = parse_csv_table("a,b\n1,2\n".as_bytes(), "votes.csv").unwrap();
        let res = read_ballots(&table, &members(&[]), VOTES_USERNAME_COLUMN, "votes.csv");
        assert!(matches!(res, Err(VoteError::MissingColumn { .. })));
    }
}
