use crate::args::Args;
use crate::committee::io_members::MEMBERS_USERNAME_COLUMN;
use crate::committee::io_survey::VOTES_USERNAME_COLUMN;
use crate::committee::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

pub const DEFAULT_NO_CONFIDENCE: &str = "No Confidence";

/// A role of the committee, as described in the roles file.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    /// The label of the role in the vote columns, when it differs from the name.
    #[serde(default)]
    pub column_name: Option<String>,
    pub held_in_conjunction: bool,
    pub number_of_positions: u32,
}

impl Role {
    pub fn label(&self) -> &str {
        match &self.column_name {
            Some(c) if !c.is_empty() => c.as_str(),
            _ => self.name.as_str(),
        }
    }
}

/// The settings shared by the elections of all the roles.
#[derive(PartialEq, Debug, Clone)]
pub struct ElectionSettings {
    /// The number of seats is overridden for each role.
    pub rules: VoteRules,
    pub no_confidence: String,
}

#[derive(PartialEq, Debug, Clone)]
pub struct SessionSettings {
    pub votes_path: String,
    pub members_path: String,
    pub roles_path: String,
    pub members_column: String,
    pub voter_column: String,
    pub worksheet: Option<String>,
    pub out: Option<String>,
    pub reference: Option<String>,
    pub election: ElectionSettings,
}

impl SessionSettings {
    pub fn from_args(args: &Args) -> VoteResult<SessionSettings> {
        let tiebreak_mode = parse_tiebreak(args.tiebreak.as_deref(), args.random_seed)?;
        let tolerance = match args.tolerance {
            Some(t) if !(t > 0.0 && t < 1.0) => {
                whatever!("The tolerance must be between 0 and 1, got {}", t)
            }
            Some(t) => t,
            None => VoteRules::DEFAULT_RULES.tolerance,
        };
        let rules = VoteRules {
            tiebreak_mode,
            tolerance,
            ..VoteRules::DEFAULT_RULES
        };
        Ok(SessionSettings {
            votes_path: args.votes.clone(),
            members_path: args.members.clone(),
            roles_path: args.roles.clone(),
            members_column: args
                .members_column
                .clone()
                .unwrap_or_else(|| MEMBERS_USERNAME_COLUMN.to_string()),
            voter_column: args
                .voter_column
                .clone()
                .unwrap_or_else(|| VOTES_USERNAME_COLUMN.to_string()),
            worksheet: args.excel_worksheet_name.clone(),
            out: args.out.clone().filter(|s| !s.is_empty()),
            reference: args.reference.clone(),
            election: ElectionSettings {
                rules,
                no_confidence: args
                    .no_confidence
                    .clone()
                    .unwrap_or_else(|| DEFAULT_NO_CONFIDENCE.to_string()),
            },
        })
    }
}

fn parse_tiebreak(mode: Option<&str>, seed: Option<u32>) -> VoteResult<TieBreakMode> {
    match (mode, seed) {
        (None, _) | (Some("lexicographic"), _) => Ok(TieBreakMode::Lexicographic),
        (Some("candidate_order"), _) => Ok(TieBreakMode::UseCandidateOrder),
        (Some("random"), Some(s)) => Ok(TieBreakMode::Random(s)),
        (Some("random"), None) => whatever!("The random tiebreak requires --random-seed"),
        (Some(x), _) => UnknownTiebreakSnafu { mode: x }.fail(),
    }
}

pub fn parse_roles(contents: &str, path: &str) -> VoteResult<Vec<Role>> {
    serde_json::from_str(contents).context(ParsingJsonSnafu { path })
}

pub fn read_roles(path: &str) -> VoteResult<Vec<Role>> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let roles = parse_roles(contents.as_str(), path)?;
    info!("Read {} roles from {}", roles.len(), path);
    Ok(roles)
}

pub fn read_summary(path: &str) -> VoteResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn roles_column_name_defaults_to_name() {
        let roles = parse_roles(
            r#"[
                {"name": "President", "held_in_conjunction": false, "number_of_positions": 1},
                {"name": "Ordinary Member", "column_name": "OCM", "held_in_conjunction": true, "number_of_positions": 3}
            ]"#,
            "roles.json",
        )
        .unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(roles[0].label(), "President");
        assert_eq!(roles[1].label(), "OCM");
        assert_eq!(roles[1].number_of_positions, 3);
        assert!(roles[1].held_in_conjunction);
    }

    #[test]
    fn roles_missing_field() {
        let res = parse_roles(r#"[{"name": "President"}]"#, "roles.json");
        assert!(matches!(res, Err(VoteError::ParsingJson { .. })));
    }

    #[test]
    fn tiebreak_parsing() {
        assert_eq!(
            parse_tiebreak(None, None).unwrap(),
            TieBreakMode::Lexicographic
        );
        assert_eq!(
            parse_tiebreak(Some("candidate_order"), None).unwrap(),
            TieBreakMode::UseCandidateOrder
        );
        assert_eq!(
            parse_tiebreak(Some("random"), Some(42)).unwrap(),
            TieBreakMode::Random(42)
        );
        assert!(parse_tiebreak(Some("random"), None).is_err());
        assert!(matches!(
            parse_tiebreak(Some("coin"), None),
            Err(VoteError::UnknownTiebreak { .. })
        ));
    }

    #[test]
    fn settings_from_args() {
        let args = Args::parse_from([
            "meekvote",
            "votes.csv",
            "members.xlsx",
            "--tiebreak",
            "random",
            "--random-seed",
            "7",
            "--out",
            "stdout",
        ]);
        let settings = SessionSettings::from_args(&args).unwrap();
        assert_eq!(settings.roles_path, "roles.json");
        assert_eq!(settings.members_column, MEMBERS_USERNAME_COLUMN);
        assert_eq!(settings.voter_column, VOTES_USERNAME_COLUMN);
        assert_eq!(settings.out, Some("stdout".to_string()));
        assert_eq!(settings.election.rules.tiebreak_mode, TieBreakMode::Random(7));
        assert_eq!(settings.election.no_confidence, DEFAULT_NO_CONFIDENCE);

        let args = Args::parse_from(["meekvote", "v.csv", "m.csv", "--tolerance", "2"]);
        assert!(SessionSettings::from_args(&args).is_err());
    }
}
