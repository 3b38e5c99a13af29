use log::{debug, info, warn};

use meek_stv::*;
use snafu::{prelude::*, Snafu};

use std::collections::BTreeSet;
use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::committee::config_reader::*;
use crate::committee::io_common::read_table;
use crate::committee::io_members::read_members;
use crate::committee::io_survey::{read_ballots, SurveyBallots};

pub mod config_reader;
mod io_common;
mod io_members;
mod io_survey;

#[derive(Debug, Snafu)]
pub enum VoteError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error reading line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error opening workbook {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The workbook {path} has no worksheet {sheet:?}"))]
    MissingWorksheet { path: String, sheet: String },
    #[snafu(display("The first worksheet of {path} is empty"))]
    EmptyExcel { path: String },
    #[snafu(display("Error parsing the JSON content of {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing the summary to {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Column {column:?} is missing from {path}"))]
    MissingColumn { column: String, path: String },
    #[snafu(display("Unknown tiebreak mode {mode:?}"))]
    UnknownTiebreak { mode: String },
    #[snafu(display("Difference detected between calculated summary and reference summary"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type VoteResult<T> = Result<T, VoteError>;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElectedEntry {
    pub name: String,
    pub tally: String,
}

/// The outcome of the election for one role.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RoleOutcome {
    pub role: String,
    pub seats: u32,
    pub elected: Vec<ElectedEntry>,
    pub quota: Option<String>,
    pub rounds: Option<u32>,
    #[serde(rename = "noConfidenceElected")]
    pub no_confidence_elected: bool,
    pub error: Option<String>,
}

impl RoleOutcome {
    fn elected(role: &Role, result: &ElectionResult, no_confidence_elected: bool) -> RoleOutcome {
        RoleOutcome {
            role: role.name.clone(),
            seats: role.number_of_positions,
            elected: result
                .elected
                .iter()
                .map(|ec| ElectedEntry {
                    name: ec.name.clone(),
                    tally: format!("{:.6}", ec.tally),
                })
                .collect(),
            quota: Some(format!("{:.6}", result.quota)),
            rounds: Some(result.rounds),
            no_confidence_elected,
            error: None,
        }
    }

    fn failed(role: &Role, error: &MeekErrors) -> RoleOutcome {
        RoleOutcome {
            role: role.name.clone(),
            seats: role.number_of_positions,
            elected: Vec::new(),
            quota: None,
            rounds: None,
            no_confidence_elected: false,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub roles: Vec<RoleOutcome>,
    /// Everybody disqualified by the end of the session.
    pub disqualified: Vec<String>,
}

/// Runs the election of every role, in order.
///
/// The winners of a role that cannot be held in conjunction with another one are
/// passed on to the following roles as disqualified candidates.
pub fn elect_roles(
    roles: &[Role],
    survey: &SurveyBallots,
    settings: &ElectionSettings,
) -> SessionSummary {
    let (outcomes, disqualified) = roles.iter().fold(
        (Vec::new(), BTreeSet::new()),
        |(mut outcomes, disqualified), role| {
            let (outcome, next) = elect_role(role, survey, &disqualified, settings);
            outcomes.push(outcome);
            (outcomes, next)
        },
    );
    SessionSummary {
        roles: outcomes,
        disqualified: disqualified.into_iter().collect(),
    }
}

// Returns the outcome and the disqualified candidates for the next roles.
fn elect_role(
    role: &Role,
    survey: &SurveyBallots,
    disqualified: &BTreeSet<String>,
    settings: &ElectionSettings,
) -> (RoleOutcome, BTreeSet<String>) {
    let label = role.label();
    let names: Vec<String> = survey.candidates.get(label).cloned().unwrap_or_default();
    let candidates: Vec<Candidate> = names
        .iter()
        .map(|name| Candidate {
            name: name.clone(),
            disqualified: disqualified.contains(name),
        })
        .collect();
    let ballots: Vec<Ballot> = survey
        .ballots
        .get(label)
        .map(|rankings| {
            rankings
                .iter()
                .map(|ranking| Ballot {
                    candidates: ranking.clone(),
                    count: 1,
                })
                .collect()
        })
        .unwrap_or_default();
    info!(
        "Role {}: {} candidates, {} ballots, {} seat(s)",
        role.name,
        candidates.len(),
        ballots.len(),
        role.number_of_positions
    );

    let rules = VoteRules {
        number_of_seats: role.number_of_positions,
        ..settings.rules.clone()
    };

    println!();
    println!("Results for election of {}:", role.name);
    match run_election(&ballots, &rules, &candidates) {
        Ok(result) => {
            for (idx, ec) in result.elected.iter().enumerate() {
                println!("{}. {}", idx + 1, ec.name);
            }
            let no_confidence_elected = result
                .elected
                .iter()
                .any(|ec| ec.name == settings.no_confidence);
            if no_confidence_elected {
                warn!("Role {}: {} was elected", role.name, settings.no_confidence);
                println!("!!! {} was elected !!!", settings.no_confidence);
            }

            let mut next = disqualified.clone();
            if !role.held_in_conjunction {
                println!(
                    "{} may not be held in conjunction with any other role, eliminating elected candidates from further elections...",
                    role.name
                );
                next.extend(
                    result
                        .winners()
                        .into_iter()
                        .filter(|name| *name != settings.no_confidence),
                );
            }
            debug!("elect_role: disqualified after {}: {:?}", role.name, next);
            (
                RoleOutcome::elected(role, &result, no_confidence_elected),
                next,
            )
        }
        Err(e) => {
            warn!("Role {}: {}", role.name, e);
            println!("Could not elect a valid candidate!");
            println!(
                "Our candidates: {:?}, disqualified candidates: {:?}.",
                names, disqualified
            );
            println!("{}", e);
            (RoleOutcome::failed(role, &e), disqualified.clone())
        }
    }
}

fn build_summary_js(summary: &SessionSummary) -> VoteResult<JSValue> {
    serde_json::to_value(summary).context(ParsingJsonSnafu { path: "summary" })
}

fn write_summary(out: &str, pretty_js_stats: &str) -> VoteResult<()> {
    if out == "stdout" {
        println!("{}", pretty_js_stats);
        return Ok(());
    }
    info!("Writing summary to {}", out);
    fs::write(out, pretty_js_stats).context(WritingSummarySnafu { path: out })
}

fn compare_with_reference(summary_ref: &JSValue, pretty_js_stats: &str) -> VoteResult<()> {
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(summary_ref).context(ParsingJsonSnafu { path: "reference" })?;
    if pretty_js_summary_ref != pretty_js_stats {
        warn!("Found differences with the reference summary");
        print_diff(
            pretty_js_summary_ref.as_str(),
            pretty_js_stats,
            "\n",
        );
        return ReferenceMismatchSnafu {}.fail();
    }
    Ok(())
}

pub fn run_session(settings: &SessionSettings) -> VoteResult<()> {
    info!("settings: {:?}", settings);
    let members_table = read_table(&settings.members_path, None)?;
    let members = read_members(
        &members_table,
        &settings.members_column,
        &settings.members_path,
    )?;
    info!(
        "Read {} members from {}",
        members.len(),
        settings.members_path
    );

    let votes_table = read_table(&settings.votes_path, settings.worksheet.as_deref())?;
    let survey = read_ballots(
        &votes_table,
        &members,
        &settings.voter_column,
        &settings.votes_path,
    )?;
    let roles = read_roles(&settings.roles_path)?;

    let summary = elect_roles(&roles, &survey, &settings.election);

    let pretty_js_stats = serde_json::to_string_pretty(&build_summary_js(&summary)?)
        .context(ParsingJsonSnafu { path: "summary" })?;
    if let Some(out) = &settings.out {
        write_summary(out, &pretty_js_stats)?;
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &settings.reference {
        let summary_ref = read_summary(summary_p)?;
        compare_with_reference(&summary_ref, &pretty_js_stats)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::committee::io_common::parse_csv_table;
    use crate::committee::io_members::MEMBERS_USERNAME_COLUMN;
    use crate::committee::io_survey::VOTES_USERNAME_COLUMN;

    const MEMBERS: &str = "UC Username,Name
abc12,Ann
def345,Dan
ghij67,Gil
klm89,Kim
nop10,Noa
zz1,Bad
";

    const VOTES: &str = "Timestamp,What is your UC usercode (abc123),President Candidates [Alice],President Candidates [Bob],President Candidates [No Confidence],Secretary Candidates [Alice],Secretary Candidates [Carol]
t1,ABC12,1,2,,1,2
t2,def345,1;3,2,3,1,2
t3,ghij67,2,1,,1,2
t4,klm89,1,1,,,1
t5,abc12,2,1,,2,1
t6,xyz99,2,1,,2,1
t7,nop10,1,,,2,1
";

    const ROLES: &str = r#"[
        {"name": "President", "held_in_conjunction": false, "number_of_positions": 1},
        {"name": "Treasurer", "held_in_conjunction": false, "number_of_positions": 1},
        {"name": "Secretary", "held_in_conjunction": true, "number_of_positions": 1}
    ]"#;

    fn settings() -> ElectionSettings {
        ElectionSettings {
            rules: VoteRules::DEFAULT_RULES,
            no_confidence: DEFAULT_NO_CONFIDENCE.to_string(),
        }
    }

    fn survey() -> SurveyBallots {
        let members_table = parse_csv_table(MEMBERS.as_bytes(), "members.csv").unwrap();
        let members = read_members(&members_table, MEMBERS_USERNAME_COLUMN, "members.csv").unwrap();
        let votes_table = parse_csv_table(VOTES.as_bytes(), "votes.csv").unwrap();
        read_ballots(&votes_table, &members, VOTES_USERNAME_COLUMN, "votes.csv").unwrap()
    }

    #[test]
    fn winners_are_disqualified_from_later_roles() {
        let roles = parse_roles(ROLES, "roles.json").unwrap();
        let summary = elect_roles(&roles, &survey(), &settings());

        assert_eq!(summary.roles.len(), 3);
        let president = &summary.roles[0];
        assert_eq!(
            president.elected,
            vec![ElectedEntry {
                name: "Alice".to_string(),
                tally: "2.000000".to_string()
            }]
        );
        assert_eq!(president.quota, Some("2.000000".to_string()));
        assert_eq!(president.error, None);

        // Nobody stood for treasurer. The session goes on.
        let treasurer = &summary.roles[1];
        assert!(treasurer.elected.is_empty());
        assert!(treasurer.error.is_some());

        // Alice would have won, but she already is president.
        let secretary = &summary.roles[2];
        assert_eq!(
            secretary.elected,
            vec![ElectedEntry {
                name: "Carol".to_string(),
                tally: "5.000000".to_string()
            }]
        );
        assert_eq!(summary.disqualified, vec!["Alice".to_string()]);
    }

    #[test]
    fn roles_held_in_conjunction_keep_their_winners() {
        let roles = vec![
            Role {
                name: "Secretary".to_string(),
                column_name: None,
                held_in_conjunction: true,
                number_of_positions: 1,
            },
            Role {
                name: "Chair".to_string(),
                column_name: Some("Secretary".to_string()),
                held_in_conjunction: true,
                number_of_positions: 1,
            },
        ];
        let summary = elect_roles(&roles, &survey(), &settings());
        assert_eq!(summary.roles[0].elected[0].name, "Alice");
        assert_eq!(summary.roles[1].elected[0].name, "Alice");
        assert!(summary.disqualified.is_empty());
    }

    #[test]
    fn no_confidence_is_never_disqualified() {
        let mut survey = SurveyBallots::default();
        survey.candidates.insert(
            "Chair".to_string(),
            vec!["Zoe".to_string(), "No Confidence".to_string()],
        );
        survey.ballots.insert(
            "Chair".to_string(),
            vec![
                vec!["No Confidence".to_string()],
                vec!["No Confidence".to_string(), "Zoe".to_string()],
                vec!["Zoe".to_string()],
            ],
        );
        let roles = vec![Role {
            name: "Chair".to_string(),
            column_name: None,
            held_in_conjunction: false,
            number_of_positions: 1,
        }];
        let summary = elect_roles(&roles, &survey, &settings());
        assert_eq!(summary.roles[0].elected[0].name, "No Confidence");
        assert!(summary.roles[0].no_confidence_elected);
        assert!(summary.disqualified.is_empty());
    }

    #[test]
    fn too_many_seats_is_reported() {
        let roles = vec![Role {
            name: "President".to_string(),
            column_name: None,
            held_in_conjunction: false,
            number_of_positions: 4,
        }];
        let summary = elect_roles(&roles, &survey(), &settings());
        let outcome = &summary.roles[0];
        assert!(outcome.elected.is_empty());
        assert!(outcome
            .error
            .as_ref()
            .unwrap()
            .starts_with("cannot fill 4 seat(s)"));
    }

    #[test]
    fn reference_comparison() {
        let roles = parse_roles(ROLES, "roles.json").unwrap();
        let summary = elect_roles(&roles, &survey(), &settings());
        let js = build_summary_js(&summary).unwrap();
        let pretty = serde_json::to_string_pretty(&js).unwrap();

        let same: JSValue = serde_json::from_str(&pretty).unwrap();
        assert!(compare_with_reference(&same, &pretty).is_ok());

        let mut other = same.clone();
        other["disqualified"] = serde_json::json!(["Bob"]);
        assert!(matches!(
            compare_with_reference(&other, &pretty),
            Err(VoteError::ReferenceMismatch {})
        ));
    }
}
