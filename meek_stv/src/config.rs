// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// A ranked ballot: candidate names, most preferred first.
///
/// `count` is the number of voters who cast exactly this ranking.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Ballot {
    pub candidates: Vec<String>,
    pub count: u64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Candidate {
    pub name: String,
    /// A disqualified candidate starts the election with a keep value of zero:
    /// it can never be elected and every ballot passes through it.
    pub disqualified: bool,
}

impl Candidate {
    pub fn new(name: &str) -> Candidate {
        Candidate {
            name: name.to_string(),
            disqualified: false,
        }
    }
}

// ******** Output data structures *********

#[derive(PartialEq, Debug, Clone)]
pub struct ElectedCandidate {
    pub name: String,
    /// The last tally at which this candidate was confirmed.
    pub tally: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ElectionResult {
    /// The winners, in the order they were elected.
    pub elected: Vec<ElectedCandidate>,
    /// The quota of the final round.
    pub quota: f64,
    pub rounds: u32,
}

impl ElectionResult {
    pub fn winners(&self) -> Vec<String> {
        self.elected.iter().map(|ec| ec.name.clone()).collect()
    }

    pub fn tally_of(&self, name: &str) -> Option<f64> {
        self.elected
            .iter()
            .find(|ec| ec.name == name)
            .map(|ec| ec.tally)
    }
}

/// Errors that prevent the algorithm from completing successfully.
#[derive(PartialEq, Debug, Clone)]
pub enum MeekErrors {
    /// No candidates, or no ballot weight at all.
    EmptyElection,
    /// The inputs were rejected before the first round.
    InvalidConfiguration(String),
    /// Fewer candidates are still eligible than there are seats to fill.
    ExhaustedCandidatePool { seats: u32, eligible: Vec<String> },
    NoConvergence { rounds: u32 },
}

impl Error for MeekErrors {}

impl Display for MeekErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeekErrors::EmptyElection => write!(f, "the election has no candidates or no votes"),
            MeekErrors::InvalidConfiguration(msg) => write!(f, "invalid configuration: {}", msg),
            MeekErrors::ExhaustedCandidatePool { seats, eligible } => write!(
                f,
                "cannot fill {} seat(s): only {} eligible candidate(s) remain {:?}",
                seats,
                eligible.len(),
                eligible
            ),
            MeekErrors::NoConvergence { rounds } => {
                write!(f, "no stable result after {} rounds", rounds)
            }
        }
    }
}

// ********* Configuration **********

/// How ties between candidates with the same tally are resolved.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TieBreakMode {
    /// The candidate whose name sorts last is eliminated first.
    Lexicographic,
    /// The candidate listed last is eliminated first.
    UseCandidateOrder,
    /// Candidates are ordered by a SHA-256 digest of the seed, the round number
    /// and their name. The outcome is hard to guess in advance but reproducible.
    Random(u32),
}

#[derive(PartialEq, Debug, Clone)]
pub struct VoteRules {
    pub number_of_seats: u32,
    pub tiebreak_mode: TieBreakMode,
    /// Relative tolerance used whenever a tally is compared with the quota.
    pub tolerance: f64,
    pub max_rounds: u32,
}

impl VoteRules {
    pub const DEFAULT_RULES: VoteRules = VoteRules {
        number_of_seats: 1,
        tiebreak_mode: TieBreakMode::Lexicographic,
        tolerance: 1e-6,
        max_rounds: 10_000,
    };

    pub fn with_seats(seats: u32) -> VoteRules {
        VoteRules {
            number_of_seats: seats,
            ..VoteRules::DEFAULT_RULES
        }
    }
}
