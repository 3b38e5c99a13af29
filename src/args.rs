use clap::Parser;

/// This is a committee election tabulation program, using the Meek single transferable vote.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The export of the voting form, in CSV or Excel (.xlsx) format.
    #[clap(value_parser)]
    pub votes: String,

    /// (file path) The membership roll for the current year, in CSV or Excel (.xlsx) format.
    #[clap(value_parser)]
    pub members: String,

    /// (file path) The JSON description of the roles in the committee.
    #[clap(value_parser, default_value = "roles.json")]
    pub roles: String,

    /// (file path, 'stdout' or empty) If specified, the summary of the session will be written in JSON format to the given
    /// location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing the outcome of a session in JSON format. If provided, meekvote will
    /// check that the tabulated output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (default lexicographic) How ties are broken: lexicographic, candidate_order or random.
    #[clap(long, value_parser)]
    pub tiebreak: Option<String>,

    /// The seed of the random tiebreak.
    #[clap(long, value_parser)]
    pub random_seed: Option<u32>,

    /// (default 1e-6) The relative tolerance used to compare a tally with the quota.
    #[clap(long, value_parser)]
    pub tolerance: Option<f64>,

    /// (default "No Confidence") The name of the candidate standing for no confidence.
    #[clap(long, value_parser)]
    pub no_confidence: Option<String>,

    /// (default "UC Username") The column of the membership roll holding the usercodes.
    #[clap(long, value_parser)]
    pub members_column: Option<String>,

    /// (default "What is your UC usercode (abc123)") The column of the votes holding the usercode of the voter.
    #[clap(long, value_parser)]
    pub voter_column: Option<String>,

    /// (default: the first one) When using an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
