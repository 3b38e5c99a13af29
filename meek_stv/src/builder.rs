pub use crate::config::*;

/// A builder for adding votes.
///
/// ```
/// pub use meek_stv::builder::Builder;
/// pub use meek_stv::VoteRules;
/// # use meek_stv::MeekErrors;
///
/// let mut builder = Builder::new(&VoteRules::with_seats(1))?
///     .candidates(&["Anna".to_string(), "Bob".to_string()])?;
///
/// builder.add_vote(&["Anna".to_string(), "Bob".to_string()], 3)?;
/// builder.add_vote_simple(&["Bob".to_string()])?;
///
/// let result = builder.run()?;
/// assert_eq!(result.winners(), vec!["Anna".to_string()]);
///
/// # Ok::<(), MeekErrors>(())
/// ```
pub struct Builder {
    pub(crate) _rules: VoteRules,
    pub(crate) _candidates: Option<Vec<Candidate>>,
    pub(crate) _votes: Vec<Ballot>,
}

impl Builder {
    pub fn new(rules: &VoteRules) -> Result<Builder, MeekErrors> {
        Ok(Builder {
            _rules: rules.clone(),
            _candidates: None,
            _votes: Vec::new(),
        })
    }

    /// Registers the candidates. Votes added before are dropped.
    pub fn candidates(self, cands: &[String]) -> Result<Builder, MeekErrors> {
        Ok(Builder {
            _rules: self._rules,
            _candidates: Some(cands.iter().map(|name| Candidate::new(name)).collect()),
            _votes: Vec::new(),
        })
    }

    /// Marks some registered candidates as disqualified.
    ///
    /// Names that are not registered are ignored: a disqualification list is
    /// often shared between several elections.
    pub fn disqualify(self, names: &[String]) -> Result<Builder, MeekErrors> {
        let cands = self._candidates.ok_or_else(|| {
            MeekErrors::InvalidConfiguration(
                "candidates must be registered before disqualifying them".to_string(),
            )
        })?;
        Ok(Builder {
            _rules: self._rules,
            _candidates: Some(
                cands
                    .into_iter()
                    .map(|c| Candidate {
                        disqualified: c.disqualified || names.contains(&c.name),
                        name: c.name,
                    })
                    .collect(),
            ),
            _votes: self._votes,
        })
    }

    /// Adds the vote of a single voter.
    pub fn add_vote_simple(&mut self, candidates: &[String]) -> Result<(), MeekErrors> {
        self.add_vote(candidates, 1)
    }

    /// Adds a ranking cast by `count` voters, most preferred candidate first.
    pub fn add_vote(&mut self, candidates: &[String], count: u64) -> Result<(), MeekErrors> {
        if let Some(valid_candidates) = self._candidates.as_deref() {
            if let Some(unknown) = candidates
                .iter()
                .find(|name| !valid_candidates.iter().any(|cd| cd.name == **name))
            {
                return Err(MeekErrors::InvalidConfiguration(format!(
                    "unknown candidate {:?}",
                    unknown
                )));
            }
        }
        self.add_vote_2(&Ballot {
            candidates: candidates.to_vec(),
            count,
        })
    }

    pub fn add_vote_2(&mut self, vote: &Ballot) -> Result<(), MeekErrors> {
        self._votes.push(vote.clone());
        Ok(())
    }

    /// Runs the election.
    ///
    /// If no candidates were registered, they are inferred from the votes in
    /// order of first appearance.
    pub fn run(&self) -> Result<ElectionResult, MeekErrors> {
        let candidates: Vec<Candidate> = match &self._candidates {
            Some(cands) => cands.clone(),
            None => {
                let mut names: Vec<String> = Vec::new();
                for v in self._votes.iter() {
                    for name in v.candidates.iter() {
                        if !names.contains(name) {
                            names.push(name.clone());
                        }
                    }
                }
                names.iter().map(|name| Candidate::new(name)).collect()
            }
        };
        crate::run_election(&self._votes, &self._rules, &candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(ns: &[&str]) -> Vec<String> {
        ns.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn infers_candidates_from_votes() {
        let mut builder = Builder::new(&VoteRules::with_seats(1)).unwrap();
        builder.add_vote(&names(&["A", "B"]), 60).unwrap();
        builder.add_vote(&names(&["B", "A"]), 40).unwrap();
        let res = builder.run().unwrap();
        assert_eq!(res.winners(), names(&["A"]));
    }

    #[test]
    fn disqualified_candidates_are_skipped() {
        let mut builder = Builder::new(&VoteRules::with_seats(1))
            .unwrap()
            .candidates(&names(&["D", "E", "F"]))
            .unwrap()
            .disqualify(&names(&["D", "Somebody else"]))
            .unwrap();
        builder.add_vote(&names(&["D", "E"]), 10).unwrap();
        builder.add_vote(&names(&["F"]), 4).unwrap();
        let res = builder.run().unwrap();
        assert_eq!(res.winners(), names(&["E"]));
    }

    #[test]
    fn rejects_unknown_candidates() {
        let mut builder = Builder::new(&VoteRules::with_seats(1))
            .unwrap()
            .candidates(&names(&["A", "B"]))
            .unwrap();
        assert!(builder.add_vote_simple(&names(&["A", "Zed"])).is_err());
        assert!(Builder::new(&VoteRules::with_seats(1))
            .unwrap()
            .disqualify(&names(&["A"]))
            .is_err());
    }
}
