mod config;
pub mod builder;
pub mod manual;

use log::{debug, info};

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

pub use crate::config::*;

// **** Private structures ****

type RoundId = u32;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
struct CandidateId(u32);

impl CandidateId {
    fn idx(self) -> usize {
        self.0 as usize
    }
}

// All the ballots sharing the same ranking, folded together.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
struct VoteSignature {
    // May be empty, in which case the whole weight is exhausted.
    ranks: Vec<CandidateId>,
    // Guaranteed to never be zero at construction
    count: u64,
}

/// The keep value of every candidate, indexed by candidate id.
///
/// A round only ever reads a snapshot. The elector and the eliminator hand
/// back a new snapshot instead of updating the current one in place.
#[derive(PartialEq, Debug, Clone)]
struct KeepValues(Vec<f64>);

impl KeepValues {
    fn initial(num_candidates: usize, disqualified: &HashSet<CandidateId>) -> KeepValues {
        KeepValues(
            (0..num_candidates)
                .map(|idx| {
                    if disqualified.contains(&CandidateId(idx as u32)) {
                        0.0
                    } else {
                        1.0
                    }
                })
                .collect(),
        )
    }

    fn get(&self, cid: CandidateId) -> f64 {
        self.0[cid.idx()]
    }

    fn is_continuing(&self, cid: CandidateId) -> bool {
        self.get(cid) > 0.0
    }

    fn continuing(&self) -> Vec<CandidateId> {
        (0..self.0.len())
            .map(|idx| CandidateId(idx as u32))
            .filter(|cid| self.is_continuing(*cid))
            .collect()
    }

    // A keep value never goes above 1, and zero stays zero.
    fn rescaled(&self, factors: &[(CandidateId, f64)]) -> KeepValues {
        let mut values = self.0.clone();
        for (cid, factor) in factors.iter() {
            let v = &mut values[cid.idx()];
            *v = (*v * factor).min(1.0);
        }
        KeepValues(values)
    }

    fn eliminated(&self, cid: CandidateId) -> KeepValues {
        let mut values = self.0.clone();
        values[cid.idx()] = 0.0;
        KeepValues(values)
    }
}

#[derive(PartialEq, Debug, Clone)]
struct RoundTally {
    // One entry per candidate, zero if nobody kept any weight for them.
    counts: Vec<f64>,
    // The weight left at the end of the ballots.
    exhausted: f64,
}

impl RoundTally {
    fn get(&self, cid: CandidateId) -> f64 {
        self.counts[cid.idx()]
    }

    fn total(&self) -> f64 {
        self.counts.iter().sum()
    }
}

/// The elected candidates, in order of election, with their latest tally.
#[derive(PartialEq, Debug, Clone, Default)]
struct ElectedSet(Vec<(CandidateId, f64)>);

impl ElectedSet {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn contains(&self, cid: CandidateId) -> bool {
        self.0.iter().any(|(cid2, _)| *cid2 == cid)
    }

    fn ids(&self) -> Vec<CandidateId> {
        self.0.iter().map(|(cid, _)| *cid).collect()
    }

    /// Refreshes the tally of every member and appends the newcomers of this round.
    fn refreshed(&self, tally: &RoundTally, chosen: &[CandidateId]) -> ElectedSet {
        let mut members: Vec<(CandidateId, f64)> = self
            .0
            .iter()
            .map(|(cid, _)| (*cid, tally.get(*cid)))
            .collect();
        for cid in chosen.iter() {
            if !self.contains(*cid) {
                members.push((*cid, tally.get(*cid)));
            }
        }
        ElectedSet(members)
    }
}

// What the elector decided for one round.
#[derive(PartialEq, Debug, Clone)]
struct ElectedDelta {
    // Members confirmed again and newcomers, possibly empty.
    chosen: Vec<CandidateId>,
    // The newcomers alone.
    admitted: Vec<CandidateId>,
    keep: KeepValues,
}

struct CheckResult {
    votes: Vec<VoteSignature>,
    // Candidates are in the same order as provided.
    candidates: Vec<(String, CandidateId)>,
    disqualified: HashSet<CandidateId>,
    total_count: u64,
}

impl CheckResult {
    fn name(&self, cid: CandidateId) -> &str {
        self.candidates[cid.idx()].0.as_str()
    }

    fn names(&self, cids: &[CandidateId]) -> Vec<String> {
        cids.iter().map(|cid| self.name(*cid).to_string()).collect()
    }
}

// The state of a run once it stopped.
struct FinalState {
    winners: Vec<(CandidateId, f64)>,
    quota: f64,
    rounds: u32,
    keep: KeepValues,
    tally: RoundTally,
}

/// Runs a Meek STV election for the given ballots.
///
/// Arguments:
/// * `coll` the ballots to process
/// * `rules` the rules that govern this election, including the number of seats
/// * `candidates` the registered candidates. Every name on a ballot must be one of them.
///
/// On success, exactly `rules.number_of_seats` candidates are returned.
pub fn run_election(
    coll: &[Ballot],
    rules: &VoteRules,
    candidates: &[Candidate],
) -> Result<ElectionResult, MeekErrors> {
    info!(
        "Processing {:?} ballots, candidates: {:?}, rules: {:?}",
        coll.len(),
        candidates,
        rules
    );

    let cr = checks(coll, candidates, rules)?;
    info!(
        "Processing {:?} aggregated ballots, total weight {:?}",
        cr.votes.len(),
        cr.total_count
    );
    for (name, cid) in cr.candidates.iter() {
        if cr.disqualified.contains(cid) {
            info!("Candidate: {}: {} (disqualified)", cid.0, name);
        } else {
            info!("Candidate: {}: {}", cid.0, name);
        }
    }

    let fs = run_rounds(&cr, rules)?;
    for (cid, count) in fs.winners.iter() {
        info!("Elected: {} with {:.6} votes", cr.name(*cid), count);
    }
    Ok(ElectionResult {
        elected: fs
            .winners
            .iter()
            .map(|(cid, tally)| ElectedCandidate {
                name: cr.name(*cid).to_string(),
                tally: *tally,
            })
            .collect(),
        quota: fs.quota,
        rounds: fs.rounds,
    })
}

fn run_rounds(cr: &CheckResult, rules: &VoteRules) -> Result<FinalState, MeekErrors> {
    let seats = rules.number_of_seats as usize;
    let total = cr.total_count as f64;

    let mut keep = KeepValues::initial(cr.candidates.len(), &cr.disqualified);
    let eligible = keep.continuing();
    if eligible.len() < seats {
        return Err(MeekErrors::ExhaustedCandidatePool {
            seats: rules.number_of_seats,
            eligible: cr.names(&eligible),
        });
    }

    let mut elected = ElectedSet::default();
    // Exhausted weight of the previous round
    let mut exhausted = 0.0;
    for round_id in 1..=rules.max_rounds {
        let tally = tabulate(&cr.votes, &keep);
        let quota = compute_quota(total, exhausted, rules.number_of_seats);
        info!(
            "Round {} (quota: {:.6}, exhausted: {:.6})",
            round_id, quota, tally.exhausted
        );
        for (name, cid) in cr.candidates.iter() {
            debug!(
                "run_rounds: {:>12.6} {} (keep {:.6})",
                tally.get(*cid),
                name,
                keep.get(*cid)
            );
        }

        let continuing = keep.continuing();
        if continuing.len() == seats {
            debug!("run_rounds: as many candidates left as seats, electing all of them");
            let winners = fill_remaining_seats(&continuing, &elected, &tally, rules, cr, round_id);
            return Ok(FinalState {
                winners,
                quota,
                rounds: round_id,
                keep,
                tally,
            });
        }

        let delta = apply_election(&tally, &keep, &elected, quota, rules, cr, round_id);
        debug!("run_rounds: chosen this round: {:?}", cr.names(&delta.chosen));
        elected = elected.refreshed(&tally, &delta.chosen);

        if check_done(&elected, quota, seats, rules.tolerance) {
            return Ok(FinalState {
                winners: elected.0,
                quota,
                rounds: round_id,
                keep: delta.keep,
                tally,
            });
        }

        // Re-confirming members at quota is not progress.
        keep = if delta.admitted.is_empty() && !has_surplus(&elected, quota, rules.tolerance) {
            let (loser, next_keep) =
                eliminate_weakest(&tally, &delta.keep, &elected, rules, cr, round_id)?;
            info!(
                "Round {}: eliminating {} ({:.6} votes)",
                round_id,
                cr.name(loser),
                tally.get(loser)
            );
            next_keep
        } else {
            delta.keep
        };
        exhausted = total - tally.total();
    }
    Err(MeekErrors::NoConvergence {
        rounds: rules.max_rounds,
    })
}

/// Distributes every ballot over its rankings according to the keep values.
///
/// Each candidate keeps its share of what is left of the ballot and passes the
/// rest down. The walk never stops early so that the weight is conserved: a
/// candidate with a keep value of zero takes nothing and the next preference
/// receives the full remaining weight.
fn tabulate(votes: &[VoteSignature], keep: &KeepValues) -> RoundTally {
    let mut counts: Vec<f64> = vec![0.0; keep.0.len()];
    let mut exhausted = 0.0;
    for v in votes.iter() {
        let weight = v.count as f64;
        let mut remaining = 1.0;
        for cid in v.ranks.iter() {
            let k = keep.get(*cid);
            counts[cid.idx()] += weight * k * remaining;
            remaining *= 1.0 - k;
        }
        exhausted += weight * remaining;
    }
    RoundTally { counts, exhausted }
}

// Using seats + 1 means no more than `seats` candidates can reach it with disjoint votes.
fn compute_quota(total: f64, exhausted: f64, seats: u32) -> f64 {
    (total - exhausted) / (seats as f64 + 1.0)
}

fn is_close(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance * a.abs().max(b.abs())
}

fn meets_quota(count: f64, quota: f64, tolerance: f64) -> bool {
    count >= quota || is_close(count, quota, tolerance)
}

/// Elects every candidate at or above the quota and scales down their keep value
/// so that they retain exactly one quota.
///
/// Members elected in earlier rounds are evaluated again: eliminations further
/// down may have changed how much weight reaches them.
fn apply_election(
    tally: &RoundTally,
    keep: &KeepValues,
    elected: &ElectedSet,
    quota: f64,
    rules: &VoteRules,
    cr: &CheckResult,
    round_id: RoundId,
) -> ElectedDelta {
    let tolerance = rules.tolerance;
    let mut chosen: Vec<CandidateId> = elected
        .ids()
        .into_iter()
        .filter(|cid| meets_quota(tally.get(*cid), quota, tolerance))
        .collect();

    let newcomers: Vec<CandidateId> = keep
        .continuing()
        .into_iter()
        .filter(|cid| !elected.contains(*cid) && meets_quota(tally.get(*cid), quota, tolerance))
        .collect();
    let open_seats = (rules.number_of_seats as usize).saturating_sub(elected.len());
    let mut admitted = strongest_first(&newcomers, tally, rules.tiebreak_mode, cr, round_id);
    if admitted.len() > open_seats {
        debug!(
            "apply_election: {} candidates reached the quota for {} open seat(s)",
            admitted.len(),
            open_seats
        );
        admitted.truncate(open_seats);
    }
    chosen.extend(admitted.iter().cloned());

    let factors: Vec<(CandidateId, f64)> = chosen
        .iter()
        .filter(|cid| tally.get(**cid) > 0.0)
        .map(|cid| (*cid, quota / tally.get(*cid)))
        .collect();
    ElectedDelta {
        chosen,
        admitted,
        keep: keep.rescaled(&factors),
    }
}

fn check_done(elected: &ElectedSet, quota: f64, seats: usize, tolerance: f64) -> bool {
    elected.len() >= seats
        && elected
            .0
            .iter()
            .all(|(_, count)| is_close(*count, quota, tolerance))
}

// A surplus within tolerance of the quota has nothing left to move.
fn has_surplus(elected: &ElectedSet, quota: f64, tolerance: f64) -> bool {
    elected
        .0
        .iter()
        .any(|(_, count)| *count > quota && !is_close(*count, quota, tolerance))
}

/// Removes the hopeful candidate with the lowest tally.
///
/// Elected candidates are never eliminated. Returns the eliminated candidate
/// and the updated keep values.
fn eliminate_weakest(
    tally: &RoundTally,
    keep: &KeepValues,
    elected: &ElectedSet,
    rules: &VoteRules,
    cr: &CheckResult,
    round_id: RoundId,
) -> Result<(CandidateId, KeepValues), MeekErrors> {
    let hopefuls: Vec<CandidateId> = keep
        .continuing()
        .into_iter()
        .filter(|cid| !elected.contains(*cid))
        .collect();
    if hopefuls.is_empty() {
        return Err(MeekErrors::ExhaustedCandidatePool {
            seats: rules.number_of_seats,
            eligible: cr.names(&keep.continuing()),
        });
    }

    let min_count = hopefuls
        .iter()
        .map(|cid| tally.get(*cid))
        .fold(f64::INFINITY, f64::min);
    let all_smallest: Vec<CandidateId> = hopefuls
        .iter()
        .filter(|cid| {
            let count = tally.get(**cid);
            count == min_count || is_close(count, min_count, rules.tolerance)
        })
        .cloned()
        .collect();
    debug!(
        "eliminate_weakest: all_smallest: {:?}",
        cr.names(&all_smallest)
    );

    let loser = if all_smallest.len() == 1 {
        all_smallest[0]
    } else {
        let queue = elimination_order(&all_smallest, rules.tiebreak_mode, cr, round_id);
        debug!(
            "eliminate_weakest: tiebreak {:?} elimination queue: {:?}",
            rules.tiebreak_mode,
            cr.names(&queue)
        );
        queue[0]
    };
    Ok((loser, keep.eliminated(loser)))
}

/// Orders tied candidates by elimination priority: the first one goes first.
fn elimination_order(
    tied: &[CandidateId],
    tiebreak: TieBreakMode,
    cr: &CheckResult,
    round_id: RoundId,
) -> Vec<CandidateId> {
    let mut res = tied.to_vec();
    match tiebreak {
        TieBreakMode::Lexicographic => {
            res.sort_by(|a, b| cr.name(*b).cmp(cr.name(*a)));
        }
        TieBreakMode::UseCandidateOrder => {
            res.sort();
            res.reverse();
        }
        TieBreakMode::Random(seed) => {
            res = candidate_permutation_crypto(&res, seed, round_id, cr);
        }
    }
    res
}

/// Candidates by decreasing tally. Exact ties go to the candidate that would be
/// eliminated last.
fn strongest_first(
    cands: &[CandidateId],
    tally: &RoundTally,
    tiebreak: TieBreakMode,
    cr: &CheckResult,
    round_id: RoundId,
) -> Vec<CandidateId> {
    let preference: HashMap<CandidateId, usize> = elimination_order(cands, tiebreak, cr, round_id)
        .iter()
        .enumerate()
        .map(|(idx, cid)| (*cid, idx))
        .collect();
    let mut res = cands.to_vec();
    res.sort_by(|a, b| match tally.get(*b).total_cmp(&tally.get(*a)) {
        Ordering::Equal => preference[b].cmp(&preference[a]),
        o => o,
    });
    res
}

fn fill_remaining_seats(
    continuing: &[CandidateId],
    elected: &ElectedSet,
    tally: &RoundTally,
    rules: &VoteRules,
    cr: &CheckResult,
    round_id: RoundId,
) -> Vec<(CandidateId, f64)> {
    let mut winners: Vec<(CandidateId, f64)> = elected
        .ids()
        .into_iter()
        .map(|cid| (cid, tally.get(cid)))
        .collect();
    let rest: Vec<CandidateId> = continuing
        .iter()
        .filter(|cid| !elected.contains(**cid))
        .cloned()
        .collect();
    for cid in strongest_first(&rest, tally, rules.tiebreak_mode, cr, round_id) {
        winners.push((cid, tally.get(cid)));
    }
    winners
}

/// Generates a "random" permutation of the candidates. Random in this context means hard to guess in advance.
/// The order only depends on the seed, the round and the candidate names.
fn candidate_permutation_crypto(
    candidates: &[CandidateId],
    seed: u32,
    num_round: u32,
    cr: &CheckResult,
) -> Vec<CandidateId> {
    let mut data: Vec<(CandidateId, String)> = candidates
        .iter()
        .map(|cid| {
            let key = format!("{:08}{:08}{}", seed, num_round, cr.name(*cid));
            (*cid, sha256::digest(key))
        })
        .collect();
    data.sort_by(|a, b| a.1.cmp(&b.1));
    data.iter().map(|p| p.0).collect()
}

fn overflow_error(idx: usize) -> MeekErrors {
    MeekErrors::InvalidConfiguration(format!(
        "the ballot counts overflow at ballot #{}",
        idx + 1
    ))
}

// Candidates are returned in the same order.
fn checks(
    coll: &[Ballot],
    reg_candidates: &[Candidate],
    rules: &VoteRules,
) -> Result<CheckResult, MeekErrors> {
    debug!("checks: coll size: {:?}", coll.len());
    if rules.number_of_seats == 0 {
        return Err(MeekErrors::InvalidConfiguration(
            "the number of seats must be positive".to_string(),
        ));
    }
    if !(rules.tolerance.is_finite() && rules.tolerance > 0.0) {
        return Err(MeekErrors::InvalidConfiguration(format!(
            "the tolerance must be a positive number, got {}",
            rules.tolerance
        )));
    }
    if rules.max_rounds == 0 {
        return Err(MeekErrors::InvalidConfiguration(
            "the maximum number of rounds must be positive".to_string(),
        ));
    }
    if reg_candidates.is_empty() {
        return Err(MeekErrors::EmptyElection);
    }

    let mut candidates: HashMap<String, CandidateId> = HashMap::new();
    for (idx, c) in reg_candidates.iter().enumerate() {
        if candidates
            .insert(c.name.clone(), CandidateId(idx as u32))
            .is_some()
        {
            return Err(MeekErrors::InvalidConfiguration(format!(
                "candidate {:?} is registered twice",
                c.name
            )));
        }
    }
    let disqualified: HashSet<CandidateId> = reg_candidates
        .iter()
        .enumerate()
        .filter_map(|(idx, c)| {
            if c.disqualified {
                Some(CandidateId(idx as u32))
            } else {
                None
            }
        })
        .collect();

    // Identical rankings are folded together, in order of first appearance.
    let mut votes: Vec<VoteSignature> = Vec::new();
    let mut positions: HashMap<Vec<CandidateId>, usize> = HashMap::new();
    let mut total_count: u64 = 0;
    for (idx, v) in coll.iter().enumerate() {
        if v.count == 0 {
            continue;
        }
        let mut ranks: Vec<CandidateId> = Vec::new();
        for name in v.candidates.iter() {
            let cid = candidates.get(name).ok_or_else(|| {
                MeekErrors::InvalidConfiguration(format!(
                    "ballot #{} ranks unknown candidate {:?}",
                    idx + 1,
                    name
                ))
            })?;
            ranks.push(*cid);
        }
        total_count = total_count
            .checked_add(v.count)
            .ok_or_else(|| overflow_error(idx))?;
        if let Some(pos) = positions.get(&ranks) {
            let sig = &mut votes[*pos];
            sig.count = sig
                .count
                .checked_add(v.count)
                .ok_or_else(|| overflow_error(idx))?;
        } else {
            positions.insert(ranks.clone(), votes.len());
            votes.push(VoteSignature {
                ranks,
                count: v.count,
            });
        }
    }
    if total_count == 0 {
        return Err(MeekErrors::EmptyElection);
    }

    let ordered_candidates: Vec<(String, CandidateId)> = reg_candidates
        .iter()
        .enumerate()
        .map(|(idx, c)| (c.name.clone(), CandidateId(idx as u32)))
        .collect();

    debug!("checks: ordered_candidates {:?}", ordered_candidates);
    Ok(CheckResult {
        votes,
        candidates: ordered_candidates,
        disqualified,
        total_count,
    })
}
