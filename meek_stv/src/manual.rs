/*!

This is the long-form manual for `meek_stv` and `meekvote`.

## The counting method

`meek_stv` implements the Meek variant of the single transferable vote. Every
candidate carries a *keep value* between 0 and 1: the fraction of a ballot
they keep when the ballot reaches them. Each round:

1. Every ballot is walked from its first preference. A candidate with keep
   value `k` receives `k` times what is left of the ballot, and passes the
   rest to the next preference. Whatever is left at the end of the ballot is
   *exhausted*.
2. The quota is `(votes - exhausted) / (seats + 1)`, where `exhausted` is the
   exhausted weight of the previous round (zero in the first round).
3. Every candidate at or above the quota is elected, and their keep value is
   multiplied by `quota / tally` so that they keep exactly one quota. The
   surplus flows to the next preferences of their voters.
4. The count stops when all the seats are filled and every winner sits on
   the quota (relative tolerance `1e-6` by default).
5. If no new candidate reached the quota and no winner has a surplus left to
   pass on, the hopeful candidate with the lowest tally is eliminated: their
   keep value becomes zero and their ballots move on. Winners are never
   eliminated.

Consider the ballot `A D B` where `A` keeps 80%, `D` keeps 20% and `B` keeps
everything: `A` gets 0.8 votes, `D` gets 0.2 × 0.2 = 0.04 and `B` gets
0.2 × 0.8 = 0.16.

When only as many candidates are left as there are seats, they are all
elected.

### Ties

Ties are resolved with the `TieBreakMode` of the rules:
* `Lexicographic` (default) eliminates the tied candidate whose name sorts last
* `UseCandidateOrder` eliminates the tied candidate listed last
* `Random(seed)` orders the tied candidates with a SHA-256 digest of the seed,
  the round number and the names

When more candidates reach the quota than there are open seats, the strongest
are elected first and exact ties use the reverse of the elimination order.

### Disqualified candidates

A disqualified candidate starts with a keep value of zero. They receive
nothing, and ballots ranking them pass through to the next preference as if
they were not listed.

## The `meekvote` program

```bash
meekvote votes.csv members.csv roles.json --out summary.json
```

### Membership roll

A CSV (or `.xlsx`) file with a `UC Username` column (see `--members-column`).
Codes are compared in lower case. Rows whose code is not 3 or 4 letters
followed by 2 or 3 digits are ignored.

### Votes

The export of an online form (CSV or `.xlsx`). The voter is identified by the
column `What is your UC usercode (abc123)` (see `--voter-column`); votes from
non-members are dropped, and only the first response of each member counts.

Every preference column is named after the role and the candidate:

|              | President Candidates [Alice] | President Candidates [Bob] | Secretary Candidates [Carol] |
|--------------|------------------------------|----------------------------|------------------------------|
| ab123        | 2                            | 1                          | 1                            |

A cell holds the preference for that candidate. A list such as `1;2` keeps the
smallest number. Giving the same preference to two candidates of the same role
spoils the ballot for that role.

### Roles

```json
[
  {"name": "President", "held_in_conjunction": false, "number_of_positions": 1},
  {"name": "Ordinary Member", "column_name": "OCM", "held_in_conjunction": true, "number_of_positions": 3}
]
```

Roles are counted in file order. The winners of a role that cannot be held in
conjunction with another one are disqualified from all the following roles.
`column_name` is the role label used in the vote columns, and defaults to the
name.

A candidate named `No Confidence` (see `--no-confidence`) is counted like any
other candidate. If they win, a warning is printed, and they are never
disqualified from later roles.

### Output

The winners of each role are printed. With `--out`, a JSON summary is written;
with `--reference`, the summary is compared with a previous one and the
differences are printed.

 */
