use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::model::db::candidate::CandidateTotal;

/// One line of the tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyCount {
    pub party: Option<String>,
    pub count: u64,
}

/// Order candidates by vote count, most first.
///
/// Candidates with equal counts keep their storage order.
pub fn tally(totals: Vec<CandidateTotal>) -> Vec<PartyCount> {
    let mut totals = totals;
    totals.sort_by_key(|total| Reverse(total.vote_count));
    totals
        .into_iter()
        .map(|total| PartyCount {
            party: total.party,
            count: total.vote_count,
        })
        .collect()
}
