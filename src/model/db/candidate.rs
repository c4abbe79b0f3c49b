use std::ops::{Deref, DerefMut};

use mongodb::bson::{doc, DateTime, Document};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// One entry in a candidate's vote ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    /// The user who cast the vote.
    pub user: Id,
    pub voted_at: DateTime,
}

impl VoteRecord {
    /// A vote by the given user, cast now.
    pub fn new(user: Id) -> Self {
        Self {
            user,
            voted_at: DateTime::now(),
        }
    }

    /// The update that appends this record to a candidate's ledger and bumps its count.
    ///
    /// Both happen in one document update, so `voteCount` never drifts from the ledger length.
    pub fn append_update(&self) -> Document {
        doc! {
            "$push": {
                "votes": {
                    "user": self.user,
                    "votedAt": self.voted_at,
                }
            },
            "$inc": {
                "voteCount": 1,
            },
        }
    }
}

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateCore {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    /// Append-only ledger, one entry per voter.
    #[serde(default)]
    pub votes: Vec<VoteRecord>,
    #[serde(default)]
    pub vote_count: u64,
}

impl CandidateCore {
    /// A new candidate with no votes.
    pub fn new(name: String, party: Option<String>, age: Option<u32>) -> Self {
        Self {
            name,
            party,
            age,
            votes: Vec::new(),
            vote_count: 0,
        }
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// The projection of a candidate needed for the tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTotal {
    pub party: Option<String>,
    #[serde(default)]
    pub vote_count: u64,
}

impl CandidateTotal {
    /// The fields to fetch.
    pub fn projection() -> Document {
        doc! {
            "_id": 0,
            "party": 1,
            "voteCount": 1,
        }
    }
}
