use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::db::candidate::{Candidate, NewCandidate, VoteRecord};

/// A candidate as submitted by an admin.
///
/// There is no ledger or count: a new candidate always starts with no votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    #[serde(default)]
    pub party: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
}

impl TryFrom<CandidateSpec> for NewCandidate {
    type Error = Error;

    fn try_from(spec: CandidateSpec) -> Result<Self> {
        check_name(&spec.name)?;
        Ok(Self::new(spec.name, spec.party, spec.age))
    }
}

/// A partial update to a candidate. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub party: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
}

impl CandidatePatch {
    /// Validate the patch and turn it into a `$set` update.
    ///
    /// Returns `None` if there is nothing to change.
    pub fn into_update(self) -> Result<Option<Document>> {
        let mut set = Document::new();
        if let Some(name) = self.name {
            check_name(&name)?;
            set.insert("name", name);
        }
        if let Some(party) = self.party {
            set.insert("party", party);
        }
        if let Some(age) = self.age {
            set.insert("age", i64::from(age));
        }

        if set.is_empty() {
            Ok(None)
        } else {
            Ok(Some(doc! { "$set": set }))
        }
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::BadRequest("Candidate name is required".to_string()));
    }
    Ok(())
}

/// API-friendly representation of a vote ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecordDesc {
    pub user: String,
    pub voted_at: DateTime<Utc>,
}

impl From<VoteRecord> for VoteRecordDesc {
    fn from(record: VoteRecord) -> Self {
        Self {
            user: record.user.to_string(),
            voted_at: record.voted_at.to_chrono(),
        }
    }
}

/// API-friendly representation of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescription {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    pub votes: Vec<VoteRecordDesc>,
    pub vote_count: u64,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        let core = candidate.candidate;
        Self {
            id: candidate.id.to_string(),
            name: core.name,
            party: core.party,
            age: core.age,
            votes: core.votes.into_iter().map(Into::into).collect(),
            vote_count: core.vote_count,
        }
    }
}

/// Response to a successful creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCreated {
    pub response: CandidateDescription,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_candidates_start_without_votes() {
        let candidate = NewCandidate::try_from(CandidateSpec::example2()).unwrap();
        assert!(candidate.votes.is_empty());
        assert_eq!(candidate.vote_count, 0);
        assert_eq!(candidate.age, Some(52));
    }

    #[test]
    fn blank_names_are_rejected() {
        let spec = CandidateSpec {
            name: "   ".to_string(),
            ..CandidateSpec::example()
        };
        assert!(matches!(
            NewCandidate::try_from(spec),
            Err(Error::BadRequest(_))
        ));

        let patch = CandidatePatch {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(patch.into_update(), Err(Error::BadRequest(_))));
    }

    #[test]
    fn patch_only_sets_given_fields() {
        let patch = CandidatePatch {
            party: Some("Z".to_string()),
            age: Some(40),
            ..Default::default()
        };
        let update = patch.into_update().unwrap().unwrap();
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get_str("party").unwrap(), "Z");
        assert_eq!(set.get_i64("age").unwrap(), 40);
    }

    #[test]
    fn empty_patch_is_no_update() {
        assert_eq!(CandidatePatch::default().into_update().unwrap(), None);
    }
}
