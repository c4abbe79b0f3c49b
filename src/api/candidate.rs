use mongodb::{
    bson::{doc, oid::Error as OidError},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client,
};
use rocket::{
    futures::TryStreamExt,
    http::Status,
    serde::json::{self, Json},
    Route, State,
};

use crate::error::{Error, Result};
use crate::logging::RequestId;
use crate::model::{
    api::{
        auth::{AdminCheck, AuthToken},
        candidate::{CandidateCreated, CandidateDescription, CandidatePatch, CandidateSpec},
        message::Message,
        tally::{tally, PartyCount},
    },
    db::{
        candidate::{Candidate, CandidateTotal, NewCandidate, VoteRecord},
        user::{Role, User, ALREADY_VOTED},
    },
    mongodb::{
        is_transient_transaction_error, is_unknown_commit_result, Backoff, Coll, Id,
    },
};

const CANDIDATE_NOT_FOUND: &str = "Candidate not found";

pub fn routes() -> Vec<Route> {
    routes![
        create_candidate,
        update_candidate,
        delete_candidate,
        vote,
        vote_count,
        list_candidates,
    ]
}

#[post("/", data = "<spec>")]
async fn create_candidate(
    admin: AdminCheck,
    spec: std::result::Result<Json<CandidateSpec>, json::Error<'_>>,
    new_candidates: Coll<NewCandidate>,
) -> Result<Json<CandidateCreated>> {
    admin.require_admin()?;

    let candidate: NewCandidate = spec?.into_inner().try_into()?;
    let id: Id = new_candidates
        .insert_one(&candidate, None)
        .await?
        .inserted_id
        .as_object_id()
        .ok_or_else(|| {
            Error::Status(
                Status::InternalServerError,
                "Inserted candidate has no ObjectId".to_string(),
            )
        })?
        .into();
    info!("Candidate {id} saved");

    let candidate = Candidate { id, candidate };
    Ok(Json(CandidateCreated {
        response: candidate.into(),
    }))
}

#[put("/<candidate_id>", data = "<patch>")]
async fn update_candidate(
    admin: AdminCheck,
    candidate_id: std::result::Result<Id, OidError>,
    patch: std::result::Result<Json<CandidatePatch>, json::Error<'_>>,
    candidates: Coll<Candidate>,
) -> Result<Json<CandidateDescription>> {
    admin.require_admin()?;

    // Reported as forbidden rather than not found, for compatibility with existing clients.
    let not_found = || Error::Status(Status::Forbidden, CANDIDATE_NOT_FOUND.to_string());
    let update = patch?.into_inner().into_update()?;
    let candidate_id = candidate_id.map_err(|_| not_found())?;

    let updated = match update {
        Some(update) => {
            let options = FindOneAndUpdateOptions::builder()
                .return_document(ReturnDocument::After)
                .build();
            candidates
                .find_one_and_update(candidate_id.as_doc(), update, options)
                .await?
        }
        None => candidates.find_one(candidate_id.as_doc(), None).await?,
    }
    .ok_or_else(not_found)?;
    info!("Candidate {candidate_id} updated");

    Ok(Json(updated.into()))
}

#[delete("/<candidate_id>")]
async fn delete_candidate(
    admin: AdminCheck,
    candidate_id: std::result::Result<Id, OidError>,
    candidates: Coll<Candidate>,
) -> Result<Json<CandidateDescription>> {
    admin.require_admin()?;

    let candidate_id = candidate_id.map_err(|_| Error::not_found(CANDIDATE_NOT_FOUND))?;
    let deleted = candidates
        .find_one_and_delete(candidate_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(CANDIDATE_NOT_FOUND))?;
    info!("Candidate {candidate_id} deleted");

    Ok(Json(deleted.into()))
}

#[post("/vote/<candidate_id>")]
async fn vote(
    token: AuthToken,
    candidate_id: std::result::Result<Id, OidError>,
    request_id: &RequestId,
    candidates: Coll<Candidate>,
    users: Coll<User>,
    db_client: &State<Client>,
) -> Result<Json<Message>> {
    let candidate_id = candidate_id.map_err(|_| Error::not_found(CANDIDATE_NOT_FOUND))?;
    let user_id = token.id;

    // Check the preconditions in order, so each failure gets its own error.
    candidates
        .find_one(candidate_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(CANDIDATE_NOT_FOUND))?;
    let user = users
        .find_one(user_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("user not found"))?;
    user.check_can_vote()?;

    // A transaction that collides with another vote by the same user is rerun after a pause.
    // Once the other vote commits, the rerun is rejected as already voted.
    let mut retries = Backoff::TRANSACTION.start();
    loop {
        let err = match record_vote(db_client, &candidates, &users, candidate_id, user_id).await {
            Err(Error::Db(err)) if is_transient_transaction_error(&err) => err,
            result => break result?,
        };
        if !retries.wait().await {
            error!("req{request_id}: vote transaction still colliding, giving up");
            return Err(err.into());
        }
        warn!(
            "req{request_id}: vote transaction collided, retry {}",
            retries.count()
        );
    }
    info!("req{request_id}: vote recorded for candidate {candidate_id}");

    Ok(Json(Message::new("Vote Recorded Successfully")))
}

/// Atomically append the vote to the candidate's ledger and mark the user as having voted.
///
/// The user is claimed with a conditional update, so of two concurrent votes by the same user
/// exactly one succeeds. Nothing is committed unless both writes succeed.
async fn record_vote(
    db_client: &Client,
    candidates: &Coll<Candidate>,
    users: &Coll<User>,
    candidate_id: Id,
    user_id: Id,
) -> Result<()> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let claim = doc! {
        "_id": user_id,
        "isVoted": false,
        "role": { "$ne": Role::Admin },
    };
    let mark_voted = doc! {
        "$set": { "isVoted": true }
    };
    let result = users
        .update_one_with_session(claim, mark_voted, None, &mut session)
        .await?;
    if result.modified_count != 1 {
        session.abort_transaction().await?;
        return Err(Error::Conflict(ALREADY_VOTED.to_string()));
    }

    let record = VoteRecord::new(user_id);
    let result = candidates
        .update_one_with_session(
            candidate_id.as_doc(),
            record.append_update(),
            None,
            &mut session,
        )
        .await?;
    if result.matched_count != 1 {
        // Deleted since we looked it up.
        session.abort_transaction().await?;
        return Err(Error::not_found(CANDIDATE_NOT_FOUND));
    }

    let mut retries = Backoff::TRANSACTION.start();
    loop {
        let err = match session.commit_transaction().await {
            Err(err) if is_unknown_commit_result(&err) => err,
            result => break Ok(result?),
        };
        if !retries.wait().await {
            return Err(err.into());
        }
        warn!("Outcome of vote commit unknown, committing again");
    }
}

#[get("/vote/count")]
async fn vote_count(totals: Coll<CandidateTotal>) -> Result<Json<Vec<PartyCount>>> {
    let options = FindOptions::builder()
        .projection(CandidateTotal::projection())
        .build();
    let totals: Vec<CandidateTotal> = totals.find(None, options).await?.try_collect().await?;
    Ok(Json(tally(totals)))
}

#[get("/")]
async fn list_candidates(candidates: Coll<Candidate>) -> Result<Json<Vec<CandidateDescription>>> {
    let candidates: Vec<Candidate> = candidates.find(None, None).await?.try_collect().await?;
    if candidates.is_empty() {
        return Err(Error::not_found("candidates not found"));
    }
    Ok(Json(candidates.into_iter().map(Into::into).collect()))
}
