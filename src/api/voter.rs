use rocket::{serde::json::Json, Route, State};

use crate::{
    engine::Engine,
    error::{Error, Result},
    model::{
        api::{
            auth::{AuthToken, Voter},
            ballot::{BallotReceipt, VoteRequest},
            candidacy::{ApplicationSpec, CandidacyDescription},
            election::ActiveElection,
        },
        mongodb::Id,
    },
    uploads::FileUpload,
};

pub fn routes() -> Vec<Route> {
    routes![
        get_cohort_election,
        count_approved,
        apply,
        get_own_application,
        cast_vote,
        has_voted,
    ]
}

/// The election the voter's cohort is taking part in, with the candidates
/// that have been approved so far.
#[get("/voter/election")]
async fn get_cohort_election(
    token: AuthToken<Voter>,
    engine: &State<Engine>,
) -> Result<Json<Option<ActiveElection>>> {
    let election = match engine.eligibility().resolve(&token.caller()).await? {
        Some(election) => election,
        None => return Ok(Json(None)),
    };
    let candidates = engine.candidacies().approved(election.id).await?;
    Ok(Json(Some(ActiveElection {
        election: election.into(),
        candidates: candidates.into_iter().map(Into::into).collect(),
    })))
}

#[get("/voter/election/approved")]
async fn count_approved(token: AuthToken<Voter>, engine: &State<Engine>) -> Result<Json<u64>> {
    let count = engine
        .candidacies()
        .count_approved_for_voter(&token.caller())
        .await?;
    Ok(Json(count))
}

#[post("/voter/candidacy", data = "<application>", format = "json")]
async fn apply(
    token: AuthToken<Voter>,
    application: Json<ApplicationSpec>,
    engine: &State<Engine>,
) -> Result<Json<CandidacyDescription>> {
    let application = application.0;
    let manifesto = FileUpload::try_from(application.manifesto)?;
    let image = application.image.map(FileUpload::try_from).transpose()?;
    let candidacy = engine
        .candidacies()
        .apply(&token.caller(), manifesto, image)
        .await?;
    Ok(Json(candidacy.into()))
}

#[get("/voter/candidacy")]
async fn get_own_application(
    token: AuthToken<Voter>,
    engine: &State<Engine>,
) -> Result<Json<Option<CandidacyDescription>>> {
    let candidacy = engine.candidacies().own_application(&token.caller()).await?;
    Ok(Json(candidacy.map(Into::into)))
}

#[post("/voter/elections/<election_id>/vote", data = "<vote>", format = "json")]
async fn cast_vote(
    token: AuthToken<Voter>,
    election_id: Id,
    vote: Json<VoteRequest>,
    engine: &State<Engine>,
) -> Result<Json<BallotReceipt>> {
    // A malformed ID cannot name a candidate on the ballot.
    let candidacy_id: Id = vote
        .candidacy_id
        .parse()
        .map_err(|_| Error::InvalidCandidate)?;
    let ballot = engine
        .ballot_box()
        .cast(&token.caller(), election_id, candidacy_id)
        .await?;
    Ok(Json(ballot.into()))
}

#[get("/voter/elections/<election_id>/voted")]
async fn has_voted(
    token: AuthToken<Voter>,
    election_id: Id,
    engine: &State<Engine>,
) -> Result<Json<bool>> {
    let voted = engine
        .ballot_box()
        .has_voted(&token.caller(), election_id)
        .await?;
    Ok(Json(voted))
}
