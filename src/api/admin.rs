use rocket::{serde::json::Json, Route, State};

use crate::{
    engine::Engine,
    error::Result,
    model::{
        api::{
            auth::{Admin, AuthToken},
            candidacy::{CandidacyDescription, DecisionRequest},
            election::{ElectionDescription, ElectionDetails, ElectionSpec, ElectionUpdate},
            filter::ListFilter,
            tally::Tally,
        },
        common::CandidacyStatus,
        mongodb::Id,
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        list_elections,
        get_election,
        update_election,
        delete_election,
        election_results,
        list_candidacies,
        decide_candidacy,
    ]
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    engine: &State<Engine>,
) -> Result<Json<ElectionDescription>> {
    let election = engine.elections().create(&token.caller(), spec.0).await?;
    Ok(Json(election.into()))
}

#[get("/elections?<filter..>")]
async fn list_elections(
    token: AuthToken<Admin>,
    filter: ListFilter,
    engine: &State<Engine>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let elections = engine.elections().list(&token.caller(), &filter).await?;
    Ok(Json(elections.into_iter().map(Into::into).collect()))
}

#[get("/elections/<election_id>")]
async fn get_election(
    token: AuthToken<Admin>,
    election_id: Id,
    engine: &State<Engine>,
) -> Result<Json<ElectionDetails>> {
    let details = engine.elections().get(&token.caller(), election_id).await?;
    Ok(Json(details))
}

#[put("/elections/<election_id>", data = "<update>", format = "json")]
async fn update_election(
    token: AuthToken<Admin>,
    election_id: Id,
    update: Json<ElectionUpdate>,
    engine: &State<Engine>,
) -> Result<Json<ElectionDescription>> {
    let election = engine
        .elections()
        .update(&token.caller(), election_id, update.0)
        .await?;
    Ok(Json(election.into()))
}

#[delete("/elections/<election_id>")]
async fn delete_election(
    token: AuthToken<Admin>,
    election_id: Id,
    engine: &State<Engine>,
) -> Result<()> {
    engine.elections().delete(&token.caller(), election_id).await
}

#[get("/elections/<election_id>/results")]
async fn election_results(
    token: AuthToken<Admin>,
    election_id: Id,
    engine: &State<Engine>,
) -> Result<Json<Tally>> {
    let tally = engine.tally().tally(&token.caller(), election_id).await?;
    Ok(Json(tally))
}

#[get("/candidacies?<status>&<filter..>")]
async fn list_candidacies(
    token: AuthToken<Admin>,
    status: Option<CandidacyStatus>,
    filter: ListFilter,
    engine: &State<Engine>,
) -> Result<Json<Vec<CandidacyDescription>>> {
    let candidacies = engine
        .candidacies()
        .list_by_status(&token.caller(), status, filter)
        .await?;
    Ok(Json(candidacies.into_iter().map(Into::into).collect()))
}

#[post("/candidacies/<candidacy_id>/decision", data = "<decision>", format = "json")]
async fn decide_candidacy(
    token: AuthToken<Admin>,
    candidacy_id: Id,
    decision: Json<DecisionRequest>,
    engine: &State<Engine>,
) -> Result<Json<CandidacyDescription>> {
    let candidacy = engine
        .candidacies()
        .decide(&token.caller(), candidacy_id, decision.decision)
        .await?;
    Ok(Json(candidacy.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::serde_json,
    };

    use crate::error::{ErrorBody, ErrorKind};
    use crate::model::common::{Cohort, Decision, Phase};
    use crate::testing::{admin_cookie, voter_cookie};

    use super::*;

    fn bca2a() -> Cohort {
        Cohort::new("BCA", 2, "A")
    }

    async fn create(client: &Client, spec: &ElectionSpec) -> ElectionDescription {
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .cookie(admin_cookie(client))
            .body(serde_json::to_string(spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        response.into_json().await.unwrap()
    }

    async fn update<'c>(
        client: &'c Client,
        id: Id,
        spec: &ElectionSpec,
        phase: Phase,
    ) -> LocalResponse<'c> {
        let update = ElectionUpdate {
            spec: spec.clone(),
            phase,
        };
        client
            .put(uri!(update_election(id)))
            .header(ContentType::JSON)
            .cookie(admin_cookie(client))
            .body(serde_json::to_string(&update).unwrap())
            .dispatch()
            .await
    }

    #[backend_test]
    async fn create_and_get(client: Client) {
        let spec = ElectionSpec::example(bca2a());
        let created = create(&client, &spec).await;
        assert_eq!(created.name, spec.name);
        assert_eq!(created.cohort, bca2a());
        assert_eq!(created.phase, Phase::Pending);
        assert_eq!(created.voting_end_date, spec.voting_end_date);

        let id: Id = created.id.parse().unwrap();
        let response = client
            .get(uri!(get_election(id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let details: ElectionDetails = response.into_json().await.unwrap();
        assert_eq!(details.election, created);
        assert!(details.candidacies.is_empty());

        let response = client
            .get(uri!(get_election(Id::new())))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
        let body: ErrorBody = response.into_json().await.unwrap();
        assert_eq!(body.kind, ErrorKind::NotFound);
    }

    #[backend_test]
    async fn duplicate_cohort_conflicts(client: Client) {
        create(&client, &ElectionSpec::example(bca2a())).await;

        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .cookie(admin_cookie(&client))
            .body(serde_json::to_string(&ElectionSpec::example(bca2a())).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());
        let body: ErrorBody = response.into_json().await.unwrap();
        assert_eq!(body.kind, ErrorKind::Conflict);
    }

    #[backend_test]
    async fn invalid_spec_rejected(client: Client) {
        let mut spec = ElectionSpec::example(Cohort::new("BCA", 7, "A"));
        spec.name = "Year seven".to_string();
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .cookie(admin_cookie(&client))
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::UnprocessableEntity, response.status());
        let body: ErrorBody = response.into_json().await.unwrap();
        assert_eq!(body.kind, ErrorKind::InvalidInput);
    }

    #[backend_test]
    async fn list_with_filters(client: Client) {
        create(&client, &ElectionSpec::example(bca2a())).await;
        create(&client, &ElectionSpec::example(Cohort::new("BCA", 3, "A"))).await;
        create(&client, &ElectionSpec::example(Cohort::new("MCA", 2, "B"))).await;

        for (query, expected) in [
            ("/elections", 3),
            ("/elections?course=BCA", 2),
            ("/elections?course=BCA&year=3", 1),
            ("/elections?division=B", 1),
            ("/elections?search=representative", 3),
            ("/elections?search=captain", 0),
        ] {
            let response = client
                .get(query)
                .cookie(admin_cookie(&client))
                .dispatch()
                .await;
            assert_eq!(Status::Ok, response.status());
            let elections: Vec<ElectionDescription> = response.into_json().await.unwrap();
            assert_eq!(elections.len(), expected, "{query}");
        }
    }

    #[backend_test]
    async fn update_then_delete(client: Client) {
        let spec = ElectionSpec::example(bca2a());
        let created = create(&client, &spec).await;
        let id: Id = created.id.parse().unwrap();

        let response = update(&client, id, &spec, Phase::CandidatureOpen).await;
        assert_eq!(Status::Ok, response.status());
        let updated: ElectionDescription = response.into_json().await.unwrap();
        assert_eq!(updated.phase, Phase::CandidatureOpen);

        let response = client
            .delete(uri!(delete_election(id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let response = client
            .get(uri!(get_election(id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn closed_elections_stay(client: Client) {
        let spec = ElectionSpec::example(bca2a());
        let created = create(&client, &spec).await;
        let id: Id = created.id.parse().unwrap();
        assert_eq!(Status::Ok, update(&client, id, &spec, Phase::Closed).await.status());

        let response = update(&client, id, &spec, Phase::VotingOpen).await;
        assert_eq!(Status::Conflict, response.status());
        let body: ErrorBody = response.into_json().await.unwrap();
        assert_eq!(body.kind, ErrorKind::InvalidState);

        let response = client
            .delete(uri!(delete_election(id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());
    }

    #[backend_test]
    async fn results_before_voting_refused(client: Client) {
        let created = create(&client, &ElectionSpec::example(bca2a())).await;
        let id: Id = created.id.parse().unwrap();
        let response = client
            .get(uri!(election_results(id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());
        let body: ErrorBody = response.into_json().await.unwrap();
        assert_eq!(body.kind, ErrorKind::InvalidState);
    }

    #[backend_test]
    async fn review_candidacies(client: Client) {
        let spec = ElectionSpec::example(bca2a());
        let created = create(&client, &spec).await;
        let id: Id = created.id.parse().unwrap();
        update(&client, id, &spec, Phase::CandidatureOpen).await;

        // A student applies.
        let asha = crate::engine::Caller::voter(Id::new(), "Asha", bca2a());
        let application = crate::model::api::candidacy::ApplicationSpec::example();
        let response = client
            .post("/voter/candidacy")
            .header(ContentType::JSON)
            .cookie(voter_cookie(&client, &asha))
            .body(serde_json::to_string(&application).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let candidacy: CandidacyDescription = response.into_json().await.unwrap();

        let response = client
            .get("/candidacies?status=PENDING&course=BCA")
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let pending: Vec<CandidacyDescription> = response.into_json().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, candidacy.id);

        let candidacy_id: Id = candidacy.id.parse().unwrap();
        let response = client
            .post(uri!(decide_candidacy(candidacy_id)))
            .header(ContentType::JSON)
            .cookie(admin_cookie(&client))
            .body(
                serde_json::to_string(&DecisionRequest {
                    decision: Decision::Approved,
                })
                .unwrap(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let decided: CandidacyDescription = response.into_json().await.unwrap();
        assert_eq!(decided.status, CandidacyStatus::Approved);

        let response = client
            .get("/candidacies?status=PENDING")
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        let pending: Vec<CandidacyDescription> = response.into_json().await.unwrap();
        assert!(pending.is_empty());

        let response = client
            .get(uri!(get_election(id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        let details: ElectionDetails = response.into_json().await.unwrap();
        assert_eq!(details.candidacies.len(), 1);
    }

    #[backend_test]
    async fn admin_routes_need_admin(client: Client) {
        let spec = serde_json::to_string(&ElectionSpec::example(bca2a())).unwrap();

        // No token at all.
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(spec.clone())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        // A student's token.
        let asha = crate::engine::Caller::voter(Id::new(), "Asha", bca2a());
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .cookie(voter_cookie(&client, &asha))
            .body(spec)
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        let response = client.get("/elections").dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }
}
