use log::warn;

use crate::error::{Error, Result};
use crate::model::{
    api::tally::{CandidateTally, Tally},
    common::{CandidacyStatus, Phase},
    mongodb::Id,
};
use crate::store::{CandidacyQuery, Store};

use super::Caller;

/// Derives vote counts from the recorded ballots.
pub struct TallyEngine<'a> {
    store: &'a dyn Store,
}

impl<'a> TallyEngine<'a> {
    pub(super) fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Count the votes for every approved candidate.
    ///
    /// Live while voting is open, final once the election is closed. All
    /// counts come from a single read of the ballots, so they always add up
    /// to the reported total.
    pub async fn tally(&self, caller: &Caller, election_id: Id) -> Result<Tally> {
        caller.require_admin()?;
        let election = self
            .store
            .election(election_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
        let phase = election.phase();
        if !phase.has_results() {
            return Err(Error::InvalidState(format!(
                "Election {election_id} is {phase} and has no results yet"
            )));
        }

        let query = CandidacyQuery {
            election_id: Some(election_id),
            status: Some(CandidacyStatus::Approved),
            ..Default::default()
        };
        let candidates = self.store.candidacies(&query).await?;
        let counts = self.store.vote_counts(election_id).await?;

        let candidates: Vec<CandidateTally> = candidates
            .into_iter()
            .map(|candidacy| CandidateTally {
                votes: counts.get(&candidacy.id).copied().unwrap_or(0),
                candidacy_id: candidacy.id.to_string(),
                applicant_name: candidacy.candidacy.applicant_name,
                image_url: candidacy.candidacy.image_url,
            })
            .collect();
        let total_votes = candidates.iter().map(|c| c.votes).sum();

        let recorded: u64 = counts.values().sum();
        if recorded != total_votes {
            warn!(
                "Election {election_id} has {} ballots for candidates no longer on the ballot",
                recorded - total_votes
            );
        }

        Ok(Tally {
            election_id: election_id.to_string(),
            phase,
            is_final: phase == Phase::Closed,
            total_votes,
            candidates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;

    use crate::model::{
        api::election::{ElectionSpec, ElectionUpdate},
        common::Decision,
    };
    use crate::uploads::FileUpload;

    fn manifesto() -> FileUpload {
        FileUpload {
            bytes: b"%PDF-1.4".to_vec(),
            file_name: "manifesto.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
        }
    }

    #[rocket::async_test]
    async fn refused_before_voting() {
        let (engine, _) = engine();
        for (division, phase) in [("A", Phase::Pending), ("B", Phase::CandidatureOpen)] {
            let cohort = crate::model::common::Cohort::new("BCA", 2, division);
            let election = election_in(&engine, cohort, phase).await;
            let err = engine.tally().tally(&admin(), election.id).await.unwrap_err();
            assert!(matches!(err, Error::InvalidState(_)));
        }
        let err = engine.tally().tally(&admin(), Id::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    /// The walkthrough for cohort (BCA, 2, A): two approved candidates, one
    /// rejected, three voters, one attempted double vote.
    #[rocket::async_test]
    async fn cohort_walkthrough() {
        let (engine, _) = engine();
        let admin = admin();
        let spec = ElectionSpec::example(bca2a());
        let election = engine
            .elections()
            .create(&admin, spec.clone())
            .await
            .unwrap();
        let update = ElectionUpdate {
            spec: spec.clone(),
            phase: Phase::CandidatureOpen,
        };
        engine
            .elections()
            .update(&admin, election.id, update)
            .await
            .unwrap();

        let v1 = voter("Asha", bca2a());
        let v2 = voter("Ravi", bca2a());
        let v3 = voter("Meera", bca2a());
        let c1 = engine.candidacies().apply(&v1, manifesto(), None).await.unwrap();
        let c2 = engine.candidacies().apply(&v2, manifesto(), None).await.unwrap();
        let c3 = engine.candidacies().apply(&v3, manifesto(), None).await.unwrap();
        engine.candidacies().decide(&admin, c1.id, Decision::Approved).await.unwrap();
        engine.candidacies().decide(&admin, c2.id, Decision::Approved).await.unwrap();
        engine.candidacies().decide(&admin, c3.id, Decision::Rejected).await.unwrap();

        let update = ElectionUpdate {
            spec: spec.clone(),
            phase: Phase::VotingOpen,
        };
        engine
            .elections()
            .update(&admin, election.id, update)
            .await
            .unwrap();

        engine.ballot_box().cast(&v1, election.id, c2.id).await.unwrap();
        engine.ballot_box().cast(&v2, election.id, c2.id).await.unwrap();
        engine.ballot_box().cast(&v3, election.id, c1.id).await.unwrap();
        let err = engine
            .ballot_box()
            .cast(&v1, election.id, c1.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyVoted));

        let live = engine.tally().tally(&admin, election.id).await.unwrap();
        assert!(!live.is_final);
        assert_eq!(live.total_votes, 3);
        assert_eq!(live.votes_for(&c1.id.to_string()), Some(1));
        assert_eq!(live.votes_for(&c2.id.to_string()), Some(2));
        assert_eq!(live.votes_for(&c3.id.to_string()), None);
        assert_eq!(live.candidates.iter().map(|c| c.votes).sum::<u64>(), live.total_votes);

        let update = ElectionUpdate {
            spec,
            phase: Phase::Closed,
        };
        engine
            .elections()
            .update(&admin, election.id, update)
            .await
            .unwrap();
        let closed = engine.tally().tally(&admin, election.id).await.unwrap();
        assert!(closed.is_final);
        assert_eq!(closed.total_votes, 3);

        let err = engine
            .ballot_box()
            .cast(&voter("Late", bca2a()), election.id, c1.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VotingClosed));

        let err = engine
            .elections()
            .delete(&admin, election.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[rocket::async_test]
    async fn candidates_without_votes_count_zero() {
        let (engine, _) = engine();
        let admin = admin();
        let election = election_in(&engine, bca2a(), Phase::CandidatureOpen).await;
        let c = engine
            .candidacies()
            .apply(&voter("Asha", bca2a()), manifesto(), None)
            .await
            .unwrap();
        engine.candidacies().decide(&admin, c.id, Decision::Approved).await.unwrap();
        engine
            .elections()
            .advance(election.id, Phase::CandidatureOpen, Phase::VotingOpen)
            .await
            .unwrap();

        let tally = engine.tally().tally(&admin, election.id).await.unwrap();
        assert_eq!(tally.total_votes, 0);
        assert_eq!(tally.votes_for(&c.id.to_string()), Some(0));
    }
}
