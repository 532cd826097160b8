use crate::error::Result;
use crate::model::{common::Phase, db::election::Election};
use crate::store::Store;

use super::Caller;

/// Maps a voter to the one election their cohort may take part in.
pub struct EligibilityResolver<'a> {
    store: &'a dyn Store,
}

impl<'a> EligibilityResolver<'a> {
    pub(super) fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// The active election for the caller's cohort, if there is one.
    /// Callers without a cohort (administrators, incomplete profiles) never
    /// have one.
    pub async fn resolve(&self, caller: &Caller) -> Result<Option<Election>> {
        match caller.cohort {
            Some(ref cohort) => self.store.active_election(cohort).await,
            None => Ok(None),
        }
    }

    /// As [`resolve`](Self::resolve), but only if the election is in `phase`.
    pub async fn resolve_in(&self, caller: &Caller, phase: Phase) -> Result<Option<Election>> {
        Ok(self
            .resolve(caller)
            .await?
            .filter(|election| election.phase() == phase))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;

    use crate::model::common::Cohort;

    #[rocket::async_test]
    async fn resolves_own_cohort_only() {
        let (engine, _) = engine();
        let election = election_in(&engine, bca2a(), Phase::CandidatureOpen).await;
        election_in(&engine, Cohort::new("BCA", 2, "B"), Phase::CandidatureOpen).await;

        let asha = voter("Asha", bca2a());
        let found = engine.eligibility().resolve(&asha).await.unwrap();
        assert_eq!(found.map(|e| e.id), Some(election.id));

        let stranger = voter("Ravi", Cohort::new("MCA", 1, "A"));
        assert!(engine.eligibility().resolve(&stranger).await.unwrap().is_none());
    }

    #[rocket::async_test]
    async fn no_cohort_no_election() {
        let (engine, _) = engine();
        election_in(&engine, bca2a(), Phase::CandidatureOpen).await;

        let mut incomplete = voter("Asha", bca2a());
        incomplete.cohort = None;
        assert!(engine.eligibility().resolve(&incomplete).await.unwrap().is_none());
        assert!(engine.eligibility().resolve(&admin()).await.unwrap().is_none());
    }

    #[rocket::async_test]
    async fn phase_filter() {
        let (engine, _) = engine();
        election_in(&engine, bca2a(), Phase::Pending).await;

        let asha = voter("Asha", bca2a());
        assert!(engine.eligibility().resolve(&asha).await.unwrap().is_some());
        assert!(engine
            .eligibility()
            .resolve_in(&asha, Phase::CandidatureOpen)
            .await
            .unwrap()
            .is_none());
    }
}
