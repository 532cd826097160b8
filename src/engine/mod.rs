//! The election lifecycle and voting integrity engine.
//!
//! Each component borrows the shared collaborators from [`Engine`] and is
//! handed an explicit [`Caller`] for every operation; nothing is cached
//! between calls.

use std::sync::Arc;

use log::{error, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{api::auth::Rights, common::Cohort, mongodb::Id};
use crate::store::Store;
use crate::uploads::FileStorage;

mod ballot_box;
mod candidacy;
mod elections;
mod eligibility;
mod scheduler;
mod tally;

pub use ballot_box::BallotBox;
pub use candidacy::CandidacyWorkflow;
pub use elections::ElectionStateMachine;
pub use eligibility::EligibilityResolver;
pub use scheduler::PhaseScheduler;
pub use tally::TallyEngine;

/// Who is performing an operation, as vouched for by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: Id,
    pub rights: Rights,
    pub name: String,
    /// Absent for administrators and for students with an incomplete profile.
    pub cohort: Option<Cohort>,
}

impl Caller {
    pub fn voter(id: Id, name: impl Into<String>, cohort: Cohort) -> Self {
        Self {
            id,
            rights: Rights::Voter,
            name: name.into(),
            cohort: Some(cohort),
        }
    }

    pub fn admin(id: Id, name: impl Into<String>) -> Self {
        Self {
            id,
            rights: Rights::Admin,
            name: name.into(),
            cohort: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.rights == Rights::Admin
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(Error::Unauthorized("administrator rights required".to_string()))
        }
    }

    pub fn require_voter(&self) -> Result<()> {
        if self.rights == Rights::Voter {
            Ok(())
        } else {
            Err(Error::Unauthorized("only students may do this".to_string()))
        }
    }
}

/// Entry point to every engine component.
pub struct Engine {
    store: Arc<dyn Store>,
    files: Arc<dyn FileStorage>,
    scheduler: PhaseScheduler,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        files: Arc<dyn FileStorage>,
        phase_retry: chrono::Duration,
    ) -> Self {
        let scheduler = PhaseScheduler::new(store.clone(), phase_retry);
        Self {
            store,
            files,
            scheduler,
        }
    }

    pub fn scheduler(&self) -> &PhaseScheduler {
        &self.scheduler
    }

    pub fn eligibility(&self) -> EligibilityResolver<'_> {
        EligibilityResolver::new(self.store.as_ref())
    }

    pub fn elections(&self) -> ElectionStateMachine<'_> {
        ElectionStateMachine::new(self.store.as_ref(), &self.scheduler)
    }

    pub fn candidacies(&self) -> CandidacyWorkflow<'_> {
        CandidacyWorkflow::new(self.store.as_ref(), self.files.as_ref())
    }

    pub fn ballot_box(&self) -> BallotBox<'_> {
        BallotBox::new(self.store.as_ref())
    }

    pub fn tally(&self) -> TallyEngine<'_> {
        TallyEngine::new(self.store.as_ref())
    }
}

/// A fairing that builds the [`Engine`] from the managed config, store and
/// file storage, schedules phase changes for every running election, and
/// places the engine into managed state.
/// This fairing must be attached after the fairings providing its inputs.
pub struct EngineFairing;

#[rocket::async_trait]
impl Fairing for EngineFairing {
    fn info(&self) -> Info {
        Info {
            name: "Election engine",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (store, files, retry) = match (
            rocket.state::<Arc<dyn Store>>(),
            rocket.state::<Arc<dyn FileStorage>>(),
            rocket.state::<Config>(),
        ) {
            (Some(store), Some(files), Some(config)) => {
                (store.clone(), files.clone(), config.phase_retry())
            }
            _ => {
                error!("Config, store and file storage must be available before the engine");
                return Err(rocket);
            }
        };
        let engine = Engine::new(store, files, retry);

        info!("Scheduling phase changes...");
        if let Err(e) = engine.scheduler().schedule_all().await {
            error!("Failed to schedule phase changes: {e}");
            return Err(rocket);
        }
        info!("...phase changes scheduled!");

        // Manage the state.
        rocket = rocket.manage(engine);
        Ok(rocket)
    }
}
