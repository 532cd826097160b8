mod candidacy;
mod cohort;
mod phase;

pub use candidacy::{CandidacyStatus, Decision};
pub use cohort::{Cohort, MAX_YEAR, MIN_YEAR};
pub use phase::Phase;
