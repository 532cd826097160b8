use std::fmt::{Display, Formatter};

use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lowest year of study a cohort can be in.
pub const MIN_YEAR: i32 = 1;
/// Highest year of study a cohort can be in.
pub const MAX_YEAR: i32 = 3;

/// The `(course, year, division)` triple that scopes an election.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cohort {
    pub course: String,
    pub year: i32,
    pub division: String,
}

impl Cohort {
    pub fn new(course: impl Into<String>, year: i32, division: impl Into<String>) -> Self {
        Self {
            course: course.into(),
            year,
            division: division.into(),
        }
    }

    /// Reject cohorts that could never have been issued to a student.
    ///
    /// Cohorts are compared exactly, so padded fields are refused rather
    /// than letting `"BCA "` and `"BCA"` count as different cohorts.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("Course", &self.course), ("Division", &self.division)] {
            if value.trim() != value.as_str() {
                return Err(Error::InvalidInput(format!(
                    "{field} must not start or end with whitespace"
                )));
            }
        }
        if self.course.chars().count() < 2 {
            return Err(Error::InvalidInput(
                "Course must be at least 2 characters".to_string(),
            ));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&self.year) {
            return Err(Error::InvalidInput(format!(
                "Year must be between {MIN_YEAR} and {MAX_YEAR}"
            )));
        }
        if self.division.is_empty() {
            return Err(Error::InvalidInput("Division must not be empty".to_string()));
        }
        Ok(())
    }

    /// Equality filter on the flattened cohort fields.
    pub fn as_doc(&self) -> Document {
        doc! {
            "course": &self.course,
            "year": self.year,
            "division": &self.division,
        }
    }
}

impl Display for Cohort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} year {} division {}", self.course, self.year, self.division)
    }
}
