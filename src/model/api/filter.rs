use mongodb::bson::{doc, Document};
use rocket::FromForm;
use serde::{Deserialize, Serialize};

use crate::model::common::Cohort;

/// Optional filters shared by the administrative list views.
///
/// An absent field matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromForm)]
pub struct ListFilter {
    /// Case-insensitive substring of the election or applicant name.
    pub search: Option<String>,
    pub course: Option<String>,
    pub year: Option<i32>,
    pub division: Option<String>,
}

impl ListFilter {
    fn search(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Does the given name and cohort pass this filter?
    pub fn matches(&self, name: &str, cohort: &Cohort) -> bool {
        let name_ok = self
            .search()
            .map_or(true, |s| name.to_lowercase().contains(&s.to_lowercase()));
        name_ok
            && self.course.as_ref().map_or(true, |c| *c == cohort.course)
            && self.year.map_or(true, |y| y == cohort.year)
            && self.division.as_ref().map_or(true, |d| *d == cohort.division)
    }

    /// The equivalent MongoDB filter, searching the given name field.
    pub fn as_doc(&self, name_field: &str) -> Document {
        let mut filter = Document::new();
        if let Some(search) = self.search() {
            filter.insert(
                name_field,
                doc! { "$regex": regex::escape(search), "$options": "i" },
            );
        }
        if let Some(ref course) = self.course {
            filter.insert("course", course.as_str());
        }
        if let Some(year) = self.year {
            filter.insert("year", year);
        }
        if let Some(ref division) = self.division {
            filter.insert("division", division.as_str());
        }
        filter
    }
}
