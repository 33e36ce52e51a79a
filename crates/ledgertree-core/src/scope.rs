//! Scope restricting which accounts and entries a query considers

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Caller-supplied query scope: an organization and an optional date window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatisticsScope {
    pub organization_id: Option<String>,
    /// Inclusive start of the date window
    pub start_date: Option<NaiveDate>,
    /// Inclusive end of the date window
    pub end_date: Option<NaiveDate>,
}

impl StatisticsScope {
    /// Everything, no restriction
    pub fn all() -> Self {
        Self::default()
    }

    pub fn organization(organization_id: &str) -> Self {
        Self {
            organization_id: Some(organization_id.to_string()),
            ..Self::default()
        }
    }

    pub fn with_period(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Check if a date is within the window
    pub fn contains(&self, date: &NaiveDate) -> bool {
        match (self.start_date, self.end_date) {
            (None, None) => true,
            (Some(s), None) => *date >= s,
            (None, Some(e)) => *date <= e,
            (Some(s), Some(e)) => *date >= s && *date <= e,
        }
    }

    /// Whether an account belonging to `organization_id` is in scope
    pub fn includes_organization(&self, organization_id: Option<&str>) -> bool {
        match self.organization_id.as_deref() {
            None => true,
            Some(scope) => organization_id == Some(scope),
        }
    }

    /// Human-readable description for logs
    pub fn description(&self) -> String {
        let organization = self.organization_id.as_deref().unwrap_or("all organizations");
        match (self.start_date, self.end_date) {
            (None, None) => format!("{}, all time", organization),
            (Some(s), None) => format!("{}, from {}", organization, s),
            (None, Some(e)) => format!("{}, until {}", organization, e),
            (Some(s), Some(e)) => format!("{}, {} to {}", organization, s, e),
        }
    }
}
