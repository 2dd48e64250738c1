use super::role::Role;
use chrono::{NaiveDate, Utc};

pub const DEFAULT_USER: &str = "admin@dashboard.com";

/// Session settings for a [`Dashboard`](crate::dashboard::Dashboard).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    current_user: String,
    initial_role: Role,
    // when false, roles only gate what the presentation layer offers
    enforce_roles: bool,
    // pins the end of the revenue history window; defaults to the current UTC date
    today: Option<NaiveDate>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            current_user: DEFAULT_USER.to_string(),
            initial_role: Role::Admin,
            enforce_roles: false,
            today: None,
        }
    }
}

impl DashboardConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_current_user(mut self, user: impl Into<String>) -> Self {
        self.current_user = user.into();
        self
    }
    pub fn set_initial_role(mut self, role: Role) -> Self {
        self.initial_role = role;
        self
    }
    pub fn set_enforce_roles(mut self, enforce: bool) -> Self {
        self.enforce_roles = enforce;
        self
    }
    pub fn set_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn current_user(&self) -> &str {
        &self.current_user
    }
    pub fn initial_role(&self) -> Role {
        self.initial_role
    }
    pub fn enforce_roles(&self) -> bool {
        self.enforce_roles
    }
    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}
