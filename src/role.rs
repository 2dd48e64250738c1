//! Session roles and the capabilities they grant
use super::error::ValidationError;
use std::fmt;
use std::str::FromStr;

/// Self-selected session role. Nothing verifies it; it only decides what the
/// presentation layer offers and, when enforcement is switched on, what the
/// dashboard accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    Admin,
    Analyst,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    EditData,
    ManageVisibility,
    Export,
    AdminPanel,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Analyst, Role::Viewer];

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::Export => true,
            Capability::EditData | Capability::ManageVisibility | Capability::AdminPanel => {
                *self == Role::Admin
            }
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Analyst => "analyst",
            Role::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "analyst" => Ok(Role::Analyst),
            "viewer" => Ok(Role::Viewer),
            _ => Err(ValidationError::UnknownRole(s.to_string())),
        }
    }
}
