//! Role hierarchy.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// A permission tier.
///
/// Variants are declared from the lowest to the highest tier, so the derived
/// `Ord` gives `Citizen < Admin < Owner` and "has at least role X" is a plain
/// comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Citizen,
    Admin,
    Owner,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Citizen => "citizen",
        }
    }

    /// Label with an icon, used in replies.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Role::Owner => "👑 Owner",
            Role::Admin => "⚡ Admin",
            Role::Citizen => "👤 Citizen",
        }
    }

    /// Returns `true` if this role is at least `required`.
    #[must_use]
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            // Older command tables used "user" for the base tier.
            "citizen" | "user" => Ok(Role::Citizen),
            other => Err(EngineError::InvalidArgument(format!("unknown role \"{other}\""))),
        }
    }
}
