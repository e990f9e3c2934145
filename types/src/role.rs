//! Account roles in the family-federation capability hierarchy.
//!
//! Authority order: `Guardian > Steward > Adult > Offspring > Private`.

use crate::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of an account (or of a guardian) within its federation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    /// Self-sovereign account with no family federation.
    Private,
    Offspring,
    Adult,
    Steward,
    Guardian,
}

impl AccountRole {
    /// All roles from lowest to highest authority.
    pub const ALL: [AccountRole; 5] = [
        Self::Private,
        Self::Offspring,
        Self::Adult,
        Self::Steward,
        Self::Guardian,
    ];

    /// Authority rank used for ordering; higher outranks lower.
    pub fn authority(&self) -> u8 {
        match self {
            Self::Private => 0,
            Self::Offspring => 1,
            Self::Adult => 2,
            Self::Steward => 3,
            Self::Guardian => 4,
        }
    }

    /// Whether this role carries at least the authority of `other`.
    pub fn at_least(&self, other: AccountRole) -> bool {
        self.authority() >= other.authority()
    }

    /// Guardians and stewards hold elevated approval authority.
    pub fn is_elevated(&self) -> bool {
        self.at_least(Self::Steward)
    }

    /// Whether the account belongs to a family federation at all.
    pub fn is_federated(&self) -> bool {
        !matches!(self, Self::Private)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Offspring => "offspring",
            Self::Adult => "adult",
            Self::Steward => "steward",
            Self::Guardian => "guardian",
        }
    }
}

impl PartialOrd for AccountRole {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AccountRole {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.authority().cmp(&other.authority())
    }
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountRole {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| TypeError::UnknownVariant {
                kind: "account role",
                value: s.to_string(),
            })
    }
}
