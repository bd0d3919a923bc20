//! Inversion arbitration between named requesters and the user override.

use std::collections::BTreeSet;

use crate::common::constants::USER_REASON;

/// Tri-state user preference that trumps every named request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserOverride {
    #[default]
    Unset,
    Inverted,
    NotInverted,
}

impl UserOverride {
    /// Convert from the persisted flag; an absent flag means unset.
    pub fn from_stored(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::Inverted,
            Some(false) => Self::NotInverted,
            None => Self::Unset,
        }
    }

    pub fn as_stored(self) -> Option<bool> {
        match self {
            Self::Inverted => Some(true),
            Self::NotInverted => Some(false),
            Self::Unset => None,
        }
    }
}

/// Holds the active inversion requests and resolves the effective decision.
#[derive(Debug, Default)]
pub struct InversionArbiter {
    requests: BTreeSet<String>,
    user_override: UserOverride,
}

impl InversionArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (`true`) or remove (`false`) a named request.
    ///
    /// Returns whether the request set changed.
    pub fn set_request(&mut self, key: &str, invert: bool) -> bool {
        if invert {
            self.requests.insert(key.to_string())
        } else {
            self.requests.remove(key)
        }
    }

    pub fn has_request(&self, key: &str) -> bool {
        self.requests.contains(key)
    }

    pub fn requests(&self) -> impl Iterator<Item = &str> {
        self.requests.iter().map(String::as_str)
    }

    pub fn user_override(&self) -> UserOverride {
        self.user_override
    }

    pub fn set_user_override(&mut self, value: UserOverride) {
        self.user_override = value;
    }

    /// The reason the screen should be inverted, or `None` to leave it normal.
    ///
    /// An explicit override wins. Otherwise the lexicographically smallest
    /// requester key is reported.
    pub fn effective(&self) -> Option<&str> {
        match self.user_override {
            UserOverride::Inverted => Some(USER_REASON),
            UserOverride::NotInverted => None,
            UserOverride::Unset => self.requests.first().map(String::as_str),
        }
    }

    /// Apply a user toggle.
    ///
    /// `Some(value)` pins the override. `None` flips the current outcome when no
    /// override is set, and otherwise hands control back to the requests.
    pub fn toggle(&mut self, value: Option<bool>) {
        self.user_override = match (value, self.user_override) {
            (Some(true), _) => UserOverride::Inverted,
            (Some(false), _) => UserOverride::NotInverted,
            (None, UserOverride::Unset) => {
                if self.effective().is_some() {
                    UserOverride::NotInverted
                } else {
                    UserOverride::Inverted
                }
            }
            (None, _) => UserOverride::Unset,
        };
    }
}
