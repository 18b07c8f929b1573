//! Domain types for credential and session management.
//!
//! Newtypes and enums shared by the store, the services and the HTTP adapter.
//! Nothing here touches the database or the hasher.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier of a user record.
///
/// Assigned by the store at insertion time and never reused.
///
/// # Examples
///
/// ```rust
/// use keyward::domain::UserId;
///
/// let id = UserId::new(5);
/// assert_eq!(id.value(), 5);
/// assert_eq!(id.to_string(), "5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i32);

impl UserId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for UserId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl From<UserId> for i32 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// Forgot-password workflow state of a single user.
///
/// `None --request--> Pending --resolve--> Resolved`; a new request may be
/// filed from any state and always lands in `Pending`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryStatus {
    #[default]
    None,
    Pending,
    Resolved,
}

impl RecoveryStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pending => "pending",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecoveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "" => Ok(Self::None),
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            other => Err(format!("unknown recovery status: {other}")),
        }
    }
}

/// Who is making a request, as established by a verified session token.
///
/// A snapshot taken at token issuance: it is not refreshed from the store,
/// so a rename or demotion only shows up after the next login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
    pub is_admin: bool,
}

/// Current time in the storage timestamp format.
///
/// Fixed microsecond precision in UTC, so string order is chronological order.
#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
