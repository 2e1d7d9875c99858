use crate::error::FareError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Opaque fare identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FareId(String);

impl FareId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FareId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for FareId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for FareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sequential fare code such as `TAR004`.
///
/// Codes order by their numeric suffix first, so `TAR1000` sorts after
/// `TAR999`. A suffix that is not a number counts as zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FareCode(String);

impl FareCode {
    pub const PREFIX: &'static str = "TAR";
    const MIN_DIGITS: usize = 3;

    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The code assigned when the store holds no fares yet.
    pub fn first() -> Self {
        Self::from_sequence(1)
    }

    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!(
            "{}{:0width$}",
            Self::PREFIX,
            sequence,
            width = Self::MIN_DIGITS
        ))
    }

    /// Numeric suffix of the code, or 0 when it does not parse.
    pub fn sequence(&self) -> u64 {
        self.0
            .strip_prefix(Self::PREFIX)
            .unwrap_or(&self.0)
            .parse()
            .unwrap_or(0)
    }

    /// The code that follows this one. Widens past `TAR999` instead of wrapping.
    pub fn next(&self) -> Self {
        Self::from_sequence(self.sequence().saturating_add(1))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for FareCode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence()
            .cmp(&other.sequence())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for FareCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FareCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FareStatus {
    Active,
    Inactive,
}

impl FareStatus {
    /// Status a fare starts with: inactive only while its effective date lies
    /// strictly in the future.
    pub fn initial(effective_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match effective_date {
            Some(date) if date > now => Self::Inactive,
            _ => Self::Active,
        }
    }
}

impl fmt::Display for FareStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("ACTIVE"),
            Self::Inactive => f.write_str("INACTIVE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FareType {
    #[serde(alias = "daily", alias = "DIARIA", alias = "diaria")]
    Daily,
    #[serde(alias = "weekly", alias = "SEMANAL", alias = "semanal")]
    Weekly,
    #[serde(alias = "monthly", alias = "MENSUAL", alias = "mensual")]
    Monthly,
}

/// A non-negative fare price.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct FareAmount(Decimal);

impl FareAmount {
    pub fn new(value: Decimal) -> Result<Self, FareError> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(FareError::ValidationError(
                "Fare amount must not be negative".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for FareAmount {
    type Error = FareError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FareAmount> for Decimal {
    fn from(amount: FareAmount) -> Self {
        amount.0
    }
}

/// A priced tariff of an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fare {
    pub id: FareId,
    pub organization_id: String,
    pub code: FareCode,
    pub name: String,
    pub fare_type: FareType,
    pub amount: FareAmount,
    pub status: FareStatus,
    pub created_at: DateTime<Utc>,
    /// Instant from which the fare should be the current one. `None` means
    /// effective immediately and indefinitely.
    pub effective_date: Option<DateTime<Utc>>,
}

impl Fare {
    /// Has a concrete effective date that is not after `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.effective_date.is_some_and(|date| date <= now)
    }

    /// Either always effective or already due.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.effective_date.is_none_or(|date| date <= now)
    }

    /// Orders fares by effective date, then by id.
    ///
    /// The greatest fare under this ordering is the authoritative one for its
    /// organization. A missing effective date ranks below any concrete date.
    pub fn recency_cmp(&self, other: &Self) -> Ordering {
        self.effective_date
            .cmp(&other.effective_date)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Client input for creating or updating a fare.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FareRequest {
    pub organization_id: String,
    pub name: String,
    pub fare_type: FareType,
    pub amount: Decimal,
    pub effective_date: Option<DateTime<Utc>>,
}

impl FareRequest {
    /// Checks the request and returns its validated amount.
    pub fn validate(&self) -> Result<FareAmount, FareError> {
        if self.organization_id.trim().is_empty() {
            return Err(FareError::ValidationError(
                "Organization id is required".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(FareError::ValidationError(
                "Fare name is required".to_string(),
            ));
        }
        FareAmount::new(self.amount)
    }
}
