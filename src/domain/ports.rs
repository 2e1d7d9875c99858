use super::fare::{Fare, FareCode, FareId, FareStatus};
use super::organization::Organization;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Persistence for fares. Implementations only need per-record atomic writes.
#[async_trait]
pub trait FareStore: Send + Sync {
    async fn find_by_id(&self, id: &FareId) -> Result<Option<Fare>>;
    async fn find_all(&self) -> Result<Vec<Fare>>;
    async fn find_by_status(&self, status: FareStatus) -> Result<Vec<Fare>>;
    /// Fares of one organization with the given status, latest effective date
    /// first and fares without an effective date last.
    async fn find_by_organization_and_status(
        &self,
        organization_id: &str,
        status: FareStatus,
    ) -> Result<Vec<Fare>>;
    /// The fare holding the greatest code, if any.
    async fn find_last_by_code(&self) -> Result<Option<Fare>>;
    async fn exists_by_code(&self, code: &FareCode) -> Result<bool>;
    async fn save(&self, fare: Fare) -> Result<Fare>;
    async fn delete(&self, id: &FareId) -> Result<bool>;
}

/// Read access to the external organization directory.
#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    async fn organization_by_id(&self, organization_id: &str) -> Result<Option<Organization>>;
}

/// Source of wall-clock time, injected so time-dependent decisions can be tested.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub type FareStoreRef = Arc<dyn FareStore>;
pub type DirectoryRef = Arc<dyn OrganizationDirectory>;
pub type ClockRef = Arc<dyn Clock>;

/// Orders fares the way `find_by_organization_and_status` returns them.
pub fn sort_latest_first(fares: &mut [Fare]) {
    fares.sort_by(|a, b| b.recency_cmp(a));
}
