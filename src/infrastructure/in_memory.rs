use crate::domain::fare::{Fare, FareCode, FareId, FareStatus};
use crate::domain::organization::Organization;
use crate::domain::ports::{sort_latest_first, Clock, FareStore, OrganizationDirectory};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

/// A thread-safe in-memory fare store.
///
/// Uses `Arc<RwLock<HashMap<FareId, Fare>>>` so clones share the same data.
/// Every query scans the map, which is fine for tests and small data sets.
#[derive(Default, Clone)]
pub struct InMemoryFareStore {
    fares: Arc<RwLock<HashMap<FareId, Fare>>>,
}

impl InMemoryFareStore {
    /// Creates a new, empty in-memory fare store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FareStore for InMemoryFareStore {
    async fn find_by_id(&self, id: &FareId) -> Result<Option<Fare>> {
        let fares = self.fares.read().await;
        Ok(fares.get(id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Fare>> {
        let fares = self.fares.read().await;
        Ok(fares.values().cloned().collect())
    }

    async fn find_by_status(&self, status: FareStatus) -> Result<Vec<Fare>> {
        let fares = self.fares.read().await;
        Ok(fares
            .values()
            .filter(|fare| fare.status == status)
            .cloned()
            .collect())
    }

    async fn find_by_organization_and_status(
        &self,
        organization_id: &str,
        status: FareStatus,
    ) -> Result<Vec<Fare>> {
        let fares = self.fares.read().await;
        let mut matching: Vec<Fare> = fares
            .values()
            .filter(|fare| fare.organization_id == organization_id && fare.status == status)
            .cloned()
            .collect();
        sort_latest_first(&mut matching);
        Ok(matching)
    }

    async fn find_last_by_code(&self) -> Result<Option<Fare>> {
        let fares = self.fares.read().await;
        Ok(fares.values().max_by(|a, b| a.code.cmp(&b.code)).cloned())
    }

    async fn exists_by_code(&self, code: &FareCode) -> Result<bool> {
        let fares = self.fares.read().await;
        Ok(fares.values().any(|fare| &fare.code == code))
    }

    async fn save(&self, fare: Fare) -> Result<Fare> {
        let mut fares = self.fares.write().await;
        fares.insert(fare.id.clone(), fare.clone());
        Ok(fare)
    }

    async fn delete(&self, id: &FareId) -> Result<bool> {
        let mut fares = self.fares.write().await;
        Ok(fares.remove(id).is_some())
    }
}

/// Organization directory backed by a fixed map, seeded from configuration.
#[derive(Default, Clone)]
pub struct InMemoryOrganizationDirectory {
    organizations: Arc<RwLock<HashMap<String, Organization>>>,
}

impl InMemoryOrganizationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_organizations(organizations: impl IntoIterator<Item = Organization>) -> Self {
        let map = organizations
            .into_iter()
            .map(|org| (org.id.clone(), org))
            .collect();
        Self {
            organizations: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn insert(&self, organization: Organization) {
        let mut organizations = self.organizations.write().await;
        organizations.insert(organization.id.clone(), organization);
    }
}

#[async_trait]
impl OrganizationDirectory for InMemoryOrganizationDirectory {
    async fn organization_by_id(&self, organization_id: &str) -> Result<Option<Organization>> {
        let organizations = self.organizations.read().await;
        Ok(organizations.get(organization_id).cloned())
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
