use super::code_generator::FareCodeGenerator;
use super::enrichment::{EnrichedFare, FareEnricher};
use super::reconcile;
use crate::domain::fare::{Fare, FareId, FareRequest, FareStatus};
use crate::domain::ports::{ClockRef, DirectoryRef, FareStoreRef, SystemClock};
use crate::error::{FareError, Result};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Entry point for fare commands and queries.
///
/// `FareLifecycleEngine` decides the status of new fares, keeps a single
/// active fare per organization when a fare is created already due, and
/// answers which fare is current. Periodic reconciliation lives in
/// [`FareTransitionScheduler`](super::scheduler::FareTransitionScheduler).
pub struct FareLifecycleEngine {
    store: FareStoreRef,
    codes: FareCodeGenerator,
    enricher: FareEnricher,
    clock: ClockRef,
    creation_lock: Mutex<()>,
}

impl FareLifecycleEngine {
    /// Creates a new `FareLifecycleEngine` using the system clock.
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence for fares.
    /// * `directory` - Organization directory used for enriched reads.
    pub fn new(store: FareStoreRef, directory: DirectoryRef) -> Self {
        Self {
            codes: FareCodeGenerator::new(Arc::clone(&store)),
            store,
            enricher: FareEnricher::new(directory),
            clock: Arc::new(SystemClock),
            creation_lock: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: ClockRef) -> Self {
        self.clock = clock;
        self
    }

    /// Creates a fare with the next sequential code.
    ///
    /// A fare whose effective date is already due becomes the only active fare
    /// of its organization. Failing to deactivate a sibling does not fail the
    /// creation; the scheduler finishes the job on its next run.
    pub async fn create_fare(&self, request: FareRequest) -> Result<Fare> {
        let amount = request.validate()?;

        let fare = {
            // Single writer for code assignment within this process.
            let _guard = self.creation_lock.lock().await;

            let code = self.codes.next_code().await?;
            if self.store.exists_by_code(&code).await? {
                return Err(FareError::DuplicateCode(code));
            }

            let now = self.clock.now();
            let fare = Fare {
                id: FareId::generate(),
                organization_id: request.organization_id,
                code,
                name: request.name,
                fare_type: request.fare_type,
                amount,
                status: FareStatus::initial(request.effective_date, now),
                created_at: now,
                effective_date: request.effective_date,
            };
            self.store.save(fare).await?
        };

        tracing::info!(
            fare_code = %fare.code,
            organization_id = %fare.organization_id,
            status = %fare.status,
            "Created fare"
        );

        if fare.is_due(self.clock.now()) {
            match reconcile::deactivate_siblings(&self.store, &fare).await {
                Ok(outcome) if outcome.failed > 0 => tracing::warn!(
                    fare_code = %fare.code,
                    failed = outcome.failed,
                    "Some previous fares could not be deactivated"
                ),
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    fare_code = %fare.code,
                    error = %e,
                    "Failed to deactivate previous fares"
                ),
            }
        }

        Ok(fare)
    }

    /// Replaces the descriptive fields of a fare. The status is left as is.
    pub async fn update_fare(&self, id: &FareId, request: FareRequest) -> Result<Fare> {
        let amount = request.validate()?;
        let mut fare = self.get_fare(id).await?;

        fare.organization_id = request.organization_id;
        fare.name = request.name;
        fare.fare_type = request.fare_type;
        fare.amount = amount;
        fare.effective_date = request.effective_date;

        self.store.save(fare).await
    }

    /// Sets a fare active without touching other fares of its organization.
    pub async fn activate(&self, id: &FareId) -> Result<Fare> {
        self.change_status(id, FareStatus::Active).await
    }

    /// Sets a fare inactive without touching other fares of its organization.
    pub async fn deactivate(&self, id: &FareId) -> Result<Fare> {
        self.change_status(id, FareStatus::Inactive).await
    }

    /// Removes a fare. Codes are never reused while a later code exists.
    pub async fn delete_fare(&self, id: &FareId) -> Result<()> {
        if !self.store.delete(id).await? {
            return Err(FareError::NotFound(id.clone()));
        }
        tracing::info!(fare_id = %id, "Deleted fare");
        Ok(())
    }

    async fn change_status(&self, id: &FareId, status: FareStatus) -> Result<Fare> {
        let mut fare = self.get_fare(id).await?;
        let previous = fare.status;
        fare.status = status;
        let saved = self.store.save(fare).await?;
        tracing::info!(fare_code = %saved.code, from = %previous, to = %status, "Changed fare status");
        Ok(saved)
    }

    /// The active fare of an organization in effect right now, preferring the
    /// latest effective date. Does not write anything.
    pub async fn current_active_fare(&self, organization_id: &str) -> Result<Option<Fare>> {
        let now = self.clock.now();
        Ok(self
            .store
            .find_by_organization_and_status(organization_id, FareStatus::Active)
            .await?
            .into_iter()
            .filter(|fare| fare.is_effective(now))
            .max_by(Fare::recency_cmp))
    }

    pub async fn get_fare(&self, id: &FareId) -> Result<Fare> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| FareError::NotFound(id.clone()))
    }

    pub async fn list_fares(&self) -> Result<Vec<Fare>> {
        let mut fares = self.store.find_all().await?;
        fares.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(fares)
    }

    pub async fn list_fares_by_status(&self, status: FareStatus) -> Result<Vec<Fare>> {
        let mut fares = self.store.find_by_status(status).await?;
        fares.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(fares)
    }

    pub async fn get_enriched(&self, id: &FareId) -> Result<EnrichedFare> {
        let fare = self.get_fare(id).await?;
        Ok(self.enricher.enrich(fare).await)
    }

    pub async fn list_enriched(&self, status: Option<FareStatus>) -> Result<Vec<EnrichedFare>> {
        let fares = match status {
            Some(status) => self.list_fares_by_status(status).await?,
            None => self.list_fares().await?,
        };
        Ok(self.enricher.enrich_all(fares).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fare::{FareAmount, FareCode, FareType};
    use crate::domain::ports::{Clock, FareStore};
    use crate::infrastructure::in_memory::{
        FixedClock, InMemoryFareStore, InMemoryOrganizationDirectory,
    };
    use chrono::{DateTime, Duration, Utc};
    use rust_decimal_macros::dec;

    fn engine(store: &InMemoryFareStore, clock: &FixedClock) -> FareLifecycleEngine {
        FareLifecycleEngine::new(
            Arc::new(store.clone()),
            Arc::new(InMemoryOrganizationDirectory::new()),
        )
        .with_clock(Arc::new(clock.clone()))
    }

    fn request(org: &str, effective_date: Option<DateTime<Utc>>) -> FareRequest {
        FareRequest {
            organization_id: org.to_string(),
            name: "Monthly water".to_string(),
            fare_type: FareType::Monthly,
            amount: dec!(25.50),
            effective_date,
        }
    }

    fn stored(id: &str, org: &str, status: FareStatus, effective: Option<DateTime<Utc>>) -> Fare {
        Fare {
            id: FareId::from(id),
            organization_id: org.to_string(),
            code: FareCode::new(format!("OLD-{id}")),
            name: id.to_string(),
            fare_type: FareType::Monthly,
            amount: FareAmount::new(dec!(10)).unwrap(),
            status,
            created_at: Utc::now(),
            effective_date: effective,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_codes() {
        let store = InMemoryFareStore::new();
        let clock = FixedClock::new(Utc::now());
        let engine = engine(&store, &clock);

        let first = engine.create_fare(request("org-a", None)).await.unwrap();
        let second = engine.create_fare(request("org-b", None)).await.unwrap();

        assert_eq!(first.code.as_str(), "TAR001");
        assert_eq!(second.code.as_str(), "TAR002");
        assert_eq!(first.created_at, clock.now());
    }

    #[tokio::test]
    async fn test_create_without_effective_date_is_active_and_sweeps_nothing() {
        let store = InMemoryFareStore::new();
        let clock = FixedClock::new(Utc::now());
        store
            .save(stored("prev", "org-a", FareStatus::Active, None))
            .await
            .unwrap();
        let engine = engine(&store, &clock);

        let created = engine.create_fare(request("org-a", None)).await.unwrap();

        assert_eq!(created.status, FareStatus::Active);
        let prev = store.find_by_id(&FareId::from("prev")).await.unwrap().unwrap();
        assert_eq!(prev.status, FareStatus::Active);
    }

    #[tokio::test]
    async fn test_create_due_fare_deactivates_previous() {
        let store = InMemoryFareStore::new();
        let now = Utc::now();
        let clock = FixedClock::new(now);
        store
            .save(stored("prev", "org-a", FareStatus::Active, Some(now - Duration::days(5))))
            .await
            .unwrap();
        store
            .save(stored("other", "org-b", FareStatus::Active, Some(now - Duration::days(5))))
            .await
            .unwrap();
        let engine = engine(&store, &clock);

        let created = engine
            .create_fare(request("org-a", Some(now - Duration::hours(1))))
            .await
            .unwrap();

        assert_eq!(created.status, FareStatus::Active);
        let prev = store.find_by_id(&FareId::from("prev")).await.unwrap().unwrap();
        assert_eq!(prev.status, FareStatus::Inactive);
        let other = store.find_by_id(&FareId::from("other")).await.unwrap().unwrap();
        assert_eq!(other.status, FareStatus::Active);
    }

    #[tokio::test]
    async fn test_create_at_exact_now_counts_as_due() {
        let store = InMemoryFareStore::new();
        let now = Utc::now();
        let clock = FixedClock::new(now);
        store
            .save(stored("prev", "org-a", FareStatus::Active, Some(now - Duration::days(1))))
            .await
            .unwrap();
        let engine = engine(&store, &clock);

        let created = engine.create_fare(request("org-a", Some(now))).await.unwrap();

        assert_eq!(created.status, FareStatus::Active);
        let prev = store.find_by_id(&FareId::from("prev")).await.unwrap().unwrap();
        assert_eq!(prev.status, FareStatus::Inactive);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_request() {
        let store = InMemoryFareStore::new();
        let engine = engine(&store, &FixedClock::new(Utc::now()));

        let mut negative = request("org-a", None);
        negative.amount = dec!(-5);
        assert!(matches!(
            engine.create_fare(negative).await,
            Err(FareError::ValidationError(_))
        ));
        assert!(matches!(
            engine.create_fare(request("", None)).await,
            Err(FareError::ValidationError(_))
        ));
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manual_override_does_not_sweep() {
        let store = InMemoryFareStore::new();
        let now = Utc::now();
        store
            .save(stored("a", "org-a", FareStatus::Active, Some(now - Duration::days(2))))
            .await
            .unwrap();
        store
            .save(stored("b", "org-a", FareStatus::Inactive, Some(now - Duration::days(1))))
            .await
            .unwrap();
        let engine = engine(&store, &FixedClock::new(now));

        let activated = engine.activate(&FareId::from("b")).await.unwrap();
        assert_eq!(activated.status, FareStatus::Active);

        let active = store.find_by_status(FareStatus::Active).await.unwrap();
        assert_eq!(active.len(), 2);

        let deactivated = engine.deactivate(&FareId::from("a")).await.unwrap();
        assert_eq!(deactivated.status, FareStatus::Inactive);
    }

    #[tokio::test]
    async fn test_override_unknown_fare_is_not_found() {
        let store = InMemoryFareStore::new();
        let engine = engine(&store, &FixedClock::new(Utc::now()));

        assert!(matches!(
            engine.activate(&FareId::from("missing")).await,
            Err(FareError::NotFound(_))
        ));
        assert!(matches!(
            engine.deactivate(&FareId::from("missing")).await,
            Err(FareError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_fare() {
        let store = InMemoryFareStore::new();
        let engine = engine(&store, &FixedClock::new(Utc::now()));

        let fare = engine.create_fare(request("org-a", None)).await.unwrap();
        engine.delete_fare(&fare.id).await.unwrap();

        assert!(store.find_all().await.unwrap().is_empty());
        assert!(matches!(
            engine.delete_fare(&fare.id).await,
            Err(FareError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_current_active_fare_prefers_latest_effective_date() {
        let store = InMemoryFareStore::new();
        let now = Utc::now();
        for fare in [
            stored("older", "org-a", FareStatus::Active, Some(now - Duration::days(3))),
            stored("newer", "org-a", FareStatus::Active, Some(now - Duration::days(1))),
            stored("future", "org-a", FareStatus::Active, Some(now + Duration::days(1))),
            stored("inactive", "org-a", FareStatus::Inactive, Some(now - Duration::hours(1))),
        ] {
            store.save(fare).await.unwrap();
        }
        let engine = engine(&store, &FixedClock::new(now));

        let current = engine.current_active_fare("org-a").await.unwrap().unwrap();
        assert_eq!(current.id, FareId::from("newer"));
        assert!(engine.current_active_fare("org-z").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_current_active_fare_accepts_undated_fare() {
        let store = InMemoryFareStore::new();
        store
            .save(stored("undated", "org-a", FareStatus::Active, None))
            .await
            .unwrap();
        let engine = engine(&store, &FixedClock::new(Utc::now()));

        let current = engine.current_active_fare("org-a").await.unwrap().unwrap();
        assert_eq!(current.id, FareId::from("undated"));
    }

    #[tokio::test]
    async fn test_update_keeps_status() {
        let store = InMemoryFareStore::new();
        let now = Utc::now();
        let engine = engine(&store, &FixedClock::new(now));
        let created = engine.create_fare(request("org-a", None)).await.unwrap();

        let mut changes = request("org-a", Some(now + Duration::days(7)));
        changes.amount = dec!(30.00);
        let updated = engine.update_fare(&created.id, changes).await.unwrap();

        assert_eq!(updated.status, FareStatus::Active);
        assert_eq!(updated.amount.value(), dec!(30.00));
        assert_eq!(updated.code, created.code);
    }

    #[tokio::test]
    async fn test_list_enriched_filters_by_status() {
        let store = InMemoryFareStore::new();
        let now = Utc::now();
        let engine = engine(&store, &FixedClock::new(now));
        engine.create_fare(request("org-a", None)).await.unwrap();
        engine
            .create_fare(request("org-b", Some(now + Duration::days(1))))
            .await
            .unwrap();

        let inactive = engine
            .list_enriched(Some(FareStatus::Inactive))
            .await
            .unwrap();
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].organization.id, "org-b");
        assert_eq!(engine.list_enriched(None).await.unwrap().len(), 2);
    }
}
