use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use fare_lifecycle::domain::fare::{Fare, FareAmount, FareCode, FareId, FareRequest, FareStatus, FareType};
use fare_lifecycle::domain::ports::FareStore;
use fare_lifecycle::error::{FareError, Result};
use fare_lifecycle::infrastructure::in_memory::InMemoryFareStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Reference instant shared by the time-dependent tests.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn request(organization_id: &str, name: &str, effective_date: Option<DateTime<Utc>>) -> FareRequest {
    FareRequest {
        organization_id: organization_id.to_string(),
        name: name.to_string(),
        fare_type: FareType::Monthly,
        amount: dec!(15.00),
        effective_date,
    }
}

pub fn fare(id: &str, organization_id: &str, status: FareStatus, effective_date: Option<DateTime<Utc>>) -> Fare {
    Fare {
        id: FareId::from(id),
        organization_id: organization_id.to_string(),
        code: FareCode::new(format!("TAR{id}")),
        name: format!("fare {id}"),
        fare_type: FareType::Monthly,
        amount: FareAmount::new(Decimal::ONE).unwrap(),
        status,
        created_at: t0() - Duration::days(30),
        effective_date,
    }
}

/// Writes a seed file with the given `(organization_id, name, fare_type, amount, effective_date)` rows.
pub fn generate_seed_csv(path: &Path, rows: &[[&str; 5]]) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["organization_id", "name", "fare_type", "amount", "effective_date"])?;
    for row in rows {
        wtr.write_record(row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Parses the CLI output into `(code, organization_id, status)` triples.
pub fn parse_fare_rows(stdout: &[u8]) -> Vec<(String, String, String)> {
    let mut rdr = csv::Reader::from_reader(stdout);
    rdr.records()
        .map(|record| {
            let record = record.unwrap();
            (
                record[2].to_string(),
                record[1].to_string(),
                record[6].to_string(),
            )
        })
        .collect()
}

/// In-memory store whose writes of INACTIVE fares and whose full scans can
/// be made to fail on demand.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: InMemoryFareStore,
    fail_deactivations: AtomicBool,
    fail_scans: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: InMemoryFareStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn fail_deactivations(&self, fail: bool) {
        self.fail_deactivations.store(fail, Ordering::SeqCst);
    }

    pub fn fail_scans(&self, fail: bool) {
        self.fail_scans.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl FareStore for FaultyStore {
    async fn find_by_id(&self, id: &FareId) -> Result<Option<Fare>> {
        self.inner.find_by_id(id).await
    }

    async fn find_all(&self) -> Result<Vec<Fare>> {
        if self.fail_scans.load(Ordering::SeqCst) {
            return Err(FareError::store("scan unavailable"));
        }
        self.inner.find_all().await
    }

    async fn find_by_status(&self, status: FareStatus) -> Result<Vec<Fare>> {
        self.inner.find_by_status(status).await
    }

    async fn find_by_organization_and_status(
        &self,
        organization_id: &str,
        status: FareStatus,
    ) -> Result<Vec<Fare>> {
        self.inner
            .find_by_organization_and_status(organization_id, status)
            .await
    }

    async fn find_last_by_code(&self) -> Result<Option<Fare>> {
        self.inner.find_last_by_code().await
    }

    async fn exists_by_code(&self, code: &FareCode) -> Result<bool> {
        self.inner.exists_by_code(code).await
    }

    async fn save(&self, fare: Fare) -> Result<Fare> {
        if fare.status == FareStatus::Inactive && self.fail_deactivations.load(Ordering::SeqCst) {
            return Err(FareError::store(format!("write of {} rejected", fare.code)));
        }
        self.inner.save(fare).await
    }

    async fn delete(&self, id: &FareId) -> Result<bool> {
        self.inner.delete(id).await
    }
}
