use crate::domain::fare::{Fare, FareCode, FareId, FareStatus};
use crate::domain::ports::{sort_latest_first, FareStore};
use crate::error::{FareError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;

/// Column Family holding fares keyed by id.
pub const CF_FARES: &str = "fares";
/// Column Family mapping fare codes to fare ids.
pub const CF_FARE_CODES: &str = "fare_codes";

/// A persistent fare store using RocksDB.
///
/// Fares are stored as JSON under their id. A second Column Family indexes
/// codes so `exists_by_code` and `find_last_by_code` avoid decoding every fare.
/// Both families are updated in one `WriteBatch`, which keeps the index
/// consistent with the fare records on a per-fare basis.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBFareStore {
    db: Arc<DB>,
}

impl RocksDBFareStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_fares = ColumnFamilyDescriptor::new(CF_FARES, Options::default());
        let cf_codes = ColumnFamilyDescriptor::new(CF_FARE_CODES, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_fares, cf_codes])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| FareError::store(format!("{name} column family not found")))
    }

    fn decode(bytes: &[u8]) -> Result<Fare> {
        serde_json::from_slice(bytes)
            .map_err(|e| FareError::store(format!("Deserialization error: {e}")))
    }

    fn get_fare(&self, id: &FareId) -> Result<Option<Fare>> {
        let cf = self.cf(CF_FARES)?;
        match self.db.get_cf(cf, id.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan(&self) -> Result<Vec<Fare>> {
        let cf = self.cf(CF_FARES)?;
        let mut fares = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            fares.push(Self::decode(&value)?);
        }
        Ok(fares)
    }
}

#[async_trait]
impl FareStore for RocksDBFareStore {
    async fn find_by_id(&self, id: &FareId) -> Result<Option<Fare>> {
        self.get_fare(id)
    }

    async fn find_all(&self) -> Result<Vec<Fare>> {
        self.scan()
    }

    async fn find_by_status(&self, status: FareStatus) -> Result<Vec<Fare>> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|fare| fare.status == status)
            .collect())
    }

    async fn find_by_organization_and_status(
        &self,
        organization_id: &str,
        status: FareStatus,
    ) -> Result<Vec<Fare>> {
        let mut matching: Vec<Fare> = self
            .scan()?
            .into_iter()
            .filter(|fare| fare.organization_id == organization_id && fare.status == status)
            .collect();
        sort_latest_first(&mut matching);
        Ok(matching)
    }

    async fn find_last_by_code(&self) -> Result<Option<Fare>> {
        let cf = self.cf(CF_FARE_CODES)?;
        let mut last: Option<(FareCode, Vec<u8>)> = None;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let code = FareCode::new(String::from_utf8_lossy(&key).into_owned());
            if last.as_ref().is_none_or(|(best, _)| &code > best) {
                last = Some((code, value.into_vec()));
            }
        }

        match last {
            Some((_, id)) => {
                let id = FareId::from(String::from_utf8_lossy(&id).into_owned());
                self.get_fare(&id)
            }
            None => Ok(None),
        }
    }

    async fn exists_by_code(&self, code: &FareCode) -> Result<bool> {
        let cf = self.cf(CF_FARE_CODES)?;
        // Just check if the key exists without retrieving the value
        Ok(self.db.get_pinned_cf(cf, code.as_str().as_bytes())?.is_some())
    }

    async fn save(&self, fare: Fare) -> Result<Fare> {
        let fares_cf = self.cf(CF_FARES)?;
        let codes_cf = self.cf(CF_FARE_CODES)?;

        let value = serde_json::to_vec(&fare)
            .map_err(|e| FareError::store(format!("Serialization error: {e}")))?;

        let mut batch = WriteBatch::default();
        if let Some(previous) = self.get_fare(&fare.id)?
            && previous.code != fare.code
        {
            batch.delete_cf(codes_cf, previous.code.as_str().as_bytes());
        }
        batch.put_cf(fares_cf, fare.id.as_str().as_bytes(), value);
        batch.put_cf(
            codes_cf,
            fare.code.as_str().as_bytes(),
            fare.id.as_str().as_bytes(),
        );
        self.db.write(batch)?;

        Ok(fare)
    }

    async fn delete(&self, id: &FareId) -> Result<bool> {
        let Some(existing) = self.get_fare(id)? else {
            return Ok(false);
        };

        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf(CF_FARES)?, id.as_str().as_bytes());
        batch.delete_cf(self.cf(CF_FARE_CODES)?, existing.code.as_str().as_bytes());
        self.db.write(batch)?;

        Ok(true)
    }
}
