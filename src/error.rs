use crate::domain::fare::{FareCode, FareId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FareError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Fare code {0} is already registered")]
    DuplicateCode(FareCode),
    #[error("Fare {0} not found")]
    NotFound(FareId),
    #[error("Store error: {0}")]
    StoreError(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Organization directory error: {0}")]
    EnrichmentError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl FareError {
    pub fn store<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::StoreError(err.into())
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for FareError {
    fn from(err: rocksdb::Error) -> Self {
        Self::StoreError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, FareError>;
