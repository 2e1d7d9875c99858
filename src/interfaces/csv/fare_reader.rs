use crate::domain::fare::FareRequest;
use crate::error::{FareError, Result};
use std::io::Read;

/// Reads fare creation requests from a CSV source.
///
/// Expected header: `organization_id,name,fare_type,amount,effective_date`.
/// An empty `effective_date` means the fare is effective immediately.
pub struct FareRequestReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> FareRequestReader<R> {
    /// Creates a new `FareRequestReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes requests.
    pub fn requests(self) -> impl Iterator<Item = Result<FareRequest>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(FareError::from))
    }
}
