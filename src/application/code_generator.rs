use crate::domain::fare::FareCode;
use crate::domain::ports::FareStoreRef;
use crate::error::Result;

/// Derives the next fare code from the greatest code in the store.
///
/// Reading the last code and writing the new fare are separate steps, so two
/// callers can obtain the same code. The engine serializes creations and
/// re-checks existence before saving.
#[derive(Clone)]
pub struct FareCodeGenerator {
    store: FareStoreRef,
}

impl FareCodeGenerator {
    pub fn new(store: FareStoreRef) -> Self {
        Self { store }
    }

    pub async fn next_code(&self) -> Result<FareCode> {
        Ok(self
            .store
            .find_last_by_code()
            .await?
            .map_or_else(FareCode::first, |last| last.code.next()))
    }
}
