use crate::domain::fare::{Fare, FareStatus};
use crate::domain::ports::FareStoreRef;
use crate::error::Result;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Result of a batch of status writes. Failed writes are logged, not returned.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub deactivated: usize,
    pub failed: usize,
}

/// Deactivates every other active fare of `keep`'s organization.
///
/// Reads and writes are separate store calls; a concurrent sweep or creation
/// for the same organization can interleave, and the next scheduler run
/// settles whatever state is left.
pub async fn deactivate_siblings(store: &FareStoreRef, keep: &Fare) -> Result<SweepOutcome> {
    let siblings: Vec<Fare> = store
        .find_by_organization_and_status(&keep.organization_id, FareStatus::Active)
        .await?
        .into_iter()
        .filter(|fare| fare.id != keep.id)
        .collect();

    Ok(deactivate_fares(store, siblings).await)
}

/// Marks each fare inactive and saves it, one concurrent write per fare.
pub async fn deactivate_fares(store: &FareStoreRef, fares: Vec<Fare>) -> SweepOutcome {
    let mut writes = JoinSet::new();
    for mut fare in fares {
        let store = Arc::clone(store);
        writes.spawn(async move {
            fare.status = FareStatus::Inactive;
            let code = fare.code.clone();
            let organization_id = fare.organization_id.clone();
            (code, organization_id, store.save(fare).await)
        });
    }

    let mut outcome = SweepOutcome::default();
    while let Some(joined) = writes.join_next().await {
        match joined {
            Ok((code, organization_id, Ok(_))) => {
                tracing::info!(fare_code = %code, organization_id = %organization_id, "Deactivated fare");
                outcome.deactivated += 1;
            }
            Ok((code, organization_id, Err(e))) => {
                tracing::warn!(
                    fare_code = %code,
                    organization_id = %organization_id,
                    error = %e,
                    "Failed to deactivate fare"
                );
                outcome.failed += 1;
            }
            Err(e) => {
                tracing::error!(error = %e, "Fare deactivation task aborted");
                outcome.failed += 1;
            }
        }
    }
    outcome
}
