use crate::domain::fare::{Fare, FareAmount, FareCode, FareId, FareStatus, FareType};
use crate::domain::organization::Organization;
use crate::domain::ports::DirectoryRef;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinSet;

/// A fare joined with the organization that owns it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedFare {
    pub id: FareId,
    pub organization_id: String,
    pub organization: Organization,
    pub code: FareCode,
    pub name: String,
    pub fare_type: FareType,
    pub amount: FareAmount,
    pub status: FareStatus,
    pub created_at: DateTime<Utc>,
    pub effective_date: Option<DateTime<Utc>>,
}

impl EnrichedFare {
    fn new(fare: Fare, organization: Organization) -> Self {
        Self {
            id: fare.id,
            organization_id: fare.organization_id,
            organization,
            code: fare.code,
            name: fare.name,
            fare_type: fare.fare_type,
            amount: fare.amount,
            status: fare.status,
            created_at: fare.created_at,
            effective_date: fare.effective_date,
        }
    }
}

/// Attaches organization metadata to fares.
///
/// Never fails: when the directory errors or has no entry, the fare gets a
/// placeholder organization carrying only its id.
#[derive(Clone)]
pub struct FareEnricher {
    directory: DirectoryRef,
}

impl FareEnricher {
    pub fn new(directory: DirectoryRef) -> Self {
        Self { directory }
    }

    pub async fn enrich(&self, fare: Fare) -> EnrichedFare {
        let organization = lookup(&self.directory, &fare.organization_id).await;
        EnrichedFare::new(fare, organization)
    }

    /// Enriches a batch, keeping its order. Each distinct organization is
    /// looked up once and the lookups run concurrently.
    pub async fn enrich_all(&self, fares: Vec<Fare>) -> Vec<EnrichedFare> {
        let organization_ids: HashSet<String> = fares
            .iter()
            .map(|fare| fare.organization_id.clone())
            .collect();

        let mut lookups = JoinSet::new();
        for organization_id in organization_ids {
            let directory = Arc::clone(&self.directory);
            lookups.spawn(async move {
                let organization = lookup(&directory, &organization_id).await;
                (organization_id, organization)
            });
        }

        let mut organizations = HashMap::new();
        while let Some(joined) = lookups.join_next().await {
            match joined {
                Ok((organization_id, organization)) => {
                    organizations.insert(organization_id, organization);
                }
                Err(e) => tracing::error!(error = %e, "Organization lookup task aborted"),
            }
        }

        fares
            .into_iter()
            .map(|fare| {
                let organization = organizations
                    .get(&fare.organization_id)
                    .cloned()
                    .unwrap_or_else(|| Organization::placeholder(&fare.organization_id));
                EnrichedFare::new(fare, organization)
            })
            .collect()
    }
}

async fn lookup(directory: &DirectoryRef, organization_id: &str) -> Organization {
    match directory.organization_by_id(organization_id).await {
        Ok(Some(organization)) => organization,
        Ok(None) => {
            tracing::debug!(
                organization_id = %organization_id,
                "Organization not found in directory, using placeholder"
            );
            Organization::placeholder(organization_id)
        }
        Err(e) => {
            tracing::warn!(
                organization_id = %organization_id,
                error = %e,
                "Failed to fetch organization details"
            );
            Organization::placeholder(organization_id)
        }
    }
}
