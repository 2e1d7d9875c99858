//! Application layer containing the fare lifecycle logic.
//!
//! [`lifecycle::FareLifecycleEngine`] handles requests: it creates fares,
//! applies manual overrides and answers queries. [`scheduler::FareTransitionScheduler`]
//! periodically reconciles stored statuses with effective dates. Both share the
//! organization sweep in [`reconcile`].

pub mod code_generator;
pub mod enrichment;
pub mod lifecycle;
pub mod reconcile;
pub mod scheduler;
