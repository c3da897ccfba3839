//! # Roster Testing
//!
//! Testing utilities for roster services.
//!
//! This crate provides:
//! - [`InMemoryEntityStore`]: an `EntityStore` with scriptable faults
//! - [`FixedClock`]: deterministic time
//! - [`TestRoster`]: every service wired to one in-memory store
//! - Fixtures and proptest strategies for domain types
//!
//! ## Example
//!
//! ```ignore
//! use roster_testing::{TestRoster, fixtures};
//!
//! #[tokio::test]
//! async fn registration_updates_the_event() {
//!     let roster = TestRoster::new();
//!     let event = roster.catalog.create_event(fixtures::new_event(10)).await.unwrap();
//!
//!     roster.ledger.register_new(event.id, fixtures::new_participant(1)).await.unwrap();
//!
//!     assert_eq!(roster.store.event(event.id).unwrap().registered, 1);
//!     assert!(roster.store.consistency_violations().is_empty());
//! }
//! ```

use chrono::{DateTime, Utc};
use roster_core::environment::Clock;

mod in_memory_store;

pub use in_memory_store::{InMemoryEntityStore, Operation};

/// Mock implementations of injected dependencies.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use roster_testing::mocks::FixedClock;
    /// use roster_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Builders for creation parameters.
pub mod fixtures {
    use super::{Clock, mocks::test_clock};
    use chrono::Duration;
    use roster_core::types::{NewEvent, NewParticipant, OrganizerId};

    /// An upcoming event 30 days after [`test_clock`] with the given capacity.
    #[must_use]
    pub fn new_event(capacity: u32) -> NewEvent {
        NewEvent {
            name: "RustConf".to_string(),
            description: "Talks and workshops".to_string(),
            date: test_clock().now() + Duration::days(30),
            location: "Hall A".to_string(),
            capacity,
            organizer_id: OrganizerId::new(),
            status: None,
        }
    }

    /// The `n`-th distinct participant.
    #[must_use]
    pub fn new_participant(n: usize) -> NewParticipant {
        NewParticipant::new(
            format!("Participant {n}"),
            format!("participant{n}@example.com"),
            format!("555-{n:04}"),
        )
    }

    /// `count` distinct participants.
    #[must_use]
    pub fn new_participants(count: usize) -> Vec<NewParticipant> {
        (0..count).map(new_participant).collect()
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use roster_core::types::NewParticipant;

    /// Participant creation parameters with plausible contact fields.
    pub fn new_participant() -> impl Strategy<Value = NewParticipant> {
        ("[A-Z][a-z]{1,10}", "[a-z]{1,8}", "[0-9]{3}-[0-9]{4}").prop_map(|(name, user, phone)| {
            NewParticipant::new(name, format!("{user}@example.com"), phone)
        })
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use super::{InMemoryEntityStore, mocks::test_clock};
    use roster_core::environment::Clock;
    use roster_core::retry::RetryPolicy;
    use roster_core::store::EntityStore;
    use roster_core::{BulkImportService, Catalog, CheckInService, LedgerAuditor, RegistrationLedger};
    use std::sync::Arc;

    /// Every roster service wired to one [`InMemoryEntityStore`] and [`test_clock`].
    ///
    /// Compensation retries run without delay.
    #[derive(Clone)]
    pub struct TestRoster {
        /// Backing store, for fault scripting and assertions
        pub store: InMemoryEntityStore,
        /// Registration ledger
        pub ledger: RegistrationLedger,
        /// Bulk import service
        pub import: BulkImportService,
        /// Check-in service
        pub check_in: CheckInService,
        /// Reads and field updates
        pub catalog: Catalog,
        /// Consistency auditor
        pub auditor: LedgerAuditor,
    }

    impl TestRoster {
        /// Services with a retry budget of 3 immediate retries.
        #[must_use]
        pub fn new() -> Self {
            Self::with_retry(RetryPolicy::immediate(3))
        }

        /// Services with the given compensation retry policy.
        #[must_use]
        pub fn with_retry(retry: RetryPolicy) -> Self {
            let store = InMemoryEntityStore::new();
            let shared: Arc<dyn EntityStore> = Arc::new(store.clone());
            let clock: Arc<dyn Clock> = Arc::new(test_clock());
            Self {
                ledger: RegistrationLedger::new(shared.clone(), clock.clone(), retry.clone()),
                import: BulkImportService::new(shared.clone(), clock.clone(), retry),
                check_in: CheckInService::new(shared.clone(), clock.clone()),
                catalog: Catalog::new(shared.clone(), clock),
                auditor: LedgerAuditor::new(shared),
                store,
            }
        }
    }

    impl Default for TestRoster {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Route `tracing` output to the test harness. Safe to call from every test.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("roster_core=debug"))
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use helpers::{TestRoster, init_test_tracing};
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn fixtures_are_distinct() {
        let a = fixtures::new_participant(1);
        let b = fixtures::new_participant(2);
        assert_ne!(a.email, b.email);
        assert_eq!(fixtures::new_participants(3).len(), 3);
    }
}
