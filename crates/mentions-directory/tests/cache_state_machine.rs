//! Stateful property testing for the member cache.
//!
//! Uses proptest-state-machine to drive arbitrary sequences of replace,
//! clear and clock movement against a reference model, checking that:
//!
//! - an empty replace never blanks a populated snapshot
//! - only `clear` returns the cache to the empty state
//! - staleness is `empty || now - fetched_at > ttl`

use proptest::prelude::*;
use proptest_state_machine::{ReferenceStateMachine, StateMachineTest, prop_state_machine};

use mentions_directory::{CacheSnapshot, MemberCache, UserRecord};

/// TTLs checked after every transition.
const TTLS: [u64; 4] = [0, 1, 60, 300];

/// Operations that can be performed on the cache.
#[derive(Debug, Clone)]
pub enum CacheOperation {
    /// Install a listing of `count` members (0 models a failed fetch).
    Replace { first_id: u64, count: u64 },
    /// Reset to empty.
    Clear,
    /// Move the clock forward.
    Advance { secs: i64 },
}

/// Reference model of the cache.
#[derive(Clone, Debug, Default)]
pub struct CacheModel {
    /// Member ids in order.
    pub ids: Vec<u64>,
    /// Fetch timestamp, 0 when empty.
    pub fetched_at: i64,
    /// Current clock.
    pub now: i64,
}

impl CacheModel {
    fn is_stale(&self, ttl: u64) -> bool {
        self.ids.is_empty() || self.now - self.fetched_at > ttl as i64
    }
}

impl ReferenceStateMachine for CacheModel {
    type State = Self;
    type Transition = CacheOperation;

    fn init_state() -> BoxedStrategy<Self::State> {
        Just(Self {
            now: 1_700_000_000,
            ..Self::default()
        })
        .boxed()
    }

    fn transitions(_state: &Self::State) -> BoxedStrategy<Self::Transition> {
        prop_oneof![
            3 => (1u64..1000, 0u64..5).prop_map(|(first_id, count)| CacheOperation::Replace { first_id, count }),
            1 => Just(CacheOperation::Clear),
            3 => (0i64..400).prop_map(|secs| CacheOperation::Advance { secs }),
        ]
        .boxed()
    }

    fn apply(mut state: Self::State, transition: &Self::Transition) -> Self::State {
        match transition {
            CacheOperation::Replace { first_id, count } => {
                if *count > 0 {
                    state.ids = (*first_id..first_id + count).collect();
                    state.fetched_at = state.now;
                }
            }
            CacheOperation::Clear => {
                state.ids.clear();
                state.fetched_at = 0;
            }
            CacheOperation::Advance { secs } => state.now += secs,
        }
        state
    }
}

/// System under test: the real cache plus the clock it is checked against.
pub struct CacheHarness {
    cache: MemberCache,
    now: i64,
    previous: CacheSnapshot,
}

impl StateMachineTest for CacheHarness {
    type SystemUnderTest = Self;
    type Reference = CacheModel;

    fn init_test(
        ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) -> Self::SystemUnderTest {
        Self {
            cache: MemberCache::new(),
            now: ref_state.now,
            previous: CacheSnapshot::empty(),
        }
    }

    fn apply(
        mut state: Self::SystemUnderTest,
        _ref_state: &<Self::Reference as ReferenceStateMachine>::State,
        transition: <Self::Reference as ReferenceStateMachine>::Transition,
    ) -> Self::SystemUnderTest {
        state.previous = CacheSnapshot::clone(&state.cache.snapshot());
        match transition {
            CacheOperation::Replace { first_id, count } => {
                let members: Vec<UserRecord> = (first_id..first_id + count)
                    .map(|id| UserRecord::new(id, format!("user{id}")))
                    .collect();
                let installed = state.cache.replace(members, state.now);
                assert_eq!(installed, count > 0);
                if count == 0 {
                    // A failed fetch leaves the previous snapshot untouched.
                    assert_eq!(*state.cache.snapshot(), state.previous);
                }
            }
            CacheOperation::Clear => state.cache.clear(),
            CacheOperation::Advance { secs } => state.now += secs,
        }
        state
    }

    fn check_invariants(
        state: &Self::SystemUnderTest,
        ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) {
        let snapshot = state.cache.snapshot();

        let ids: Vec<u64> = snapshot.members.iter().map(|u| u.id).collect();
        assert_eq!(ids, ref_state.ids);
        assert_eq!(snapshot.fetched_at, ref_state.fetched_at);

        if snapshot.is_empty() {
            assert_eq!(snapshot.fetched_at, 0);
        }

        for ttl in TTLS {
            assert_eq!(
                state.cache.is_stale(ttl, state.now),
                ref_state.is_stale(ttl),
                "staleness mismatch for ttl={ttl}"
            );
        }
    }
}

prop_state_machine! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 5000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn member_cache_state_machine_test(sequential 1..40 => CacheHarness);
}

proptest! {
    #[test]
    fn empty_snapshot_is_always_stale(ttl in any::<u64>(), now in any::<i64>()) {
        prop_assert!(CacheSnapshot::empty().is_stale(ttl, now));
    }

    #[test]
    fn populated_staleness_is_age_over_ttl(
        fetched_at in 0i64..2_000_000_000,
        age in 0i64..100_000,
        ttl in 0u64..100_000,
    ) {
        let snapshot = CacheSnapshot::new(vec![UserRecord::new(1, "alice")], fetched_at);
        prop_assert_eq!(snapshot.is_stale(ttl, fetched_at + age), age > ttl as i64);
    }
}
