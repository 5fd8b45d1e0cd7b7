//! Property-based tests for the invariants the next-state function must
//! uphold under arbitrary sequences of operations (see `SPEC_FULL.md` §8).

use proptest::prelude::*;
use std::time::Duration;
use throttlegate::algorithm::next;
use throttlegate::{Configuration, State};

#[derive(Debug, Clone)]
enum Op {
    Acquire { permits: i64, timeout_nanos: i64, advance_nanos: u64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    (1i64..=5, 0i64..=50_000_000, 0u64..=30_000_000).prop_map(|(permits, timeout_nanos, advance_nanos)| {
        Op::Acquire { permits, timeout_nanos, advance_nanos }
    })
}

fn run(limit: i64, refresh_nanos: u64, ops: &[Op]) -> Vec<State> {
    let config = Configuration::builder()
        .limit_per_period(limit)
        .refresh_period(Duration::from_nanos(refresh_nanos))
        .build()
        .unwrap();
    let mut state = State::initial(config);
    let mut now = 0u64;
    let mut trail = Vec::with_capacity(ops.len());
    for op in ops {
        let Op::Acquire { permits, timeout_nanos, advance_nanos } = op;
        now += advance_nanos;
        state = next(&state, *permits, *timeout_nanos, now);
        trail.push(state.clone());
    }
    trail
}

proptest! {
    /// Cap: a refilled balance never exceeds the configured limit.
    #[test]
    fn cap_invariant(
        limit in 1i64..=20,
        refresh_nanos in 1_000_000u64..=200_000_000,
        ops in prop::collection::vec(op_strategy(), 1..40),
    ) {
        let trail = run(limit, refresh_nanos, &ops);
        for state in &trail {
            prop_assert!(state.active_permissions <= limit);
        }
    }

    /// Monotone cycles: active_cycle never decreases across a sequence of
    /// calls driven by a nondecreasing clock.
    #[test]
    fn monotone_cycle_invariant(
        limit in 1i64..=20,
        refresh_nanos in 1_000_000u64..=200_000_000,
        ops in prop::collection::vec(op_strategy(), 1..40),
    ) {
        let trail = run(limit, refresh_nanos, &ops);
        let mut last = 0u64;
        for state in &trail {
            prop_assert!(state.active_cycle >= last);
            last = state.active_cycle;
        }
    }

    /// Reservation soundness: a reservation is deducted only when the
    /// caller's timeout covers the computed wait; otherwise the returned
    /// snapshot must match a read-only (`NEVER_WAIT`) simulation exactly.
    #[test]
    fn reservation_soundness(
        limit in 1i64..=10,
        refresh_nanos in 1_000_000u64..=100_000_000,
        permits in 1i64..=5,
        timeout_nanos in 0i64..=50_000_000,
        now in 0u64..=500_000_000,
    ) {
        let config = Configuration::builder()
            .limit_per_period(limit)
            .refresh_period(Duration::from_nanos(refresh_nanos))
            .build()
            .unwrap();
        let prev = State::initial(config);
        let simulated = next(&prev, permits, throttlegate::algorithm::NEVER_WAIT, now);
        let got = next(&prev, permits, timeout_nanos, now);

        if timeout_nanos >= 0 && timeout_nanos as u64 >= got.nanos_to_wait {
            prop_assert_eq!(got.active_permissions, simulated.active_permissions - permits);
        } else {
            prop_assert_eq!(got.active_permissions, simulated.active_permissions);
        }
    }

    /// Throughput bound (§8): total permits granted over any interval `T`
    /// never exceeds `ceil(T/refresh_period)*limit + limit`, the one extra
    /// `limit` accounting for the partial leading cycle a sequence can
    /// straddle. Every step here is an immediate-only request
    /// (`timeout_nanos = 0`) so "granted" is exactly "wait == 0".
    #[test]
    fn throughput_bound(
        limit in 1i64..=20,
        refresh_nanos in 1_000_000u64..=200_000_000,
        steps in prop::collection::vec((1i64..=5, 0u64..=50_000_000), 1..200),
    ) {
        let config = Configuration::builder()
            .limit_per_period(limit)
            .refresh_period(Duration::from_nanos(refresh_nanos))
            .build()
            .unwrap();
        let mut state = State::initial(config);
        let mut now = 0u64;
        let mut total_granted: i64 = 0;
        for (permits, advance_nanos) in &steps {
            now += advance_nanos;
            let got = next(&state, *permits, 0, now);
            if got.nanos_to_wait == 0 {
                total_granted += permits;
            }
            state = got;
        }

        let elapsed_periods = (now as u128 + refresh_nanos as u128 - 1) / refresh_nanos as u128;
        let bound = elapsed_periods as i64 * limit + limit;
        prop_assert!(total_granted <= bound);
    }

    /// Determinism: the pure function is a referentially transparent
    /// mapping from its four inputs.
    #[test]
    fn next_is_deterministic(
        limit in 1i64..=20,
        refresh_nanos in 1_000_000u64..=200_000_000,
        permits in 1i64..=5,
        timeout_nanos in 0i64..=50_000_000,
        now in 0u64..=500_000_000,
    ) {
        let config = Configuration::builder()
            .limit_per_period(limit)
            .refresh_period(Duration::from_nanos(refresh_nanos))
            .build()
            .unwrap();
        let prev = State::initial(config);
        let a = next(&prev, permits, timeout_nanos, now);
        let b = next(&prev, permits, timeout_nanos, now);
        prop_assert_eq!(a.active_cycle, b.active_cycle);
        prop_assert_eq!(a.active_permissions, b.active_permissions);
        prop_assert_eq!(a.nanos_to_wait, b.nanos_to_wait);
    }
}
