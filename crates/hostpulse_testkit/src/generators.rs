//! Property-based test generators using proptest.
//!
//! Scripts are sequences of [`Step`]s replayed against both a
//! [`TestAgent`](crate::TestAgent) and a [`CounterModel`](crate::CounterModel).

use proptest::prelude::*;

/// One thing that can happen to a running agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// One minute passes and the agent ticks.
    Tick,
    /// The clock jumps to the next day without a tick.
    NextDay,
    /// The collector becomes reachable or unreachable.
    Connectivity(bool),
    /// The collector starts accepting or rejecting each endpoint.
    Accepting {
        /// Bulk endpoint answers 200.
        bulk: bool,
        /// Single-window endpoint answers 200.
        window: bool,
    },
    /// A scheduled standalone sync.
    Sync,
    /// The agent dies without finalizing and is started again.
    Restart,
}

/// Strategy for a single step, weighted towards ticks.
pub fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        10 => Just(Step::Tick),
        1 => Just(Step::NextDay),
        2 => any::<bool>().prop_map(Step::Connectivity),
        1 => (any::<bool>(), any::<bool>())
            .prop_map(|(bulk, window)| Step::Accepting { bulk, window }),
        1 => Just(Step::Sync),
        1 => Just(Step::Restart),
    ]
}

/// Strategy for a script of up to `max_len` steps.
pub fn script_strategy(max_len: usize) -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(step_strategy(), 1..max_len)
}

/// Strategy for a script of ticks only, against an unreachable collector.
pub fn offline_ticks_strategy(max_len: usize) -> impl Strategy<Value = usize> {
    1..max_len
}

/// Strategy for small window sizes, so rollovers happen often.
pub fn window_size_strategy() -> impl Strategy<Value = u32> {
    1u32..=8
}

/// Strategy for interval documents that must not survive a load.
///
/// Produces unparsable bytes, structurally wrong JSON, and well-formed
/// windows whose `elapsed` exceeds `window_size`.
pub fn bad_interval_strategy(window_size: u32) -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..64)
            .prop_filter("must not be valid JSON", |bytes| {
                serde_json::from_slice::<serde_json::Value>(bytes).is_err()
            }),
        Just(b"[]".to_vec()),
        Just(br#"{"elapsed": "five"}"#.to_vec()),
        (window_size + 1..=window_size + 1000).prop_map(|elapsed| {
            format!(
                r#"{{"elapsed": {}, "date": "2026-03-14",
                    "created_at": "2026-03-14T08:00:00Z",
                    "last_updated": "2026-03-14T08:00:00Z"}}"#,
                elapsed
            )
            .into_bytes()
        }),
    ]
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
