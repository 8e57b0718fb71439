//! Property-based test generators using proptest.
//!
//! Provides strategies for field values, like patterns and group
//! hierarchies.

use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use yep_value::{RecordId, Value};

/// Strategy for generating record ids.
pub fn record_id_strategy() -> impl Strategy<Value = RecordId> {
    (1i64..10_000).prop_map(RecordId::new)
}

/// Strategy for generating scalar and relational values.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e6f64..1.0e6).prop_map(Value::Float),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::Text),
        record_id_strategy().prop_map(Value::Id),
        prop::collection::vec(record_id_strategy(), 0..4).prop_map(Value::Ids),
    ]
}

/// Strategy for generating text fragments safe to embed in like patterns.
pub fn like_fragment_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9.*+?()]{0,8}").expect("Invalid regex")
}

/// A group hierarchy: group `i` inherits from the listed groups, all of
/// which have a lower index.
#[derive(Debug, Clone)]
pub struct GroupHierarchy {
    /// Parents of each group.
    pub parents: Vec<Vec<usize>>,
}

impl GroupHierarchy {
    /// Name of group `i`.
    #[must_use]
    pub fn name(i: usize) -> String {
        format!("group_{i}")
    }

    /// Groups reachable from `start` through inheritance, `start` included.
    #[must_use]
    pub fn closure(&self, start: usize) -> Vec<usize> {
        let mut seen = vec![false; self.parents.len()];
        let mut stack = vec![start];
        while let Some(g) = stack.pop() {
            if std::mem::replace(&mut seen[g], true) {
                continue;
            }
            stack.extend(self.parents[g].iter().copied());
        }
        (0..seen.len()).filter(|g| seen[*g]).collect()
    }
}

/// Strategy for generating acyclic group hierarchies of up to `max` groups.
pub fn group_hierarchy_strategy(max: usize) -> impl Strategy<Value = GroupHierarchy> {
    (1..=max.max(1))
        .prop_flat_map(|n| {
            (0..n)
                .map(|i| {
                    if i == 0 {
                        Just(Vec::new()).boxed()
                    } else {
                        prop::collection::vec(0..i, 0..=2.min(i)).boxed()
                    }
                })
                .collect::<Vec<_>>()
        })
        .prop_map(|mut parents| {
            for p in &mut parents {
                p.sort_unstable();
                p.dedup();
            }
            GroupHierarchy { parents }
        })
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
