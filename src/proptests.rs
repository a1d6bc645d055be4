use std::collections::BTreeMap;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

use crate::{HatTrie, Value};

/// Actions to test against both implementations
#[derive(Arbitrary, Debug, Clone)]
enum Action {
    Insert(KeyValue),
    Get(Key),
    GetOrInsert(Key),
    Remove(Key),
}

/// Wrapper for key generation with custom strategy
#[derive(Debug, Clone)]
struct Key(Vec<u8>);

/// Wrapper for key-value pair
#[derive(Debug, Clone)]
struct KeyValue {
    key: Key,
    value: Value,
}

impl Arbitrary for Key {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            // Empty key
            Just(Key(vec![])),
            // Single bytes, NUL included
            any::<u8>().prop_map(|b| Key(vec![b])),
            // Short binary keys
            prop::collection::vec(any::<u8>(), 1..4).prop_map(Key),
            // Medium binary keys
            prop::collection::vec(any::<u8>(), 4..24).prop_map(Key),
            // Keys sharing a prefix, so trie-node values and their
            // extensions collide in interesting ways
            "[a-c]{0,3}".prop_map(|s| {
                let mut key = b"pre".to_vec();
                key.extend_from_slice(s.as_bytes());
                Key(key)
            }),
        ]
        .boxed()
    }
}

impl Arbitrary for KeyValue {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (any::<Key>(), any::<Value>())
            .prop_map(|(key, value)| KeyValue { key, value })
            .boxed()
    }
}

/// Test harness that executes actions on both HatTrie and a BTreeMap model
#[derive(Default)]
struct Test {
    trie: HatTrie,
    model: BTreeMap<Vec<u8>, Value>,
}

impl Test {
    fn execute(&mut self, action: Action) {
        match action {
            Action::Insert(kv) => {
                let key = kv.key.0;
                let trie_result = self.trie.insert(&key, kv.value);
                let model_result = self.model.insert(key.clone(), kv.value);
                assert_eq!(
                    trie_result, model_result,
                    "insert mismatch: key={:?}",
                    key
                );
            }
            Action::Get(key) => {
                let key = key.0;
                let trie_result = self.trie.get(&key);
                let model_result = self.model.get(&key).copied();
                assert_eq!(trie_result, model_result, "get mismatch: key={:?}", key);
            }
            Action::GetOrInsert(key) => {
                let key = key.0;
                let trie_result = self.trie.get_or_insert(&key);
                let model_result = *self.model.entry(key.clone()).or_insert(0);
                assert_eq!(
                    trie_result, model_result,
                    "get_or_insert mismatch: key={:?}",
                    key
                );
            }
            Action::Remove(key) => {
                let key = key.0;
                let trie_result = self.trie.remove(&key);
                let model_result = self.model.remove(&key);
                assert_eq!(trie_result, model_result, "remove mismatch: key={:?}", key);
            }
        }
        assert_eq!(
            self.trie.len(),
            self.model.len(),
            "length mismatch after action"
        );
        assert_eq!(self.trie.is_empty(), self.model.is_empty());
    }

    /// Sorted iteration must equal the model exactly; unsorted iteration
    /// must visit the same multiset.
    fn check_iteration(&self) {
        let expected: Vec<(Vec<u8>, Value)> =
            self.model.iter().map(|(k, v)| (k.clone(), *v)).collect();

        let sorted: Vec<_> = self.trie.iter(true).collect();
        assert_eq!(sorted, expected, "sorted iteration mismatch");

        let mut unsorted: Vec<_> = self.trie.iter(false).collect();
        unsorted.sort();
        assert_eq!(unsorted, expected, "unsorted iteration multiset mismatch");
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn proptest_vs_btreemap(actions in prop::collection::vec(any::<Action>(), 1..64)) {
        let mut test = Test::default();
        for action in actions {
            test.execute(action);
        }
        test.check_iteration();
    }
}
