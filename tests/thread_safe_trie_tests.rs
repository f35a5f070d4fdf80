//! Integration tests for cross-thread use of HashTrieMap.
//!
//! With the `arc` feature enabled, any number of threads may read one
//! map version or derive new versions from it without synchronization.
//! Writers coordinate through an external compare-and-swap cell, which
//! these tests model the way a host application would build it.

#![cfg(feature = "arc")]

use rstest::rstest;
use std::sync::{Arc, Mutex};
use std::thread;
use triemap::HashTrieMap;

// =============================================================================
// Concurrent readers over a shared version
// =============================================================================

#[rstest]
fn test_cross_thread_reads_of_shared_version() {
    let map: Arc<HashTrieMap<i32, i32>> = Arc::new((0..1_000).map(|i| (i, i * 2)).collect());

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let shared = Arc::clone(&map);
            thread::spawn(move || {
                for index in (worker..1_000).step_by(4) {
                    assert_eq!(shared.get(&index), Some(&(index * 2)));
                }
                shared.len()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().expect("reader panicked"), 1_000);
    }
}

#[rstest]
fn test_cross_thread_derivations_share_structure() {
    let original = Arc::new(
        HashTrieMap::new()
            .insert("a".to_string(), 1)
            .insert("b".to_string(), 2)
            .insert("c".to_string(), 3),
    );

    let handles: Vec<_> = (0..4)
        .map(|worker: i32| {
            let shared = Arc::clone(&original);
            thread::spawn(move || {
                // Each thread derives its own new version
                let derived = shared.insert(format!("worker-{worker}"), worker * 10);
                assert_eq!(derived.len(), 4);
                // Original is unchanged
                assert_eq!(shared.len(), 3);
                derived
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("writer panicked"))
        .collect();

    for (worker, derived) in (0_i32..).zip(&results) {
        assert_eq!(derived.get(&format!("worker-{worker}")), Some(&(worker * 10)));
        assert_eq!(derived.get("a"), Some(&1));
    }
    assert_eq!(original.len(), 3);
}

// =============================================================================
// External compare-and-swap retry loop
// =============================================================================

/// The shared cell the map is designed to sit behind: writers publish a
/// new version only if the current one is still the version they read.
struct SharedCell {
    current: Mutex<HashTrieMap<String, i32>>,
}

impl SharedCell {
    fn new(map: HashTrieMap<String, i32>) -> Self {
        Self {
            current: Mutex::new(map),
        }
    }

    fn load(&self) -> HashTrieMap<String, i32> {
        self.current.lock().expect("cell poisoned").clone()
    }

    fn compare_and_swap(
        &self,
        expected: &HashTrieMap<String, i32>,
        replacement: HashTrieMap<String, i32>,
    ) -> bool {
        let mut current = self.current.lock().expect("cell poisoned");
        if current.ptr_eq(expected) {
            *current = replacement;
            true
        } else {
            false
        }
    }
}

#[rstest]
fn test_cas_retry_loop_with_contending_writers() {
    let cell = Arc::new(SharedCell::new(HashTrieMap::new()));
    let writers = 4;
    let keys_per_writer = 100;

    let handles: Vec<_> = (0..writers)
        .map(|worker| {
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                for index in 0..keys_per_writer {
                    loop {
                        let snapshot = cell.load();
                        let updated =
                            snapshot.insert(format!("w{worker}-k{index}"), index as i32);
                        if cell.compare_and_swap(&snapshot, updated) {
                            break;
                        }
                        // Lost the race: retry against the new version.
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("writer panicked");
    }

    let result = cell.load();
    assert_eq!(result.len(), writers * keys_per_writer);
    for worker in 0..writers {
        for index in 0..keys_per_writer {
            assert_eq!(
                result.get(&format!("w{worker}-k{index}")),
                Some(&(index as i32))
            );
        }
    }
}

#[rstest]
fn test_cas_conditional_removal_observes_value_in_one_pass() {
    let cell = Arc::new(SharedCell::new(
        HashTrieMap::new().insert("job".to_string(), 1),
    ));

    // Two contenders race to claim the same entry; conditional removal
    // guarantees exactly one of them wins.
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                loop {
                    let snapshot = cell.load();
                    let mut claimed = false;
                    let updated =
                        snapshot.remove_if_with("job", &1, |occurred| claimed = occurred);
                    if !claimed {
                        return false; // Someone else already took it.
                    }
                    if cell.compare_and_swap(&snapshot, updated) {
                        return true;
                    }
                }
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|handle| handle.join().expect("contender panicked"))
        .filter(|won| *won)
        .count();

    assert_eq!(winners, 1);
    assert!(cell.load().is_empty());
}

// =============================================================================
// Send + Sync bounds
// =============================================================================

#[rstest]
fn test_map_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<HashTrieMap<String, i32>>();
    assert_send_sync::<HashTrieMap<i32, Vec<u8>>>();
}
