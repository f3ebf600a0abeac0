use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use hashtab::{
    BucketMutexes, ChainedTable, FnOps, GrowthState, HashOps, IdentityOps, Murmur3, RemovalCause,
    RwLocks, SingleThreaded, StrOps, StreamingHash, XxHash32,
};
use paste::paste;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_seed() -> u32 {
    let mut buf = [0; 4];
    getrandom::getrandom(&mut buf).unwrap();
    u32::from_le_bytes(buf)
}

// Generates the same tests for every lock strategy.
macro_rules! generate_chained_tests {
    ($name:ident, $locks:ty) => {
        paste! {
            #[test]
            fn [<$name _fold_and_filter>]() {
                let table = ChainedTable::<(i32, i32), IdentityOps, $locks>::builder()
                    .build(IdentityOps);
                for key in 0..=31 {
                    table.insert((key, key + 1)).unwrap();
                }

                assert_eq!(table.fold(0, |sum, (_, v)| sum + v), 528);

                let evicted = table.retain(|(_, v)| v % 2 == 0);
                assert_eq!(evicted, 16);
                assert_eq!(table.len(), 16);
                assert_eq!(table.fold(0, |sum, (_, v)| sum + v), 272);
            }

            #[test]
            fn [<$name _round_trip>]() {
                init_logger();

                let table = ChainedTable::<(u32, u64), HashOps<XxHash32>, $locks>::builder()
                    .name(stringify!($name))
                    .build(HashOps::with_seed(random_seed()));

                for key in 0..10_000u32 {
                    table.insert((key, u64::from(key) * 3)).unwrap();
                }
                assert_eq!(table.len(), 10_000);
                assert!(table.num_buckets().is_power_of_two());
                assert!(table.generation() > 0);

                for key in 0..10_000u32 {
                    assert_eq!(table.get(&key), Some((key, u64::from(key) * 3)), "key {key}");
                }

                // Shadow every tenth key, then uncover it again.
                for key in (0..10_000u32).step_by(10) {
                    table.insert((key, 0)).unwrap();
                    assert_eq!(table.get_and(&key, |(_, v)| *v), Some(0));
                }
                assert_eq!(table.len(), 11_000);
                for key in (0..10_000u32).step_by(10) {
                    assert_eq!(table.remove(&key), Some((key, 0)));
                    assert_eq!(table.get(&key), Some((key, u64::from(key) * 3)));
                }

                for key in (0..10_000u32).filter(|k| k % 3 == 0) {
                    assert!(table.delete(&key));
                }
                assert_eq!(table.len(), 10_000 - 3_334);
                assert_eq!(table.fold(0, |n, _| n + 1), table.len());
            }

            #[test]
            fn [<$name _string_keys>]() {
                let table = ChainedTable::<(String, usize), StrOps, $locks>::builder()
                    .bloom_filter(12)
                    .build(StrOps::case_insensitive());

                for (i, word) in ["Alpha", "Bravo", "Charlie", "Delta"].iter().enumerate() {
                    table.insert((word.to_string(), i)).unwrap();
                }

                assert_eq!(table.get_and("CHARLIE", |(_, i)| *i), Some(2));
                assert!(table.contains_key("bravo"));
                assert!(!table.contains_key("Echo"));
                assert_eq!(table.remove("ALPHA"), Some(("Alpha".to_string(), 0)));
            }

            #[test]
            fn [<$name _removal_listener>]() {
                let removed = Arc::new(AtomicUsize::default());
                let removed1 = Arc::clone(&removed);

                let table = ChainedTable::<(u32, u32), IdentityOps, $locks>::builder()
                    .removal_listener(move |_, cause| {
                        assert_ne!(cause, RemovalCause::Explicit);
                        removed1.fetch_add(1, Ordering::Relaxed);
                    })
                    .build(IdentityOps);

                for key in 0..100 {
                    table.insert((key, key)).unwrap();
                }
                table.retain(|(k, _)| k % 4 != 0);
                assert_eq!(removed.load(Ordering::Relaxed), 25);

                // Keys returned by `remove` are not reported.
                assert!(table.remove(&1).is_some());
                assert_eq!(removed.load(Ordering::Relaxed), 25);

                drop(table);
                assert_eq!(removed.load(Ordering::Relaxed), 99);
            }
        }
    };
}

generate_chained_tests!(single_threaded, SingleThreaded);
generate_chained_tests!(rw_locks, RwLocks);
generate_chained_tests!(bucket_mutexes, BucketMutexes);

#[test]
fn colliding_keys_disable_growth() -> anyhow::Result<()> {
    init_logger();

    // Murmur3 over the key's high bits only: keys below 2^16 all share one
    // hash.
    let ops = FnOps::new(
        |k: &u32| Murmur3::hash_bytes(7, &(k >> 16).to_le_bytes()),
        |a: &u32, b: &u32| a == b,
    );
    let table = ChainedTable::<(u32, ()), _, RwLocks>::builder()
        .name("colliding")
        .build(ops);

    for key in 0..5_000u32 {
        table.insert((key, ()))?;
    }

    let stats = table.stats();
    assert_eq!(stats.growth(), GrowthState::Disabled);
    assert_eq!(stats.generation(), 2);
    assert_eq!(stats.ineff_expands(), 2);
    assert_eq!(stats.longest_chain(), 5_000);

    // Every key is still reachable.
    for key in 0..5_000u32 {
        assert!(table.contains_key(&key));
    }
    Ok(())
}

#[test]
#[cfg_attr(skip_large_mem_tests, ignore)]
fn grows_to_a_million_records() -> anyhow::Result<()> {
    let table = ChainedTable::<(u64, u64), HashOps<XxHash32>, RwLocks>::builder()
        .initial_buckets(1024)
        .build(HashOps::new());

    for key in 0..1_000_000u64 {
        table.insert((key, key))?;
    }

    let stats = table.stats();
    assert_eq!(stats.num_items(), 1_000_000);
    assert_eq!(stats.growth(), GrowthState::Idle);
    assert!(stats.load_factor() < 10.0);
    assert!(stats.longest_chain() < 64);

    for key in (0..1_000_000u64).step_by(997) {
        assert_eq!(table.get(&key), Some((key, key)));
    }
    Ok(())
}
