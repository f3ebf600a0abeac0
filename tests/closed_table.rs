use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use hashtab::{
    BoundedAlloc, ClosedTable, HashOps, IdentityOps, Murmur3, RemovalCause, StrOps, TableError,
};

fn random_keys(n: usize) -> Vec<u64> {
    let mut buf = vec![0u8; n * 8];
    getrandom::getrandom(&mut buf).unwrap();
    buf.chunks_exact(8)
        .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

#[test]
fn load_factor_triggers_the_first_rehash() {
    let mut table = ClosedTable::<(u32, u32), IdentityOps>::builder()
        .initial_buckets(32)
        .build(IdentityOps);

    for key in 0..24 {
        table.insert((key, key)).unwrap();
    }
    let stats = table.stats();
    assert_eq!(stats.num_buckets(), 32);
    assert_eq!(stats.num_items(), 24);
    assert_eq!(stats.generation(), 0);

    table.insert((24, 24)).unwrap();
    let stats = table.stats();
    assert_eq!(stats.num_buckets(), 64);
    assert_eq!(stats.log2_num_buckets(), 6);
    assert_eq!(stats.generation(), 1);
}

#[test]
fn bloom_filter_never_hides_a_stored_key() {
    let keys = random_keys(5_000);
    let mut table = ClosedTable::<(u64, ()), HashOps<Murmur3>>::builder()
        .bloom_filter(8)
        .build(HashOps::with_seed(17));

    for key in &keys {
        table.insert((*key, ())).unwrap();
    }
    // A 256-bit filter is saturated by 5,000 keys; every lookup must still
    // find its record.
    for key in &keys {
        assert!(table.contains_key(key));
    }
    assert_eq!(table.len(), keys.len());
}

#[test]
fn header_like_string_keys() {
    let mut headers = ClosedTable::new(StrOps::<hashtab::OneAtATime>::case_insensitive());
    headers.insert(("Host".to_string(), "example.com")).unwrap();
    headers.insert(("Accept".to_string(), "*/*")).unwrap();

    let old = headers
        .insert(("HOST".to_string(), "example.org"))
        .unwrap();
    assert_eq!(old, Some(("Host".to_string(), "example.com")));
    assert_eq!(headers.get_and("host", |(_, v)| *v), Some("example.org"));
    assert_eq!(headers.len(), 2);
}

#[test]
fn delete_and_drop_notify_the_listener() {
    let explicit = Arc::new(AtomicUsize::default());
    let dropped = Arc::new(AtomicUsize::default());
    let (explicit1, dropped1) = (Arc::clone(&explicit), Arc::clone(&dropped));

    let mut table = ClosedTable::<(u32, String), IdentityOps>::builder()
        .name("listener")
        .removal_listener(move |_, cause| match cause {
            RemovalCause::Explicit => {
                explicit1.fetch_add(1, Ordering::Relaxed);
            }
            RemovalCause::Dropped => {
                dropped1.fetch_add(1, Ordering::Relaxed);
            }
            _ => unreachable!("unexpected cause {cause:?}"),
        })
        .build(IdentityOps);

    for key in 0..50 {
        table.insert((key, key.to_string())).unwrap();
    }
    for key in 0..10 {
        assert!(table.delete(&key));
    }
    assert!(!table.delete(&0));
    assert_eq!(explicit.load(Ordering::Relaxed), 10);

    drop(table);
    assert_eq!(dropped.load(Ordering::Relaxed), 40);
}

#[test]
fn bounded_allocator_reports_failures() -> anyhow::Result<()> {
    let alloc = Arc::new(BoundedAlloc::new(4096));
    let mut table = ClosedTable::<(u64, u64), IdentityOps, Arc<BoundedAlloc>>::builder()
        .initial_buckets(2)
        .build_with_alloc(IdentityOps, Arc::clone(&alloc));

    let mut stored = 0u64;
    let err = loop {
        match table.insert((stored, stored)) {
            Ok(_) => stored += 1,
            Err(e) => break e,
        }
    };

    assert!(matches!(err, TableError::AllocFailed { .. }));
    assert!(err.bytes() > 0);
    assert!(alloc.in_use() <= alloc.limit());
    assert_eq!(table.len() as u64, stored);
    for key in 0..stored {
        anyhow::ensure!(table.get(&key) == Some((key, key)), "lost key {key}");
    }

    table.clear();
    assert_eq!(alloc.in_use(), 0);
    Ok(())
}
