use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;

use crate::{ConcurrentMap, Settings};

#[test]
fn set_get_iter() {
    let m = ConcurrentMap::new();
    m.set("a", 1);
    m.set("b", 2);
    m.set("c", 3);

    assert_eq!(*m.get("a").unwrap(), 1);
    assert!(m.get("d").is_none());

    let pairs: HashSet<_> = m.iter().collect();
    let expected: HashSet<_> = vec![("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
    assert_eq!(pairs, expected);
}

#[test]
fn update_does_not_duplicate() {
    let m = ConcurrentMap::new();
    m.set("a", 1);
    m.set("a", 2);

    assert_eq!(*m.get("a").unwrap(), 2);
    assert_eq!(m.iter().filter(|&(k, _)| k == "a").count(), 1);
    assert_eq!(m.iter().count(), 1);
}

#[test]
fn set_then_get() {
    let m = ConcurrentMap::with_settings(Settings::sharded(7)).unwrap();

    for i in 0..2000 {
        m.set(i, !i);
        assert_eq!(*m.get(&i).unwrap(), !i);
        m.set(i, i);
        assert_eq!(*m.get(&i).unwrap(), i);
    }
}

#[test]
fn iter_over_buckets() {
    let m = ConcurrentMap::with_settings(Settings::sharded(16)).unwrap();
    for i in 0..16_000u32 {
        m.set(i, i * 2);
    }

    // Every bucket got some pairs.
    let mut counts = HashMap::new();
    for i in 0..16_000u32 {
        *counts.entry(m.bucket_index(&i)).or_insert(0) += 1;
    }
    assert_eq!(counts.len(), 16);

    let pairs: Vec<_> = m.iter().collect();
    assert_eq!(pairs.len(), 16_000);
    let keys: HashSet<_> = pairs.iter().map(|&(k, _)| k).collect();
    assert_eq!(keys.len(), 16_000);
    assert!(pairs.iter().all(|&(k, v)| v == k * 2));
}

#[test]
fn concurrent_writes_to_same_key() {
    let m = Arc::new(ConcurrentMap::new());
    let mut joins = Vec::new();

    for t in 0..10 {
        let m = m.clone();
        joins.push(thread::spawn(move || {
            for i in 0..1000 {
                m.set("key", t * 1000 + i);
                let v = *m.get("key").unwrap();
                assert!(v < 10_000);
            }
        }));
    }

    for j in joins {
        j.join().unwrap();
    }

    // The final value is the last write of one of the threads.
    let v = *m.get("key").unwrap();
    assert_eq!(v % 1000, 999);
    assert_eq!(m.iter().count(), 1);
}

#[test]
fn spam_set_single_bucket() {
    let m = Arc::new(ConcurrentMap::new());
    let mut joins = Vec::new();

    for t in 0..10 {
        let m = m.clone();
        joins.push(thread::spawn(move || {
            for i in t * 200..(t + 1) * 200 {
                m.set(i, !i);
                m.set(i, i);
            }
        }));
    }

    for j in joins {
        j.join().unwrap();
    }

    assert_eq!(m.buckets(), 1);
    for i in 0..2000 {
        assert_eq!(*m.get(&i).unwrap(), i);
    }
    assert_eq!(m.iter().count(), 2000);
}

#[test]
fn spam_set() {
    let m = Arc::new(ConcurrentMap::with_settings(Settings::sharded(256)).unwrap());
    let mut joins = Vec::new();

    for t in 0..100 {
        let m = m.clone();
        joins.push(thread::spawn(move || {
            for i in t * 1000..(t + 1) * 1000 {
                m.set(i, !i);
                m.set(i, i);
            }
        }));
    }

    for j in joins.drain(..) {
        j.join().unwrap();
    }

    for t in 0..10 {
        let m = m.clone();
        joins.push(thread::spawn(move || {
            for i in t * 10_000..(t + 1) * 10_000 {
                assert_eq!(*m.get(&i).unwrap(), i);
            }
        }));
    }

    for j in joins {
        j.join().unwrap();
    }

    assert_eq!(m.iter().count(), 100_000);
}

#[test]
fn read_while_writing() {
    let m = Arc::new(ConcurrentMap::with_settings(Settings::sharded(4)).unwrap());
    for i in 0..100 {
        m.set(i, 0);
    }

    let writer = {
        let m = m.clone();
        thread::spawn(move || {
            for round in 1..=100 {
                for i in 0..100 {
                    m.set(i, round);
                }
            }
        })
    };

    let mut last = vec![0; 100];
    while !writer.is_finished() {
        // Values only grow, and a guard pins what was read.
        for (i, last) in last.iter_mut().enumerate() {
            let v = m.get(&i).unwrap();
            assert!(*v >= *last);
            *last = *v;
        }
    }

    writer.join().unwrap();
    for i in 0..100 {
        assert_eq!(*m.get(&i).unwrap(), 100);
    }
}
