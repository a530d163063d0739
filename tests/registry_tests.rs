//! Integration tests for the identity registry

use chatrelay::relay::{ConnectionHandle, Registry, RegistryError};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

#[tokio::test]
async fn test_concurrent_register_same_name() {
    let registry = Arc::new(Registry::new());
    let mut tasks = Vec::new();

    for _ in 0..32 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            let (handle, _rx) = ConnectionHandle::channel(1);
            registry.register("contested", handle).await
        }));
    }

    let mut winners = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => winners += 1,
            Err(e) => assert_eq!(e, RegistryError::AlreadyTaken("contested".to_string())),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(registry.snapshot().await, vec!["contested"]);
}

#[tokio::test]
async fn test_concurrent_register_distinct_names() {
    let registry = Arc::new(Registry::new());
    let mut tasks = Vec::new();

    for i in 0..32 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            let (handle, _rx) = ConnectionHandle::channel(1);
            registry.register(&format!("user{}", i), handle).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(registry.len().await, 32);
}

#[tokio::test]
async fn test_name_reusable_after_release() {
    let registry = Registry::new();
    let (first, _rx1) = ConnectionHandle::channel(1);
    let (second, _rx2) = ConnectionHandle::channel(1);

    registry.register("alice", first.clone()).await.unwrap();
    assert!(registry.unregister("alice", first.id()).await);
    registry.register("alice", second.clone()).await.unwrap();

    let found = registry.lookup("alice").await.unwrap();
    assert_eq!(found.id(), second.id());
    assert!(registry.lookup("bob").await.is_none());
}

#[derive(Debug, Clone)]
enum Op {
    Join(usize),
    Leave(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..6).prop_map(Op::Join),
        (0usize..6).prop_map(Op::Leave),
    ]
}

proptest! {
    /// After any join/leave sequence the roster is exactly the joined names, in join order
    #[test]
    fn prop_roster_matches_joined_sessions(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let registry = Registry::new();
            let mut owners = HashMap::new();
            let mut expected: Vec<String> = Vec::new();
            let mut receivers = Vec::new();

            for op in ops {
                match op {
                    Op::Join(i) => {
                        let name = format!("user{}", i);
                        let (handle, rx) = ConnectionHandle::channel(1);
                        receivers.push(rx);
                        let id = handle.id();
                        let result = registry.register(&name, handle).await;
                        if expected.contains(&name) {
                            assert_eq!(result, Err(RegistryError::AlreadyTaken(name)));
                        } else {
                            assert_eq!(result, Ok(()));
                            owners.insert(name.clone(), id);
                            expected.push(name);
                        }
                    }
                    Op::Leave(i) => {
                        let name = format!("user{}", i);
                        let removed = match owners.remove(&name) {
                            Some(id) => registry.unregister(&name, id).await,
                            None => false,
                        };
                        assert_eq!(removed, expected.contains(&name));
                        expected.retain(|n| n != &name);
                    }
                }

                assert_eq!(registry.snapshot().await, expected);
            }
        });
    }
}
