//! Ownership admission properties exercised through the resource table and
//! the host façade.

use std::sync::Arc;
use std::thread;

use camera_broker::{
    CameraHost, ErrorCode, HostOptions, OwnerToken, ResourceId, ResourceTable,
};

#[test]
fn test_ownership_round_trip_law() {
    let table = ResourceTable::new();
    let id = ResourceId::camera(0);
    let t1 = OwnerToken::new("t");
    let t2 = OwnerToken::new("t-prime");

    // acquire(t); release(t); acquire(t') always admits the third step.
    assert!(table.acquire(id, &t1).is_ok());
    assert!(table.release(id, &t1));
    assert!(table.acquire(id, &t2).is_ok());

    // Same-token round trip holds as well.
    assert!(table.release(id, &t2));
    assert!(table.acquire(id, &t2).is_ok());
}

#[test]
fn test_non_owner_release_leaves_owner_unchanged() {
    let table = ResourceTable::new();
    let id = ResourceId::camera(0);
    let owner = OwnerToken::new("owner");
    table.acquire(id, &owner).unwrap();

    assert!(!table.release(id, &OwnerToken::new("other")));
    assert_eq!(table.owner(id), Some(owner.clone()));

    // The rightful owner can still release.
    assert!(table.release(id, &owner));
    assert!(table.owner(id).is_none());
}

#[test]
fn test_n_concurrent_acquires_admit_exactly_one() {
    let table = Arc::new(ResourceTable::new());
    let id = ResourceId::camera(0);
    table.ensure(id);

    let n = 32;
    let results: Vec<bool> = (0..n)
        .map(|i| {
            let table = Arc::clone(&table);
            thread::spawn(move || table.acquire(id, &OwnerToken::new(format!("t{i}"))).is_ok())
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    assert_eq!(results.iter().filter(|&&ok| ok).count(), 1);
    assert_eq!(
        results.iter().filter(|&&ok| !ok).count(),
        n - 1,
        "losers must fail with the ownership conflict"
    );
}

#[test]
fn test_acquire_failure_code_is_own2001() {
    let table = ResourceTable::new();
    let id = ResourceId::camera(0);
    table.acquire(id, &OwnerToken::new("a")).unwrap();
    assert_eq!(
        table.acquire(id, &OwnerToken::new("b")),
        Err(ErrorCode::OwnershipConflict)
    );
}

#[test]
fn test_concurrent_session_creation_admits_one_per_camera() {
    let host = Arc::new(CameraHost::new());
    host.initialize(HostOptions::new().with_camera_count(2))
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let host = Arc::clone(&host);
            thread::spawn(move || {
                let user = format!("u{i}");
                host.create_session(Some(user.as_str())).is_ok()
            })
        })
        .collect();

    let admitted = handles
        .into_iter()
        .map(|h| h.join().unwrap_or(false))
        .filter(|ok| *ok)
        .count();
    assert_eq!(admitted, 2, "one session per pre-registered camera");
    assert_eq!(host.free_resource_count(), 0);
    host.shutdown();
}

#[test]
fn test_shutdown_then_reinitialize_frees_cameras() {
    let host = CameraHost::new();
    host.initialize(HostOptions::new().with_camera_count(1))
        .unwrap();
    let session = host.create_session(Some("u1")).unwrap();

    host.shutdown();
    host.initialize(HostOptions::new().with_camera_count(1))
        .unwrap();
    // The old owner is gone after teardown.
    let fresh = host.create_session(Some("u2"));
    assert!(fresh.is_ok());

    drop(session);
    host.shutdown();
}
