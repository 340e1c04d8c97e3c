#![allow(dead_code)]

use cookie_session::SessionBackend;
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle checks every backend has to pass. `prefix` keeps ids unique per run.
pub async fn lifecycle_contract(backend: &dyn SessionBackend, prefix: &str) {
    let sid = format!("{prefix}-lifecycle");
    assert!(!backend.check(&sid).await.expect("check missing"));

    let handle = backend.create(&sid, 10).await.expect("create");
    assert_eq!(handle.session_id(), sid);
    assert!(handle.is_empty());
    assert!(handle.get("foo").is_none());

    handle.set("foo", "bar");
    handle.set("foo2", "bar2");
    handle.save().await.expect("save");
    drop(handle);
    assert!(backend.check(&sid).await.expect("check live"));

    let handle = backend.update(&sid, 10).await.expect("update");
    assert_eq!(handle.get_str("foo").as_deref(), Some("bar"));
    let removed = handle.remove("foo");
    assert_eq!(removed.as_ref().and_then(|v| v.as_str()), Some("bar"));
    assert!(handle.get("foo").is_none());
    assert_eq!(handle.get_str("foo2").as_deref(), Some("bar2"));
    handle.flush();
    assert!(handle.get("foo2").is_none());
    handle.set("kept", "yes");
    handle.save().await.expect("save after flush");
    drop(handle);

    let new_sid = format!("{prefix}-lifecycle-rotated");
    let handle = backend.refresh(&sid, &new_sid, 10).await.expect("refresh");
    assert_eq!(handle.session_id(), new_sid);
    assert_eq!(handle.get_str("kept").as_deref(), Some("yes"));
    assert_eq!(handle.len(), 1);
    drop(handle);
    assert!(!backend.check(&sid).await.expect("old id gone"));
    assert!(backend.check(&new_sid).await.expect("new id live"));

    backend.delete(&new_sid).await.expect("delete");
    assert!(!backend.check(&new_sid).await.expect("check deleted"));
    backend.delete(&new_sid).await.expect("delete missing is a no-op");
}

/// `update` and `refresh` on ids without a record behave like `create`.
pub async fn missing_ids_are_created(backend: &dyn SessionBackend, prefix: &str) {
    let sid = format!("{prefix}-fresh");
    let handle = backend.update(&sid, 10).await.expect("update missing");
    assert!(handle.is_empty());
    assert!(backend.check(&sid).await.expect("check"));

    let absent = format!("{prefix}-absent");
    let rotated = format!("{prefix}-absent-rotated");
    let handle = backend.refresh(&absent, &rotated, 10).await.expect("refresh missing");
    assert!(handle.is_empty());
    assert!(!backend.check(&absent).await.expect("absent"));
    assert!(backend.check(&rotated).await.expect("rotated"));
}

/// A one-second record is gone two seconds later.
pub async fn expired_records_are_not_live(backend: &dyn SessionBackend, prefix: &str) {
    let sid = format!("{prefix}-short");
    let handle = backend.create(&sid, 1).await.expect("create");
    handle.set("foo", "bar");
    handle.save().await.expect("save");
    assert!(backend.check(&sid).await.expect("live"));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!backend.check(&sid).await.expect("expired"));

    let handle = backend.update(&sid, 10).await.expect("update expired");
    assert!(handle.get("foo").is_none());
}

/// Two tasks writing different keys through one handle both land in storage.
pub async fn concurrent_sets_survive_save(backend: &dyn SessionBackend, prefix: &str) {
    let sid = format!("{prefix}-concurrent");
    let handle = Arc::new(backend.create(&sid, 10).await.expect("create"));

    let a = {
        let handle = Arc::clone(&handle);
        tokio::spawn(async move { handle.set("a", 1) })
    };
    let b = {
        let handle = Arc::clone(&handle);
        tokio::spawn(async move { handle.set("b", 2) })
    };
    a.await.expect("task a");
    b.await.expect("task b");

    handle.save().await.expect("save");
    drop(handle);

    let reloaded = backend.update(&sid, 10).await.expect("reload");
    assert_eq!(reloaded.get_as::<i64>("a").expect("decode a"), Some(1));
    assert_eq!(reloaded.get_as::<i64>("b").expect("decode b"), Some(2));
}
