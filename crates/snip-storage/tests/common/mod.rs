//! Behaviour every backend must share, written once and run per backend.
#![allow(dead_code)]

use snip_core::{NewUrl, Owner, ShortCode, Store, StoreError, StoreStats};
use std::collections::HashSet;
use std::sync::Arc;

pub fn url(original: &str, owner: &str) -> NewUrl {
    NewUrl::new(original, Owner::new(owner)).unwrap()
}

pub async fn create_then_get<S: Store>(store: &S) {
    let created = store.create(url("https://example.com/a", "u1")).await.unwrap();

    let got = store.get_by_id(&created.id).await.unwrap();
    assert_eq!(got.original_url, "https://example.com/a");
    assert_eq!(got.owner, Owner::new("u1"));
    assert!(!got.is_deleted);
    assert_eq!(got.id.as_str().len(), 16);
}

pub async fn unknown_code_is_not_found<S: Store>(store: &S) {
    let err = store.get_by_id(&ShortCode::new("missing")).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

pub async fn duplicate_url_returns_existing_code<S: Store>(store: &S) {
    let first = store.create(url("https://dup.example", "u1")).await.unwrap();

    let err = store.create(url("https://dup.example", "u1")).await.unwrap_err();
    let existing = err.existing().expect("duplicate should be AlreadyExists");
    assert_eq!(existing.id, first.id);

    let err = store.create(url("https://dup.example", "u1")).await.unwrap_err();
    assert_eq!(err.existing().map(|r| &r.id), Some(&first.id));
}

/// u1 shortens a URL, u2 re-submits it, then both try to delete it.
pub async fn first_writer_owns_and_deletes<S: Store>(store: &S) {
    let u1 = Owner::new("u1");
    let u2 = Owner::new("u2");

    let c1 = store.create(url("https://a.example", "u1")).await.unwrap().id;

    let err = store.create(url("https://a.example", "u2")).await.unwrap_err();
    assert_eq!(err.existing().map(|r| &r.id), Some(&c1));

    let got = store.get_by_id(&c1).await.unwrap();
    assert_eq!(got.original_url, "https://a.example");
    assert_eq!(got.owner, u1);

    store
        .bulk_soft_delete(std::slice::from_ref(&c1), &u2)
        .await
        .unwrap();
    assert!(store.get_by_id(&c1).await.is_ok());

    store
        .bulk_soft_delete(std::slice::from_ref(&c1), &u1)
        .await
        .unwrap();
    let err = store.get_by_id(&c1).await.unwrap_err();
    assert!(matches!(err, StoreError::IsDeleted(_)));
}

pub async fn soft_delete_only_touches_owner_records<S: Store>(store: &S) {
    let mine = store.create(url("https://mine.example", "u1")).await.unwrap();
    let theirs = store.create(url("https://theirs.example", "u2")).await.unwrap();

    let ids = vec![
        mine.id.clone(),
        theirs.id.clone(),
        ShortCode::new("does-not-exist"),
    ];
    store.bulk_soft_delete(&ids, &Owner::new("u1")).await.unwrap();

    assert!(matches!(
        store.get_by_id(&mine.id).await,
        Err(StoreError::IsDeleted(_))
    ));
    assert!(store.get_by_id(&theirs.id).await.is_ok());
}

pub async fn listing_skips_deleted_records<S: Store>(store: &S) {
    let owner = Owner::new("lister");
    let keep = store.create(url("https://keep.example", "lister")).await.unwrap();
    let drop = store.create(url("https://drop.example", "lister")).await.unwrap();
    store.create(url("https://other.example", "someone")).await.unwrap();

    store
        .bulk_soft_delete(std::slice::from_ref(&drop.id), &owner)
        .await
        .unwrap();

    let listed = store.list_by_owner(&owner).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, keep.id);

    let none = store.list_by_owner(&Owner::new("nobody")).await.unwrap();
    assert!(none.is_empty());
}

pub async fn deleted_url_can_be_shortened_again<S: Store>(store: &S) {
    let owner = Owner::new("u1");
    let first = store.create(url("https://again.example", "u1")).await.unwrap();
    store
        .bulk_soft_delete(std::slice::from_ref(&first.id), &owner)
        .await
        .unwrap();

    let second = store.create(url("https://again.example", "u1")).await.unwrap();
    assert_ne!(second.id, first.id);
    assert!(store.get_by_id(&second.id).await.is_ok());
}

pub async fn bulk_create_reports_per_item<S: Store>(store: &S) {
    let existing = store.create(url("https://old.example", "u0")).await.unwrap();

    let outcomes = store
        .bulk_create(vec![
            url("https://new-1.example", "u1").with_correlation_id("a"),
            url("https://old.example", "u1").with_correlation_id("b"),
            url("https://new-2.example", "u1").with_correlation_id("c"),
            url("https://new-1.example", "u1").with_correlation_id("d"),
        ])
        .await
        .unwrap();

    let correlation: Vec<_> = outcomes
        .iter()
        .map(|o| o.correlation_id.as_deref())
        .collect();
    assert_eq!(correlation, vec![Some("a"), Some("b"), Some("c"), Some("d")]);

    let new_1 = outcomes[0].result.as_ref().unwrap();
    assert_eq!(new_1.owner, Owner::new("u1"));
    assert!(matches!(
        outcomes[1].result,
        Err(StoreError::AlreadyExists(_))
    ));
    assert_eq!(outcomes[1].short_code(), Some(&existing.id));
    assert!(outcomes[2].result.is_ok());
    assert_eq!(outcomes[3].short_code(), Some(&new_1.id));

    let fetched = store.get_by_id(&new_1.id).await.unwrap();
    assert_eq!(fetched.correlation_id.as_deref(), Some("a"));
}

pub async fn bulk_create_accepts_empty_batch<S: Store>(store: &S) {
    let outcomes = store.bulk_create(Vec::new()).await.unwrap();
    assert!(outcomes.is_empty());
}

pub async fn stats_count_live_urls_and_owners<S: Store>(store: &S) {
    assert_eq!(store.stats().await.unwrap(), StoreStats::default());

    store.create(url("https://s1.example", "u1")).await.unwrap();
    store.create(url("https://s2.example", "u1")).await.unwrap();
    let gone = store.create(url("https://s3.example", "u2")).await.unwrap();
    store
        .bulk_soft_delete(std::slice::from_ref(&gone.id), &Owner::new("u2"))
        .await
        .unwrap();

    assert_eq!(
        store.stats().await.unwrap(),
        StoreStats { urls: 2, users: 1 }
    );
}

pub async fn close_twice_fails<S: Store>(store: &S) {
    store.ping().await.unwrap();
    store.close().await.unwrap();

    assert!(matches!(store.close().await, Err(StoreError::AlreadyClosed)));
    assert!(matches!(store.ping().await, Err(StoreError::AlreadyClosed)));
}

/// Concurrent writers must never end up sharing a code.
pub async fn concurrent_creates_get_unique_codes<S: Store>(store: Arc<S>, writers: usize) {
    let mut handles = Vec::with_capacity(writers);
    for i in 0..writers {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .create(url(&format!("https://concurrent{i}.example"), "u1"))
                .await
                .unwrap()
                .id
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }
    assert_eq!(ids.len(), writers);

    let listed = store.list_by_owner(&Owner::new("u1")).await.unwrap();
    assert_eq!(listed.len(), writers);
}
