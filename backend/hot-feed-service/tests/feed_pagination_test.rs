//! Cursor pagination over the ranked set.

mod common;

use common::*;
use hot_feed::db::{InMemoryStore, ItemStore};
use hot_feed::models::RankedItem;
use hot_feed::services::hot_page;
use hot_feed::services::pagination::ranking_order;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

async fn walk(store: &InMemoryStore, limit: usize) -> Vec<Vec<String>> {
    let mut pages = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = hot_page(store, limit, cursor.as_deref()).await.unwrap();
        pages.push(page.feed.into_iter().map(|p| p.post).collect());
        match page.cursor {
            Some(next) => cursor = Some(next),
            None => return pages,
        }
        assert!(pages.len() < 10_000, "pagination did not terminate");
    }
}

fn random_items(rng: &mut StdRng, n: usize) -> Vec<RankedItem> {
    // Few distinct scores and timestamps so ties are common.
    (0..n)
        .map(|i| {
            let score = rng.gen_range(0..6) as f64 * 0.5;
            let first_indexed = NOW_MS - rng.gen_range(0..4) * HOUR_MS;
            scored_item(&format!("p{:04}", i), score, first_indexed)
        })
        .collect()
}

#[tokio::test]
async fn every_eligible_item_is_served_exactly_once_in_order() {
    let mut rng = StdRng::seed_from_u64(42);

    for (n, limit) in [(1, 1), (7, 3), (50, 50), (51, 50), (123, 10), (200, 7)] {
        let store = InMemoryStore::new();
        let items = random_items(&mut rng, n);
        store.insert_if_absent(&items).await.unwrap();

        let mut eligible: Vec<&RankedItem> = items.iter().filter(|i| i.score > 0.0).collect();
        eligible.sort_by(|a, b| {
            ranking_order(
                (a.score, a.first_indexed, a.id.as_str()),
                (b.score, b.first_indexed, b.id.as_str()),
            )
        });
        let expected: Vec<String> = eligible.iter().map(|i| i.id.clone()).collect();

        let pages = walk(&store, limit).await;
        let served: Vec<String> = pages.iter().flatten().cloned().collect();
        assert_eq!(served, expected, "n={} limit={}", n, limit);

        if !expected.is_empty() {
            assert_eq!(pages.len(), (expected.len() + limit - 1) / limit);
        }
        assert!(pages.iter().all(|page| page.len() <= limit));

        let scores: Vec<f64> = served
            .iter()
            .map(|id| items.iter().find(|i| &i.id == id).unwrap().score)
            .collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }
}

#[tokio::test]
async fn unscored_items_are_not_served() {
    let store = InMemoryStore::new();
    store
        .insert_if_absent(&[fresh_item("new", 0), scored_item("ranked", 1.0, NOW_MS)])
        .await
        .unwrap();

    let page = hot_page(&store, 10, None).await.unwrap();
    assert_eq!(page.feed.len(), 1);
    assert_eq!(page.feed[0].post, post_uri("ranked"));
    assert!(page.cursor.is_none());
}

#[tokio::test]
async fn empty_store_serves_an_empty_page() {
    let store = InMemoryStore::new();
    let page = hot_page(&store, 10, None).await.unwrap();
    assert!(page.feed.is_empty());
    assert!(page.cursor.is_none());
}

#[tokio::test]
async fn concurrent_changes_never_repeat_items() {
    let store = InMemoryStore::new();
    let items: Vec<RankedItem> = (0..10)
        .map(|i| scored_item(&format!("p{}", i), 10.0 - i as f64, NOW_MS))
        .collect();
    store.insert_if_absent(&items).await.unwrap();

    let first = hot_page(&store, 4, None).await.unwrap();
    let served_first: Vec<String> = first.feed.iter().map(|p| p.post.clone()).collect();
    assert_eq!(served_first.len(), 4);

    // A new item jumps above the cursor, one later item disappears, and an
    // already served item is rescored below the cursor.
    store
        .insert_if_absent(&[scored_item("newcomer", 100.0, NOW_MS)])
        .await
        .unwrap();
    store.delete_by_ids(&[post_uri("p6")]).await.unwrap();
    let demoted = RankedItem {
        score: 0.5,
        ..items[0].clone()
    };
    store.upsert_score(&demoted).await.unwrap();

    let mut cursor = first.cursor;
    let mut rest = Vec::new();
    while let Some(c) = cursor {
        let page = hot_page(&store, 4, Some(&c)).await.unwrap();
        rest.extend(page.feed.into_iter().map(|p| p.post));
        cursor = page.cursor;
    }

    assert!(!rest.contains(&post_uri("newcomer")));
    assert!(!rest.contains(&post_uri("p6")));
    // The demoted item now ranks after the cursor and is served again; every
    // other item appears once.
    let mut all = served_first.clone();
    all.extend(rest.iter().cloned());
    let repeated: Vec<&String> = all
        .iter()
        .filter(|id| all.iter().filter(|other| other == id).count() > 1)
        .collect();
    assert!(repeated.iter().all(|id| **id == post_uri("p0")));
}

#[test]
fn ties_break_on_first_indexed_then_id() {
    assert_eq!(
        ranking_order((1.0, 200, "a"), (1.0, 100, "b")),
        Ordering::Less
    );
    assert_eq!(ranking_order((1.0, 100, "b"), (1.0, 100, "a")), Ordering::Less);
    assert_eq!(ranking_order((2.0, 0, "a"), (1.0, 999, "z")), Ordering::Less);
}
