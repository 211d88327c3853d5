//! XRPC surface served by actix-web.

mod common;

use actix_web::{test, web, App};
use common::*;
use hot_feed::db::{InMemoryStore, ItemStore};
use hot_feed::handlers::{self, FeedHandlerState, ServiceIdentity};
use hot_feed::models::{DescribeFeedGeneratorResponse, FeedSkeletonResponse};
use hot_feed::services::{refresh_queue, RefreshRequests};
use std::sync::Arc;
use std::time::Duration;

const PUBLISHER: &str = "did:plc:publisher";
const HOSTNAME: &str = "feeds.example.com";

fn hot_feed_uri() -> String {
    format!("at://{}/app.bsky.feed.generator/hot", PUBLISHER)
}

fn identity(service_did: &str) -> ServiceIdentity {
    ServiceIdentity {
        hostname: HOSTNAME.to_string(),
        service_did: service_did.to_string(),
        publisher_did: PUBLISHER.to_string(),
    }
}

async fn ranked_store(count: usize) -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    let items: Vec<_> = (0..count)
        .map(|i| scored_item(&format!("p{:03}", i), 1_000.0 - i as f64, NOW_MS))
        .collect();
    store.insert_if_absent(&items).await.unwrap();
    store
}

macro_rules! app {
    ($store:expr, $trigger:expr, $identity:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(FeedHandlerState {
                    store: $store,
                    refresh: $trigger,
                    publisher_did: PUBLISHER.to_string(),
                }))
                .app_data(web::Data::new($identity))
                .configure(handlers::configure),
        )
        .await
    };
}

async fn drained(requests: &mut RefreshRequests) -> bool {
    tokio::time::timeout(Duration::from_millis(200), requests.next())
        .await
        .map(|r| r.is_some())
        .unwrap_or(false)
}

#[actix_web::test]
async fn serves_pages_and_queues_a_refresh() {
    let store = ranked_store(5).await;
    let (trigger, mut requests) = refresh_queue();
    let app = app!(store, trigger, identity("did:web:feeds.example.com"));

    let req = test::TestRequest::get()
        .uri(&format!(
            "/xrpc/app.bsky.feed.getFeedSkeleton?feed={}&limit=2",
            hot_feed_uri()
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let page: FeedSkeletonResponse = test::read_body_json(resp).await;
    assert_eq!(page.feed.len(), 2);
    assert_eq!(page.feed[0].post, post_uri("p000"));
    let cursor = page.cursor.expect("more items remain");
    assert!(drained(&mut requests).await);

    let req = test::TestRequest::get()
        .uri(&format!(
            "/xrpc/app.bsky.feed.getFeedSkeleton?feed={}&limit=10&cursor={}",
            hot_feed_uri(),
            cursor
        ))
        .to_request();
    let page: FeedSkeletonResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page.feed.len(), 3);
    assert_eq!(page.feed[0].post, post_uri("p002"));
    assert!(page.cursor.is_none());
}

#[actix_web::test]
async fn limit_is_defaulted_and_clamped() {
    let store = ranked_store(120).await;
    let (trigger, _requests) = refresh_queue();
    let app = app!(store, trigger, identity("did:web:feeds.example.com"));

    for (query, expected) in [("", 50), ("&limit=500", 100), ("&limit=0", 1), ("&limit=-3", 1)] {
        let req = test::TestRequest::get()
            .uri(&format!(
                "/xrpc/app.bsky.feed.getFeedSkeleton?feed={}{}",
                hot_feed_uri(),
                query
            ))
            .to_request();
        let page: FeedSkeletonResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(page.feed.len(), expected, "query {:?}", query);
    }
}

#[actix_web::test]
async fn unknown_feed_is_unsupported_algorithm() {
    let (trigger, mut requests) = refresh_queue();
    let app = app!(
        ranked_store(1).await,
        trigger,
        identity("did:web:feeds.example.com")
    );

    let req = test::TestRequest::get()
        .uri(&format!(
            "/xrpc/app.bsky.feed.getFeedSkeleton?feed=at://{}/app.bsky.feed.generator/cold",
            PUBLISHER
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "UnsupportedAlgorithm");
    assert!(!drained(&mut requests).await);
}

#[actix_web::test]
async fn bad_requests_are_rejected() {
    let (trigger, mut requests) = refresh_queue();
    let app = app!(
        ranked_store(1).await,
        trigger,
        identity("did:web:feeds.example.com")
    );

    for query in [
        format!("feed={}&cursor=%25%25not-base64", hot_feed_uri()),
        format!("feed={}&cursor=bm90IGEgY3Vyc29y", hot_feed_uri()),
        format!("feed={}&limit=many", hot_feed_uri()),
        "limit=5".to_string(),
    ] {
        let req = test::TestRequest::get()
            .uri(&format!("/xrpc/app.bsky.feed.getFeedSkeleton?{}", query))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400, "query {:?}", query);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "InvalidRequest", "query {:?}", query);
    }
    // A rejected read never asks for a refresh
    assert!(!drained(&mut requests).await);
}

#[actix_web::test]
async fn describes_the_hot_feed() {
    let (trigger, _requests) = refresh_queue();
    let app = app!(
        Arc::new(InMemoryStore::new()),
        trigger,
        identity("did:web:feeds.example.com")
    );

    let req = test::TestRequest::get()
        .uri("/xrpc/app.bsky.feed.describeFeedGenerator")
        .to_request();
    let body: DescribeFeedGeneratorResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.did, "did:web:feeds.example.com");
    assert_eq!(body.feeds.len(), 1);
    assert_eq!(body.feeds[0].uri, hot_feed_uri());
}

#[actix_web::test]
async fn did_document_follows_the_service_did() {
    let (trigger, _requests) = refresh_queue();
    let app = app!(
        Arc::new(InMemoryStore::new()),
        trigger,
        identity("did:web:feeds.example.com")
    );
    let req = test::TestRequest::get().uri("/.well-known/did.json").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["id"], "did:web:feeds.example.com");
    assert_eq!(body["service"][0]["type"], "BskyFeedGenerator");
    assert_eq!(
        body["service"][0]["serviceEndpoint"],
        "https://feeds.example.com"
    );

    let (trigger, _requests) = refresh_queue();
    let app = app!(
        Arc::new(InMemoryStore::new()),
        trigger,
        identity("did:plc:elsewhere")
    );
    let req = test::TestRequest::get().uri("/.well-known/did.json").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[actix_web::test]
async fn health_and_metrics_respond() {
    let (trigger, _requests) = refresh_queue();
    let app = app!(
        Arc::new(InMemoryStore::new()),
        trigger,
        identity("did:web:feeds.example.com")
    );

    let req = test::TestRequest::get().uri("/health").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, web::Bytes::from_static(b"OK"));

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}
