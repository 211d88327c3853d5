use actix_web::{get, web, HttpResponse};
use serde_json::json;

use crate::handlers::feed::{ALGORITHMS, FEED_GENERATOR_COLLECTION};
use crate::models::{DescribeFeedGeneratorResponse, FeedDescriptor};

pub struct ServiceIdentity {
    pub hostname: String,
    pub service_did: String,
    pub publisher_did: String,
}

impl ServiceIdentity {
    pub fn feed_uris(&self) -> Vec<String> {
        ALGORITHMS
            .iter()
            .map(|algorithm| {
                format!(
                    "at://{}/{}/{}",
                    self.publisher_did, FEED_GENERATOR_COLLECTION, algorithm
                )
            })
            .collect()
    }
}

#[get("/xrpc/app.bsky.feed.describeFeedGenerator")]
pub async fn describe_feed_generator(identity: web::Data<ServiceIdentity>) -> HttpResponse {
    HttpResponse::Ok().json(DescribeFeedGeneratorResponse {
        did: identity.service_did.clone(),
        feeds: identity
            .feed_uris()
            .into_iter()
            .map(|uri| FeedDescriptor { uri })
            .collect(),
    })
}

/// `did:web` document pointing clients at this feed generator.
#[get("/.well-known/did.json")]
pub async fn did_document(identity: web::Data<ServiceIdentity>) -> HttpResponse {
    // Only meaningful when the service DID is the did:web of this host.
    if !identity.service_did.ends_with(&identity.hostname) {
        return HttpResponse::NotFound().finish();
    }

    HttpResponse::Ok().json(json!({
        "@context": ["https://www.w3.org/ns/did/v1"],
        "id": identity.service_did,
        "service": [{
            "id": "#bsky_fg",
            "type": "BskyFeedGenerator",
            "serviceEndpoint": format!("https://{}", identity.hostname),
        }],
    }))
}
