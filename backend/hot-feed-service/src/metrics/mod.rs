//! Prometheus collectors, grouped by the component that records them.

pub mod http;
pub mod ingest;
pub mod jobs;

use actix_web::HttpResponse;
use prometheus::{Encoder, TextEncoder};

/// `/metrics` in the Prometheus text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    match encoder.encode(&prometheus::gather(), &mut buffer) {
        Ok(()) => HttpResponse::Ok()
            .content_type(encoder.format_type())
            .body(buffer),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}
