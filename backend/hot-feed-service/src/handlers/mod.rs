pub mod describe;
pub mod feed;

use actix_web::web;

use crate::error::AppError;

pub use describe::{describe_feed_generator, did_document, ServiceIdentity};
pub use feed::{get_feed_skeleton, FeedHandlerState};

/// Registers the XRPC, health and metrics routes. Handler state is supplied
/// by the caller as `app_data`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .service(get_feed_skeleton)
    .service(describe_feed_generator)
    .service(did_document)
    .route("/health", web::get().to(|| async { "OK" }))
    .route("/metrics", web::get().to(crate::metrics::serve_metrics));
}
