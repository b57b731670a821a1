//! HTTP Dispatcher (§4.9): axum router composition, shared application
//! state, and the CORS/tracing middleware stack.
//!
//! Grounded in the donor's `create_router`/`RouterConfig` composition,
//! stripped of the protected/public split (auth is out of scope here) and
//! extended with the Deep Zoom and internal-dialect route groups.

mod handlers;

use std::num::NonZeroUsize;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cache::SingleFlightCache;
use crate::config::Config;
use crate::iiif::{Constraint, FeatureSet, ImageInfo};
use crate::resolver::IdResolver;

/// Shared, immutable-after-construction application state handed to every
/// handler via `axum::extract::State`.
pub struct AppState {
    pub config: Config,
    pub resolver: IdResolver,
    pub features: FeatureSet,
    pub constraint: Constraint,
    pub info_cache: SingleFlightCache<String, ImageInfo>,
    pub tile_cache: SingleFlightCache<String, Arc<Vec<u8>>>,
}

impl AppState {
    pub fn new(config: Config, resolver: IdResolver) -> Self {
        let constraint = Constraint {
            width: if config.max_width == 0 { u32::MAX } else { config.max_width },
            height: if config.max_height == 0 { u32::MAX } else { config.max_height },
            area: if config.max_area == 0 { u64::MAX } else { config.max_area },
        };
        let info_cache = SingleFlightCache::new(
            NonZeroUsize::new(config.info_cache_len.max(1)).unwrap(),
        );
        let tile_cache = SingleFlightCache::new(
            NonZeroUsize::new(config.tile_cache_len.max(1)).unwrap(),
        );
        Self {
            config,
            resolver,
            features: FeatureSet::default(),
            constraint,
            info_cache,
            tile_cache,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let iiif_prefix = state.config.iiif_prefix.trim_end_matches('/').to_string();
    let dzi_prefix = state.config.dzi_prefix.trim_end_matches('/').to_string();
    let internal_prefix = state.config.internal_prefix.trim_end_matches('/').to_string();
    let cors = build_cors_layer(&state.config.cors_origins);

    Router::new()
        .route(&format!("{iiif_prefix}/{{*rest}}"), get(handlers::iiif_handler))
        .route(&format!("{dzi_prefix}/{{*rest}}"), get(handlers::dzi_handler))
        .route(
            &format!("{internal_prefix}/{{*rest}}"),
            get(handlers::internal_handler),
        )
        .route("/debug/stats", get(handlers::stats_handler))
        .route("/health", get(handlers::health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(origins: &str) -> CorsLayer {
    if origins.trim() == "*" {
        return CorsLayer::new().allow_methods([Method::GET]).allow_origin(tower_http::cors::Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .split(',')
        .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
        .collect();
    CorsLayer::new().allow_methods([Method::GET]).allow_origin(parsed)
}
