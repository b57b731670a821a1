//! Shared fixtures for the integration suite: a `Config` pointed at a
//! nonexistent tile root (every test exercises routing/error-mapping, never
//! a real decode) and the `axum::Router` built from it.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;

use rais_rs::config::Config;
use rais_rs::resolver::IdResolver;
use rais_rs::server::{build_router, AppState};

pub fn test_config(tile_path: PathBuf) -> Config {
    Config {
        address: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
        port: 0,
        tile_path,
        iiif_scheme: "http".to_string(),
        iiif_server: Some("iiif.test".to_string()),
        iiif_prefix: "/images/iiif".to_string(),
        dzi_prefix: "/images/dzi".to_string(),
        internal_prefix: "/images".to_string(),
        jpg_quality: 75,
        max_width: 0,
        max_height: 0,
        max_area: 0,
        info_cache_len: 100,
        tile_cache_len: 100,
        request_timeout_secs: 30,
        cors_origins: "*".to_string(),
        log_level: 4,
        iiif_tile_sizes: vec![512],
    }
}

pub fn test_router() -> axum::Router {
    let config = test_config(PathBuf::from("/nonexistent-rais-rs-fixture-root"));
    let resolver = IdResolver::new(config.tile_path.clone(), Vec::new());
    let state = Arc::new(AppState::new(config, resolver));
    build_router(state)
}
