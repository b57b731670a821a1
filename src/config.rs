//! Server configuration (§6): CLI flags and `RAIS_`-prefixed environment
//! variables via `clap`, with a `validate()` pass the CLI runs before
//! starting the listener.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::ConfigError;

#[derive(Debug, Parser)]
#[command(name = "rais-rs", version, about = "An IIIF/Deep Zoom tile server for pyramidal JPEG2000 images")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server.
    Serve(Config),
    /// Validate the configuration and tile root, then exit.
    Check(Config),
}

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Address to bind the HTTP listener to.
    #[arg(long, env = "RAIS_ADDRESS", default_value = "0.0.0.0")]
    pub address: IpAddr,

    /// Port to bind the HTTP listener to.
    #[arg(long, env = "RAIS_PORT", default_value_t = 12415)]
    pub port: u16,

    /// Filesystem root that identifiers resolve against.
    #[arg(long, env = "RAIS_TILE_PATH")]
    pub tile_path: PathBuf,

    /// Public scheme used to build the `@id` in `info.json` (e.g. "https").
    #[arg(long, env = "RAIS_IIIF_SCHEME", default_value = "http")]
    pub iiif_scheme: String,

    /// Public host:port used to build the `@id` in `info.json`.
    #[arg(long, env = "RAIS_IIIF_SERVER")]
    pub iiif_server: Option<String>,

    /// URL path prefix for IIIF Image API routes.
    #[arg(long, env = "RAIS_IIIF_PREFIX", default_value = "/images/iiif")]
    pub iiif_prefix: String,

    /// URL path prefix for Deep Zoom routes.
    #[arg(long, env = "RAIS_DZI_PREFIX", default_value = "/images/dzi")]
    pub dzi_prefix: String,

    /// URL path prefix for the plain internal dialect.
    #[arg(long, env = "RAIS_INTERNAL_PREFIX", default_value = "/images")]
    pub internal_prefix: String,

    /// JPEG encode quality (1-100) for JPEG and DZI tile output.
    #[arg(long, env = "RAIS_JPG_QUALITY", default_value_t = crate::encoder::DEFAULT_JPEG_QUALITY)]
    pub jpg_quality: u8,

    /// Maximum output width the planner will honor, in pixels.
    #[arg(long, env = "RAIS_MAX_WIDTH", default_value_t = 0)]
    pub max_width: u32,

    /// Maximum output height the planner will honor, in pixels.
    #[arg(long, env = "RAIS_MAX_HEIGHT", default_value_t = 0)]
    pub max_height: u32,

    /// Maximum output area (width * height) the planner will honor.
    #[arg(long, env = "RAIS_MAX_AREA", default_value_t = 0)]
    pub max_area: u64,

    /// Capacity of the info cache, in entries.
    #[arg(long, env = "RAIS_INFO_CACHE_LEN", default_value_t = 10_000)]
    pub info_cache_len: usize,

    /// Capacity of the decoded-tile cache, in entries.
    #[arg(long, env = "RAIS_TILE_CACHE_LEN", default_value_t = 2_000)]
    pub tile_cache_len: usize,

    /// Per-request timeout before a 503 is returned.
    #[arg(long, env = "RAIS_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Comma-separated list of allowed CORS origins; "*" allows any.
    #[arg(long, env = "RAIS_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Logging verbosity, 0 (least) through 7 (most verbose).
    #[arg(long, env = "RAIS_LOG_LEVEL", default_value_t = 4)]
    pub log_level: u8,

    /// Tile widths advertised in info.json tile descriptors.
    #[arg(long, env = "RAIS_IIIF_TILE_SIZES", value_delimiter = ',', default_value = "512")]
    pub iiif_tile_sizes: Vec<u32>,
}

impl Config {
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// The server base URL used to build `info.json`'s `@id`, e.g.
    /// `http://iiif.example.org/images/iiif`. Requires `iiif_server` to be set.
    pub fn iiif_base(&self) -> Result<String, ConfigError> {
        let server = self
            .iiif_server
            .as_ref()
            .ok_or(ConfigError::MissingField("iiif-server"))?;
        Ok(format!(
            "{}://{}{}",
            self.iiif_scheme,
            server,
            self.iiif_prefix
        ))
    }

    /// Map the 0-7 `log_level` to a `tracing_subscriber::EnvFilter`
    /// directive, generalizing the donor's boolean `--verbose` flag (which
    /// only distinguished info/debug) into the full severity scale.
    pub fn filter_directive(&self) -> String {
        let level = match self.log_level {
            0..=1 => "error",
            2..=3 => "warn",
            4 => "info",
            5 => "debug",
            _ => "trace",
        };
        format!("rais_rs={level},tower_http={level}")
    }

    /// Reject configurations that cannot serve correctly, rather than
    /// discovering the conflict at request time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("tile-path"));
        }
        if !crate::encoder::is_valid_quality(self.jpg_quality) {
            return Err(ConfigError::InvalidValue {
                field: "jpg-quality",
                reason: format!("{} is outside 1-100", self.jpg_quality),
            });
        }

        // iiifScheme/iiifServer/iiifPrefix compose one IIIF base URL and must
        // be configured together; iiif_scheme/iiif_prefix always carry a
        // value, so the only way to be half-configured is a missing server.
        if self.iiif_server.is_none() {
            return Err(ConfigError::MissingField("iiif-server"));
        }

        let prefixes = [
            ("iiif-prefix", &self.iiif_prefix),
            ("dzi-prefix", &self.dzi_prefix),
            ("internal-prefix", &self.internal_prefix),
        ];
        for i in 0..prefixes.len() {
            for j in 0..prefixes.len() {
                if i == j {
                    continue;
                }
                let (name_a, a) = prefixes[i];
                let (name_b, b) = prefixes[j];
                if prefix_overlaps(a, b) {
                    return Err(ConfigError::PrefixOverlap {
                        a: name_a,
                        b: name_b,
                    });
                }
            }
        }

        Ok(())
    }
}

/// True if `a` and `b` are the same route prefix, which is genuinely
/// ambiguous (the router could not tell which dialect a request is for). A
/// prefix nested under another (e.g. the default `internalPrefix` "/images"
/// containing `iiifPrefix` "/images/iiif") is not an overlap: axum's router
/// always prefers the more specific static match over a wildcard tail, so
/// nesting resolves unambiguously at dispatch time.
fn prefix_overlaps(a: &str, b: &str) -> bool {
    let norm = |s: &str| s.trim_end_matches('/').to_string();
    norm(a) == norm(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 12415,
            tile_path: PathBuf::from("/data/tiles"),
            iiif_scheme: "http".to_string(),
            iiif_server: Some("iiif.example.org".to_string()),
            iiif_prefix: "/images/iiif".to_string(),
            dzi_prefix: "/images/dzi".to_string(),
            internal_prefix: "/images".to_string(),
            jpg_quality: 75,
            max_width: 0,
            max_height: 0,
            max_area: 0,
            info_cache_len: 10_000,
            tile_cache_len: 2_000,
            request_timeout_secs: 30,
            cors_origins: "*".to_string(),
            log_level: 4,
            iiif_tile_sizes: vec![512],
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn empty_tile_path_is_rejected() {
        let mut c = base_config();
        c.tile_path = PathBuf::new();
        assert!(matches!(c.validate(), Err(ConfigError::MissingField("tile-path"))));
    }

    #[test]
    fn out_of_range_quality_is_rejected() {
        let mut c = base_config();
        c.jpg_quality = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn identical_prefixes_are_rejected() {
        let mut c = base_config();
        c.dzi_prefix = c.iiif_prefix.clone();
        assert!(matches!(c.validate(), Err(ConfigError::PrefixOverlap { .. })));
    }

    #[test]
    fn nested_prefixes_are_allowed() {
        // The default topology nests iiifPrefix/dziPrefix under internalPrefix
        // ("/images/iiif", "/images/dzi" under "/images"); axum's router
        // prefers the more specific static match, so this isn't ambiguous.
        assert!(!prefix_overlaps("/images/iiif", "/images"));
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn disjoint_prefixes_pass() {
        assert!(!prefix_overlaps("/images/iiif", "/images/dzi"));
    }

    #[test]
    fn missing_iiif_server_is_rejected() {
        let mut c = base_config();
        c.iiif_server = None;
        assert!(matches!(c.validate(), Err(ConfigError::MissingField("iiif-server"))));
    }

    #[test]
    fn log_level_scale_maps_to_tracing_levels() {
        let mut c = base_config();
        c.log_level = 0;
        assert_eq!(c.filter_directive(), "rais_rs=error,tower_http=error");
        c.log_level = 4;
        assert_eq!(c.filter_directive(), "rais_rs=info,tower_http=info");
        c.log_level = 7;
        assert_eq!(c.filter_directive(), "rais_rs=trace,tower_http=trace");
    }

    #[test]
    fn iiif_base_joins_scheme_server_and_prefix() {
        let c = base_config();
        assert_eq!(c.iiif_base().unwrap(), "http://iiif.example.org/images/iiif");
    }
}
