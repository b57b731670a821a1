//! An HTTP image tile server for pyramidal JPEG2000 images, speaking the
//! IIIF Image API, Deep Zoom, and a plain internal tile/resize/info dialect.

pub mod cache;
pub mod config;
pub mod decoder;
pub mod dzi;
pub mod encoder;
pub mod error;
pub mod iiif;
pub mod resolver;
#[cfg(feature = "s3-resolver")]
pub mod resolver_s3;
pub mod resource;
pub mod server;
