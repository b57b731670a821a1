//! Request handlers for the three dialects this server speaks: IIIF Image
//! API, Deep Zoom, and the plain internal tile/resize/info dialect.
//!
//! All three share the same resolve -> info -> plan -> decode -> encode
//! pipeline; they differ only in URL grammar and in how they shape the
//! response. Conditional GET (Last-Modified/If-Modified-Since) is applied
//! uniformly across all three, mirroring the donor's single `cache_headers`
//! helper rather than duplicating it per route.

use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;

use crate::cache::StatsSnapshot;
use crate::decoder::{Decoder, Jp2Decoder};
use crate::dzi;
use crate::encoder;
use crate::error::{DziTileError, ServerError};
use crate::iiif::{self, Format, ImageInfo, Quality, Rotation, TransformSpec};
use crate::resource;

use super::AppState;

async fn source_mtime(path: &FsPath) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

fn not_modified(headers: &HeaderMap, mtime: SystemTime) -> bool {
    let Some(raw) = headers.get(header::IF_MODIFIED_SINCE) else {
        return false;
    };
    let Ok(raw) = raw.to_str() else { return false };
    let Ok(since) = httpdate::parse_http_date(raw) else {
        return false;
    };
    mtime <= since
}

fn last_modified_header(mtime: SystemTime) -> HeaderValue {
    HeaderValue::from_str(&httpdate::fmt_http_date(mtime)).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Info override (§4.6): if `{resolvedPath}-info.json` exists, it is served
/// verbatim in place of the decoder-computed `info.json`, after substituting
/// the literal token `%ID%` with the canonical `@id` URL. A malformed
/// override is logged and ignored rather than failing the request.
async fn load_info_override(path: &FsPath, canonical_id: &str) -> Option<serde_json::Value> {
    let override_path = {
        let mut s = path.as_os_str().to_os_string();
        s.push("-info.json");
        PathBuf::from(s)
    };
    let raw = tokio::fs::read_to_string(&override_path).await.ok()?;
    let substituted = raw.replace("%ID%", canonical_id);
    match serde_json::from_str(&substituted) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(path = %override_path.display(), error = %err, "ignoring malformed info override");
            None
        }
    }
}

async fn resolve_and_load_info(
    state: &AppState,
    id: &iiif::Identifier,
) -> Result<(PathBuf, ImageInfo), ServerError> {
    let path = state.resolver.resolve(id).await?;
    let path_for_info = path.clone();
    let info = state
        .info_cache
        .get_or_compute(id.raw().to_string(), || async move {
            tokio::task::spawn_blocking(move || {
                let decoder = Jp2Decoder::open(&path_for_info)?;
                Ok::<_, crate::error::DecodeError>(ImageInfo {
                    width: decoder.width(),
                    height: decoder.height(),
                    tile_width: decoder.tile_width(),
                    tile_height: decoder.tile_height(),
                    levels: decoder.levels(),
                })
            })
            .await
            .expect("decoder open task panicked")
        })
        .await?;
    Ok((path, info))
}

async fn render(
    state: &AppState,
    spec: &TransformSpec,
    path: &FsPath,
    info: ImageInfo,
) -> Result<Arc<Vec<u8>>, ServerError> {
    state.features.check(spec)?;
    let plan = resource::plan(spec, info.width, info.height, info.levels, state.constraint)?;

    let rotation = spec.rotation;
    let quality = spec.quality;
    let format = spec.format;
    let jpg_quality = state.config.jpg_quality;
    let path = path.to_path_buf();

    let decode_and_encode = move || {
        tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ServerError> {
            let decoder = Jp2Decoder::open(&path)?;
            let image = resource::execute(&decoder, &plan, rotation, quality)?;
            let bytes = encoder::encode(&image, format, jpg_quality)?;
            Ok(bytes)
        })
    };

    // Cacheability rule (§4.7): only JPEG output no larger than 1024x1024 is
    // worth caching; everything else renders straight through, uncached.
    let cacheable =
        format == Format::Jpg && plan.out_width > 0 && plan.out_width <= 1024 && plan.out_height <= 1024;

    if cacheable {
        let cache_key = format!(
            "{}/{}/{}",
            spec.id.raw(),
            spec.canonical_command(),
            jpg_quality
        );
        state
            .tile_cache
            .get_or_compute(cache_key, || async move {
                decode_and_encode().await.expect("render task panicked").map(Arc::new)
            })
            .await
    } else {
        decode_and_encode()
            .await
            .expect("render task panicked")
            .map(Arc::new)
    }
}

fn respond_image(bytes: Arc<Vec<u8>>, format: Format, mtime: SystemTime) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(format.content_type())),
            (header::LAST_MODIFIED, last_modified_header(mtime)),
        ],
        bytes.as_ref().clone(),
    )
        .into_response()
}

pub async fn iiif_handler(
    State(state): State<Arc<AppState>>,
    Path(rest): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    let spec = iiif::parse_iiif_path(&rest)?;

    if spec.base_redirect {
        let target = format!(
            "{}/{}/info.json",
            state.config.iiif_prefix.trim_end_matches('/'),
            spec.id.escaped()
        );
        return Ok(Redirect::to(&target).into_response());
    }

    let (path, info) = resolve_and_load_info(&state, &spec.id).await?;
    let mtime = source_mtime(&path).await;
    if let Some(mtime) = mtime {
        if not_modified(&headers, mtime) {
            return Ok(StatusCode::NOT_MODIFIED.into_response());
        }
    }

    if spec.info {
        let base = state
            .config
            .iiif_base()
            .unwrap_or_else(|_| state.config.iiif_prefix.clone());
        let canonical_id = format!("{}/{}", base.trim_end_matches('/'), spec.id.escaped());
        let body = match load_info_override(&path, &canonical_id).await {
            Some(overridden) => overridden,
            None => serde_json::to_value(iiif::build_info(
                &spec.id,
                info,
                state.constraint,
                &base,
                &state.features,
                &state.config.iiif_tile_sizes,
            ))
            .expect("Info always serializes"),
        };
        let mut response = (StatusCode::OK, Json(body)).into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/ld+json"));
        if let Some(mtime) = mtime {
            response.headers_mut().insert(header::LAST_MODIFIED, last_modified_header(mtime));
        }
        return Ok(response);
    }

    let bytes = render(&state, &spec, &path, info).await?;
    Ok(respond_image(bytes, spec.format, mtime.unwrap_or(SystemTime::now())))
}

pub async fn dzi_handler(
    State(state): State<Arc<AppState>>,
    Path(rest): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    if let Some(id_part) = rest.strip_suffix(".dzi") {
        let id = iiif::Identifier::from_escaped(id_part)?;
        let (path, info) = resolve_and_load_info(&state, &id).await?;
        let mtime = source_mtime(&path).await;
        if let Some(mtime) = mtime {
            if not_modified(&headers, mtime) {
                return Ok(StatusCode::NOT_MODIFIED.into_response());
            }
        }
        let xml = dzi::generate_dzi_xml(info.width, info.height);
        let mut response = (StatusCode::OK, xml).into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/xml"));
        if let Some(mtime) = mtime {
            response.headers_mut().insert(header::LAST_MODIFIED, last_modified_header(mtime));
        }
        return Ok(response);
    }

    let (id_part, tail) = rest
        .split_once("_files/")
        .ok_or_else(|| ServerError::DziTile(DziTileError::LevelOutOfRange { level: 0, max: 0 }))?;
    let (level_seg, filename) = tail
        .split_once('/')
        .ok_or_else(|| ServerError::DziTile(DziTileError::LevelOutOfRange { level: 0, max: 0 }))?;
    let (level, col, row) = dzi::parse_tile_path(level_seg, filename)
        .ok_or_else(|| ServerError::DziTile(DziTileError::LevelOutOfRange { level: 0, max: 0 }))?;

    let id = iiif::Identifier::from_escaped(id_part)?;
    let (path, info) = resolve_and_load_info(&state, &id).await?;
    let mtime = source_mtime(&path).await;
    if let Some(mtime) = mtime {
        if not_modified(&headers, mtime) {
            return Ok(StatusCode::NOT_MODIFIED.into_response());
        }
    }

    let spec = dzi::dzi_tile_to_spec(id, info.width, info.height, level, col, row)?;
    let bytes = render(&state, &spec, &path, info).await?;
    Ok(respond_image(bytes, Format::Jpg, mtime.unwrap_or(SystemTime::now())))
}

enum InternalRequest {
    Info(iiif::Identifier),
    Tile { id: iiif::Identifier, level: u32, col: u32, row: u32 },
    Resize { id: iiif::Identifier, width: u32, height: u32 },
}

fn parse_internal_path(rest: &str) -> Result<InternalRequest, ServerError> {
    let bad = || crate::error::UrlGrammarError::MalformedSegment {
        segment: "internal",
        reason: format!("unrecognized internal dialect path {rest:?}"),
    };

    if let Some(id_part) = rest.strip_suffix("/info") {
        return Ok(InternalRequest::Info(iiif::Identifier::from_escaped(id_part)?));
    }
    if let Some((id_part, tail)) = rest.split_once("/tile/") {
        let mut parts = tail.trim_end_matches(".jpg").split('/');
        let level: u32 = parts.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
        let col: u32 = parts.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
        let row: u32 = parts.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
        if parts.next().is_some() {
            return Err(bad().into());
        }
        return Ok(InternalRequest::Tile {
            id: iiif::Identifier::from_escaped(id_part)?,
            level,
            col,
            row,
        });
    }
    if let Some((id_part, tail)) = rest.split_once("/resize/") {
        let dims = tail.trim_end_matches(".jpg");
        let (w_str, h_str) = dims.split_once('x').ok_or_else(bad)?;
        let width: u32 = w_str.parse().map_err(|_| bad())?;
        let height: u32 = h_str.parse().map_err(|_| bad())?;
        return Ok(InternalRequest::Resize {
            id: iiif::Identifier::from_escaped(id_part)?,
            width,
            height,
        });
    }

    Err(bad().into())
}

pub async fn internal_handler(
    State(state): State<Arc<AppState>>,
    Path(rest): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    match parse_internal_path(&rest)? {
        InternalRequest::Info(id) => {
            let (path, info) = resolve_and_load_info(&state, &id).await?;
            let mtime = source_mtime(&path).await;
            if let Some(mtime) = mtime {
                if not_modified(&headers, mtime) {
                    return Ok(StatusCode::NOT_MODIFIED.into_response());
                }
            }
            #[derive(serde::Serialize)]
            struct InternalInfo {
                width: u32,
                height: u32,
                #[serde(rename = "tileWidth")]
                tile_width: u32,
                #[serde(rename = "tileHeight")]
                tile_height: u32,
                levels: u32,
            }
            let body = InternalInfo {
                width: info.width,
                height: info.height,
                tile_width: info.tile_width,
                tile_height: info.tile_height,
                levels: info.levels,
            };
            let mut response = (StatusCode::OK, Json(body)).into_response();
            if let Some(mtime) = mtime {
                response.headers_mut().insert(header::LAST_MODIFIED, last_modified_header(mtime));
            }
            Ok(response)
        }
        InternalRequest::Tile { id, level, col, row } => {
            let (path, info) = resolve_and_load_info(&state, &id).await?;
            let tile_w = if info.tile_width > 0 { info.tile_width } else { 256 };
            let tile_h = if info.tile_height > 0 { info.tile_height } else { 256 };
            let downsample = 1u32 << level.min(info.levels.saturating_sub(1));
            let x = col * tile_w * downsample;
            let y = row * tile_h * downsample;
            let spec = TransformSpec {
                id,
                region: iiif::Region::Absolute { x, y, w: tile_w * downsample, h: tile_h * downsample },
                size: iiif::Size::ScaleExact { w: tile_w, h: tile_h },
                upscale: iiif::UpscaleAllowed(false),
                rotation: Rotation::default(),
                quality: Quality::Default,
                format: Format::Jpg,
                info: false,
                base_redirect: false,
            };
            let mtime = source_mtime(&path).await;
            if let Some(mtime) = mtime {
                if not_modified(&headers, mtime) {
                    return Ok(StatusCode::NOT_MODIFIED.into_response());
                }
            }
            let bytes = render(&state, &spec, &path, info).await?;
            Ok(respond_image(bytes, Format::Jpg, mtime.unwrap_or(SystemTime::now())))
        }
        InternalRequest::Resize { id, width, height } => {
            let (path, info) = resolve_and_load_info(&state, &id).await?;
            let spec = TransformSpec {
                id,
                region: iiif::Region::Full,
                size: iiif::Size::ScaleExact { w: width, h: height },
                upscale: iiif::UpscaleAllowed(true),
                rotation: Rotation::default(),
                quality: Quality::Default,
                format: Format::Jpg,
                info: false,
                base_redirect: false,
            };
            let mtime = source_mtime(&path).await;
            if let Some(mtime) = mtime {
                if not_modified(&headers, mtime) {
                    return Ok(StatusCode::NOT_MODIFIED.into_response());
                }
            }
            let bytes = render(&state, &spec, &path, info).await?;
            Ok(respond_image(bytes, Format::Jpg, mtime.unwrap_or(SystemTime::now())))
        }
    }
}

#[derive(serde::Serialize)]
struct StatsBody {
    info_cache: StatsSnapshot,
    tile_cache: StatsSnapshot,
}

pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<StatsBody> {
    Json(StatsBody {
        info_cache: state.info_cache.stats().snapshot(),
        tile_cache: state.tile_cache.stats().snapshot(),
    })
}

pub async fn health_handler() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn info_override_substitutes_id_token() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("image.jp2");
        let override_path = dir.path().join("image.jp2-info.json");
        tokio::fs::write(&override_path, br#"{"@id":"%ID%","custom":true}"#)
            .await
            .unwrap();

        let value = load_info_override(&image_path, "http://example.com/iiif/image")
            .await
            .unwrap();
        assert_eq!(value["@id"], "http://example.com/iiif/image");
        assert_eq!(value["custom"], true);
    }

    #[tokio::test]
    async fn missing_override_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("image.jp2");
        assert!(load_info_override(&image_path, "http://example.com/iiif/image")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn malformed_override_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("image.jp2");
        let override_path = dir.path().join("image.jp2-info.json");
        tokio::fs::write(&override_path, b"not json").await.unwrap();

        assert!(load_info_override(&image_path, "http://example.com/iiif/image")
            .await
            .is_none());
    }
}
