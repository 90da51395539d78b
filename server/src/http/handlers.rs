use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use shared_types::Tag;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    dto::{
        BucketQuery, CopyObjectResult, ListVersionsResponse, ObjectQuery, Tagging,
        VersioningConfiguration,
    },
    error::{ApiError, ApiResult},
    state::AppState,
};
use crate::api::{
    CopyObjectInput, DeleteObjectInput, Directive, GetObjectInput, PutObjectInput,
    PutObjectTaggingInput,
};
use crate::auth::AuthInfo;
use crate::error::EngineError;

pub const VERSION_ID_HEADER: &str = "x-amz-version-id";
pub const DELETE_MARKER_HEADER: &str = "x-amz-delete-marker";
pub const COPY_SOURCE_HEADER: &str = "x-amz-copy-source";
pub const COPY_SOURCE_VERSION_ID_HEADER: &str = "x-amz-copy-source-version-id";
/// Canonical id of the requester, set by the authenticating proxy.
pub const REQUESTER_HEADER: &str = "x-amz-canonical-id";

const METADATA_DIRECTIVE_HEADER: &str = "x-amz-metadata-directive";
const TAGGING_DIRECTIVE_HEADER: &str = "x-amz-tagging-directive";
const TAGGING_HEADER: &str = "x-amz-tagging";
const USER_METADATA_PREFIX: &str = "x-amz-meta-";

/// GET /health
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "versioned-object-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// PUT /:bucket
/// Create a bucket, or set its versioning status with `?versioning`
#[instrument(skip(state, headers, body))]
pub async fn put_bucket(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    Query(query): Query<BucketQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let auth = requester(&headers);

    if query.versioning.is_some() {
        let config: VersioningConfiguration = parse_json(&body)?;
        info!("Setting versioning of {} to {}", bucket, config.status);
        state
            .service
            .put_bucket_versioning(&auth, &bucket, config.status)
            .await?;
        return Ok(StatusCode::OK.into_response());
    }

    info!("Creating bucket: {}", bucket);
    let record = state.service.create_bucket(&auth, &bucket).await?;
    let mut response = Json(record).into_response();
    set_header(&mut response, header::LOCATION, &format!("/{bucket}"));
    Ok(response)
}

/// GET /:bucket?versioning
#[instrument(skip(state, headers))]
pub async fn get_bucket(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    Query(query): Query<BucketQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<VersioningConfiguration>> {
    if query.versioning.is_none() {
        return Err(EngineError::InvalidRequest(
            "Only the versioning sub-resource can be read from a bucket".to_string(),
        )
        .into());
    }

    let status = state
        .service
        .get_bucket_versioning(&requester(&headers), &bucket)
        .await?;
    Ok(Json(VersioningConfiguration { status }))
}

/// PUT /:bucket/*key
/// Upload an object, copy one (`x-amz-copy-source`) or replace its tags (`?tagging`)
#[instrument(skip(state, headers, body))]
pub async fn put_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<ObjectQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let auth = requester(&headers);

    if query.tagging.is_some() {
        let tagging: Tagging = parse_json(&body)?;
        info!("Putting tags on {}/{}", bucket, key);
        let output = state
            .service
            .put_object_tagging(
                &auth,
                PutObjectTaggingInput {
                    bucket,
                    key,
                    version_id: query.version_id,
                    tags: tagging.tag_set,
                },
            )
            .await?;

        let mut response = StatusCode::OK.into_response();
        set_optional_header(&mut response, VERSION_ID_HEADER, output.version_id.as_deref());
        return Ok(response);
    }

    if let Some(source) = header_str(&headers, COPY_SOURCE_HEADER) {
        let (source_bucket, source_key, source_version_id) = parse_copy_source(source)?;
        info!(
            "Copying {}/{} to {}/{}",
            source_bucket, source_key, bucket, key
        );
        let input = CopyObjectInput {
            source_bucket,
            source_key,
            source_version_id,
            bucket,
            key,
            metadata_directive: directive(&headers, METADATA_DIRECTIVE_HEADER)?,
            tagging_directive: directive(&headers, TAGGING_DIRECTIVE_HEADER)?,
            content_type: content_type(&headers),
            user_metadata: user_metadata(&headers),
            tags: tagging_header(&headers)?,
        };
        let output = state.service.copy_object(&auth, input).await?;

        let mut response = Json(CopyObjectResult {
            etag: format!("\"{}\"", output.etag),
            last_modified: output.last_modified,
        })
        .into_response();
        set_optional_header(&mut response, VERSION_ID_HEADER, output.version_id.as_deref());
        set_optional_header(
            &mut response,
            COPY_SOURCE_VERSION_ID_HEADER,
            output.copy_source_version_id.as_deref(),
        );
        return Ok(response);
    }

    info!("Putting object {}/{} ({} bytes)", bucket, key, body.len());
    let input = PutObjectInput {
        bucket,
        key,
        body,
        content_type: content_type(&headers),
        user_metadata: user_metadata(&headers),
        tags: tagging_header(&headers)?,
    };
    let output = state.service.put_object(&auth, input).await?;

    let mut response = StatusCode::OK.into_response();
    set_header(&mut response, header::ETAG, &format!("\"{}\"", output.etag));
    set_optional_header(&mut response, VERSION_ID_HEADER, output.version_id.as_deref());
    Ok(response)
}

/// GET /:bucket/*key
/// Read an object, its tags (`?tagging`) or its version list (`?versions`)
#[instrument(skip(state, headers))]
pub async fn get_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<ObjectQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let auth = requester(&headers);

    if query.tagging.is_some() {
        let output = state
            .service
            .get_object_tagging(&auth, &bucket, &key, query.version_id.as_deref())
            .await?;
        let mut response = Json(Tagging {
            tag_set: output.tags,
        })
        .into_response();
        set_optional_header(&mut response, VERSION_ID_HEADER, output.version_id.as_deref());
        return Ok(response);
    }

    if query.versions.is_some() {
        let versions = state
            .service
            .list_object_versions(&auth, &bucket, &key)
            .await?;
        return Ok(Json(ListVersionsResponse { key, versions }).into_response());
    }

    let output = state
        .service
        .get_object(
            &auth,
            GetObjectInput {
                bucket,
                key,
                version_id: query.version_id,
            },
        )
        .await?;

    let mut response = output.body.into_response();
    if let Some(content) = output.record.content() {
        if let Some(content_type) = &content.content_type {
            set_header(&mut response, header::CONTENT_TYPE, content_type);
        }
        set_header(
            &mut response,
            header::ETAG,
            &format!("\"{}\"", content.content_md5),
        );
        for (name, value) in &content.user_metadata {
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(format!("{USER_METADATA_PREFIX}{name}")),
                HeaderValue::from_str(value),
            ) {
                response.headers_mut().insert(name, value);
            }
        }
    }
    set_header(
        &mut response,
        header::LAST_MODIFIED,
        &output
            .record
            .last_modified
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string(),
    );
    set_optional_header(&mut response, VERSION_ID_HEADER, output.version_id.as_deref());
    Ok(response)
}

/// DELETE /:bucket/*key
#[instrument(skip(state, headers))]
pub async fn delete_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<ObjectQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    info!("Deleting {}/{} (version {:?})", bucket, key, query.version_id);

    let output = state
        .service
        .delete_object(
            &requester(&headers),
            DeleteObjectInput {
                bucket,
                key,
                version_id: query.version_id,
            },
        )
        .await?;

    let mut response = StatusCode::NO_CONTENT.into_response();
    set_optional_header(&mut response, VERSION_ID_HEADER, output.version_id.as_deref());
    if output.delete_marker {
        set_header(&mut response, DELETE_MARKER_HEADER, "true");
    }
    Ok(response)
}

fn requester(headers: &HeaderMap) -> AuthInfo {
    header_str(headers, REQUESTER_HEADER)
        .filter(|id| !id.is_empty())
        .map_or_else(AuthInfo::anonymous, AuthInfo::new)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    header_str(headers, header::CONTENT_TYPE.as_str()).map(str::to_string)
}

fn user_metadata(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let name = name.as_str().strip_prefix(USER_METADATA_PREFIX)?;
            Some((name.to_string(), value.to_str().ok()?.to_string()))
        })
        .collect()
}

fn directive(headers: &HeaderMap, name: &str) -> Result<Directive, EngineError> {
    header_str(headers, name).map_or(Ok(Directive::Copy), str::parse)
}

/// Tags given as a form-encoded query string, e.g. `team=infra&tier=gold`.
fn tagging_header(headers: &HeaderMap) -> Result<Vec<Tag>, EngineError> {
    let Some(raw) = header_str(headers, TAGGING_HEADER) else {
        return Ok(Vec::new());
    };

    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Ok(Tag::new(decode_form_component(key)?, decode_form_component(value)?))
        })
        .collect()
}

/// Form encoding writes spaces as `+`.
fn decode_form_component(raw: &str) -> Result<String, EngineError> {
    decode_component(&raw.replace('+', " "))
}

fn decode_component(raw: &str) -> Result<String, EngineError> {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| EngineError::InvalidArgument(format!("Invalid URL encoding: {raw}")))
}

/// Split `x-amz-copy-source` (`[/]bucket/key[?versionId=id]`) into its parts.
pub(super) fn parse_copy_source(
    raw: &str,
) -> Result<(String, String, Option<String>), EngineError> {
    let invalid = || EngineError::InvalidArgument(format!("Invalid copy source: {raw}"));

    let (path, query) = match raw.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (raw, None),
    };
    let path = decode_component(path.trim_start_matches('/'))?;
    let (bucket, key) = path
        .split_once('/')
        .filter(|(bucket, key)| !bucket.is_empty() && !key.is_empty())
        .ok_or_else(invalid)?;

    let version_id = query
        .and_then(|query| {
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("versionId="))
        })
        .map(decode_component)
        .transpose()?;

    Ok((bucket.to_string(), key.to_string(), version_id))
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::MalformedBody(e.to_string()))
}

fn set_header<K: axum::http::header::IntoHeaderName>(
    response: &mut Response,
    name: K,
    value: &str,
) {
    if let Ok(value) = HeaderValue::from_str(value) {
        response.headers_mut().insert(name, value);
    }
}

fn set_optional_header(response: &mut Response, name: &'static str, value: Option<&str>) {
    if let Some(value) = value {
        set_header(response, name, value);
    }
}
