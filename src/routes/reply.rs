use std::convert::Infallible;

use serde::Serialize;
use serde_json::{json, Value};
use warp::{
    http::{header, StatusCode},
    reject::Rejection,
    reply::{self, Response},
    Reply,
};

use crate::{error::status_of, middleware::Unauthorized};

use super::InvalidQuery;

/// JSON body of an error: field-level bodies pass through, anything else becomes `{"detail": ...}`.
pub fn error_body(info: Option<&str>, status: StatusCode) -> Value {
    let parsed = info
        .and_then(|info| serde_json::from_str::<Value>(info).ok())
        .filter(Value::is_object);

    match parsed {
        Some(body) => body,
        None => json!({
            "detail": info.unwrap_or_else(|| status.canonical_reason().unwrap_or("Error"))
        }),
    }
}

fn with_detail(status: StatusCode, detail: &str) -> Response {
    reply::with_status(reply::json(&json!({ "detail": detail })), status).into_response()
}

pub fn error(error: potion::Error) -> Response {
    let status =
        StatusCode::from_u16(status_of(&error)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = error_body(error.info.as_deref(), status);

    reply::with_status(reply::json(&body), status).into_response()
}

pub fn json<T: Serialize>(result: Result<T, potion::Error>, status: StatusCode) -> Response {
    match result {
        Ok(value) => reply::with_status(reply::json(&value), status).into_response(),
        Err(e) => error(e),
    }
}

pub fn ok<T: Serialize>(result: Result<T, potion::Error>) -> Response {
    json(result, StatusCode::OK)
}

pub fn created<T: Serialize>(result: Result<T, potion::Error>) -> Response {
    json(result, StatusCode::CREATED)
}

pub fn no_content(result: Result<(), potion::Error>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error(e),
    }
}

/// Plain-text download.
pub fn attachment(result: Result<String, potion::Error>, filename: &str) -> Response {
    match result {
        Ok(body) => {
            let disposition = format!("attachment; filename=\"{filename}\"");
            let body = reply::with_header(body, header::CONTENT_TYPE, "text/plain; charset=utf-8");
            reply::with_header(body, header::CONTENT_DISPOSITION, disposition).into_response()
        }
        Err(e) => error(e),
    }
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if err.is_not_found() {
        return Ok(with_detail(StatusCode::NOT_FOUND, "Not found."));
    }

    if err.find::<Unauthorized>().is_some() {
        return Ok(with_detail(
            StatusCode::UNAUTHORIZED,
            "Authentication credentials were not provided or are invalid.",
        ));
    }

    if err.find::<InvalidQuery>().is_some() {
        return Ok(with_detail(StatusCode::BAD_REQUEST, "Malformed query string."));
    }

    if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        let body = json!({ "non_field_errors": [e.to_string()] });
        return Ok(reply::with_status(reply::json(&body), StatusCode::BAD_REQUEST).into_response());
    }

    if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        return Ok(with_detail(StatusCode::PAYLOAD_TOO_LARGE, "Request body is too large."));
    }

    if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        return Ok(with_detail(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Expected an application/json body.",
        ));
    }

    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(with_detail(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed."));
    }

    log::error!("Unhandled rejection: {err:?}");
    Ok(with_detail(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_level_info_is_kept() {
        let body = error_body(Some(r#"{"cooking_time":["Too short."]}"#), StatusCode::BAD_REQUEST);
        assert_eq!(body["cooking_time"][0], "Too short.");
    }

    #[test]
    fn plain_info_becomes_detail() {
        let body = error_body(Some("No recipe exists with specified id"), StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "detail": "No recipe exists with specified id" }));

        let body = error_body(None, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({ "detail": "Forbidden" }));
    }

    #[test]
    fn errors_carry_their_status() {
        let response = error(crate::error::Conflict::new("twice").into());
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = no_content(Ok(()));
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
