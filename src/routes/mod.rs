use std::{convert::Infallible, path::PathBuf, sync::Arc};

use serde::de::DeserializeOwned;
use sqlx::{Pool, Postgres};
use warp::{
    reject::{self, Rejection},
    Filter, Reply,
};

use crate::{config::Config, constants::MAX_BODY_SIZE, form::Form};

pub mod ingredients;
pub mod recipes;
pub mod reply;
pub mod tags;
pub mod users;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub secret: Arc<str>,
    pub media_root: PathBuf,
}

impl AppState {
    pub fn new(pool: Pool<Postgres>, config: &Config) -> Self {
        Self {
            pool,
            secret: Arc::from(config.jwt_secret.as_str()),
            media_root: config.media_root.clone(),
        }
    }
}

#[derive(Debug)]
pub struct InvalidQuery;

impl reject::Reject for InvalidQuery {}

pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Query string as a `Form`; a request without one yields an empty form.
pub fn with_form() -> impl Filter<Extract = (Form,), Error = Rejection> + Clone {
    warp::query::raw()
        .or(warp::any().map(String::new))
        .unify()
        .and_then(|query: String| async move {
            Form::from_query(&query).map_err(|_| reject::custom(InvalidQuery))
        })
}

pub fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
{
    warp::body::content_length_limit(MAX_BODY_SIZE).and(warp::body::json())
}

/// The whole service: the JSON API under `/api` and uploaded images under `/media`.
pub fn api(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let media = warp::path("media").and(warp::fs::dir(state.media_root.clone()));

    let api = warp::path("api").and(
        users::routes(state.clone())
            .or(tags::routes(state.clone()))
            .unify()
            .or(ingredients::routes(state.clone()))
            .unify()
            .or(recipes::routes(state))
            .unify(),
    );

    api.or(media.map(|file: warp::fs::File| file.into_response()))
        .unify()
        .recover(reply::handle_rejection)
        .unify()
        .with(warp::log("foodgram::api"))
}
