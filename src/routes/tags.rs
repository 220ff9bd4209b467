use warp::{reject::Rejection, reply::Response, Filter};

use crate::{
    actions::tags,
    jwt::SessionData,
    middleware::with_session,
    permissions::ActionType,
    schema::{Tag, Uuid},
    validation::TagForm,
};

use super::{json_body, reply, with_state, AppState};

async fn list(state: AppState) -> Result<Vec<Tag>, potion::Error> {
    tags::list_tags(&state.pool).await
}

async fn retrieve(id: Uuid, state: AppState) -> Result<Tag, potion::Error> {
    tags::get_tag(id, &state.pool).await
}

async fn create(session: SessionData, form: TagForm, state: AppState) -> Result<Tag, potion::Error> {
    session.authenticate(ActionType::ManageTags)?;
    tags::create_tag(form.clean(false)?, &state.pool).await
}

async fn update(
    id: Uuid,
    session: SessionData,
    form: TagForm,
    state: AppState,
) -> Result<Tag, potion::Error> {
    session.authenticate(ActionType::ManageTags)?;
    tags::update_tag(id, form.clean(true)?, &state.pool).await
}

async fn remove(id: Uuid, session: SessionData, state: AppState) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageTags)?;
    tags::delete_tag(id, &state.pool).await
}

pub fn routes(state: AppState) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let secret = state.secret.clone();

    let list = warp::path!("tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .then(list)
        .map(reply::ok);

    let retrieve = warp::path!("tags" / Uuid)
        .and(warp::get())
        .and(with_state(state.clone()))
        .then(retrieve)
        .map(reply::ok);

    let create = warp::path!("tags")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(json_body::<TagForm>())
        .and(with_state(state.clone()))
        .then(create)
        .map(reply::created);

    let update = warp::path!("tags" / Uuid)
        .and(warp::patch())
        .and(with_session(secret.clone()))
        .and(json_body::<TagForm>())
        .and(with_state(state.clone()))
        .then(update)
        .map(reply::ok);

    let remove = warp::path!("tags" / Uuid)
        .and(warp::delete())
        .and(with_session(secret))
        .and(with_state(state))
        .then(remove)
        .map(reply::no_content);

    list.or(retrieve)
        .unify()
        .or(create)
        .unify()
        .or(update)
        .unify()
        .or(remove)
        .unify()
}
