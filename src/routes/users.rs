use warp::{reject::Rejection, reply::Response, Filter};

use crate::{
    actions::{relations, users},
    form::Form,
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    pagination::PageContext,
    permissions::ActionType,
    schema::{Subscription, UserProfile, Uuid},
    validation::{PasswordForm, UserForm},
};

use super::{json_body, reply, with_form, with_state, AppState};

fn recipes_limit(form: &Form) -> Option<i64> {
    form.get_number::<i64>("recipes_limit").filter(|limit| *limit >= 0)
}

async fn list(
    session: Option<SessionData>,
    form: Form,
    state: AppState,
) -> Result<PageContext<UserProfile>, potion::Error> {
    let page = users::default_user_page(&form);
    users::fetch_users(page, session.map(|s| s.user_id), &form, &state.pool).await
}

async fn register(form: UserForm, state: AppState) -> Result<UserProfile, potion::Error> {
    users::register_user(form.clean()?, &state.pool).await
}

async fn me(session: SessionData, state: AppState) -> Result<UserProfile, potion::Error> {
    users::get_user_profile(session.user_id, Some(session.user_id), &state.pool).await
}

async fn retrieve(
    id: Uuid,
    session: Option<SessionData>,
    state: AppState,
) -> Result<UserProfile, potion::Error> {
    users::get_user_profile(id, session.map(|s| s.user_id), &state.pool).await
}

async fn set_password(
    session: SessionData,
    form: PasswordForm,
    state: AppState,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageOwnAccount)?;
    users::set_password(session.user_id, form.clean()?, &state.pool).await
}

async fn subscriptions(
    session: SessionData,
    form: Form,
    state: AppState,
) -> Result<PageContext<Subscription>, potion::Error> {
    let page = users::default_user_page(&form);
    users::fetch_subscriptions(session.user_id, page, recipes_limit(&form), &form, &state.pool)
        .await
}

async fn subscribe(
    id: Uuid,
    session: SessionData,
    form: Form,
    state: AppState,
) -> Result<Subscription, potion::Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    let relation = relations::PgRelation::subscriptions(&state.pool);
    relations::follow(&relation, id, session.user_id).await?;
    users::get_subscription(id, recipes_limit(&form), &state.pool).await
}

async fn unsubscribe(id: Uuid, session: SessionData, state: AppState) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    let relation = relations::PgRelation::subscriptions(&state.pool);
    relations::unfollow(&relation, id, session.user_id).await
}

pub fn routes(state: AppState) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let secret = state.secret.clone();

    let list = warp::path!("users")
        .and(warp::get())
        .and(with_possible_session(secret.clone()))
        .and(with_form())
        .and(with_state(state.clone()))
        .then(list)
        .map(reply::ok);

    let register = warp::path!("users")
        .and(warp::post())
        .and(json_body::<UserForm>())
        .and(with_state(state.clone()))
        .then(register)
        .map(reply::created);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .then(me)
        .map(reply::ok);

    let set_password = warp::path!("users" / "set_password")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(json_body::<PasswordForm>())
        .and(with_state(state.clone()))
        .then(set_password)
        .map(reply::no_content);

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(with_session(secret.clone()))
        .and(with_form())
        .and(with_state(state.clone()))
        .then(subscriptions)
        .map(reply::ok);

    let retrieve = warp::path!("users" / Uuid)
        .and(warp::get())
        .and(with_possible_session(secret.clone()))
        .and(with_state(state.clone()))
        .then(retrieve)
        .map(reply::ok);

    let subscribe = warp::path!("users" / Uuid / "subscribe")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(with_form())
        .and(with_state(state.clone()))
        .then(subscribe)
        .map(reply::created);

    let unsubscribe = warp::path!("users" / Uuid / "subscribe")
        .and(warp::delete())
        .and(with_session(secret))
        .and(with_state(state))
        .then(unsubscribe)
        .map(reply::no_content);

    list.or(register)
        .unify()
        .or(me)
        .unify()
        .or(set_password)
        .unify()
        .or(subscriptions)
        .unify()
        .or(retrieve)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
}
