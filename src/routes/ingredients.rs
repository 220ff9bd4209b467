use warp::{reject::Rejection, reply::Response, Filter};

use crate::{
    actions::ingredients,
    form::Form,
    jwt::SessionData,
    middleware::with_session,
    permissions::ActionType,
    schema::{Ingredient, Uuid},
    validation::IngredientForm,
};

use super::{json_body, reply, with_form, with_state, AppState};

async fn list(form: Form, state: AppState) -> Result<Vec<Ingredient>, potion::Error> {
    ingredients::fetch_ingredients(form.get_str("name"), &state.pool).await
}

async fn retrieve(id: Uuid, state: AppState) -> Result<Ingredient, potion::Error> {
    ingredients::get_ingredient(id, &state.pool).await
}

async fn create(
    session: SessionData,
    form: IngredientForm,
    state: AppState,
) -> Result<Ingredient, potion::Error> {
    session.authenticate(ActionType::ManageIngredients)?;
    ingredients::create_ingredient(form.clean(false)?, &state.pool).await
}

async fn update(
    id: Uuid,
    session: SessionData,
    form: IngredientForm,
    state: AppState,
) -> Result<Ingredient, potion::Error> {
    session.authenticate(ActionType::ManageIngredients)?;
    ingredients::update_ingredient(id, form.clean(true)?, &state.pool).await
}

async fn remove(id: Uuid, session: SessionData, state: AppState) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageIngredients)?;
    ingredients::delete_ingredient(id, &state.pool).await
}

pub fn routes(state: AppState) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let secret = state.secret.clone();

    let list = warp::path!("ingredients")
        .and(warp::get())
        .and(with_form())
        .and(with_state(state.clone()))
        .then(list)
        .map(reply::ok);

    let retrieve = warp::path!("ingredients" / Uuid)
        .and(warp::get())
        .and(with_state(state.clone()))
        .then(retrieve)
        .map(reply::ok);

    let create = warp::path!("ingredients")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(json_body::<IngredientForm>())
        .and(with_state(state.clone()))
        .then(create)
        .map(reply::created);

    let update = warp::path!("ingredients" / Uuid)
        .and(warp::patch())
        .and(with_session(secret.clone()))
        .and(json_body::<IngredientForm>())
        .and(with_state(state.clone()))
        .then(update)
        .map(reply::ok);

    let remove = warp::path!("ingredients" / Uuid)
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
