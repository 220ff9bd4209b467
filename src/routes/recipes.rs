use warp::{reject::Rejection, reply::Response, Filter};

use crate::{
    actions::{recipes, relations, shopping},
    constants::SHOPPING_LIST_FILENAME,
    filters::RecipeFilter,
    form::Form,
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    pagination::PageContext,
    permissions::ActionType,
    schema::{Recipe, RecipeShort, Uuid},
    validation::RecipeForm,
};

use super::{json_body, reply, with_form, with_state, AppState};

/// Which per-user recipe relation a `favorite` / `shopping_cart` route manages.
#[derive(Debug, Clone, Copy)]
enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    fn relation(self, state: &AppState) -> relations::PgRelation<'_> {
        match self {
            RecipeList::Favorites => relations::PgRelation::favorites(&state.pool),
            RecipeList::ShoppingCart => relations::PgRelation::shopping_cart(&state.pool),
        }
    }
}

async fn list(
    session: Option<SessionData>,
    form: Form,
    state: AppState,
) -> Result<PageContext<Recipe>, potion::Error> {
    let filter = RecipeFilter::from_form(&form);
    let page = recipes::default_recipe_page(&form);
    recipes::fetch_recipes(&filter, session.map(|s| s.user_id), page, &form, &state.pool).await
}

async fn retrieve(
    id: Uuid,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Recipe, potion::Error> {
    recipes::get_recipe(id, session.map(|s| s.user_id), &state.pool).await
}

async fn create(
    session: SessionData,
    form: RecipeForm,
    state: AppState,
) -> Result<Recipe, potion::Error> {
    let changes = form.clean(false)?;
    recipes::create_recipe(&session, changes, &state.media_root, &state.pool).await
}

async fn update(
    id: Uuid,
    session: SessionData,
    form: RecipeForm,
    state: AppState,
) -> Result<Recipe, potion::Error> {
    let changes = form.clean(true)?;
    recipes::update_recipe(id, &session, changes, &state.media_root, &state.pool).await
}

async fn remove(id: Uuid, session: SessionData, state: AppState) -> Result<(), potion::Error> {
    recipes::delete_recipe(id, &session, &state.media_root, &state.pool).await
}

async fn add_to(
    list: RecipeList,
    id: Uuid,
    session: SessionData,
    state: AppState,
) -> Result<RecipeShort, potion::Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    relations::follow(&list.relation(&state), id, session.user_id).await?;
    recipes::get_recipe_short(id, &state.pool).await
}

async fn remove_from(
    list: RecipeList,
    id: Uuid,
    session: SessionData,
    state: AppState,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    relations::unfollow(&list.relation(&state), id, session.user_id).await
}

async fn download_shopping_cart(
    session: SessionData,
    state: AppState,
) -> Result<String, potion::Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    shopping::build_shopping_list(session.user_id, &state.pool).await
}

fn recipe_list(
    list: RecipeList,
    segment: &'static str,
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let secret = state.secret.clone();
    let path = warp::path("recipes")
        .and(warp::path::param::<Uuid>())
        .and(warp::path(segment))
        .and(warp::path::end());

    let add = warp::any()
        .map(move || list)
        .and(path.clone())
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .then(add_to)
        .map(reply::created);

    let remove = warp::any()
        .map(move || list)
        .and(path)
        .and(warp::delete())
        .and(with_session(secret))
        .and(with_state(state))
        .then(remove_from)
        .map(reply::no_content);

    add.or(remove).unify()
}

pub fn routes(state: AppState) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let secret = state.secret.clone();

    let list = warp::path!("recipes")
        .and(warp::get())
        .and(with_possible_session(secret.clone()))
        .and(with_form())
        .and(with_state(state.clone()))
        .then(list)
        .map(reply::ok);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(json_body::<RecipeForm>())
        .and(with_state(state.clone()))
        .then(create)
        .map(reply::created);

    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .then(download_shopping_cart)
        .map(|result: Result<String, potion::Error>| {
            reply::attachment(result, SHOPPING_LIST_FILENAME)
        });

    let retrieve = warp::path!("recipes" / Uuid)
        .and(warp::get())
        .and(with_possible_session(secret.clone()))
        .and(with_state(state.clone()))
        .then(retrieve)
        .map(reply::ok);

    let update = warp::path!("recipes" / Uuid)
        .and(warp::patch())
        .and(with_session(secret.clone()))
        .and(json_body::<RecipeForm>())
        .and(with_state(state.clone()))
        .then(update)
        .map(reply::ok);

    let remove = warp::path!("recipes" / Uuid)
        .and(warp::delete())
        .and(with_session(secret))
        .and(with_state(state.clone()))
        .then(remove)
        .map(reply::no_content);

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(retrieve)
        .unify()
        .or(update)
        .unify()
        .or(remove)
        .unify()
        .or(recipe_list(RecipeList::Favorites, "favorite", state.clone()))
        .unify()
        .or(recipe_list(RecipeList::ShoppingCart, "shopping_cart", state))
        .unify()
}
