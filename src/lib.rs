use axum::{
    middleware as layers,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod config;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod pages;
pub mod repository;
pub mod seed;
pub mod session;
pub mod store;
pub mod validate;
pub mod views;

use auth::AuthService;
use repository::{Articles, Repository, Users};
use session::SessionHandle;
use store::StoreHandle;

/// Shared application state: the injected store seam plus the repositories
/// and services layered on top of it.
#[derive(Clone)]
pub struct AppState {
    pub store: StoreHandle,
    pub users: Repository<Users>,
    pub articles: Repository<Articles>,
    pub auth: AuthService,
    pub sessions: SessionHandle,
}

impl AppState {
    pub fn new(store: StoreHandle, sessions: SessionHandle) -> Self {
        let users = Repository::new(store.clone());
        let articles = Repository::new(store.clone());
        let auth = AuthService::new(users.clone(), config::config().security.bcrypt_cost);
        Self {
            store,
            users,
            articles,
            auth,
            sessions,
        }
    }
}

/// Assemble the application router. Route gating mirrors the access model:
/// users require a session, articles require a session plus the admin role,
/// auth/settings/home are public.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::home::index))
        .route("/health", get(handlers::home::health))
        .merge(auth_routes())
        .merge(settings_routes())
        .merge(users_routes(state.clone()))
        .merge(articles_routes(state.clone()))
        .merge(protected_routes(state.clone()))
        .fallback(handlers::home::fallback)
        .layer(layers::from_fn_with_state(state.clone(), middleware::identify))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_routes() -> Router<AppState> {
    use handlers::auth;

    Router::new()
        .route("/auth/login", get(auth::login_form).post(auth::login))
        .route("/auth/register", get(auth::register_form).post(auth::register))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/profile", get(auth::profile))
}

fn settings_routes() -> Router<AppState> {
    use handlers::settings;

    Router::new()
        .route("/settings", get(settings::index))
        .route("/settings/theme", get(settings::get_theme).post(settings::set_theme))
}

fn users_routes(state: AppState) -> Router<AppState> {
    use handlers::users;

    Router::new()
        .route("/users", get(users::get_all).post(users::create))
        .route("/users/find", get(users::find))
        .route("/users/search", get(users::search))
        .route("/users/statistics", get(users::statistics))
        .route("/users/insertOne", post(users::insert_one))
        .route("/users/insertMany", post(users::insert_many))
        .route("/users/updateOne", put(users::update_one))
        .route("/users/updateMany", put(users::update_many))
        .route("/users/replaceOne", put(users::replace_one))
        .route("/users/deleteOne", delete(users::delete_one))
        .route("/users/deleteMany", delete(users::delete_many))
        .route(
            "/users/:userId",
            get(users::get_by_id).put(users::update).delete(users::delete),
        )
        .route_layer(layers::from_fn_with_state(state, middleware::require_session))
}

fn articles_routes(state: AppState) -> Router<AppState> {
    use handlers::articles;

    Router::new()
        .route("/articles", get(articles::get_all).post(articles::create))
        .route("/articles/find", get(articles::find))
        .route("/articles/search", get(articles::search))
        .route("/articles/aggregated", get(articles::aggregated))
        .route("/articles/top", get(articles::top))
        .route("/articles/insertOne", post(articles::insert_one))
        .route("/articles/insertMany", post(articles::insert_many))
        .route("/articles/updateOne", put(articles::update_one))
        .route("/articles/updateMany", put(articles::update_many))
        .route("/articles/replaceOne", put(articles::replace_one))
        .route("/articles/deleteOne", delete(articles::delete_one))
        .route("/articles/deleteMany", delete(articles::delete_many))
        .route(
            "/articles/:articleId",
            get(articles::get_by_id)
                .put(articles::update)
                .delete(articles::delete),
        )
        // Session gate runs first, then the role gate.
        .route_layer(layers::from_fn(middleware::require_admin))
        .route_layer(layers::from_fn_with_state(state, middleware::require_session))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/protected", get(handlers::protected::show))
        .route_layer(layers::from_fn_with_state(state, middleware::require_session))
}
