use std::time::Duration;

use axum::{
    http::{header, HeaderName, Method, StatusCode},
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    handlers::{
        annotations::{
            count_likes, create_comment, delete_comment, like_entry, list_comments, unlike_entry,
        },
        entries::{create_entry, delete_entry, get_entry, list_entries, update_entry},
        examples::{create_example, delete_example, get_example, list_examples, update_example},
        health::livez,
        history::list_history,
        meanings::{create_meaning, delete_meaning, get_meaning, list_meanings, update_meaning},
        translations::{
            create_translation, delete_translation, get_translation, list_translations,
            update_translation,
        },
    },
    state::AppState,
};

/// Create the application router with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    // CORS configuration for API endpoints
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-request-id"),
        ]);

    let api_routes = Router::new()
        .route("/livez", get(livez))
        // Entry routes
        .route("/entries", get(list_entries).post(create_entry))
        .route(
            "/entries/{id}",
            get(get_entry).patch(update_entry).delete(delete_entry),
        )
        .route("/entries/{id}/history", get(list_history))
        // Meaning routes
        .route(
            "/entries/{id}/meanings",
            get(list_meanings).post(create_meaning),
        )
        .route(
            "/meanings/{id}",
            get(get_meaning).patch(update_meaning).delete(delete_meaning),
        )
        // Example routes
        .route(
            "/meanings/{id}/examples",
            get(list_examples).post(create_example),
        )
        .route(
            "/examples/{id}",
            get(get_example).patch(update_example).delete(delete_example),
        )
        // Translation routes
        .route(
            "/meanings/{id}/translations",
            get(list_translations).post(create_translation),
        )
        .route(
            "/translations/{id}",
            get(get_translation)
                .patch(update_translation)
                .delete(delete_translation),
        )
        // Annotation routes
        .route(
            "/entries/{id}/comments",
            get(list_comments).post(create_comment),
        )
        .route("/comments/{id}", delete(delete_comment))
        .route(
            "/entries/{id}/likes",
            get(count_likes).post(like_entry).delete(unlike_entry),
        )
        .layer(cors);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(10),
        ))
        .with_state(state)
}
