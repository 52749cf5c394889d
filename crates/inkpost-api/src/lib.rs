pub mod articles;
pub mod auth;
pub mod comments;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod ownership;
pub mod response;
pub mod routes;
pub mod taxonomy;
pub mod token;
pub mod users;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use routes::router;

use inkpost_db::Database;

/// Runs blocking storage work off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db)).await?
}
