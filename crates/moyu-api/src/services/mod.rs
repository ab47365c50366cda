//! Request-independent business logic.
//!
//! Services are synchronous and take `&Database`; async handlers reach them
//! through [`run_blocking`] so SQLite work stays off the runtime threads.

pub mod campaigns;
pub mod ownership;
pub mod transactions;
pub mod users;

use thiserror::Error;
use tracing::error;

use moyu_db::Database;

use crate::state::AppState;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
    #[error("email or password is incorrect")]
    InvalidCredentials,
    #[error("email has been registered")]
    EmailTaken,
    #[error("notification rejected: {0}")]
    BadNotification(String),
    #[error("upstream failure: {0}")]
    Upstream(anyhow::Error),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Run a synchronous service call on the blocking pool.
pub async fn run_blocking<F, T>(state: &AppState, f: F) -> ServiceResult<T>
where
    F: FnOnce(&Database) -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ServiceError::Store(anyhow::anyhow!("blocking task failed: {}", e))
        })?
}
