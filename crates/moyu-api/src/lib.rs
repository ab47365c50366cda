pub mod auth;
pub mod campaigns;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod payment;
pub mod response;
pub mod router;
pub mod services;
pub mod state;
pub mod storage;
pub mod token;
pub mod transactions;

pub use router::router;
pub use state::{AppState, AppStateInner};
