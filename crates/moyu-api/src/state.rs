use std::sync::Arc;

use moyu_db::Database;

use crate::payment::PaymentGateway;
use crate::storage::UploadStore;
use crate::token::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
    pub payment: Arc<dyn PaymentGateway>,
    pub uploads: UploadStore,
    /// Server key used to verify payment notifications. `None` skips the check.
    pub payment_server_key: Option<String>,
}
