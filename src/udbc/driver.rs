use crate::error::DbError;
use crate::udbc::connection::Connection;
use crate::udbc::{ConnectOptions, Timeouts};
use async_trait::async_trait;
use std::sync::Arc;

/// Opens backend connections. One attempt per call; retrying is the
/// caller's business.
#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    async fn connect(
        &self,
        options: &ConnectOptions,
        timeouts: Timeouts,
    ) -> Result<Arc<dyn Connection>, DbError>;
}
