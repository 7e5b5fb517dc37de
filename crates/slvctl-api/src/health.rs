// Health endpoint

use crate::client::BackendClient;
use crate::error::Error;
use crate::models::SystemInfo;

impl BackendClient {
    /// Fetch backend process and host metrics.
    ///
    /// `GET /health`
    pub async fn health(&self) -> Result<SystemInfo, Error> {
        let url = self.url("/health")?;
        self.get(url).await
    }
}
