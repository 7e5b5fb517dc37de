// Settings endpoints

use serde_json::Value;

use crate::client::BackendClient;
use crate::error::Error;

impl BackendClient {
    /// Fetch backend settings as an opaque JSON object.
    ///
    /// `GET /settings`
    pub async fn get_settings(&self) -> Result<Value, Error> {
        let url = self.url("/settings")?;
        self.get(url).await
    }

    /// Save backend settings.
    ///
    /// `PUT /settings`. A rejected save comes back as
    /// [`Error::Validation`] with the per-field messages.
    pub async fn save_settings(&self, settings: &Value) -> Result<(), Error> {
        let url = self.url("/settings")?;
        self.put(url, settings).await?;
        Ok(())
    }
}
