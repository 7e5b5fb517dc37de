// Device listing endpoint

use crate::client::BackendClient;
use crate::error::Error;
use crate::models::{ListResponse, RawDevice};

impl BackendClient {
    /// List every device the backend currently knows about.
    ///
    /// `GET /devices`
    pub async fn list_devices(&self) -> Result<Vec<RawDevice>, Error> {
        let url = self.url("/devices")?;
        let resp: ListResponse<RawDevice> = self.get(url).await?;
        Ok(resp.items)
    }
}
