// Automation script endpoints
//
// CRUD over the backend's stored scripts. Script names become a single
// percent-encoded path segment.

use tracing::debug;
use url::Url;

use crate::client::BackendClient;
use crate::error::Error;
use crate::models::{AutomationScript, ListResponse};

impl BackendClient {
    fn script_url(&self, name: &str) -> Result<Url, Error> {
        let mut url = self.url("/automation/scripts")?;
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .push(name);
        Ok(url)
    }

    /// List stored scripts (names only; the listing omits code).
    ///
    /// `GET /automation/scripts`
    pub async fn list_scripts(&self) -> Result<Vec<AutomationScript>, Error> {
        let url = self.url("/automation/scripts")?;
        let resp: ListResponse<AutomationScript> = self.get(url).await?;
        Ok(resp.items)
    }

    /// Fetch a single script including its code.
    ///
    /// `GET /automation/scripts/{name}`
    pub async fn get_script(&self, name: &str) -> Result<AutomationScript, Error> {
        let url = self.script_url(name)?;
        self.get(url).await
    }

    /// Create a new script.
    ///
    /// `POST /automation/scripts`
    pub async fn create_script(&self, script: &AutomationScript) -> Result<(), Error> {
        let url = self.url("/automation/scripts")?;
        self.post(url, script).await?;
        debug!(name = %script.name, "script created");
        Ok(())
    }

    /// Overwrite an existing script.
    ///
    /// `PUT /automation/scripts/{name}`
    pub async fn update_script(&self, script: &AutomationScript) -> Result<(), Error> {
        let url = self.script_url(&script.name)?;
        self.put(url, script).await?;
        debug!(name = %script.name, "script updated");
        Ok(())
    }

    /// Delete a script.
    ///
    /// `DELETE /automation/scripts/{name}`
    pub async fn delete_script(&self, name: &str) -> Result<(), Error> {
        let url = self.script_url(name)?;
        self.delete(url).await?;
        debug!(name, "script deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn script_name_is_percent_encoded() {
        let client = BackendClient::with_client(
            reqwest::Client::new(),
            Url::parse("http://localhost:1337").unwrap(),
        );
        let url = client.script_url("my script/v2.js").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:1337/automation/scripts/my%20script%2Fv2.js"
        );
    }
}
