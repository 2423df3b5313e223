//! # Remote Backend
//!
//! Plugin running as a separate process, reached over JSON/HTTP:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `list_ids` | `GET {base}/{capability}/ids?hei_id=` |
//! | `fetch` | `POST {base}/{capability}/records` with `{"heiId", "ids"}` |
//! | `stats` | `GET {base}/{capability}/stats?hei_id=` |

use crate::domain::{BackendDescriptor, DispatchError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared_types::{BackendStats, Capability, InstitutionId, Record};
use std::time::Duration;
use url::Url;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchRequest<'a> {
    hei_id: &'a str,
    ids: &'a [String],
}

#[derive(Deserialize)]
struct IdsResponse {
    ids: Vec<String>,
}

#[derive(Deserialize)]
struct RecordsResponse {
    records: Vec<Record>,
}

/// Backend reached over HTTP.
#[derive(Clone)]
pub struct RemoteBackend {
    descriptor: BackendDescriptor,
    base_url: Url,
    client: Client,
}

impl RemoteBackend {
    /// Create a backend rooted at `base_url`.
    ///
    /// ## Errors
    ///
    /// - `InvalidBackendUrl`: unparsable URL, non-HTTP scheme, or a client
    ///   that cannot be built
    pub fn new(
        descriptor: BackendDescriptor,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| DispatchError::InvalidBackendUrl(format!("{base_url}: {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(DispatchError::InvalidBackendUrl(format!(
                "{base_url}: unsupported scheme"
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::InvalidBackendUrl(e.to_string()))?;

        Ok(Self {
            descriptor,
            base_url,
            client,
        })
    }

    /// Declared facts.
    pub fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    /// Base URL with a trailing slash.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(
        &self,
        capability: Capability,
        leaf: &str,
        operation: &'static str,
    ) -> Result<Url, DispatchError> {
        self.base_url
            .join(&format!("{}/{leaf}", capability.as_str()))
            .map_err(|e| DispatchError::backend(&self.descriptor.id, operation, e))
    }

    fn fail(&self, operation: &'static str) -> impl Fn(reqwest::Error) -> DispatchError + '_ {
        move |e| DispatchError::backend(&self.descriptor.id, operation, e)
    }

    /// `GET {base}/{capability}/ids`.
    pub async fn list_ids(
        &self,
        institution: &InstitutionId,
        capability: Capability,
    ) -> Result<Vec<String>, DispatchError> {
        let url = self.endpoint(capability, "ids", "list_ids")?;
        let response: IdsResponse = self
            .client
            .get(url)
            .query(&[("hei_id", institution.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(self.fail("list_ids"))?
            .json()
            .await
            .map_err(self.fail("list_ids"))?;
        Ok(response.ids)
    }

    /// `POST {base}/{capability}/records`.
    pub async fn fetch(
        &self,
        institution: &InstitutionId,
        capability: Capability,
        ids: &[String],
    ) -> Result<Vec<Record>, DispatchError> {
        let url = self.endpoint(capability, "records", "fetch")?;
        let body = FetchRequest {
            hei_id: institution.as_str(),
            ids,
        };
        let response: RecordsResponse = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(self.fail("fetch"))?
            .json()
            .await
            .map_err(self.fail("fetch"))?;
        Ok(response.records)
    }

    /// `GET {base}/{capability}/stats`.
    pub async fn stats(
        &self,
        institution: &InstitutionId,
        capability: Capability,
    ) -> Result<BackendStats, DispatchError> {
        let url = self.endpoint(capability, "stats", "stats")?;
        self.client
            .get(url)
            .query(&[("hei_id", institution.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(self.fail("stats"))?
            .json()
            .await
            .map_err(self.fail("stats"))
    }
}
