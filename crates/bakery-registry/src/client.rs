//! HTTP shop client.
//!
//! Speaks the shop wire contract: form-encoded resolve-and-download on
//! `/get_pastry`, multipart upload on `/upload_pastry`. Error responses
//! carry a JSON [`ShopResponse`] body whose messages are surfaced verbatim.

use std::path::Path;
use std::time::Duration;

use tracing::debug;

use bakery_core::{Pastry, VersionSpec};

use crate::error::{RegistryError, Result};
use crate::shop::{
    copy_with_progress, FetchedPastry, ProgressFn, ShopBackend, ShopResponse,
    GET_PASTRY_ROUTE, UPLOAD_PASTRY_ROUTE, VERSION_HEADER,
};

/// A shop reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpShop {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpShop {
    /// Build a client for the shop at `base_url` (scheme and authority,
    /// e.g. `http://localhost:8570`).
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(HttpShop {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}{route}", self.base_url)
    }

    /// Turn a non-success response into a [`RegistryError::ShopRejected`],
    /// surfacing the error messages from the JSON body when there are any.
    fn rejection(response: reqwest::blocking::Response) -> RegistryError {
        let status = response.status().as_u16();
        let errors = match response.json::<ShopResponse>() {
            Ok(body) if !body.errors.is_empty() => body.errors,
            _ => vec![format!("shop returned status {status}")],
        };
        RegistryError::ShopRejected { status, errors }
    }
}

impl ShopBackend for HttpShop {
    fn fetch(
        &self,
        name: &str,
        spec: &VersionSpec,
        scratch_dir: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<FetchedPastry> {
        let url = self.endpoint(GET_PASTRY_ROUTE);
        debug!(%url, name, spec = %spec, "requesting pastry");
        let response = self
            .client
            .post(&url)
            .form(&[("name", name), ("version", &spec.to_string())])
            .send()?;

        if !response.status().is_success() {
            return Err(Self::rejection(response));
        }

        let status = response.status().as_u16();
        let version = response
            .headers()
            .get(VERSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| RegistryError::ShopRejected {
                status,
                errors: vec![format!("response is missing the {VERSION_HEADER} header")],
            })?;
        let pastry = Pastry::new(name, &version)?;

        std::fs::create_dir_all(scratch_dir)?;
        let dest = scratch_dir.join(pastry.file_name());
        let total = response.content_length();
        let mut reader = response;
        let mut writer = std::fs::File::create(&dest)?;
        let transferred = copy_with_progress(&mut reader, &mut writer, total, progress)?;

        debug!(%pastry, bytes = transferred, "downloaded");
        Ok(FetchedPastry {
            pastry,
            archive_path: dest,
        })
    }

    fn upload(&mut self, pastry: &Pastry, archive: &[u8], force: bool) -> Result<()> {
        let form = reqwest::blocking::multipart::Form::new()
            .text("name", pastry.name.clone())
            .text("version", pastry.version.to_string())
            .text("force", if force { "true" } else { "false" })
            .part(
                "pastry",
                reqwest::blocking::multipart::Part::bytes(archive.to_vec())
                    .file_name(pastry.file_name()),
            );

        let url = self.endpoint(UPLOAD_PASTRY_ROUTE);
        debug!(%url, %pastry, force, "uploading pastry");
        let response = self.client.post(&url).multipart(form).send()?;
        if !response.status().is_success() {
            return Err(Self::rejection(response));
        }
        Ok(())
    }
}
