//! Google Drive thumbnail hosting.
//!
//! Optional companion to the sheets sink: optimized JPEG thumbnails are
//! uploaded into a named folder (found or created on connect), made
//! publicly readable, and referenced by a short `uc?id=` URL instead of a
//! base64 blob in the spreadsheet cell. Any failure here degrades to the
//! thumbnail the record already carries.

use reqwest::multipart;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::error::HarvestError;

const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_API: &str = "https://www.googleapis.com/upload/drive/v3";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    id: String,
}

/// Public download URL for an uploaded file.
pub fn public_url(file_id: &str) -> String {
    format!("https://drive.google.com/uc?id={file_id}")
}

/// Connected uploader bound to one folder.
#[derive(Debug)]
pub struct DriveUploader {
    client: Client,
    token: String,
    folder_id: String,
}

impl DriveUploader {
    /// Find or create the named folder.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] on any API failure; callers log it and run
    /// without Drive hosting rather than aborting.
    #[instrument(level = "info", skip(client, token))]
    pub async fn connect(
        client: Client,
        token: String,
        folder_name: &str,
    ) -> Result<Self, HarvestError> {
        let query = format!(
            "name='{}' and mimeType='{FOLDER_MIME}' and trashed=false",
            folder_name.replace('\'', "\\'")
        );
        let response = client
            .get(format!("{DRIVE_API}/files"))
            .bearer_auth(&token)
            .query(&[("q", query.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(HarvestError::BadStatus {
                status: response.status().as_u16(),
                context: "drive folder search".to_string(),
            });
        }
        let list: FileList = response
            .json()
            .await
            .map_err(|e| HarvestError::ParseFailed(e.to_string()))?;

        let folder_id = match list.files.into_iter().next() {
            Some(found) => {
                info!(folder = %folder_name, id = %found.id, "Using existing Drive folder");
                found.id
            }
            None => {
                info!(folder = %folder_name, "Creating Drive folder");
                let body = serde_json::json!({ "name": folder_name, "mimeType": FOLDER_MIME });
                let response = client
                    .post(format!("{DRIVE_API}/files"))
                    .bearer_auth(&token)
                    .json(&body)
                    .send()
                    .await?;
                if !response.status().is_success() {
                    return Err(HarvestError::BadStatus {
                        status: response.status().as_u16(),
                        context: "drive folder create".to_string(),
                    });
                }
                let created: FileRef = response
                    .json()
                    .await
                    .map_err(|e| HarvestError::ParseFailed(e.to_string()))?;
                created.id
            }
        };

        Ok(Self {
            client,
            token,
            folder_id,
        })
    }

    /// Upload JPEG bytes, grant public read, and return the `uc?id=` URL.
    #[instrument(level = "info", skip(self, jpeg), fields(%filename, bytes = jpeg.len()))]
    pub async fn upload_jpeg(&self, jpeg: Vec<u8>, filename: &str) -> Result<String, HarvestError> {
        let metadata = serde_json::json!({
            "name": filename,
            "parents": [self.folder_id],
        });
        let form = multipart::Form::new()
            .part(
                "metadata",
                multipart::Part::text(metadata.to_string())
                    .mime_str("application/json; charset=UTF-8")
                    .map_err(|e| HarvestError::RequestFailed(e.to_string()))?,
            )
            .part(
                "media",
                multipart::Part::bytes(jpeg)
                    .mime_str("image/jpeg")
                    .map_err(|e| HarvestError::RequestFailed(e.to_string()))?,
            );

        let response = self
            .client
            .post(format!("{DRIVE_UPLOAD_API}/files?uploadType=multipart&fields=id"))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(HarvestError::BadStatus {
                status: response.status().as_u16(),
                context: "drive upload".to_string(),
            });
        }
        let uploaded: FileRef = response
            .json()
            .await
            .map_err(|e| HarvestError::ParseFailed(e.to_string()))?;

        // public reader permission; without it the uc?id= link 403s
        let body = serde_json::json!({ "role": "reader", "type": "anyone" });
        let response = self
            .client
            .post(format!("{DRIVE_API}/files/{}/permissions", uploaded.id))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            warn!(
                status = response.status().as_u16(),
                file = %uploaded.id,
                "Permission grant failed; link may not be public"
            );
        }

        Ok(public_url(&uploaded.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_shape() {
        assert_eq!(
            public_url("1AbC_dEf"),
            "https://drive.google.com/uc?id=1AbC_dEf"
        );
    }
}
