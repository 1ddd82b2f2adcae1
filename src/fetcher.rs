//! Bearer-authenticated access to the Box API.

use std::path::Path;

use bytes::Bytes;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::auth::AccessToken;
use crate::config::Endpoints;
use crate::error::FetchError;
use crate::models::{ItemCollection, ItemRecord};

/// Maximum page size accepted by the folder listing endpoint.
pub const PAGE_LIMIT: u64 = 1000;

/// Statuses accepted from the upload endpoints: 201 for a new file, 200 for a new version.
const UPLOAD_STATUSES: [StatusCode; 2] = [StatusCode::CREATED, StatusCode::OK];

/// Fields requested for every listed item.
const ITEM_FIELDS: &str = "id,type,name,parent,created_at,size";

#[derive(Debug, Deserialize)]
struct SharedLinkResponse {
    shared_link: Option<SharedLinkUrl>,
}

#[derive(Debug, Deserialize)]
struct SharedLinkUrl {
    url: String,
}

/// Issues single, unretried requests with an access token attached.
///
/// Nothing is cached: asking for the same resource twice hits the API twice.
pub struct AuthorizedFetcher {
    api_base: String,
    upload_base: String,
    token: AccessToken,
    http: Client,
}

impl AuthorizedFetcher {
    /// Create a new AuthorizedFetcher.
    ///
    /// # Arguments
    /// * `token` - Access token from a successful code exchange
    /// * `endpoints` - API and upload base URLs
    pub fn new(token: AccessToken, endpoints: &Endpoints) -> Self {
        Self::with_client(Client::new(), token, endpoints)
    }

    pub fn with_client(http: Client, token: AccessToken, endpoints: &Endpoints) -> Self {
        Self {
            api_base: endpoints.api_base.trim_end_matches('/').to_string(),
            upload_base: endpoints.upload_base.trim_end_matches('/').to_string(),
            token,
            http,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn upload_url(&self, path: &str) -> String {
        format!("{}{}", self.upload_base, path)
    }

    /// Send with the token attached. Any status outside `accepted` is a failure,
    /// including other 2xx codes such as 202 for content that is not ready yet.
    async fn send(
        &self,
        request: RequestBuilder,
        url: &str,
        accepted: &[StatusCode],
    ) -> Result<Response, FetchError> {
        let response = request.bearer_auth(self.token.secret()).send().await?;

        let status = response.status();
        if !accepted.contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), %url, body = %error_body, "Request rejected");
            return Err(FetchError::RequestFailed {
                status_code: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }

    /// GET an API path and return the JSON body.
    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, FetchError> {
        self.get_json(path, params).await
    }

    /// GET an API path and decode the JSON body into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let url = self.api_url(path);
        debug!(%url, "GET");
        let response = self
            .send(self.http.get(&url).query(params), &url, &[StatusCode::OK])
            .await?;
        Ok(response.json().await?)
    }

    /// GET an API path and return the raw body.
    pub async fn download(&self, path: &str) -> Result<Bytes, FetchError> {
        let url = self.api_url(path);
        debug!(%url, "GET (download)");
        let response = self.send(self.http.get(&url), &url, &[StatusCode::OK]).await?;
        Ok(response.bytes().await?)
    }

    /// Stream an API path's body into a local file, returning the byte count.
    pub async fn download_to<P: AsRef<Path>>(
        &self,
        path: &str,
        destination: P,
    ) -> Result<u64, FetchError> {
        let url = self.api_url(path);
        debug!(%url, "GET (stream)");
        let response = self.send(self.http.get(&url), &url, &[StatusCode::OK]).await?;

        let mut file = File::create(destination.as_ref()).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;

        Ok(written)
    }

    /// PUT a JSON body to an API path and decode the JSON response.
    pub async fn put_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        body: &Value,
    ) -> Result<T, FetchError> {
        let url = self.api_url(path);
        debug!(%url, "PUT");
        let request = self.http.put(&url).query(params).json(body);
        let response = self.send(request, &url, &[StatusCode::OK]).await?;
        Ok(response.json().await?)
    }

    /// POST a multipart `attributes` + `file` upload to an upload path.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        attributes: &Value,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<T, FetchError> {
        let url = self.upload_url(path);
        let mime_type = mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string();

        let attributes_part = Part::text(attributes.to_string()).mime_str("application/json")?;

        let file_part = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str(&mime_type)?;

        let form = Form::new()
            .part("attributes", attributes_part)
            .part("file", file_part);

        debug!(%url, file_name, "POST (multipart)");
        let response = self
            .send(self.http.post(&url).multipart(form), &url, &UPLOAD_STATUSES)
            .await?;
        Ok(response.json().await?)
    }

    /// List every item of a folder, following offset pagination.
    pub async fn list_folder(&self, folder_id: &str) -> Result<Vec<ItemRecord>, FetchError> {
        let path = format!("/folders/{}/items", folder_id);
        let limit = PAGE_LIMIT.to_string();
        let mut items = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let offset_str = offset.to_string();
            let page: ItemCollection = self
                .get_json(
                    &path,
                    &[
                        ("limit", limit.as_str()),
                        ("offset", offset_str.as_str()),
                        ("fields", ITEM_FIELDS),
                    ],
                )
                .await?;

            let received = page.entries.len() as u64;
            items.extend(page.entries);
            offset += received;

            match page.total_count {
                Some(total) if received > 0 && offset < total => continue,
                _ => break,
            }
        }

        debug!(folder_id, count = items.len(), "Listed folder");
        Ok(items)
    }

    /// Full metadata of a file.
    pub async fn file_info(&self, file_id: &str) -> Result<ItemRecord, FetchError> {
        self.get_json(&format!("/files/{}", file_id), &[]).await
    }

    /// Raw content of a file.
    pub async fn file_content(&self, file_id: &str) -> Result<Bytes, FetchError> {
        self.download(&format!("/files/{}/content", file_id)).await
    }

    /// Create (or return the existing) open shared link of a file.
    pub async fn create_shared_link(&self, file_id: &str) -> Result<String, FetchError> {
        let path = format!("/files/{}", file_id);
        let body = json!({ "shared_link": { "access": "open" } });
        let response: SharedLinkResponse = self
            .put_json(&path, &[("fields", "shared_link")], &body)
            .await?;

        response
            .shared_link
            .map(|link| link.url)
            .ok_or_else(|| FetchError::UnexpectedResponse {
                url: self.api_url(&path),
                detail: "no shared_link in response",
            })
    }

    /// Search items by name, restricted to one file extension.
    pub async fn search(
        &self,
        query: &str,
        file_extension: &str,
    ) -> Result<Vec<ItemRecord>, FetchError> {
        let results: ItemCollection = self
            .get_json(
                "/search",
                &[("query", query), ("file_extensions", file_extension)],
            )
            .await?;
        Ok(results.entries)
    }

    /// Upload content as a new file in a folder.
    pub async fn upload_new(
        &self,
        folder_id: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<ItemCollection, FetchError> {
        let attributes = json!({ "name": file_name, "parent": { "id": folder_id } });
        let uploaded: ItemCollection = self
            .upload("/files/content", &attributes, file_name, content)
            .await?;
        info!(folder_id, file_name, "Uploaded new file");
        Ok(uploaded)
    }

    /// Replace the content of an existing file.
    pub async fn upload_version(
        &self,
        file_id: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<ItemCollection, FetchError> {
        let attributes = json!({ "name": file_name });
        let uploaded: ItemCollection = self
            .upload(
                &format!("/files/{}/content", file_id),
                &attributes,
                file_name,
                content,
            )
            .await?;
        info!(file_id, file_name, "Uploaded new file version");
        Ok(uploaded)
    }
}
