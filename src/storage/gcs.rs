//! Хранилище Google Cloud Storage через JSON API

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;

use super::ObjectStore;
use crate::auth::TokenSource;
use crate::error::{PipelineError, Result};

const API_BASE: &str = "https://storage.googleapis.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedObject {
    name: String,
    md5_hash: Option<String>,
}

pub struct GcsStore {
    http: Client,
    bucket: String,
    tokens: Arc<TokenSource>,
}

impl GcsStore {
    pub fn new(http: Client, bucket: impl Into<String>, tokens: Arc<TokenSource>) -> Self {
        Self {
            http,
            bucket: bucket.into(),
            tokens,
        }
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.tokens.token().await?;
        Ok(request.bearer_auth(token))
    }

    async fn check(response: Response, action: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("Failed to read error response: {}", e));
        Err(PipelineError::Storage(format!(
            "{} failed (status {}): {}",
            action, status, body
        )))
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    fn name(&self) -> &str {
        "gcs"
    }

    async fn list_objects(&self, prefix: &str) -> Result<BTreeSet<String>> {
        let url = format!("{}/storage/v1/b/{}/o", API_BASE, self.bucket);
        let mut names = BTreeSet::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut query = vec![
                ("prefix", prefix.to_string()),
                ("fields", "items(name),nextPageToken".to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let request = self.authorized(self.http.get(&url).query(&query)).await?;
            let response = Self::check(request.send().await?, "List objects").await?;
            let page: ObjectList = response.json().await?;
            pages += 1;

            names.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        log::debug!(
            "Listed {} objects under gs://{}/{} ({} pages)",
            names.len(),
            self.bucket,
            prefix,
            pages
        );
        Ok(names)
    }

    async fn put_object(&self, path: &str, bytes: Bytes) -> Result<()> {
        let url = format!("{}/upload/storage/v1/b/{}/o", API_BASE, self.bucket);
        let expected_md5 = BASE64.encode(md5::compute(&bytes).0);

        let request = self
            .http
            .post(&url)
            .query(&[("uploadType", "media"), ("name", path)])
            .header(reqwest::header::CONTENT_TYPE, content_type_for(path))
            .body(bytes);
        let request = self.authorized(request).await?;
        let response = Self::check(request.send().await?, "Upload").await?;
        let uploaded: UploadedObject = response.json().await?;

        // Сверяем контрольную сумму, которую вернул GCS
        if let Some(remote_md5) = uploaded.md5_hash {
            if remote_md5 != expected_md5 {
                return Err(PipelineError::Storage(format!(
                    "MD5 mismatch for {}: local {}, remote {}",
                    uploaded.name, expected_md5, remote_md5
                )));
            }
        }
        Ok(())
    }

    async fn get_object(&self, path: &str) -> Result<Bytes> {
        let url = format!(
            "{}/storage/v1/b/{}/o/{}",
            API_BASE,
            self.bucket,
            encode_object_name(path)
        );
        let request = self.authorized(self.http.get(&url).query(&[("alt", "media")])).await?;
        let response = Self::check(request.send().await?, "Download").await?;
        Ok(response.bytes().await?)
    }
}

fn content_type_for(path: &str) -> &'static str {
    if path.ends_with(".wav") {
        "audio/wav"
    } else if path.ends_with(".ogg") {
        "audio/ogg"
    } else {
        "application/octet-stream"
    }
}

/// Кодирование имени объекта для сегмента пути URL (`/` тоже кодируется)
fn encode_object_name(name: &str) -> String {
    urlencoding::encode(name).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_object_name() {
        assert_eq!(
            encode_object_name("AudioProject/af-ZA-Standard-A-female-WAV/item.minecraft.stone.wav"),
            "AudioProject%2Faf-ZA-Standard-A-female-WAV%2Fitem.minecraft.stone.wav"
        );
        assert_eq!(encode_object_name("a b"), "a%20b");
    }

    #[test]
    fn test_list_page_parsing() {
        let page: ObjectList = serde_json::from_str(
            r#"{"items":[{"name":"p/a.wav"},{"name":"p/b.wav"}],"nextPageToken":"abc"}"#,
        )
        .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));

        // Пустой префикс: GCS не возвращает поле items
        let page: ObjectList = serde_json::from_str("{}").unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("x/a.wav"), "audio/wav");
        assert_eq!(content_type_for("x/a.ogg"), "audio/ogg");
        assert_eq!(content_type_for("x/summary.txt"), "application/octet-stream");
    }
}
