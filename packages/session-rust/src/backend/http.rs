//! [`ListBackend`] over the list service's REST API.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use listgrid_core::{Column, ColumnUpdate, Item, ListSnapshot, Value, View, ViewConfig};

use super::config::HttpBackendConfig;
use crate::traits::ListBackend;

/// JSON client for the list service.
pub struct HttpBackend {
    client: Client,
    base: Url,
    token: Option<String>,
    page_size: usize,
}

impl HttpBackend {
    /// Builds a client for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or the HTTP client
    /// cannot be constructed.
    pub fn new(config: HttpBackendConfig) -> anyhow::Result<Self> {
        let base = Url::parse(&config.base_url)
            .with_context(|| format!("invalid base url: {}", config.base_url))?;
        if base.cannot_be_a_base() {
            bail!("base url cannot carry a path: {}", config.base_url);
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base,
            token: config.token,
            page_size: config.page_size.max(1),
        })
    }

    /// URL for a path under the base URL. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("base url cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, %url, "list service request");
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> anyhow::Result<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("list service returned {status}: {body}");
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> anyhow::Result<T> {
        let response = Self::send(builder).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ListBackend for HttpBackend {
    async fn get_list(&self, list_id: &str) -> anyhow::Result<ListSnapshot> {
        let url = self.endpoint(&["lists", list_id])?;
        let mut list: ListSnapshot = Self::send_json(self.request(Method::GET, url)).await?;
        list.normalize();
        Ok(list)
    }

    /// Pages through `skip`/`limit` until a short page comes back.
    async fn list_items(&self, list_id: &str, include_deleted: bool) -> anyhow::Result<Vec<Item>> {
        let url = self.endpoint(&["lists", list_id, "items"])?;
        let mut items: Vec<Item> = Vec::new();
        loop {
            let builder = self
                .request(Method::GET, url.clone())
                .query(&[("include_deleted", include_deleted)])
                .query(&[("skip", items.len()), ("limit", self.page_size)]);
            let page: Vec<Item> = Self::send_json(builder).await?;
            let last = page.len() < self.page_size;
            items.extend(page);
            if last {
                return Ok(items);
            }
        }
    }

    async fn update_item_values(
        &self,
        list_id: &str,
        item_id: &str,
        values: &BTreeMap<String, Value>,
    ) -> anyhow::Result<Item> {
        let url = self.endpoint(&["lists", list_id, "items", item_id])?;
        let builder = self
            .request(Method::PUT, url)
            .json(&json!({ "values": values }));
        Self::send_json(builder).await
    }

    async fn create_item(
        &self,
        list_id: &str,
        values: &BTreeMap<String, Value>,
    ) -> anyhow::Result<Item> {
        let url = self.endpoint(&["lists", list_id, "items"])?;
        let builder = self
            .request(Method::POST, url)
            .json(&json!({ "values": values }));
        Self::send_json(builder).await
    }

    async fn soft_delete_item(&self, list_id: &str, item_id: &str) -> anyhow::Result<()> {
        let url = self.endpoint(&["lists", list_id, "items", item_id])?;
        Self::send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn restore_item(&self, list_id: &str, item_id: &str) -> anyhow::Result<()> {
        let url = self.endpoint(&["lists", list_id, "items", item_id, "restore"])?;
        Self::send(self.request(Method::POST, url)).await?;
        Ok(())
    }

    async fn purge_item(&self, item_id: &str) -> anyhow::Result<()> {
        let url = self.endpoint(&["recycle-bin", item_id])?;
        Self::send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn update_view(
        &self,
        list_id: &str,
        view_id: &str,
        config: &ViewConfig,
    ) -> anyhow::Result<View> {
        let url = self.endpoint(&["lists", list_id, "views", view_id])?;
        let builder = self
            .request(Method::PUT, url)
            .json(&json!({ "config": config }));
        Self::send_json(builder).await
    }

    async fn create_view(
        &self,
        list_id: &str,
        name: &str,
        config: &ViewConfig,
    ) -> anyhow::Result<View> {
        let url = self.endpoint(&["lists", list_id, "views"])?;
        let builder = self.request(Method::POST, url).json(&json!({
            "name": name,
            "view_type": "grid",
            "config": config,
        }));
        Self::send_json(builder).await
    }

    async fn delete_view(&self, list_id: &str, view_id: &str) -> anyhow::Result<()> {
        let url = self.endpoint(&["lists", list_id, "views", view_id])?;
        Self::send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn reorder_columns(
        &self,
        list_id: &str,
        column_ids: &[String],
    ) -> anyhow::Result<Vec<Column>> {
        let url = self.endpoint(&["lists", list_id, "columns", "reorder"])?;
        let builder = self
            .request(Method::PUT, url)
            .json(&json!({ "column_ids": column_ids }));
        Self::send_json(builder).await
    }

    async fn update_column(
        &self,
        list_id: &str,
        column_id: &str,
        update: &ColumnUpdate,
    ) -> anyhow::Result<Column> {
        let url = self.endpoint(&["lists", list_id, "columns", column_id])?;
        Self::send_json(self.request(Method::PUT, url).json(update)).await
    }

    async fn delete_column(&self, list_id: &str, column_id: &str) -> anyhow::Result<()> {
        let url = self.endpoint(&["lists", list_id, "columns", column_id])?;
        Self::send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serves `GET .../items?skip=&limit=` over `total` items, one response
    /// per connection. Returns the base URL and a request counter.
    async fn serve_items(total: usize) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap();
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let query = request
                    .split_whitespace()
                    .nth(1)
                    .and_then(|path| path.split_once('?'))
                    .map(|(_, q)| q.to_string())
                    .unwrap_or_default();
                let param = |name: &str| {
                    query
                        .split('&')
                        .filter_map(|kv| kv.split_once('='))
                        .find(|(k, _)| *k == name)
                        .and_then(|(_, v)| v.parse::<usize>().ok())
                        .unwrap_or(0)
                };
                let skip = param("skip").min(total);
                let end = (skip + param("limit")).min(total);
                let page: Vec<serde_json::Value> = (skip..end)
                    .map(|i| {
                        json!({
                            "id": format!("i{i}"),
                            "list_id": "l1",
                            "position": i,
                            "values": {},
                            "created_at": "2024-01-01T00:00:00Z",
                            "updated_at": "2024-01-01T00:00:00Z"
                        })
                    })
                    .collect();
                let body = serde_json::to_string(&page).unwrap();
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });
        (format!("http://{addr}/api"), hits)
    }

    fn paged_backend(base_url: &str, page_size: usize) -> HttpBackend {
        let mut config = HttpBackendConfig::with_base_url(base_url);
        config.page_size = page_size;
        HttpBackend::new(config).unwrap()
    }

    #[tokio::test]
    async fn list_items_reads_every_page() {
        let (url, hits) = serve_items(5).await;
        let items = paged_backend(&url, 2).list_items("l1", true).await.unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["i0", "i1", "i2", "i3", "i4"]);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn full_last_page_needs_one_more_request() {
        let (url, hits) = serve_items(4).await;
        let items = paged_backend(&url, 2).list_items("l1", false).await.unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn endpoints_extend_base_path() {
        let backend =
            HttpBackend::new(HttpBackendConfig::with_base_url("http://localhost:8000/api")).unwrap();
        let url = backend.endpoint(&["lists", "l1", "items"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/lists/l1/items");
    }

    #[test]
    fn endpoint_segments_are_encoded() {
        let backend = HttpBackend::new(HttpBackendConfig::default()).unwrap();
        let url = backend.endpoint(&["lists", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/lists/a%2Fb%20c");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(HttpBackend::new(HttpBackendConfig::with_base_url("not a url")).is_err());
        assert!(HttpBackend::new(HttpBackendConfig::with_base_url("mailto:x@y.z")).is_err());
    }

    #[tokio::test]
    async fn unreachable_service_is_an_error() {
        let mut config = HttpBackendConfig::with_base_url("http://127.0.0.1:9/api");
        config.request_timeout = std::time::Duration::from_millis(500);
        let backend = HttpBackend::new(config).unwrap();
        assert!(backend.get_list("l1").await.is_err());
    }
}
