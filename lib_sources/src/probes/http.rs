use async_trait::async_trait;
use url::Url;

use crate::sources::content_types::ContentType;
use crate::sources::{Source, SourceError};

/// # HTTP Source
///
/// A source that is available when a `GET` on its URL answers with a 2xx
/// status. A non-2xx answer or a refused connection means unavailable; any
/// other transport error is a probe failure.
///
/// Content types are declared up front, since plain HTTP endpoints have no
/// standard way of listing them.
#[derive(Debug, Clone)]
pub struct HttpSource {
    id: String,
    title: Option<String>,
    url: Url,
    content_types: Vec<ContentType>,
    client: reqwest::Client,
}

impl HttpSource {
    /// Creates a source probing `url`.
    pub fn new(id: impl Into<String>, url: &str) -> Result<Self, SourceError> {
        let url = Url::parse(url).map_err(|e| SourceError::Probe(format!("invalid URL {}: {}", url, e)))?;
        Ok(Self {
            id: id.into(),
            title: None,
            url,
            content_types: Vec::new(),
            client: reqwest::Client::builder()
                .user_agent("lib_sources/0.1")
                .build()
                .unwrap_or_default(),
        })
    }

    /// Sets a human-readable title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Declares the content types this source offers.
    pub fn with_content_types(mut self, types: Vec<ContentType>) -> Self {
        self.content_types = types;
        self
    }

    /// The probed URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Source for HttpSource {
    fn id(&self) -> Result<String, SourceError> {
        Ok(self.id.clone())
    }

    fn title(&self) -> Result<Option<String>, SourceError> {
        Ok(self.title.clone())
    }

    fn description(&self) -> Result<Option<String>, SourceError> {
        Ok(Some(self.url.to_string()))
    }

    async fn is_available(&self) -> Result<bool, SourceError> {
        match self.client.get(self.url.clone()).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) if e.is_connect() => Ok(false),
            Err(e) => Err(SourceError::Probe(e.to_string())),
        }
    }

    async fn content_types(&self) -> Result<Vec<ContentType>, SourceError> {
        Ok(self.content_types.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned response per connection.
    async fn serve(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status_line
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{}/health", address)
    }

    #[tokio::test]
    async fn success_status_is_available() {
        let url = serve("200 OK").await;
        let source = HttpSource::new("ok", &url).expect("source");
        assert!(source.is_available().await.expect("probe"));
    }

    #[tokio::test]
    async fn error_status_is_unavailable() {
        let url = serve("503 Service Unavailable").await;
        let source = HttpSource::new("down", &url).expect("source");
        assert!(!source.is_available().await.expect("probe"));
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(HttpSource::new("bad", "not a url"), Err(SourceError::Probe(_))));
    }

    #[tokio::test]
    async fn declared_content_types_are_returned() {
        let source = HttpSource::new("typed", "http://127.0.0.1:1/")
            .expect("source")
            .with_content_types(vec![ContentType::new("document")]);
        assert_eq!(
            source.content_types().await.expect("types"),
            vec![ContentType::new("document")]
        );
    }
}
