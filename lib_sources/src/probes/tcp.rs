use std::io::ErrorKind;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::sources::{Source, SourceError};

/// # TCP Source
///
/// A source that is available when a TCP connection to `address` succeeds.
/// A refused or reset connection means the host answered "no": unavailable.
/// Any other connect error is a probe failure.
#[derive(Debug, Clone)]
pub struct TcpSource {
    id: String,
    title: Option<String>,
    address: String,
}

impl TcpSource {
    /// Creates a source probing `address` (`host:port`).
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            address: address.into(),
        }
    }

    /// Sets a human-readable title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The probed address.
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl Source for TcpSource {
    fn id(&self) -> Result<String, SourceError> {
        Ok(self.id.clone())
    }

    fn title(&self) -> Result<Option<String>, SourceError> {
        Ok(self.title.clone())
    }

    fn description(&self) -> Result<Option<String>, SourceError> {
        Ok(Some(format!("tcp://{}", self.address)))
    }

    async fn is_available(&self) -> Result<bool, SourceError> {
        match TcpStream::connect(&self.address).await {
            Ok(_) => Ok(true),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::ConnectionRefused
                        | ErrorKind::ConnectionReset
                        | ErrorKind::ConnectionAborted
                ) =>
            {
                Ok(false)
            }
            Err(e) => Err(SourceError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn listening_port_is_available() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let source = TcpSource::new("local", listener.local_addr().expect("addr").to_string());
        assert!(source.is_available().await.expect("probe"));
    }

    #[tokio::test]
    async fn closed_port_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("addr").to_string();
        drop(listener);

        let source = TcpSource::new("gone", address);
        assert!(!source.is_available().await.expect("probe"));
    }
}
