use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::app::ports::RecordSourcePort;
use crate::error::{EtlError, Result};
use crate::pipeline::ingestion::{read_csv, RawTable};
use crate::pipeline::report::Stage;

const USER_AGENT: &str = concat!("trending_etl/", env!("CARGO_PKG_VERSION"));

/// Downloads the snapshot as a delimited file over HTTP(S)
pub struct HttpCsvSource {
    url: String,
    client: reqwest::Client,
}

impl HttpCsvSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    fn unavailable(&self, reason: impl ToString) -> EtlError {
        EtlError::SourceUnavailable {
            stage: Stage::Source,
            source_name: self.describe(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl RecordSourcePort for HttpCsvSource {
    async fn fetch_raw_rows(&self) -> Result<RawTable> {
        debug!(url = %self.url, "downloading snapshot");
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.unavailable(e))?;
        let bytes = resp.bytes().await.map_err(|e| self.unavailable(e))?;

        let table = read_csv(&bytes[..]).map_err(|e| self.unavailable(e))?;
        info!(url = %self.url, bytes = bytes.len(), rows = table.len(), "source downloaded");
        Ok(table)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_host_is_source_unavailable() {
        // Port 9 on loopback is not expected to be listening
        let source = HttpCsvSource::new("http://127.0.0.1:9/trending.csv", Duration::from_secs(2)).unwrap();

        match source.fetch_raw_rows().await {
            Err(EtlError::SourceUnavailable { stage, source_name, .. }) => {
                assert_eq!(stage, Stage::Source);
                assert_eq!(source_name, "http://127.0.0.1:9/trending.csv");
            }
            other => panic!("expected SourceUnavailable, got {:?}", other.map(|t| t.len())),
        }
    }
}
