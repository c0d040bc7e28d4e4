//! Upstream data service access.
//!
//! URLs target a NOMADS-style filter script:
//! `{base_url}?file={file}&dir={dir}&{var_X=on&..}{level=on&..}leftlon=..&rightlon=..&toplat=..&bottomlat=..`

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use forecast_common::{BoundingBox, ModelConfig, ModelRun, VariableConfig};
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::FetchError;

/// Remote store of per-hour artifacts.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Lightweight existence probe. `Ok(false)` for a non-success status.
    async fn exists(&self, url: &str) -> Result<bool, FetchError>;

    /// Stream `url` into `dest`, returning the number of bytes written.
    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// HTTP implementation with separate probe and download timeouts.
pub struct HttpSource {
    client: Client,
    probe_timeout: Duration,
    download_timeout: Duration,
}

impl HttpSource {
    pub fn new(probe_timeout: Duration, download_timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            probe_timeout,
            download_timeout,
        })
    }
}

#[async_trait]
impl ArtifactSource for HttpSource {
    async fn exists(&self, url: &str) -> Result<bool, FetchError> {
        let response = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| FetchError::transient(url, e))?;

        debug!(url = %url, status = %response.status(), "Probe response");
        Ok(response.status().is_success())
    }

    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| FetchError::transient(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::transient(url, format!("HTTP {status}")));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| FetchError::io(dest, e))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::transient(url, e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| FetchError::io(dest, e))?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| FetchError::io(dest, e))?;
        file.sync_all().await.map_err(|e| FetchError::io(dest, e))?;
        Ok(written)
    }
}

/// `var_X=on&` per parameter followed by each level parameter and `&`.
pub fn build_variable_query(variable: &VariableConfig) -> String {
    let mut query = String::new();
    for param in &variable.nomads_params {
        query.push_str("var_");
        query.push_str(param);
        query.push_str("=on&");
    }
    for level in &variable.level_params {
        query.push_str(level);
        query.push('&');
    }
    query
}

fn filter_url(model: &ModelConfig, run: &ModelRun, forecast_hour: u32, query: &str, bbox: &BoundingBox) -> String {
    let source = &model.source;
    let init_hour = run.init_hour_str();
    format!(
        "{}?file={}&dir={}&{}{}",
        source.base_url,
        source.file_for(&init_hour, forecast_hour),
        source.dir_for(&run.date_str(), &init_hour),
        query,
        bbox.to_filter_query()
    )
}

/// URL of one variable's artifact for one forecast hour.
pub fn artifact_url(
    model: &ModelConfig,
    variable: &VariableConfig,
    run: &ModelRun,
    forecast_hour: u32,
    bbox: &BoundingBox,
) -> String {
    filter_url(model, run, forecast_hour, &build_variable_query(variable), bbox)
}

/// URL probing whether a run has published `forecast_hour`.
pub fn probe_url(model: &ModelConfig, run: &ModelRun, forecast_hour: u32, bbox: &BoundingBox) -> String {
    let query = format!("{}=on&", model.source.availability_check_var);
    filter_url(model, run, forecast_hour, &query, bbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use test_utils::{hourly_model, t2m_variable, wind_variable};

    fn run() -> ModelRun {
        ModelRun::new("hrrr", NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(), 6)
    }

    #[test]
    fn test_variable_query() {
        assert_eq!(build_variable_query(&t2m_variable()), "var_TMP=on&lev_2_m_above_ground=on&");
        assert_eq!(
            build_variable_query(&wind_variable()),
            "var_UGRD=on&var_VGRD=on&lev_10_m_above_ground=on&"
        );
    }

    #[test]
    fn test_artifact_url() {
        let bbox = BoundingBox::new(-76.5, 38.8, -73.5, 40.7);
        let url = artifact_url(&hourly_model("hrrr"), &t2m_variable(), &run(), 3, &bbox);
        assert_eq!(
            url,
            "http://upstream.test/cgi-bin/filter_hrrr.pl?file=hrrr.t06z.f03.grib2&dir=/hrrr.20240115/conus&\
             var_TMP=on&lev_2_m_above_ground=on&leftlon=-76.5&rightlon=-73.5&toplat=40.7&bottomlat=38.8"
        );
    }

    #[test]
    fn test_probe_url_uses_check_var() {
        let bbox = BoundingBox::new(-75.0, 38.0, -74.0, 39.0);
        let url = probe_url(&hourly_model("hrrr"), &run(), 1, &bbox);
        assert!(url.contains("file=hrrr.t06z.f01.grib2"));
        assert!(url.contains("&var_REFC=on&leftlon=-75"));
    }
}
