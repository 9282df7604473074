use anyhow::Result;
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub struct DownloadTest {
    url: String,
    download_size: u64,
}

impl DownloadTest {
    pub fn new(url: String, download_size: u64) -> Self {
        Self { url, download_size }
    }

    pub async fn run(
        &mut self,
        progress_tx: mpsc::Sender<DownloadProgress>,
    ) -> Result<DownloadResult> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let response = client.get(&self.url).send().await?.error_for_status()?;
        let total_size = response.content_length().unwrap_or(self.download_size);
        let mut stream = response.bytes_stream();

        let start = Instant::now();
        let mut downloaded: u64 = 0;
        let mut last_update = Instant::now();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            downloaded += chunk.len() as u64;

            let now = Instant::now();
            if now.duration_since(last_update) >= Duration::from_millis(100) {
                let _ = progress_tx
                    .send(DownloadProgress {
                        downloaded_bytes: downloaded,
                        total_bytes: total_size,
                        speed_mbps: mbps(downloaded, start.elapsed()),
                    })
                    .await;

                last_update = now;
            }
        }

        Ok(DownloadResult {
            avg_speed_mbps: mbps(downloaded, start.elapsed()),
        })
    }
}

pub(crate) fn mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / secs / 1_000_000.0
}

#[derive(Debug, Clone)]
pub struct DownloadProgress {
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub speed_mbps: f64,
}

#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub avg_speed_mbps: f64,
}
