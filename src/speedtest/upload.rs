use super::download::mbps;
use anyhow::Result;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const CHUNK_SIZE: usize = 1_000_000; // 1MB chunks

pub struct UploadTest {
    url: String,
    data: Vec<u8>,
}

impl UploadTest {
    pub fn new(url: String, upload_size: usize) -> Self {
        let mut rng = rand::rngs::StdRng::from_entropy();
        let data: Vec<u8> = (0..upload_size).map(|_| rng.gen()).collect();
        Self { url, data }
    }

    pub async fn run(&mut self, progress_tx: mpsc::Sender<UploadProgress>) -> Result<UploadResult> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let start = Instant::now();
        let mut uploaded: usize = 0;
        let mut last_update = Instant::now();

        for chunk in self.data.chunks(CHUNK_SIZE) {
            client
                .post(&self.url)
                .body(chunk.to_vec())
                .send()
                .await?
                .error_for_status()?;
            uploaded += chunk.len();

            let now = Instant::now();
            if now.duration_since(last_update) >= Duration::from_millis(100) {
                let _ = progress_tx
                    .send(UploadProgress {
                        uploaded_bytes: uploaded as u64,
                        total_bytes: self.data.len() as u64,
                        speed_mbps: mbps(uploaded as u64, start.elapsed()),
                    })
                    .await;

                last_update = now;
            }
        }

        Ok(UploadResult {
            avg_speed_mbps: mbps(uploaded as u64, start.elapsed()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct UploadProgress {
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    pub speed_mbps: f64,
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub avg_speed_mbps: f64,
}
