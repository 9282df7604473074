use anyhow::Result;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub struct PingTest {
    url: String,
    samples: Vec<f64>,
    ping_count: usize,
}

impl PingTest {
    pub fn new(url: String, ping_count: usize) -> Self {
        Self {
            url,
            samples: Vec::new(),
            ping_count,
        }
    }

    pub async fn run(&mut self, progress_tx: mpsc::Sender<PingProgress>) -> Result<PingResult> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        self.samples.clear();

        for _ in 0..self.ping_count {
            if let Some(elapsed) = probe_once(&client, &self.url).await {
                self.samples.push(elapsed);
            }

            let result = self.calculate_result();
            let _ = progress_tx
                .send(PingProgress {
                    latest_ping: self.samples.last().copied(),
                    avg_ms: result.avg_ms,
                    jitter_ms: result.jitter_ms,
                })
                .await;

            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        Ok(self.calculate_result())
    }

    fn calculate_result(&self) -> PingResult {
        stats(&self.samples)
    }
}

async fn probe_once(client: &reqwest::Client, url: &str) -> Option<f64> {
    let start = Instant::now();
    match client.get(url).send().await {
        Ok(response) if response.status().is_success() => {
            Some(start.elapsed().as_secs_f64() * 1000.0)
        }
        _ => None,
    }
}

/// Best of `probes` round trips, or `None` when every probe failed.
pub async fn probe_latency(client: &reqwest::Client, url: &str, probes: usize) -> Option<f64> {
    let mut best: Option<f64> = None;
    for _ in 0..probes {
        if let Some(ms) = probe_once(client, url).await {
            best = Some(best.map_or(ms, |b| b.min(ms)));
        }
    }
    best
}

fn stats(samples: &[f64]) -> PingResult {
    if samples.is_empty() {
        return PingResult { avg_ms: 0.0, jitter_ms: 0.0 };
    }

    let avg = samples.iter().sum::<f64>() / samples.len() as f64;
    let jitter = if samples.len() > 1 {
        let variance: f64 = samples.iter().map(|&x| (x - avg).powi(2)).sum::<f64>()
            / (samples.len() - 1) as f64;
        variance.sqrt()
    } else {
        0.0
    };

    PingResult { avg_ms: avg, jitter_ms: jitter }
}

#[derive(Debug, Clone)]
pub struct PingProgress {
    pub latest_ping: Option<f64>,
    pub avg_ms: f64,
    pub jitter_ms: f64,
}

#[derive(Debug, Clone)]
pub struct PingResult {
    pub avg_ms: f64,
    pub jitter_ms: f64,
}
