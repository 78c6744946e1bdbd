use anyhow::{Context, Result};
use gallery_core::{ImageRecord, Role};
use reqwest::Url;
use serde::{Deserialize, de::DeserializeOwned};

/// Client for the gallery HTTP API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
    code: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid server URL")?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.map(str::to_string),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("failed to build API URL")
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let req = match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        let response = req.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let envelope: Envelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => anyhow::bail!("API error ({}): {}", status, body),
            Err(e) => {
                return Err(anyhow::Error::new(e).context("failed to decode API response"));
            }
        };
        if !status.is_success() || !envelope.success {
            anyhow::bail!(
                "API error ({}): {} [{}]",
                status,
                envelope.error.unwrap_or_default(),
                envelope.code.unwrap_or_default()
            );
        }
        envelope
            .data
            .ok_or_else(|| anyhow::anyhow!("API response carried no data"))
    }

    pub async fn check_images(&self) -> Result<CheckReport> {
        let url = self.url("/api/check-images")?;
        self.send_json(self.http.post(url)).await
    }

    pub async fn fix_images(&self) -> Result<FixReport> {
        let url = self.url("/api/fix-images")?;
        self.send_json(self.http.post(url)).await
    }

    pub async fn reupload_images(&self) -> Result<ReuploadReport> {
        let url = self.url("/api/reupload-images")?;
        self.send_json(self.http.post(url)).await
    }

    pub async fn delete_all_images(&self) -> Result<DeleteAllReport> {
        let url = self.url("/api/delete-all-images")?;
        self.send_json(self.http.post(url)).await
    }

    pub async fn upload_image(
        &self,
        filename: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<ImageRecord> {
        let url = self.url("/api/upload")?;
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .context("invalid MIME type")?;
        let form = reqwest::multipart::Form::new().part("file", part);
        self.send_json(self.http.post(url).multipart(form)).await
    }

    pub async fn list_images(
        &self,
        skip: Option<usize>,
        limit: Option<usize>,
    ) -> Result<ListImagesResponse> {
        let mut url = self.url("/api/images")?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(skip) = skip {
                pairs.append_pair("skip", &skip.to_string());
            }
            if let Some(limit) = limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        self.send_json(self.http.get(url)).await
    }

    pub async fn auth_check(&self) -> Result<AuthCheckResponse> {
        let url = self.url("/api/auth/check")?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let url = self.url("/api/health")?;
        self.send_json(self.http.get(url)).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub total: usize,
    pub found: usize,
    pub missing: usize,
    pub missing_images: Vec<MissingImage>,
}

#[derive(Debug, Deserialize)]
pub struct MissingImage {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct FixReport {
    pub total: usize,
    pub fixed: usize,
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
pub struct ReuploadReport {
    pub total: usize,
    pub reuploaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub results: Vec<ReuploadResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReuploadResult {
    pub id: String,
    pub old_url: Option<String>,
    pub new_url: Option<String>,
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAllReport {
    pub total: usize,
    pub deleted: usize,
    pub failed: usize,
    pub results: Vec<DeleteResult>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteResult {
    pub id: String,
    pub status: String,
    pub reason: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListImagesResponse {
    pub images: Vec<ImageRecord>,
    pub total: usize,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub has_more: bool,
    pub total: usize,
    pub skip: usize,
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct AuthCheckResponse {
    pub identity: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
