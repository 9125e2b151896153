//! Canvas REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, LINK};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, trace};

use super::{ApiError, CourseApi};

const PER_PAGE: u32 = 100;

/// Per-request timeout unless the caller picks another.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct CanvasClient {
  http: Client,
  base_url: String,
  token: String,
  course_id: u64,
}

impl CanvasClient {
  pub fn new(base_url: &str, token: &str, course_id: u64) -> Result<Self, ApiError> {
    Self::with_timeout(base_url, token, course_id, DEFAULT_TIMEOUT)
  }

  pub fn with_timeout(base_url: &str, token: &str, course_id: u64, timeout: Duration) -> Result<Self, ApiError> {
    let http = Client::builder()
      .user_agent(concat!("coursesync/", env!("CARGO_PKG_VERSION")))
      .timeout(timeout)
      .build()
      .map_err(|source| ApiError::Transport {
        path: base_url.to_string(),
        source,
      })?;
    Ok(Self {
      http,
      base_url: base_url.trim_end_matches('/').to_string(),
      token: token.to_string(),
      course_id,
    })
  }

  fn endpoint(&self, path: &str) -> String {
    if let Some(absolute) = path.strip_prefix('/') {
      return format!("{}/api/v1/{}", self.base_url, absolute);
    }
    if path.is_empty() {
      format!("{}/api/v1/courses/{}", self.base_url, self.course_id)
    } else {
      format!("{}/api/v1/courses/{}/{}", self.base_url, self.course_id, path)
    }
  }

  async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response, ApiError> {
    let response = request
      .bearer_auth(&self.token)
      .send()
      .await
      .map_err(|source| ApiError::Transport {
        path: path.to_string(),
        source,
      })?;

    let status = response.status();
    trace!(path = %path, status = status.as_u16(), "response");
    if status == StatusCode::NOT_FOUND {
      return Err(ApiError::NotFound { path: path.to_string() });
    }
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(ApiError::Status {
        path: path.to_string(),
        status: status.as_u16(),
        body,
      });
    }
    Ok(response)
  }

  async fn json(response: Response, path: &str) -> Result<Value, ApiError> {
    response.json::<Value>().await.map_err(|source| ApiError::Transport {
      path: path.to_string(),
      source,
    })
  }
}

/// The `rel="next"` target of a `Link` header, if any.
fn next_link(headers: &HeaderMap) -> Option<String> {
  let header = headers.get(LINK)?.to_str().ok()?;
  header.split(',').find_map(|part| {
    let (target, params) = part.split_once(';')?;
    params
      .split(';')
      .any(|p| p.trim() == r#"rel="next""#)
      .then(|| target.trim().trim_start_matches('<').trim_end_matches('>').to_string())
  })
}

#[async_trait]
impl CourseApi for CanvasClient {
  fn course_id(&self) -> u64 {
    self.course_id
  }

  fn base_url(&self) -> &str {
    &self.base_url
  }

  async fn get(&self, path: &str) -> Result<Option<Value>, ApiError> {
    debug!(path = %path, "GET");
    match self.send(self.http.get(self.endpoint(path)), path).await {
      Ok(response) => Ok(Some(Self::json(response, path).await?)),
      Err(ApiError::NotFound { .. }) => Ok(None),
      Err(err) => Err(err),
    }
  }

  async fn list(&self, path: &str) -> Result<Vec<Value>, ApiError> {
    debug!(path = %path, "GET (paginated)");
    let mut items = Vec::new();
    let mut request = self.http.get(self.endpoint(path)).query(&[("per_page", PER_PAGE)]);

    loop {
      let response = self.send(request, path).await?;
      let next = next_link(response.headers());
      match Self::json(response, path).await? {
        Value::Array(page) => items.extend(page),
        other => {
          return Err(ApiError::Unexpected {
            path: path.to_string(),
            message: format!("expected an array, got {other}"),
          });
        }
      }
      match next {
        Some(url) => request = self.http.get(url),
        None => return Ok(items),
      }
    }
  }

  async fn create(&self, path: &str, body: Value) -> Result<Value, ApiError> {
    debug!(path = %path, "POST");
    let response = self.send(self.http.post(self.endpoint(path)).json(&body), path).await?;
    Self::json(response, path).await
  }

  async fn update(&self, path: &str, body: Value) -> Result<Value, ApiError> {
    debug!(path = %path, "PUT");
    let response = self.send(self.http.put(self.endpoint(path)).json(&body), path).await?;
    Self::json(response, path).await
  }

  async fn delete(&self, path: &str) -> Result<(), ApiError> {
    debug!(path = %path, "DELETE");
    self.send(self.http.delete(self.endpoint(path)), path).await?;
    Ok(())
  }

  async fn upload(&self, folder: &str, name: &str, bytes: Vec<u8>) -> Result<Value, ApiError> {
    debug!(folder = %folder, name = %name, size = bytes.len(), "uploading file");
    let path = "files";

    // Step 1: announce the upload and receive a target plus signed parameters.
    let announce = json!({
      "name": name,
      "size": bytes.len(),
      "parent_folder_path": folder,
      "on_duplicate": "overwrite",
    });
    let response = self.send(self.http.post(self.endpoint(path)).json(&announce), path).await?;
    let ticket = Self::json(response, path).await?;
    let Some(upload_url) = ticket.get("upload_url").and_then(Value::as_str) else {
      return Err(ApiError::Unexpected {
        path: path.to_string(),
        message: "upload ticket has no upload_url".to_string(),
      });
    };

    // Step 2: send the bytes to the target with the signed parameters.
    let mut form = Form::new();
    if let Some(params) = ticket.get("upload_params").and_then(Value::as_object) {
      for (key, value) in params {
        let text = match value {
          Value::String(s) => s.clone(),
          other => other.to_string(),
        };
        form = form.text(key.clone(), text);
      }
    }
    form = form.part("file", Part::bytes(bytes).file_name(name.to_string()));

    let response = self
      .http
      .post(upload_url)
      .multipart(form)
      .send()
      .await
      .map_err(|source| ApiError::Transport {
        path: upload_url.to_string(),
        source,
      })?;
    if !response.status().is_success() {
      let status = response.status().as_u16();
      let body = response.text().await.unwrap_or_default();
      return Err(ApiError::Status {
        path: upload_url.to_string(),
        status,
        body,
      });
    }
    Self::json(response, upload_url).await
  }
}
