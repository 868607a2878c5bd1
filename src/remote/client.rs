use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::cache::{Record, RecordId};
use crate::config::BackendConfig;
use crate::error::RemoteFailure;

/// CRUD access to one remote resource type.
///
/// Every call either yields the promised value or a `RemoteFailure`; a
/// failure is never disguised as an empty or partial result.
#[async_trait]
pub trait ResourceClient<T: Record>: Send + Sync {
  /// Fetch the whole collection
  async fn list(&self) -> Result<Vec<T>, RemoteFailure>;

  /// Create a record; the returned record carries the server-assigned id
  async fn create(&self, draft: &T) -> Result<T, RemoteFailure>;

  /// Replace the record stored under `id`
  async fn update(&self, id: &RecordId, record: &T) -> Result<T, RemoteFailure>;

  /// Delete the record stored under `id`
  async fn delete(&self, id: &RecordId) -> Result<(), RemoteFailure>;
}

/// List responses come either bare or wrapped in a `data` envelope
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
  Bare(Vec<T>),
  Wrapped { data: Vec<T> },
}

/// Single-record responses, same two shapes
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordBody<T> {
  Wrapped { data: T },
  Bare(T),
}

/// HTTP/JSON client for `{base}/{resource}` endpoints
pub struct HttpResourceClient<T> {
  http: reqwest::Client,
  endpoint: Url,
  token: Option<String>,
  timeout: Duration,
  _record: PhantomData<fn() -> T>,
}

impl<T: Record> HttpResourceClient<T> {
  pub fn new(backend: &BackendConfig, token: Option<String>) -> Result<Self> {
    let timeout = backend.timeout();
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    let endpoint = resource_endpoint(&backend.url, T::resource_name())?;

    Ok(Self {
      http,
      endpoint,
      token,
      timeout,
      _record: PhantomData,
    })
  }

  fn record_url(&self, id: &RecordId) -> Result<Url, RemoteFailure> {
    let mut url = self.endpoint.clone();
    url
      .path_segments_mut()
      .map_err(|_| RemoteFailure::Network(format!("{} cannot take a path", self.endpoint)))?
      .push(&id.to_string());
    Ok(url)
  }

  /// Send a request and return the body of a 2xx response.
  async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, RemoteFailure> {
    let request = match &self.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    };

    let response = request
      .send()
      .await
      .map_err(|e| RemoteFailure::from_transport(e, self.timeout))?;

    let status = response.status();
    let body = response
      .bytes()
      .await
      .map_err(|e| RemoteFailure::from_transport(e, self.timeout))?;

    if !status.is_success() {
      return Err(status_failure(status, &body));
    }

    Ok(body.to_vec())
  }
}

#[async_trait]
impl<T: Record> ResourceClient<T> for HttpResourceClient<T> {
  async fn list(&self) -> Result<Vec<T>, RemoteFailure> {
    debug!(url = %self.endpoint, "GET");
    let body = self.send(self.http.get(self.endpoint.clone())).await?;
    match decode::<ListBody<T>>(&body)? {
      ListBody::Bare(records) | ListBody::Wrapped { data: records } => Ok(records),
    }
  }

  async fn create(&self, draft: &T) -> Result<T, RemoteFailure> {
    // The backend assigns ids; never send the temporary one
    let mut payload = serde_json::to_value(draft)
      .map_err(|e| RemoteFailure::Malformed(format!("failed to encode request: {}", e)))?;
    if let Value::Object(fields) = &mut payload {
      fields.remove("id");
    }

    debug!(url = %self.endpoint, "POST");
    let body = self
      .send(self.http.post(self.endpoint.clone()).json(&payload))
      .await?;
    decode_record(&body)
  }

  async fn update(&self, id: &RecordId, record: &T) -> Result<T, RemoteFailure> {
    let url = self.record_url(id)?;
    debug!(url = %url, "PUT");
    let body = self.send(self.http.put(url).json(record)).await?;
    decode_record(&body)
  }

  async fn delete(&self, id: &RecordId) -> Result<(), RemoteFailure> {
    let url = self.record_url(id)?;
    debug!(url = %url, "DELETE");
    self.send(self.http.delete(url)).await?;
    Ok(())
  }
}

/// Bounds every call of `inner` by `limit`; an expired call is a `Timeout`.
pub struct WithTimeout<C> {
  inner: C,
  limit: Duration,
}

impl<C> WithTimeout<C> {
  pub fn new(inner: C, limit: Duration) -> Self {
    Self { inner, limit }
  }
}

#[async_trait]
impl<T, C> ResourceClient<T> for WithTimeout<C>
where
  T: Record,
  C: ResourceClient<T>,
{
  async fn list(&self) -> Result<Vec<T>, RemoteFailure> {
    tokio::time::timeout(self.limit, self.inner.list())
      .await
      .map_err(|_| RemoteFailure::Timeout(self.limit))?
  }

  async fn create(&self, draft: &T) -> Result<T, RemoteFailure> {
    tokio::time::timeout(self.limit, self.inner.create(draft))
      .await
      .map_err(|_| RemoteFailure::Timeout(self.limit))?
  }

  async fn update(&self, id: &RecordId, record: &T) -> Result<T, RemoteFailure> {
    tokio::time::timeout(self.limit, self.inner.update(id, record))
      .await
      .map_err(|_| RemoteFailure::Timeout(self.limit))?
  }

  async fn delete(&self, id: &RecordId) -> Result<(), RemoteFailure> {
    tokio::time::timeout(self.limit, self.inner.delete(id))
      .await
      .map_err(|_| RemoteFailure::Timeout(self.limit))?
  }
}

/// Build `{base}/{resource}` without dropping any path prefix of `base`.
fn resource_endpoint(base: &str, resource: &str) -> Result<Url> {
  let mut url =
    Url::parse(base.trim()).map_err(|e| eyre!("Invalid backend url '{}': {}", base, e))?;
  url
    .path_segments_mut()
    .map_err(|_| eyre!("Backend url '{}' cannot be a base", base))?
    .pop_if_empty()
    .push(resource);
  Ok(url)
}

fn status_failure(status: StatusCode, body: &[u8]) -> RemoteFailure {
  let text = String::from_utf8_lossy(body);
  RemoteFailure::Status {
    status: status.as_u16(),
    body: text.chars().take(200).collect(),
  }
}

fn decode<D: DeserializeOwned>(body: &[u8]) -> Result<D, RemoteFailure> {
  serde_json::from_slice(body).map_err(|e| RemoteFailure::Malformed(e.to_string()))
}

fn decode_record<T: Record>(body: &[u8]) -> Result<T, RemoteFailure> {
  match decode::<RecordBody<T>>(body)? {
    RecordBody::Wrapped { data } | RecordBody::Bare(data) => Ok(data),
  }
}
