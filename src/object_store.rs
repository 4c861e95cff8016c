//! # Object Store Module
//!
//! Client per l'object store remoto (API compatibile S3).
//!
//! ## Indirizzamento
//! Il "folder" fa parte dello scope, non della chiave: un oggetto vive in
//! `<bucket>/<folder>` con chiave `<file name>`, e la richiesta HTTP
//! path-style diventa `<endpoint>/<bucket>/<folder>/<file name>`.
//!
//! ## Implementazioni
//! - `HttpObjectStore`: reqwest + firma AWS Signature V4 con credenziali esplicite
//! - `MemoryObjectStore`: store in memoria, usato nei test e per le prove a secco

use crate::error::{BatchError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_TYPE, ETAG, EXPIRES};
use reqwest::{Method, StatusCode};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// `<bucket>/<folder>` scope used for every request
pub fn scope(bucket: &str, folder: &str) -> String {
    format!("{}/{}", bucket, folder)
}

/// Metadata of an existing object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHead {
    pub etag: Option<String>,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
}

/// A single object write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectRequest {
    pub scope: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub acl: String,
    pub cache_control: Option<String>,
    pub expires: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutObjectOutput {
    pub etag: Option<String>,
}

/// HEAD/PUT operations the uploader needs
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `Ok(None)` when the object does not exist, `Err` for any other failure
    async fn head_object(&self, scope: &str, key: &str) -> Result<Option<ObjectHead>>;

    async fn put_object(&self, request: PutObjectRequest) -> Result<PutObjectOutput>;
}

/// Explicit, immutable authentication for one client
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("region", &self.region)
            .finish()
    }
}

/// S3 compatible client over HTTP
pub struct HttpObjectStore {
    http: reqwest::Client,
    endpoint: reqwest::Url,
    credentials: Credentials,
}

impl HttpObjectStore {
    /// Creates a client; `endpoint` defaults to the regional AWS endpoint
    pub fn new(credentials: Credentials, endpoint: Option<&str>) -> Result<Self> {
        let endpoint = match endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://s3.{}.amazonaws.com", credentials.region),
        };
        let endpoint = reqwest::Url::parse(&endpoint)
            .map_err(|e| BatchError::Config(format!("Invalid object store endpoint {}: {}", endpoint, e)))?;

        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            endpoint,
            credentials,
        })
    }

    /// Request path: endpoint path prefix, then the encoded scope segments and key
    fn request_path(&self, scope: &str, key: &str) -> String {
        format!(
            "{}{}",
            self.endpoint.path().trim_end_matches('/'),
            Self::canonical_path(scope, key)
        )
    }

    fn canonical_path(scope: &str, key: &str) -> String {
        let mut path = String::new();
        for segment in scope.split('/').chain(std::iter::once(key)) {
            if segment.is_empty() {
                continue;
            }
            path.push('/');
            path.push_str(&uri_encode(segment));
        }
        path
    }

    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Build the signed headers for one request
    fn signed_headers(
        &self,
        method: &Method,
        path: &str,
        body: &[u8],
        mut amz_headers: Vec<(String, String)>,
        now: DateTime<Utc>,
    ) -> Result<HeaderMap> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let payload_hash = hex::encode(Sha256::digest(body));

        amz_headers.push(("x-amz-content-sha256".into(), payload_hash.clone()));
        amz_headers.push(("x-amz-date".into(), amz_date.clone()));

        let mut signed: Vec<(String, String)> = amz_headers.clone();
        signed.push(("host".into(), self.host()));
        signed.sort();

        let authorization = sign_v4(
            &self.credentials,
            method.as_str(),
            path,
            &signed,
            &payload_hash,
            now,
        )?;

        let mut headers = HeaderMap::new();
        for (name, value) in amz_headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| BatchError::Remote(e.to_string()))?,
                header_value(&value)?,
            );
        }
        headers.insert(reqwest::header::AUTHORIZATION, header_value(&authorization)?);
        Ok(headers)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.origin().ascii_serialization(), path)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| BatchError::Remote(format!("Invalid header value {:?}: {}", value, e)))
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn head_object(&self, scope: &str, key: &str) -> Result<Option<ObjectHead>> {
        let path = self.request_path(scope, key);
        let headers = self.signed_headers(&Method::HEAD, &path, &[], Vec::new(), Utc::now())?;

        let resp = self.http.head(self.url(&path)).headers(headers).send().await?;
        let status = resp.status();
        debug!("HEAD {} -> {}", path, status);

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(BatchError::Remote(format!("HEAD {} failed with status {}", path, status)));
        }

        let headers = resp.headers();
        Ok(Some(ObjectHead {
            etag: header_string(headers, ETAG),
            content_length: header_string(headers, reqwest::header::CONTENT_LENGTH)
                .and_then(|len| len.parse().ok()),
            content_type: header_string(headers, CONTENT_TYPE),
        }))
    }

    async fn put_object(&self, request: PutObjectRequest) -> Result<PutObjectOutput> {
        let path = self.request_path(&request.scope, &request.key);
        let mut headers = self.signed_headers(
            &Method::PUT,
            &path,
            &request.body,
            vec![("x-amz-acl".into(), request.acl.clone())],
            Utc::now(),
        )?;
        headers.insert(CONTENT_TYPE, header_value(&request.content_type)?);
        if let Some(cache_control) = &request.cache_control {
            headers.insert(CACHE_CONTROL, header_value(cache_control)?);
        }
        if let Some(expires) = &request.expires {
            headers.insert(EXPIRES, header_value(expires)?);
        }

        let resp = self
            .http
            .put(self.url(&path))
            .headers(headers)
            .body(request.body)
            .send()
            .await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BatchError::Remote(format!(
                "PUT {} failed with status {}: {}",
                path,
                status.as_u16(),
                body
            )));
        }

        Ok(PutObjectOutput {
            etag: header_string(resp.headers(), ETAG),
        })
    }
}

/// URI encoding as required by Signature V4 (unreserved characters kept)
fn uri_encode(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| BatchError::Remote(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// `Authorization` header value for an S3 request; `headers` must be lowercase and sorted
fn sign_v4(
    credentials: &Credentials,
    method: &str,
    path: &str,
    headers: &[(String, String)],
    payload_hash: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        method, path, canonical_headers, signed_headers, payload_hash
    );

    let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, credentials.region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let k_date = hmac_sha256(
        format!("AWS4{}", credentials.secret_access_key).as_bytes(),
        date_stamp.as_bytes(),
    )?;
    let k_region = hmac_sha256(&k_date, credentials.region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, b"s3")?;
    let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
    let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes())?);

    Ok(format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        credentials.access_key_id, credential_scope, signed_headers, signature
    ))
}

/// An object held by [`MemoryObjectStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub acl: String,
    pub cache_control: Option<String>,
    pub expires: Option<String>,
    pub etag: String,
}

/// In-process object store
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    puts: Mutex<Vec<(String, String)>>,
    fail_heads: bool,
    fail_puts: bool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every HEAD fails with a remote error
    pub fn with_failing_heads(mut self) -> Self {
        self.fail_heads = true;
        self
    }

    /// Every PUT fails with a remote error
    pub fn with_failing_puts(mut self) -> Self {
        self.fail_puts = true;
        self
    }

    fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn object(&self, scope: &str, key: &str) -> Option<StoredObject> {
        Self::lock(&self.objects)
            .get(&(scope.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys written so far, in write order
    pub fn put_log(&self) -> Vec<(String, String)> {
        Self::lock(&self.puts).clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn head_object(&self, scope: &str, key: &str) -> Result<Option<ObjectHead>> {
        if self.fail_heads {
            return Err(BatchError::Remote("HEAD failed: connection reset".into()));
        }
        Ok(self.object(scope, key).map(|object| ObjectHead {
            etag: Some(object.etag),
            content_length: Some(object.body.len() as u64),
            content_type: Some(object.content_type),
        }))
    }

    async fn put_object(&self, request: PutObjectRequest) -> Result<PutObjectOutput> {
        if self.fail_puts {
            return Err(BatchError::Remote(format!("PUT {} failed: access denied", request.key)));
        }

        let etag = format!("\"{}\"", &hex::encode(Sha256::digest(&request.body))[..32]);
        let id = (request.scope.clone(), request.key.clone());
        Self::lock(&self.puts).push(id.clone());
        Self::lock(&self.objects).insert(
            id,
            StoredObject {
                body: request.body,
                content_type: request.content_type,
                acl: request.acl,
                cache_control: request.cache_control,
                expires: request.expires,
                etag: etag.clone(),
            },
        );

        Ok(PutObjectOutput { etag: Some(etag) })
    }
}
