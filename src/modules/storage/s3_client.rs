//! S3-compatible storage client
//!
//! Uploads, ACL changes, signed URLs, reads and deletes against MinIO or
//! any S3-compatible service. Uses rust-s3 for presigning, reads, deletes and
//! bucket creation; uploads and ACL changes are SigV4-signed by hand because
//! they need `x-amz-acl` and `x-amz-meta-*` headers.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, Url};
use s3::creds::Credentials;
use s3::{Bucket, BucketConfiguration, Region};
use tracing::{debug, info, warn};

use super::errors::{StorageError, StorageResult};
use super::object_store::{ObjectAcl, ObjectStore, UploadOptions};
use super::sigv4::{encode_key_path, SigV4Signer};
use crate::core::config::S3Settings;
use crate::core::error::AppError;

pub struct S3Client {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
    endpoint: String,
    /// `host[:port]` of the endpoint, signed into every hand-built request
    host_header: String,
    signer: SigV4Signer,
    http_client: Client,
}

impl S3Client {
    /// Create a client from settings and make sure the bucket exists
    pub async fn new(settings: &S3Settings) -> Result<Self, AppError> {
        let credentials = Credentials::new(
            Some(&settings.access_key),
            Some(settings.secret_key.expose_secret()),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Internal(format!("Failed to create S3 credentials: {}", e)))?;

        let endpoint = settings.endpoint.trim_end_matches('/').to_string();
        let region = Region::Custom {
            region: settings.region.clone(),
            endpoint: endpoint.clone(),
        };

        let mut bucket = Bucket::new(&settings.bucket, region.clone(), credentials.clone())
            .map_err(|e| AppError::Internal(format!("Failed to create S3 bucket handle: {}", e)))?;

        // Use path-style URLs for MinIO (http://endpoint/bucket instead of http://bucket.endpoint)
        bucket.set_path_style();

        let endpoint_url = Url::parse(&endpoint)
            .map_err(|e| AppError::Internal(format!("Invalid endpoint URL: {}", e)))?;
        let host = endpoint_url
            .host_str()
            .ok_or_else(|| AppError::Internal("Endpoint URL has no host".to_string()))?;
        let host_header = match endpoint_url.port() {
            Some(p) => format!("{}:{}", host, p),
            None => host.to_string(),
        };

        let http_client = Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let client = Self {
            bucket,
            region,
            credentials,
            endpoint,
            host_header,
            signer: SigV4Signer::new(
                &settings.access_key,
                settings.secret_key.clone(),
                &settings.region,
            ),
            http_client,
        };

        client.ensure_bucket_exists().await;

        info!(
            "S3 client initialized for endpoint: {}, bucket: {}",
            client.endpoint,
            client.bucket.name()
        );

        Ok(client)
    }

    /// Create the bucket unless it already exists; never fails startup
    async fn ensure_bucket_exists(&self) {
        let result = Bucket::create_with_path_style(
            &self.bucket.name(),
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await;

        match result {
            Ok(_) => info!("Bucket '{}' created successfully", self.bucket.name()),
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("BucketAlreadyOwnedByYou")
                    || error_str.contains("BucketAlreadyExists")
                    || error_str.contains("already own it")
                {
                    debug!("Bucket '{}' already exists", self.bucket.name());
                } else {
                    warn!(
                        "Could not create bucket '{}': {}. Assuming it exists.",
                        self.bucket.name(),
                        e
                    );
                }
            }
        }
    }

    pub fn bucket_name(&self) -> String {
        self.bucket.name()
    }

    /// Send a SigV4-signed PUT against `/{bucket}/{key}`
    async fn signed_put(
        &self,
        key: &str,
        query: &str,
        mut headers: BTreeMap<String, String>,
        body: Vec<u8>,
    ) -> StorageResult<()> {
        let canonical_uri = format!("/{}/{}", self.bucket.name(), encode_key_path(key));
        headers.insert("host".to_string(), self.host_header.clone());

        let signed = self
            .signer
            .sign("PUT", &canonical_uri, query, &headers, &body, Utc::now())?;

        let url = if query.is_empty() {
            format!("{}{}", self.endpoint, canonical_uri)
        } else {
            // `acl=` is signed, `?acl` is sent
            format!("{}{}?{}", self.endpoint, canonical_uri, query.trim_end_matches('='))
        };

        let mut request = self.http_client.request(Method::PUT, &url);
        for (name, value) in &signed {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Request(format!("PUT {} failed: {}", key, e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(StorageError::from_status(key, status, body))
        }
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn upload_file(
        &self,
        path: &Path,
        key: &str,
        options: &UploadOptions,
    ) -> StorageResult<()> {
        let data = tokio::fs::read(path).await?;

        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), options.content_type.clone());
        if let Some(acl) = options.acl {
            headers.insert("x-amz-acl".to_string(), acl.as_header_value().to_string());
        }
        for (name, value) in &options.metadata {
            headers.insert(format!("x-amz-meta-{}", name.to_lowercase()), value.clone());
        }

        self.signed_put(key, "", headers, data).await?;

        debug!("Uploaded '{}' to bucket '{}'", key, self.bucket.name());
        Ok(())
    }

    async fn set_acl(&self, key: &str, acl: ObjectAcl) -> StorageResult<()> {
        let mut headers = BTreeMap::new();
        headers.insert("x-amz-acl".to_string(), acl.as_header_value().to_string());

        self.signed_put(key, "acl=", headers, Vec::new()).await?;

        debug!("Set ACL of '{}' to {}", key, acl.as_header_value());
        Ok(())
    }

    async fn signed_url(
        &self,
        key: &str,
        file_name: Option<&str>,
        expiry_secs: u32,
    ) -> StorageResult<String> {
        let custom_queries = file_name.filter(|n| !n.is_empty()).map(|name| {
            HashMap::from([(
                "response-content-disposition".to_string(),
                format!("filename={}", name),
            )])
        });

        self.bucket
            .presign_get(key, expiry_secs, custom_queries)
            .await
            .map_err(|e| {
                StorageError::Request(format!("Failed to presign GET for '{}': {}", key, e))
            })
    }

    async fn get_object(&self, key: &str) -> StorageResult<Vec<u8>> {
        let response = self
            .bucket
            .get_object(key)
            .await
            .map_err(|e| StorageError::Request(format!("GET {} failed: {}", key, e)))?;

        let status = response.status_code();
        let data = response.to_vec();
        if !(200..300).contains(&status) {
            return Err(StorageError::from_status(
                key,
                status,
                String::from_utf8_lossy(&data).into_owned(),
            ));
        }

        debug!("Read '{}' from bucket '{}'", key, self.bucket.name());
        Ok(data)
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        let response = self
            .bucket
            .delete_object(key)
            .await
            .map_err(|e| StorageError::Request(format!("DELETE {} failed: {}", key, e)))?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(StorageError::from_status(
                key,
                status,
                String::from_utf8_lossy(&response.to_vec()).into_owned(),
            ));
        }

        debug!("Deleted '{}' from bucket '{}'", key, self.bucket.name());
        Ok(())
    }
}
