//! Storage layer for registered group chats
//!
//! Provides a persistent storage implementation using Cloudflare R2 / AWS S3.

use crate::config::Settings;
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// R2 key of the group registry
pub const GROUPS_INDEX_KEY: &str = "groups/index.json";

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error retrieving object from S3
    #[error("S3 Get error: {0}")]
    S3Get(Box<SdkError<GetObjectError>>),
    /// Error putting object into S3
    #[error("S3 put error: {0}")]
    S3Put(String),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration error (missing credentials, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A group chat the bot has seen
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    /// Telegram chat id
    pub chat_id: i64,
    /// Chat title at registration time, `"null"` when the chat had none
    pub title: String,
    /// First registration time
    pub added_at: DateTime<Utc>,
}

/// Interface for group storage providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupStorage: Send + Sync {
    /// Register a group, or refresh the title of a known one
    async fn add_group(&self, chat_id: i64, title: &str) -> Result<(), StorageError>;
    /// All registered groups
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, StorageError>;
    /// Check connection to storage
    async fn check_connection(&self) -> Result<(), String>;
}

/// Insert `chat_id` into `groups`, or update its title if already present.
///
/// Returns `true` when a new record was added.
pub fn upsert_group(groups: &mut Vec<GroupRecord>, chat_id: i64, title: &str) -> bool {
    if let Some(existing) = groups.iter_mut().find(|g| g.chat_id == chat_id) {
        existing.title = title.to_string();
        return false;
    }
    groups.push(GroupRecord {
        chat_id,
        title: title.to_string(),
        added_at: Utc::now(),
    });
    true
}

/// Whole-document access to the persisted group registry.
#[async_trait]
trait RegistryDocument: Send + Sync {
    async fn read_groups(&self) -> Result<Vec<GroupRecord>, StorageError>;
    async fn write_groups(&self, groups: &[GroupRecord]) -> Result<(), StorageError>;
}

/// Load, upsert and save the registry while holding `lock`.
async fn register_group<D>(
    lock: &Mutex<()>,
    document: &D,
    chat_id: i64,
    title: &str,
) -> Result<(), StorageError>
where
    D: RegistryDocument + ?Sized,
{
    let _guard = lock.lock().await;
    let mut groups = document.read_groups().await?;
    if upsert_group(&mut groups, chat_id, title) {
        info!(chat_id, title = %title, "Registered new group");
    }
    document.write_groups(&groups).await
}

/// Read the registry. Readers take the write lock too: a slow read must not
/// refill the cache with a copy older than a concurrent write.
async fn read_registry<D>(lock: &Mutex<()>, document: &D) -> Result<Vec<GroupRecord>, StorageError>
where
    D: RegistryDocument + ?Sized,
{
    let _guard = lock.lock().await;
    document.read_groups().await
}

/// R2-backed storage implementation
pub struct R2Storage {
    client: Client,
    bucket: String,
    cache: Cache<String, Arc<Vec<u8>>>,
    registry_lock: Mutex<()>,
}

impl R2Storage {
    /// Create a new R2 storage instance
    ///
    /// # Errors
    ///
    /// Returns an error if R2 configuration is missing.
    pub async fn new(settings: &Settings) -> Result<Self, StorageError> {
        let endpoint_url = settings
            .r2_endpoint_url
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ENDPOINT_URL is missing".into()))?;
        let access_key = settings
            .r2_access_key_id
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ACCESS_KEY_ID is missing".into()))?;
        let secret_key = settings
            .r2_secret_access_key
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_SECRET_ACCESS_KEY is missing".into()))?;
        let bucket = settings
            .r2_bucket_name
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_BUCKET_NAME is missing".into()))?;

        let credentials = Credentials::new(access_key, secret_key, None, None, "r2-storage");

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new("auto"))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .endpoint_url(endpoint_url)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(s3_config);

        let cache = Cache::builder()
            .max_capacity(1_000)
            .time_to_live(Duration::from_secs(60 * 60))
            .build();

        Ok(Self {
            client,
            bucket: bucket.clone(),
            cache,
            registry_lock: Mutex::new(()),
        })
    }

    /// Save data as JSON to R2
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization or S3 upload fails.
    pub async fn save_json<T: Serialize + Sync>(
        &self,
        key: &str,
        data: &T,
    ) -> Result<(), StorageError> {
        let body_bytes = serde_json::to_string_pretty(data)?.into_bytes();

        // Write-through
        self.cache
            .insert(key.to_string(), Arc::new(body_bytes.clone()))
            .await;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body_bytes))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StorageError::S3Put(e.to_string()))?;

        Ok(())
    }

    /// Load data from JSON in R2
    ///
    /// # Errors
    ///
    /// Returns an error if S3 download or JSON deserialization fails.
    pub async fn load_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        if let Some(cached_data) = self.cache.get(key).await {
            match serde_json::from_slice(&cached_data) {
                Ok(data) => return Ok(Some(data)),
                Err(e) => {
                    warn!("Cache deserialization failed for {}: {}", key, e);
                    self.cache.invalidate(key).await;
                }
            }
        }

        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let data = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
                    .into_bytes();

                self.cache
                    .insert(key.to_string(), Arc::new(data.to_vec()))
                    .await;

                Ok(Some(serde_json::from_slice(&data)?))
            }
            Err(SdkError::ServiceError(err)) if err.err().is_no_such_key() => Ok(None),
            Err(e) => Err(StorageError::S3Get(Box::new(e))),
        }
    }
}

#[async_trait]
impl RegistryDocument for R2Storage {
    async fn read_groups(&self) -> Result<Vec<GroupRecord>, StorageError> {
        Ok(self.load_json(GROUPS_INDEX_KEY).await?.unwrap_or_default())
    }

    async fn write_groups(&self, groups: &[GroupRecord]) -> Result<(), StorageError> {
        self.save_json(GROUPS_INDEX_KEY, &groups).await
    }
}

#[async_trait]
impl GroupStorage for R2Storage {
    async fn add_group(&self, chat_id: i64, title: &str) -> Result<(), StorageError> {
        register_group(&self.registry_lock, self, chat_id, title).await
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, StorageError> {
        read_registry(&self.registry_lock, self).await
    }

    async fn check_connection(&self) -> Result<(), String> {
        match self.client.list_buckets().send().await {
            Ok(_) => {
                info!("Successfully connected to R2 storage.");
                Ok(())
            }
            Err(e) => {
                let err_msg = format!("R2 connectivity test failed: {e:#?}");
                error!("{}", err_msg);
                Err(err_msg)
            }
        }
    }
}
