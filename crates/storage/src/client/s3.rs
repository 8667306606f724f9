//! AWS S3 probe client.
//!
//! This module provides the [`ProbeClient`] implementation that talks to AWS
//! S3 (or any S3-compatible service when a custom endpoint is configured).
//!
//! # Credentials
//!
//! Credentials come from the standard AWS provider chain (environment,
//! profiles, SSO, instance metadata...). With
//! [`anonymous`](S3Settings::anonymous) set, requests are sent unsigned,
//! which is exactly what an unauthenticated visitor would see.
//!
//! The existence lookup is always unsigned, whatever the credentials: a
//! bucket is looked up the way a stranger would, and a missing or expired
//! credential can't turn every bucket into a lookup error.
//!
//! # Regions
//!
//! S3 answers a `HeadBucket` in the wrong region with a redirect (or a 403
//! for buckets we can't read) that still carries an `x-amz-bucket-region`
//! header. That header is all we need to confirm existence, so both are
//! treated as "found".

use crate::{
    BucketName, ClientHandle, ClientFactory, Grant, Grantee, ObjectDescriptor, ProbeClient,
    client::ObjectWriter,
    error::{Error, ErrorKind, Result},
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::{
    Client,
    config::{Region, retry::RetryConfig},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::DateTime,
    types::{Grant as S3Grant, Type as GranteeType},
};
use exn::ResultExt;
use std::collections::HashMap;
use std::fmt::Debug;
use time::OffsetDateTime;

const BUCKET_REGION_HEADER: &str = "x-amz-bucket-region";
const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings shared by every client a [`S3ClientFactory`] builds.
#[derive(Debug, Clone)]
pub struct S3Settings {
    /// Region used for the initial `HeadBucket` lookup.
    pub region: String,
    /// Custom endpoint URL for S3-compatible services.
    pub endpoint: Option<String>,
    /// Send unsigned requests instead of resolving credentials.
    pub anonymous: bool,
}
impl Default for S3Settings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            anonymous: false,
        }
    }
}

/// Loads the AWS configuration once, then hands out independent clients.
///
/// # Examples
///
/// ```no_run
/// use s3scan_storage::client::{S3ClientFactory, S3Settings};
/// use s3scan_storage::ClientFactory;
///
/// # async fn example() -> s3scan_storage::error::Result<()> {
/// let factory = S3ClientFactory::load(S3Settings::default()).await;
/// let mut client = factory.create()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3ClientFactory {
    config: SdkConfig,
    settings: S3Settings,
}
impl S3ClientFactory {
    pub async fn load(settings: S3Settings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            // Probes are one-shot.
            .retry_config(RetryConfig::disabled());
        if settings.anonymous {
            loader = loader.no_credentials();
        }
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;
        tracing::debug!(region = %settings.region, anonymous = settings.anonymous, "Loaded AWS configuration");
        Self { config, settings }
    }
}
impl ClientFactory for S3ClientFactory {
    fn create(&self) -> Result<ClientHandle> {
        Ok(Box::new(S3ProbeClient::new(self.config.clone(), &self.settings)))
    }
}

enum Connector {
    /// Derive one client per region from a shared configuration.
    Regional {
        config: SdkConfig,
        force_path_style: bool,
        clients: HashMap<String, Client>,
        /// Unsigned client in the default region.
        lookup: Client,
    },
    /// Use the same pre-built client for every region.
    Fixed(Client),
}

/// S3 implementation of [`ProbeClient`].
///
/// Keeps one SDK client per region it has talked to; a scan worker tends to
/// see the same handful of regions over and over.
pub struct S3ProbeClient {
    connector: Connector,
    default_region: String,
}

impl S3ProbeClient {
    pub fn new(config: SdkConfig, settings: &S3Settings) -> Self {
        // S3-compatible services rarely do virtual-hosted addressing.
        let force_path_style = settings.endpoint.is_some();
        let lookup = Client::from_conf(regional_config(&unsigned(&config), &settings.region, force_path_style));
        Self {
            connector: Connector::Regional {
                config,
                force_path_style,
                clients: HashMap::new(),
                lookup,
            },
            default_region: settings.region.clone(),
        }
    }

    /// Wrap an already-configured client, ignoring region hints.
    pub fn from_client(client: Client) -> Self {
        let default_region = client.config().region().map(|r| r.to_string()).unwrap_or_else(|| DEFAULT_REGION.into());
        Self {
            connector: Connector::Fixed(client),
            default_region,
        }
    }

    fn client(&mut self, region: &str) -> &Client {
        match &mut self.connector {
            Connector::Fixed(client) => client,
            Connector::Regional {
                config,
                force_path_style,
                clients,
                ..
            } => clients
                .entry(region.to_string())
                .or_insert_with(|| Client::from_conf(regional_config(config, region, *force_path_style))),
        }
    }

    /// Client for the existence lookup in the default region.
    fn lookup_client(&self) -> &Client {
        match &self.connector {
            Connector::Fixed(client) => client,
            Connector::Regional { lookup, .. } => lookup,
        }
    }

    /// Convert AWS DateTime to OffsetDateTime.
    fn parse_datetime(dt: &DateTime) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos()).ok()
    }

    fn convert_grant(grant: &S3Grant) -> Option<Grant> {
        let permission = grant.permission()?.as_str();
        let grantee = match grant.grantee() {
            Some(grantee) => match grantee.r#type() {
                GranteeType::Group => Grantee::Group {
                    uri: grantee.uri().unwrap_or_default().to_string(),
                },
                GranteeType::CanonicalUser => Grantee::CanonicalUser {
                    id: grantee.id().unwrap_or_default().to_string(),
                    display_name: grantee.display_name().map(str::to_string),
                },
                GranteeType::AmazonCustomerByEmail => {
                    Grantee::Email(grantee.email_address().unwrap_or_default().to_string())
                },
                _ => Grantee::Unknown,
            },
            None => Grantee::Unknown,
        };
        Some(Grant::new(grantee, permission))
    }
}

fn regional_config(config: &SdkConfig, region: &str, force_path_style: bool) -> aws_sdk_s3::Config {
    aws_sdk_s3::config::Builder::from(config)
        .region(Region::new(region.to_string()))
        .force_path_style(force_path_style)
        .build()
}

/// `config` without a credentials provider, so requests go out unsigned.
fn unsigned(config: &SdkConfig) -> SdkConfig {
    let mut builder = config.to_builder();
    builder.set_credentials_provider(None);
    builder.build()
}

/// Map an SDK failure onto the storage error categories.
fn sdk_error<E, R>(bucket: &BucketName, err: SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    let kind = match &err {
        SdkError::ServiceError(_) => match err.code() {
            Some("AccessDenied" | "AllAccessDisabled" | "AuthorizationHeaderMalformed" | "InvalidAccessKeyId") => {
                ErrorKind::AccessDenied(bucket.to_string())
            },
            Some("NoSuchBucket") => ErrorKind::BucketNotFound(bucket.to_string()),
            _ => ErrorKind::Service(DisplayErrorContext(&err).to_string()),
        },
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            ErrorKind::Network(DisplayErrorContext(&err).to_string())
        },
        _ => ErrorKind::Service(DisplayErrorContext(&err).to_string()),
    };
    Error::from(kind)
}

#[async_trait]
impl ProbeClient for S3ProbeClient {
    async fn resolve_region(&mut self, bucket: &BucketName) -> Result<String> {
        let result = self.lookup_client().head_bucket().bucket(bucket.as_str()).send().await;
        match result {
            Ok(output) => Ok(output
                .bucket_region()
                .map(str::to_string)
                .unwrap_or_else(|| self.default_region.clone())),
            Err(err) => {
                if let Some(response) = err.raw_response() {
                    if let Some(region) = response.headers().get(BUCKET_REGION_HEADER) {
                        tracing::trace!(bucket = %bucket, status = response.status().as_u16(), region, "Region taken from error response");
                        return Ok(region.to_string());
                    }
                    if response.status().as_u16() == 404 {
                        exn::bail!(ErrorKind::BucketNotFound(bucket.to_string()));
                    }
                }
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    exn::bail!(ErrorKind::BucketNotFound(bucket.to_string()));
                }
                Err(sdk_error(bucket, err))
            },
        }
    }

    async fn get_access_grants(&mut self, bucket: &BucketName, region: &str) -> Result<Vec<Grant>> {
        let output = self
            .client(region)
            .get_bucket_acl()
            .bucket(bucket.as_str())
            .send()
            .await
            .map_err(|e| sdk_error(bucket, e))?;
        Ok(output.grants().iter().filter_map(Self::convert_grant).collect())
    }

    async fn put_marker_object(&mut self, bucket: &BucketName, region: &str, key: &str) -> Result<()> {
        self.client(region)
            .put_object()
            .bucket(bucket.as_str())
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error(bucket, e))?;
        Ok(())
    }

    async fn delete_marker_object(&mut self, bucket: &BucketName, region: &str, key: &str) -> Result<()> {
        self.client(region)
            .delete_object()
            .bucket(bucket.as_str())
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error(bucket, e))?;
        Ok(())
    }

    async fn list_objects(&mut self, bucket: &BucketName, region: &str) -> Result<Vec<ObjectDescriptor>> {
        let output = self
            .client(region)
            .list_objects_v2()
            .bucket(bucket.as_str())
            .send()
            .await
            .map_err(|e| sdk_error(bucket, e))?;
        if output.is_truncated().unwrap_or(false) {
            tracing::debug!(bucket = %bucket, returned = output.contents().len(), "Listing truncated; only the first page is used");
        }
        Ok(output
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                let size = object.size().and_then(|s| u64::try_from(s).ok()).unwrap_or(0);
                let modified = object.last_modified().and_then(Self::parse_datetime);
                Some(ObjectDescriptor::new(key, size, modified))
            })
            .collect())
    }

    async fn download_object(
        &mut self,
        bucket: &BucketName,
        region: &str,
        key: &str,
        writer: ObjectWriter<'_>,
    ) -> Result<u64> {
        let output = self
            .client(region)
            .get_object()
            .bucket(bucket.as_str())
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error(bucket, e))?;
        let mut reader = output.body.into_async_read();
        tokio::io::copy(&mut reader, writer).await.or_raise(|| ErrorKind::Network(format!("download of {key} interrupted")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::{Credentials, SharedCredentialsProvider};
    use aws_sdk_s3::operation::get_bucket_acl::GetBucketAclOutput;
    use aws_sdk_s3::operation::get_object::GetObjectOutput;
    use aws_sdk_s3::operation::head_bucket::{HeadBucketError, HeadBucketOutput};
    use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::types::error::NotFound;
    use aws_sdk_s3::types::{Grantee as S3Grantee, Object, Permission};
    use aws_smithy_mocks::{mock, mock_client};

    const ALL_USERS: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

    fn bucket() -> BucketName {
        BucketName::normalize("acme-assets")
    }

    fn signed_config() -> SdkConfig {
        let credentials = Credentials::new("AKIDEXAMPLE", "secret", None, None, "test");
        SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("eu-west-1"))
            .endpoint_url("http://localhost:9000")
            .retry_config(RetryConfig::disabled())
            .credentials_provider(SharedCredentialsProvider::new(credentials))
            .build()
    }

    #[test]
    fn test_unsigned_drops_only_credentials() {
        let config = signed_config();
        let lookup = unsigned(&config);
        assert!(config.credentials_provider().is_some());
        assert!(lookup.credentials_provider().is_none());
        assert_eq!(lookup.region(), config.region());
        assert_eq!(lookup.endpoint_url(), Some("http://localhost:9000"));
    }

    #[tokio::test]
    async fn test_lookup_client_uses_default_region() {
        let settings = S3Settings {
            region: "eu-west-1".to_string(),
            endpoint: Some("http://localhost:9000".to_string()),
            anonymous: false,
        };
        let client = S3ProbeClient::new(signed_config(), &settings);
        let lookup = client.lookup_client().config();
        assert_eq!(lookup.region().map(|r| r.as_ref()), Some("eu-west-1"));
    }

    #[tokio::test]
    async fn test_resolve_region_found() {
        let rule = mock!(Client::head_bucket).then_output(|| HeadBucketOutput::builder().bucket_region("eu-west-1").build());
        let mut client = S3ProbeClient::from_client(mock_client!(aws_sdk_s3, [&rule]));
        assert_eq!(client.resolve_region(&bucket()).await.unwrap(), "eu-west-1");
    }

    #[tokio::test]
    async fn test_resolve_region_not_found() {
        let rule = mock!(Client::head_bucket).then_error(|| HeadBucketError::NotFound(NotFound::builder().build()));
        let mut client = S3ProbeClient::from_client(mock_client!(aws_sdk_s3, [&rule]));
        let err = client.resolve_region(&bucket()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_access_grants_converts_grantees() {
        let rule = mock!(Client::get_bucket_acl).then_output(|| {
            GetBucketAclOutput::builder()
                .grants(
                    S3Grant::builder()
                        .grantee(S3Grantee::builder().r#type(GranteeType::Group).uri(ALL_USERS).build().unwrap())
                        .permission(Permission::Read)
                        .build(),
                )
                .grants(
                    S3Grant::builder()
                        .grantee(
                            S3Grantee::builder()
                                .r#type(GranteeType::CanonicalUser)
                                .id("abc123")
                                .display_name("owner")
                                .build()
                                .unwrap(),
                        )
                        .permission(Permission::FullControl)
                        .build(),
                )
                .build()
        });
        let mut client = S3ProbeClient::from_client(mock_client!(aws_sdk_s3, [&rule]));
        let grants = client.get_access_grants(&bucket(), "us-east-1").await.unwrap();
        assert_eq!(grants.len(), 2);
        assert_eq!(grants[0], Grant::group(ALL_USERS, "READ"));
        assert_eq!(
            grants[1].grantee,
            Grantee::CanonicalUser {
                id: "abc123".to_string(),
                display_name: Some("owner".to_string())
            }
        );
        assert_eq!(grants[1].permission, "FULL_CONTROL");
    }

    #[tokio::test]
    async fn test_list_objects() {
        let rule = mock!(Client::list_objects_v2).then_output(|| {
            ListObjectsV2Output::builder()
                .contents(Object::builder().key("index.html").size(42).last_modified(DateTime::from_secs(0)).build())
                .contents(Object::builder().key("css/").size(0).build())
                .build()
        });
        let mut client = S3ProbeClient::from_client(mock_client!(aws_sdk_s3, [&rule]));
        let objects = client.list_objects(&bucket(), "us-east-1").await.unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].key, "index.html");
        assert_eq!(objects[0].size, 42);
        assert_eq!(objects[0].last_modified, Some(OffsetDateTime::UNIX_EPOCH));
        assert!(objects[1].is_directory_placeholder());
    }

    #[tokio::test]
    async fn test_download_object() {
        let rule = mock!(Client::get_object)
            .then_output(|| GetObjectOutput::builder().body(ByteStream::from_static(b"hello world")).build());
        let mut client = S3ProbeClient::from_client(mock_client!(aws_sdk_s3, [&rule]));
        let mut buffer: Vec<u8> = Vec::new();
        let written = client.download_object(&bucket(), "us-east-1", "greeting.txt", &mut buffer).await.unwrap();
        assert_eq!(written, 11);
        assert_eq!(buffer, b"hello world");
    }
}
