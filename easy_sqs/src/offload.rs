//! Large-payload support: bodies that would exceed the SQS size limit are
//! written to S3 and replaced by a pointer, using the same layout as the
//! Amazon SQS extended client libraries so existing consumers can resolve it.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::attributes::AttributeValue;
use crate::error::{PublishError, Result};
use crate::sqs::{OutboundMessage, QueueSender};

pub const MESSAGE_SIZE_THRESHOLD: usize = 262_144;
pub const RESERVED_ATTRIBUTE: &str = "ExtendedPayloadSize";
pub const MAX_MESSAGE_ATTRIBUTES: usize = 10;
const POINTER_CLASS: &str = "software.amazon.payloadoffloading.PayloadS3Pointer";

#[async_trait]
pub trait PayloadStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, body: &str) -> Result<()>;
}

pub struct S3PayloadStore {
    client: aws_sdk_s3::Client,
}

impl S3PayloadStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PayloadStore for S3PayloadStore {
    async fn put(&self, bucket: &str, key: &str, body: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body.as_bytes().to_vec()))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| PublishError::PayloadStore {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })
    }
}

/// Wraps a sender so oversized bodies go through `store` first.
pub struct OffloadingSender<S, P> {
    inner: S,
    store: P,
    bucket: String,
    threshold: usize,
}

impl<S, P> OffloadingSender<S, P> {
    pub fn new(inner: S, store: P, bucket: impl Into<String>) -> Self {
        Self {
            inner,
            store,
            bucket: bucket.into(),
            threshold: MESSAGE_SIZE_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Checked for every message while offload is on, whatever its size.
    fn check_attributes(&self, message: &OutboundMessage) -> Result<()> {
        let attributes = &message.attributes;
        if attributes.contains(RESERVED_ATTRIBUTE) {
            return Err(PublishError::InvalidMessage(format!(
                "message attribute name {RESERVED_ATTRIBUTE} is reserved"
            )));
        }
        if attributes.len() >= MAX_MESSAGE_ATTRIBUTES {
            return Err(PublishError::InvalidMessage(format!(
                "{} message attributes exceed the {} allowed alongside {RESERVED_ATTRIBUTE}",
                attributes.len(),
                MAX_MESSAGE_ATTRIBUTES - 1
            )));
        }
        let size = attributes.wire_size();
        if size > self.threshold {
            return Err(PublishError::InvalidMessage(format!(
                "message attributes take {size} bytes, more than the {} byte limit",
                self.threshold
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<S, P> QueueSender for OffloadingSender<S, P>
where
    S: QueueSender,
    P: PayloadStore,
{
    async fn send(&self, message: &OutboundMessage) -> Result<String> {
        self.check_attributes(message)?;
        if message.wire_size() <= self.threshold {
            return self.inner.send(message).await;
        }

        let key = Uuid::new_v4().to_string();
        self.store.put(&self.bucket, &key, &message.body).await?;
        info!(bucket = %self.bucket, key = %key, bytes = message.body.len(), "stored large payload");

        let pointer = json!([POINTER_CLASS, { "s3BucketName": self.bucket, "s3Key": key }]);
        let offloaded = OutboundMessage {
            body: pointer.to_string(),
            attributes: message
                .attributes
                .with(RESERVED_ATTRIBUTE, AttributeValue::number(message.body.len())),
            ..message.clone()
        };
        self.inner.send(&offloaded).await
    }
}
