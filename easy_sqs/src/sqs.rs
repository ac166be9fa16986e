use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::operation::send_message::builders::SendMessageFluentBuilder;
use aws_sdk_sqs::Client;
use tracing::debug;

use crate::attributes::MessageAttributes;
use crate::error::{PublishError, Result};

/// Everything a single `SendMessage` call needs. The FIFO fields are only
/// populated for queues whose URL ends in `.fifo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub queue_url: String,
    pub body: String,
    pub attributes: MessageAttributes,
    pub deduplication_id: Option<String>,
    pub group_id: Option<String>,
}

impl OutboundMessage {
    /// Body plus attribute bytes, the figure SQS compares against its limit.
    pub fn wire_size(&self) -> usize {
        self.body.len() + self.attributes.wire_size()
    }
}

/// The one queue operation the publisher depends on.
#[async_trait]
pub trait QueueSender: Send + Sync {
    /// Returns the id the queue assigned to the message.
    async fn send(&self, message: &OutboundMessage) -> Result<String>;
}

pub fn is_fifo_queue(queue_url: &str) -> bool {
    queue_url.ends_with(".fifo")
}

pub struct SqsQueueSender {
    client: Client,
}

impl SqsQueueSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn request(&self, message: &OutboundMessage) -> Result<SendMessageFluentBuilder> {
        let mut req = self
            .client
            .send_message()
            .queue_url(&message.queue_url)
            .message_body(&message.body);

        for (name, value) in message.attributes.iter() {
            req = req.message_attributes(name, value.to_sqs()?);
        }
        if let Some(dedup) = &message.deduplication_id {
            req = req.message_deduplication_id(dedup);
        }
        if let Some(group) = &message.group_id {
            req = req.message_group_id(group);
        }
        Ok(req)
    }
}

#[async_trait]
impl QueueSender for SqsQueueSender {
    async fn send(&self, message: &OutboundMessage) -> Result<String> {
        let out = self.request(message)?.send().await.map_err(|e| PublishError::Send {
            queue_url: message.queue_url.clone(),
            message: DisplayErrorContext(&e).to_string(),
        })?;

        // SequenceNumber is only present for FIFO queues.
        debug!(sequence = out.sequence_number().unwrap_or("-"), "send_message ok");
        Ok(out.message_id().unwrap_or("unknown").to_string())
    }
}
