use rand::Rng;
use tracing::{debug, info, warn, Instrument, Span};
use uuid::Uuid;

use crate::attributes::{load_message_attributes, load_message_body, MessageAttributes};
use crate::config::{SettingKey, Settings};
use crate::error::Result;
use crate::sqs::{is_fifo_queue, OutboundMessage, QueueSender};

/// Message ids returned by the queue, in send order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub group_id: String,
    pub message_ids: Vec<String>,
}

/// `msg-group-<k>`, `k` drawn from 1..=100.
pub fn new_group_id() -> String {
    format!("msg-group-{}", rand::thread_rng().gen_range(1..=100))
}

/// How many messages a run sends. Only a `fifo_test` of exactly `true`
/// enables bursts; a count that is missing or not a number falls back to 1.
pub fn iteration_count(settings: &Settings) -> u64 {
    if settings.get(SettingKey::FifoTest) != Some("true") {
        return 1;
    }
    match settings.get(SettingKey::FifoNumOfMessages) {
        None => 1,
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(n) => u64::try_from(n).unwrap_or(0),
            Err(_) => {
                warn!("fifo_num_of_messages '{raw}' is not a number, sending 1 message");
                1
            }
        },
    }
}

/// Body and attributes named by the settings, loaded up front so a bad
/// file fails the run before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInput {
    pub body: String,
    pub attributes: MessageAttributes,
}

impl MessageInput {
    pub fn load(settings: &Settings) -> Result<Self> {
        let body = load_message_body(settings.require(SettingKey::MessageBody)?)?;
        let attributes =
            load_message_attributes(settings.require(SettingKey::MessageAttributes)?)?;
        debug!(bytes = body.len(), attributes = attributes.len(), "loaded message input");
        Ok(Self { body, attributes })
    }
}

pub struct Dispatcher<'a, S: ?Sized> {
    sender: &'a S,
    span: Span,
}

impl<'a, S> Dispatcher<'a, S>
where
    S: QueueSender + ?Sized,
{
    /// `span` is the logging context every send is reported under.
    pub fn new(sender: &'a S, span: Span) -> Self {
        Self { sender, span }
    }

    pub async fn dispatch(
        &self,
        settings: &Settings,
        input: &MessageInput,
    ) -> Result<DispatchReport> {
        let queue_url = settings.queue_url()?;
        let group_id = new_group_id();
        let iterations = iteration_count(settings);
        let fifo = is_fifo_queue(queue_url);
        debug!(parent: &self.span, iterations, fifo, "dispatch plan");

        let mut report = DispatchReport {
            group_id: group_id.clone(),
            message_ids: Vec::new(),
        };
        for n in 1..=iterations {
            let message = OutboundMessage {
                queue_url: queue_url.to_string(),
                body: input.body.clone(),
                attributes: input.attributes.with_sequence(n),
                deduplication_id: fifo.then(|| Uuid::new_v4().to_string()),
                group_id: fifo.then(|| group_id.clone()),
            };

            info!(parent: &self.span, "sending messages in group {group_id}, message number: {n}");
            let id = self
                .sender
                .send(&message)
                .instrument(self.span.clone())
                .await?;
            info!(parent: &self.span, "message sent with ID: {id}");
            report.message_ids.push(id);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttributeValue, SEQUENCE_ATTRIBUTE};
    use crate::error::PublishError;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    struct CapturingSender {
        sent: Mutex<Vec<OutboundMessage>>,
        fail_on: Option<usize>,
    }

    impl CapturingSender {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing_on(call: usize) -> Self {
            Self {
                fail_on: Some(call),
                ..Self::new()
            }
        }

        fn sent(&self) -> Vec<OutboundMessage> {
            self.sent.lock().expect("poisoned mutex").clone()
        }
    }

    #[async_trait]
    impl QueueSender for CapturingSender {
        async fn send(&self, message: &OutboundMessage) -> Result<String> {
            let mut sent = self.sent.lock().expect("poisoned mutex");
            sent.push(message.clone());
            if self.fail_on == Some(sent.len()) {
                return Err(PublishError::Send {
                    queue_url: message.queue_url.clone(),
                    message: "throttled".into(),
                });
            }
            Ok(format!("id-{}", sent.len()))
        }
    }

    fn settings(pairs: &[(SettingKey, &str)]) -> Settings {
        let mut settings = Settings::default();
        for (key, value) in pairs {
            settings.set(*key, *value);
        }
        settings
    }

    fn input(body: &str) -> MessageInput {
        MessageInput {
            body: body.to_string(),
            attributes: MessageAttributes::default()
                .with("eventType", AttributeValue::string("order.created")),
        }
    }

    #[test]
    fn iteration_count_requires_literal_true() {
        let cases = [
            (None, Some("5"), 1),
            (Some("True"), Some("5"), 1),
            (Some("yes"), Some("5"), 1),
            (Some("true"), Some("5"), 5),
            (Some("true"), Some(" 4 "), 4),
            (Some("true"), None, 1),
            (Some("true"), Some("many"), 1),
            (Some("true"), Some("0"), 0),
            (Some("true"), Some("-2"), 0),
        ];
        for (flag, count, expected) in cases {
            let mut s = Settings::default();
            if let Some(flag) = flag {
                s.set(SettingKey::FifoTest, flag);
            }
            if let Some(count) = count {
                s.set(SettingKey::FifoNumOfMessages, count);
            }
            assert_eq!(iteration_count(&s), expected, "flag={flag:?} count={count:?}");
        }
    }

    #[test]
    fn group_ids_stay_in_range() {
        for _ in 0..200 {
            let id = new_group_id();
            let k: u32 = id.strip_prefix("msg-group-").unwrap().parse().unwrap();
            assert!((1..=100).contains(&k), "{id}");
        }
    }

    #[tokio::test]
    async fn fifo_burst_sends_numbered_deduplicated_messages() {
        let sender = CapturingSender::new();
        let s = settings(&[
            (SettingKey::QueueUrl, "https://example/q.fifo"),
            (SettingKey::FifoTest, "true"),
            (SettingKey::FifoNumOfMessages, "3"),
        ]);

        let report = Dispatcher::new(&sender, Span::none())
            .dispatch(&s, &input("<order/>"))
            .await
            .unwrap();

        let sent = sender.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(report.message_ids, vec!["id-1", "id-2", "id-3"]);

        let dedup: HashSet<_> = sent
            .iter()
            .map(|m| m.deduplication_id.clone().expect("dedup id"))
            .collect();
        assert_eq!(dedup.len(), 3);
        assert!(dedup.iter().all(|d| !d.is_empty()));

        for (i, m) in sent.iter().enumerate() {
            assert_eq!(m.group_id.as_deref(), Some(report.group_id.as_str()));
            assert_eq!(m.body, "<order/>");
            assert_eq!(
                m.attributes.get(SEQUENCE_ATTRIBUTE),
                Some(&AttributeValue::string((i + 1).to_string()))
            );
            assert_eq!(
                m.attributes.get("eventType"),
                Some(&AttributeValue::string("order.created"))
            );
        }
    }

    #[tokio::test]
    async fn standard_queue_omits_fifo_fields() {
        let sender = CapturingSender::new();
        let s = settings(&[
            (SettingKey::QueueUrl, "https://example/q"),
            (SettingKey::FifoTest, "true"),
            (SettingKey::FifoNumOfMessages, "2"),
        ]);

        Dispatcher::new(&sender, Span::none())
            .dispatch(&s, &input("body"))
            .await
            .unwrap();

        let sent = sender.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent
            .iter()
            .all(|m| m.deduplication_id.is_none() && m.group_id.is_none()));
    }

    #[tokio::test]
    async fn without_fifo_test_a_single_message_is_sent() {
        let sender = CapturingSender::new();
        let s = settings(&[
            (SettingKey::QueueUrl, "https://example/q.fifo"),
            (SettingKey::FifoNumOfMessages, "9"),
        ]);

        Dispatcher::new(&sender, Span::none())
            .dispatch(&s, &input("body"))
            .await
            .unwrap();

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].attributes.get(SEQUENCE_ATTRIBUTE),
            Some(&AttributeValue::string("1"))
        );
    }

    #[tokio::test]
    async fn send_failure_stops_the_run() {
        let sender = CapturingSender::failing_on(2);
        let s = settings(&[
            (SettingKey::QueueUrl, "https://example/q.fifo"),
            (SettingKey::FifoTest, "true"),
            (SettingKey::FifoNumOfMessages, "5"),
        ]);

        let err = Dispatcher::new(&sender, Span::none())
            .dispatch(&s, &input("body"))
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Send { .. }));
        assert_eq!(sender.sent().len(), 2);
    }

    #[tokio::test]
    async fn missing_queue_url_sends_nothing() {
        let sender = CapturingSender::new();

        let err = Dispatcher::new(&sender, Span::none())
            .dispatch(&Settings::default(), &input("body"))
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::MissingSetting("queue_url")));
        assert!(sender.sent().is_empty());
    }

    #[test]
    fn message_input_reads_both_files() {
        let mut body = NamedTempFile::new().unwrap();
        body.write_all(b"<order id=\"1\"/>").unwrap();
        let mut attrs = NamedTempFile::new().unwrap();
        attrs
            .write_all(br#"{"tenant": {"DataType": "String", "StringValue": "acme"}}"#)
            .unwrap();
        let s = settings(&[
            (SettingKey::MessageBody, body.path().to_str().unwrap()),
            (SettingKey::MessageAttributes, attrs.path().to_str().unwrap()),
        ]);

        let loaded = MessageInput::load(&s).unwrap();

        assert_eq!(loaded.body, "<order id=\"1\"/>");
        assert_eq!(loaded.attributes.get("tenant"), Some(&AttributeValue::string("acme")));
    }

    #[test]
    fn message_input_rejects_missing_or_malformed_files() {
        let mut malformed = NamedTempFile::new().unwrap();
        malformed.write_all(b"{not json").unwrap();
        let mut body = NamedTempFile::new().unwrap();
        body.write_all(b"body").unwrap();
        let body_path = body.path().to_str().unwrap();
        let attrs_path = malformed.path().to_str().unwrap();

        let missing_body = settings(&[
            (SettingKey::MessageBody, "/missing/body.xml"),
            (SettingKey::MessageAttributes, attrs_path),
        ]);
        assert!(matches!(
            MessageInput::load(&missing_body),
            Err(PublishError::MissingFile(_))
        ));

        let missing_attrs = settings(&[
            (SettingKey::MessageBody, body_path),
            (SettingKey::MessageAttributes, "/missing/attributes.json"),
        ]);
        assert!(matches!(
            MessageInput::load(&missing_attrs),
            Err(PublishError::MissingFile(_))
        ));

        let bad_json = settings(&[
            (SettingKey::MessageBody, body_path),
            (SettingKey::MessageAttributes, attrs_path),
        ]);
        assert!(matches!(
            MessageInput::load(&bad_json),
            Err(PublishError::MalformedAttributes { .. })
        ));

        assert!(matches!(
            MessageInput::load(&Settings::default()),
            Err(PublishError::MissingSetting("message_body"))
        ));
    }
}
