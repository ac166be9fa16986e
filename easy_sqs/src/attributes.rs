use aws_sdk_sqs::types::MessageAttributeValue;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{PublishError, Result};

/// Attribute stamped with the 1-based position of each message in a run.
pub const SEQUENCE_ATTRIBUTE: &str = "messageNum";

/// One entry of the attributes file, e.g.
/// `{"DataType": "String", "StringValue": "user.created"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeValue {
    pub data_type: String,
    pub string_value: String,
}

impl AttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".into(),
            string_value: value.into(),
        }
    }

    pub fn number(value: impl ToString) -> Self {
        Self {
            data_type: "Number".into(),
            string_value: value.to_string(),
        }
    }

    /// Bytes SQS counts against the message size limit.
    pub fn wire_size(&self) -> usize {
        self.data_type.len() + self.string_value.len()
    }

    pub fn to_sqs(&self) -> Result<MessageAttributeValue> {
        MessageAttributeValue::builder()
            .data_type(&self.data_type)
            .string_value(&self.string_value)
            .build()
            .map_err(|e| PublishError::InvalidMessage(format!("building message attribute: {e}")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct MessageAttributes(BTreeMap<String, AttributeValue>);

impl MessageAttributes {
    /// Copy of these attributes carrying `messageNum = n`. The receiver is
    /// left untouched so every send starts from the same base set.
    pub fn with_sequence(&self, n: u64) -> Self {
        self.with(SEQUENCE_ATTRIBUTE, AttributeValue::string(n.to_string()))
    }

    pub fn with(&self, name: &str, value: AttributeValue) -> Self {
        let mut next = self.clone();
        next.0.insert(name.to_string(), value);
        next
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.0.iter()
    }

    pub fn wire_size(&self) -> usize {
        self.iter()
            .map(|(name, value)| name.len() + value.wire_size())
            .sum()
    }
}

impl FromIterator<(String, AttributeValue)> for MessageAttributes {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Read the message body verbatim.
pub fn load_message_body(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|e| PublishError::from_io(path, e))
}

/// Read a JSON object of attribute name to `{DataType, StringValue}`.
pub fn load_message_attributes(path: impl AsRef<Path>) -> Result<MessageAttributes> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| PublishError::from_io(path, e))?;
    serde_json::from_str(&raw).map_err(|source| PublishError::MalformedAttributes {
        path: path.to_path_buf(),
        source,
    })
}
