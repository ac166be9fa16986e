use clap::{Args as ClapArgs, Parser};

use crate::config::{SettingKey, DEFAULT_SECTION};

#[derive(Parser, Debug)]
#[command(name = "easy_sqs", about = "Send messages to an AWS SQS queue")]
pub struct Args {
    /// Properties file path
    #[arg(short = 'p', long)]
    pub properties: String,

    /// Section in the properties file to read parameters from
    #[arg(short = 's', long = "properties_section", default_value = DEFAULT_SECTION)]
    pub properties_section: String,

    /// Enable debug logging
    #[arg(short = 'd', long)]
    pub debug: bool,

    #[command(flatten)]
    pub overrides: SettingOverrides,
}

/// One flag per recognized properties key; any flag given here wins over
/// the file.
#[derive(Clone, Debug, Default, ClapArgs)]
pub struct SettingOverrides {
    /// Queue URL (a `.fifo` suffix selects FIFO semantics)
    #[arg(long = "queue_url")]
    pub queue_url: Option<String>,

    /// AWS credentials profile
    #[arg(long = "aws_profile")]
    pub aws_profile: Option<String>,

    /// Path of the file holding the message body
    #[arg(long = "message_body")]
    pub message_body: Option<String>,

    /// Path of the JSON file holding the message attributes
    #[arg(long = "message_attributes")]
    pub message_attributes: Option<String>,

    /// Bucket for bodies too large to send inline
    #[arg(long = "s3_bucket")]
    pub s3_bucket: Option<String>,

    /// "true" sends a burst of fifo_num_of_messages messages
    #[arg(long = "fifo_test")]
    pub fifo_test: Option<String>,

    /// Messages to send when fifo_test is "true"
    #[arg(long = "fifo_num_of_messages")]
    pub fifo_num_of_messages: Option<String>,

    /// AWS region
    #[arg(long)]
    pub region: Option<String>,

    /// Custom endpoint, e.g. http://localhost:4566 for LocalStack
    #[arg(long = "endpoint_url")]
    pub endpoint_url: Option<String>,
}

impl SettingOverrides {
    pub fn get(&self, key: SettingKey) -> Option<&str> {
        let value = match key {
            SettingKey::QueueUrl => &self.queue_url,
            SettingKey::AwsProfile => &self.aws_profile,
            SettingKey::MessageBody => &self.message_body,
            SettingKey::MessageAttributes => &self.message_attributes,
            SettingKey::S3Bucket => &self.s3_bucket,
            SettingKey::FifoTest => &self.fifo_test,
            SettingKey::FifoNumOfMessages => &self.fifo_num_of_messages,
            SettingKey::Region => &self.region,
            SettingKey::EndpointUrl => &self.endpoint_url,
        };
        value.as_deref()
    }

    /// Only the flags that were actually passed.
    pub fn values(&self) -> impl Iterator<Item = (SettingKey, &str)> + '_ {
        SettingKey::ALL
            .into_iter()
            .filter_map(|key| self.get(key).map(|value| (key, value)))
    }
}
