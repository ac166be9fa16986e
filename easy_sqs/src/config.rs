use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::{provider::SharedCredentialsProvider, Credentials};
use aws_sdk_s3 as s3;
use aws_sdk_sqs as sqs;
use config::{Config, File, FileStoredFormat, Format, Map, Value, ValueKind};
use ini::{Ini, ParseOption};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::error::{PublishError, Result};

pub const DEFAULT_SECTION: &str = "DEFAULT";

/// Keys recognized in a properties section. Each one doubles as the name of
/// the command-line flag that overrides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingKey {
    QueueUrl,
    AwsProfile,
    MessageBody,
    MessageAttributes,
    S3Bucket,
    FifoTest,
    FifoNumOfMessages,
    Region,
    EndpointUrl,
}

impl SettingKey {
    pub const ALL: [SettingKey; 9] = [
        SettingKey::QueueUrl,
        SettingKey::AwsProfile,
        SettingKey::MessageBody,
        SettingKey::MessageAttributes,
        SettingKey::S3Bucket,
        SettingKey::FifoTest,
        SettingKey::FifoNumOfMessages,
        SettingKey::Region,
        SettingKey::EndpointUrl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::QueueUrl => "queue_url",
            SettingKey::AwsProfile => "aws_profile",
            SettingKey::MessageBody => "message_body",
            SettingKey::MessageAttributes => "message_attributes",
            SettingKey::S3Bucket => "s3_bucket",
            SettingKey::FifoTest => "fifo_test",
            SettingKey::FifoNumOfMessages => "fifo_num_of_messages",
            SettingKey::Region => "region",
            SettingKey::EndpointUrl => "endpoint_url",
        }
    }

    /// Case-insensitive, like option names in a properties file.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// INI as written: no quote stripping, no backslash escapes. `C:\new` stays
/// four characters and `"x"` keeps its quotes.
#[derive(Debug, Clone, Copy)]
struct PlainIni;

impl Format for PlainIni {
    fn parse(
        &self,
        uri: Option<&String>,
        text: &str,
    ) -> std::result::Result<Map<String, Value>, Box<dyn Error + Send + Sync>> {
        let opt = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
        };
        let ini = Ini::load_from_str_opt(text, opt)?;

        let mut root = Map::new();
        for (section, props) in ini.iter() {
            let entries = props
                .iter()
                .map(|(k, v)| (k.to_string(), Value::new(uri, ValueKind::String(v.to_string()))));
            match section {
                Some(name) => {
                    let table: Map<String, Value> = entries.collect();
                    root.insert(name.to_string(), Value::new(uri, ValueKind::Table(table)));
                }
                None => root.extend(entries),
            }
        }
        Ok(root)
    }
}

impl FileStoredFormat for PlainIni {
    fn file_extensions(&self) -> &'static [&'static str] {
        &["ini", "properties"]
    }
}

/// Top-level entry of a parsed properties file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IniEntry {
    Section(HashMap<String, String>),
    Bare(String),
}

/// Finalized connection and input parameters. Unset keys fall back to the
/// SDK's own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<SettingKey, String>,
}

impl Settings {
    /// Read one section of an INI properties file.
    ///
    /// Values in `[DEFAULT]` are inherited by every other section. Section
    /// names match exactly, except that `DEFAULT` is recognized in any case.
    /// A section that does not exist yields an empty record rather than an
    /// error.
    pub fn load(path: impl AsRef<Path>, section: &str) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PublishError::MissingFile(path.to_path_buf()));
        }

        let cfg = Config::builder()
            .add_source(File::new(&path.to_string_lossy(), PlainIni))
            .build()
            .map_err(|e| PublishError::Settings(e.to_string()))?;
        let root: HashMap<String, IniEntry> = cfg
            .try_deserialize()
            .map_err(|e| PublishError::Settings(e.to_string()))?;

        let mut defaults = Vec::new();
        let mut selected = Vec::new();
        for (name, entry) in root {
            let table = match entry {
                IniEntry::Section(table) => table,
                IniEntry::Bare(value) => {
                    return Err(PublishError::Settings(format!(
                        "'{} = {}' in {} is not inside a [section]",
                        name,
                        value,
                        path.display()
                    )));
                }
            };
            if name.eq_ignore_ascii_case(DEFAULT_SECTION) {
                defaults.extend(table);
            } else if name == section {
                selected.extend(table);
            }
        }

        let mut settings = Settings::default();
        for (name, value) in defaults.into_iter().chain(selected) {
            if let Some(key) = SettingKey::parse(&name) {
                settings.values.insert(key, value);
            }
        }
        debug!(path = %path.display(), section, ?settings, "loaded properties");
        Ok(settings)
    }

    /// Command-line values win over whatever the file provided.
    pub fn apply_overrides<'a, I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (SettingKey, &'a str)>,
    {
        for (key, value) in overrides {
            debug!("overriding '{key}' with value from command line: {value}");
            self.values.insert(key, value.to_string());
        }
    }

    pub fn get(&self, key: SettingKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    pub fn set(&mut self, key: SettingKey, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    pub fn require(&self, key: SettingKey) -> Result<&str> {
        self.get(key)
            .ok_or(PublishError::MissingSetting(key.as_str()))
    }

    pub fn queue_url(&self) -> Result<&str> {
        self.require(SettingKey::QueueUrl)
    }

    /// Blank counts as unset: `s3_bucket =` leaves offload off.
    pub fn s3_bucket(&self) -> Option<&str> {
        self.get(SettingKey::S3Bucket)
            .map(str::trim)
            .filter(|bucket| !bucket.is_empty())
    }
}

/// Shared AWS configuration for the run: named profile (or the ambient
/// chain), optional region and endpoint.
pub async fn load_aws_config(settings: &Settings) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    let profile = settings.get(SettingKey::AwsProfile);
    if let Some(profile) = profile {
        loader = loader.profile_name(profile);
    }
    if let Some(region) = settings.get(SettingKey::Region) {
        loader = loader.region(aws_config::Region::new(region.to_string()));
    }

    // A custom endpoint without a profile is LocalStack or similar; skip the
    // credential chain there.
    if let Some(endpoint) = settings.get(SettingKey::EndpointUrl) {
        loader = loader.endpoint_url(endpoint);
        if profile.is_none() {
            let creds = Credentials::new("test", "test", None, None, "localstack");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(creds));
        }
    }

    loader.load().await
}

pub fn build_sqs_client(shared: &SdkConfig) -> sqs::Client {
    sqs::Client::new(shared)
}

pub fn build_s3_client(shared: &SdkConfig, settings: &Settings) -> s3::Client {
    let mut b = s3::config::Builder::from(shared);
    if settings.get(SettingKey::EndpointUrl).is_some() {
        b = b.force_path_style(true);
    }
    s3::Client::from_conf(b.build())
}
