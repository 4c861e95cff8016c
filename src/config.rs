//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione del batch letta da file JSON.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri di upload e resize
//! - Applica i default del tool (acl, convertbin, resizecmd, extension, threads)
//! - Interpreta le definizioni di dimensione dei profili (`sizes`)
//! - Risolve i comandi di post-processing (`magick`) per profilo
//!
//! ## Esempio file:
//! ```json
//! {
//!   "source": "/srv/images/original",
//!   "target": "/srv/images/sets",
//!   "threads": 4,
//!   "sizes": { "thumb": [120, 90], "wide": [800, 450, "%convertbin% %input% -resize %dimensions% %output%"] },
//!   "s3": { "bucket": "media", "region": "eu-west-1" }
//! }
//! ```

use crate::error::{BatchError, Result};
use crate::object_store::Credentials;
use crate::template::CommandTemplate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_ACL: &str = "public-read";
pub const DEFAULT_CONVERT_BIN: &str = "convert";
pub const DEFAULT_EXTENSION: &str = ".jpg";
pub const DEFAULT_RESIZE_COMMAND: &str = "%convertbin% %input% -trim -geometry %dimensions% -gravity center -background %bgcolor% -extent %dimensions% %output%";

const SAMPLE_CONFIG: &str = r##"{
    "source": "/srv/images/original",
    "target": "/srv/images/sets",
    "extension": ".jpg",
    "overwrite": false,
    "threads": 4,
    "acl": "public-read",
    "cache": 2592000,
    "convertbin": "convert",
    "bgcolor": "#FFFFFF",
    "sizes": {
        "thumb": [120, 90],
        "large": [1024, 768, "%convertbin% %input% -resize %dimensions% %output%"]
    },
    "magick": {
        "thumb": ["%convertbin% %output% -strip %output%"],
        "large": []
    },
    "s3": {
        "keyid": "AKIAEXAMPLE",
        "secret": "secret",
        "bucket": "media",
        "region": "eu-west-1"
    }
}"##;

/// What to do when the remote existence check fails for a reason other than "not found"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckFailurePolicy {
    /// Treat the failure as absence and upload anyway
    #[default]
    Upload,
    /// Leave the object alone
    Skip,
    /// Abort the batch
    Abort,
}

/// Object store settings; every field can be overridden from the command line
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Settings {
    pub keyid: Option<String>,
    pub secret: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint for S3 compatible services
    pub endpoint: Option<String>,
}

impl S3Settings {
    /// Fields set in `overrides` replace the configured ones
    pub fn merge(&self, overrides: &S3Settings) -> S3Settings {
        let pick = |over: &Option<String>, base: &Option<String>| over.clone().or_else(|| base.clone());
        S3Settings {
            keyid: pick(&overrides.keyid, &self.keyid),
            secret: pick(&overrides.secret, &self.secret),
            bucket: pick(&overrides.bucket, &self.bucket),
            region: pick(&overrides.region, &self.region),
            endpoint: pick(&overrides.endpoint, &self.endpoint),
        }
    }

    /// Explicit credentials plus the target bucket; every auth attribute is required
    pub fn credentials(&self) -> Result<(Credentials, String)> {
        let required = |name: &str, value: &Option<String>| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| BatchError::Config(format!("Auth attribute \"{}\" not set!", name)))
        };

        let credentials = Credentials {
            access_key_id: required("keyid", &self.keyid)?,
            secret_access_key: required("secret", &self.secret)?,
            region: required("region", &self.region)?,
        };
        let bucket = required("bucket", &self.bucket)?;
        Ok((credentials, bucket))
    }
}

/// Post-process commands, either shared by all profiles or keyed by profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MagickCommands {
    Shared(Vec<String>),
    PerProfile(BTreeMap<String, Vec<String>>),
}

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory with the original images (resize)
    #[serde(default)]
    pub source: Option<PathBuf>,
    /// Base directory of the profile sets
    #[serde(default)]
    pub target: Option<PathBuf>,
    /// Only files with this extension are resized
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Re-process files whose output already exists
    #[serde(default)]
    pub overwrite: bool,
    /// Number of concurrent partitions
    #[serde(default = "default_threads", deserialize_with = "lenient_threads")]
    pub threads: usize,
    /// ACL attached to uploaded objects
    #[serde(default = "default_acl")]
    pub acl: String,
    /// Cache lifetime in seconds for uploaded objects
    #[serde(default)]
    pub cache: Option<u64>,
    #[serde(default = "default_convertbin")]
    pub convertbin: String,
    #[serde(default = "default_resizecmd")]
    pub resizecmd: String,
    /// Fixed background color; sampled from the image when absent
    #[serde(default)]
    pub bgcolor: Option<String>,
    #[serde(default)]
    pub sizes: BTreeMap<String, Vec<Value>>,
    #[serde(default)]
    pub magick: Option<MagickCommands>,
    #[serde(default)]
    pub s3: Option<S3Settings>,
    /// Abort the batch on the first failed file
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default)]
    pub check_failure: CheckFailurePolicy,
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_threads() -> usize {
    1
}

fn default_acl() -> String {
    DEFAULT_ACL.to_string()
}

fn default_convertbin() -> String {
    DEFAULT_CONVERT_BIN.to_string()
}

fn default_resizecmd() -> String {
    DEFAULT_RESIZE_COMMAND.to_string()
}

/// Any value that is not a positive integer falls back to a single partition
fn lenient_threads<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_u64()
        .filter(|threads| *threads >= 1)
        .map(|threads| threads as usize)
        .unwrap_or(1))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: None,
            target: None,
            extension: default_extension(),
            overwrite: false,
            threads: default_threads(),
            acl: default_acl(),
            cache: None,
            convertbin: default_convertbin(),
            resizecmd: default_resizecmd(),
            bgcolor: None,
            sizes: BTreeMap::new(),
            magick: None,
            s3: None,
            fail_fast: false,
            check_failure: CheckFailurePolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BatchError::Config(format!(
                "Config file does not exist: {}",
                path.display()
            )));
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::from_json(&content)?;
        Ok(config)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Sample configuration file shown by `--sample-config`
    pub fn sample() -> &'static str {
        SAMPLE_CONFIG
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(BatchError::Config("threads must be greater than 0".into()));
        }

        CommandTemplate::parse(self.resizecmd.as_str())?;
        for (profile, definition) in &self.sizes {
            if let Some(command) = SizeDefinition::parse(profile, definition)?.command {
                CommandTemplate::parse(command)?;
            }
        }

        let post_commands: Vec<&String> = match &self.magick {
            None => Vec::new(),
            Some(MagickCommands::Shared(commands)) => commands.iter().collect(),
            Some(MagickCommands::PerProfile(map)) => map.values().flatten().collect(),
        };
        for command in post_commands {
            CommandTemplate::parse(command.as_str())?;
        }

        Ok(())
    }

    /// Base directory of the profile sets
    pub fn target_dir(&self) -> Result<&Path> {
        self.target
            .as_deref()
            .ok_or_else(|| BatchError::Config("No target directory specified in config file!".into()))
    }

    /// Directory with the original images
    pub fn source_dir(&self) -> Result<&Path> {
        self.source
            .as_deref()
            .ok_or_else(|| BatchError::Config("No source directory specified in config file!".into()))
    }

    /// Names of all configured profiles, in sorted order
    pub fn profiles(&self) -> Result<Vec<String>> {
        if self.sizes.is_empty() {
            return Err(BatchError::Config("No sizes specified in config file!".into()));
        }
        Ok(self.sizes.keys().cloned().collect())
    }

    /// Parsed size definition of a profile
    pub fn size(&self, profile: &str) -> Result<SizeDefinition> {
        let definition = self.sizes.get(profile).ok_or_else(|| {
            BatchError::Config(format!("No target size specified for \"{}\"", profile))
        })?;
        SizeDefinition::parse(profile, definition)
    }

    /// Post-process commands of a profile
    pub fn post_commands(&self, profile: &str) -> Result<Vec<String>> {
        match &self.magick {
            None => Ok(Vec::new()),
            Some(MagickCommands::Shared(commands)) => Ok(commands.clone()),
            Some(MagickCommands::PerProfile(map)) => map.get(profile).cloned().ok_or_else(|| {
                BatchError::Config(format!("No imagemagick definition for size \"{}\"", profile))
            }),
        }
    }
}

/// Output dimensions of a profile plus an optional command override
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeDefinition {
    pub width: u32,
    pub height: u32,
    pub command: Option<String>,
}

impl SizeDefinition {
    /// Two elements use the default template, a third string element replaces it
    pub fn parse(profile: &str, values: &[Value]) -> Result<Self> {
        let invalid = |reason: String| BatchError::InvalidSizeDefinition {
            profile: profile.to_string(),
            reason,
        };

        let command = match values.len() {
            2 => None,
            3 => match &values[2] {
                Value::String(command) => Some(command.clone()),
                other => return Err(invalid(format!("command override must be a string, got {}", other))),
            },
            n => return Err(invalid(format!("expected 2 or 3 elements, got {}", n))),
        };

        let width = Self::dimension(&values[0]).ok_or_else(|| invalid(format!("invalid width {}", values[0])))?;
        let height = Self::dimension(&values[1]).ok_or_else(|| invalid(format!("invalid height {}", values[1])))?;

        Ok(Self { width, height, command })
    }

    fn dimension(value: &Value) -> Option<u32> {
        match value {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// `<width>x<height>` as used by the `%dimensions%` placeholder
    pub fn dimensions(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}
