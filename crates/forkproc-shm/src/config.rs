use crate::size::parse_size;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding the default segment size.
pub const SIZE_ENV: &str = "FORKPROC_SHM_SIZE";
/// Environment variable overriding the default permissions (octal).
pub const PERMISSIONS_ENV: &str = "FORKPROC_SHM_PERMISSIONS";

pub const DEFAULT_SIZE: usize = 10000;
pub const DEFAULT_PERMISSIONS: u32 = 0o666;

/// Defaults applied when a segment is opened without an explicit size or
/// permission mode.
///
/// ```yaml
/// default_size: 64k
/// permissions: "0600"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShmConfig {
    #[serde(default = "default_size", with = "size_serde")]
    pub default_size: usize,
    #[serde(default = "default_permissions", with = "octal_serde")]
    pub permissions: u32,
}

fn default_size() -> usize {
    DEFAULT_SIZE
}

fn default_permissions() -> u32 {
    DEFAULT_PERMISSIONS
}

impl Default for ShmConfig {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_SIZE,
            permissions: DEFAULT_PERMISSIONS,
        }
    }
}

impl ShmConfig {
    /// Defaults, overridden by `FORKPROC_SHM_SIZE` and
    /// `FORKPROC_SHM_PERMISSIONS` when set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(size) = std::env::var(SIZE_ENV) {
            config.default_size =
                parse_size(&size).with_context(|| format!("Invalid {}", SIZE_ENV))?;
        }
        if let Ok(permissions) = std::env::var(PERMISSIONS_ENV) {
            config.permissions = u32::from_str_radix(permissions.trim(), 8)
                .with_context(|| format!("Invalid {}: {}", PERMISSIONS_ENV, permissions))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: ShmConfig =
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_size <= crate::store::HEADER_LEN {
            return Err(anyhow!(
                "default_size must be larger than {} bytes, got {}",
                crate::store::HEADER_LEN,
                self.default_size
            ));
        }
        if self.permissions > 0o777 {
            return Err(anyhow!("permissions must be at most 0777, got {:o}", self.permissions));
        }
        Ok(())
    }
}

mod size_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(size: &usize, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&size.to_string())
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSize {
        Bytes(usize),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<usize, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawSize::deserialize(deserializer)? {
            RawSize::Bytes(bytes) => Ok(bytes),
            RawSize::Text(s) => crate::size::parse_size(&s).map_err(serde::de::Error::custom),
        }
    }
}

mod octal_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(mode: &u32, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:04o}", mode))
    }

    // `permissions: 600` is read as the octal digits it spells.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawMode {
        Digits(u32),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = match RawMode::deserialize(deserializer)? {
            RawMode::Digits(digits) => digits.to_string(),
            RawMode::Text(s) => s,
        };
        u32::from_str_radix(s.trim(), 8)
            .map_err(|_| serde::de::Error::custom(format!("Invalid octal mode: {}", s)))
    }
}
