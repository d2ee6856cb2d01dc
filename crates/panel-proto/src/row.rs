use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Kind key → human label. Always replaced wholesale.
pub type KindDictionary = BTreeMap<String, String>;

/// A material record mirrored from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: u64,
    #[serde(default, deserialize_with = "nullable_string")]
    pub code: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub brand: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub subtype: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub notes: String,
    #[serde(flatten)]
    pub flags: Flags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swatch: Option<Swatch>,
}

impl Row {
    pub fn new(id: u64, code: impl Into<String>, kind: Option<&str>) -> Self {
        Self {
            id,
            code: code.into(),
            kind: kind.map(str::to_string),
            brand: String::new(),
            subtype: String::new(),
            notes: String::new(),
            flags: Flags::default(),
            swatch: None,
        }
    }

    /// Rows without a kind are "not yet classified".
    pub fn is_classified(&self) -> bool {
        self.kind.as_deref().is_some_and(|kind| !kind.is_empty())
    }
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flags {
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub sample: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub sample_received: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlagKey {
    Locked,
    Sample,
    Hidden,
    SampleReceived,
}

impl FlagKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Sample => "sample",
            Self::Hidden => "hidden",
            Self::SampleReceived => "sampleReceived",
        }
    }
}

impl fmt::Display for FlagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partial flag update for a single row. Only the keys that were touched are
/// serialized, so `{locked: true}` stays `{locked: true}` on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_received: Option<bool>,
}

impl FlagDelta {
    pub fn with(key: FlagKey, value: bool) -> Self {
        let mut delta = Self::default();
        delta.set(key, value);
        delta
    }

    pub fn set(&mut self, key: FlagKey, value: bool) {
        let slot = match key {
            FlagKey::Locked => &mut self.locked,
            FlagKey::Sample => &mut self.sample,
            FlagKey::Hidden => &mut self.hidden,
            FlagKey::SampleReceived => &mut self.sample_received,
        };
        *slot = Some(value);
    }

    pub fn apply_to(&self, flags: &mut Flags) {
        if let Some(value) = self.locked {
            flags.locked = value;
        }
        if let Some(value) = self.sample {
            flags.sample = value;
        }
        if let Some(value) = self.hidden {
            flags.hidden = value;
        }
        if let Some(value) = self.sample_received {
            flags.sample_received = value;
        }
    }
}

/// Visual swatch attached to a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Swatch {
    Texture {
        path: String,
        /// Bumped by the host whenever the texture file changes on disk.
        #[serde(default)]
        stamp: u64,
    },
    Color {
        rgba: [u8; 4],
    },
}

impl Swatch {
    /// Stable key for image caches; texture stamps bust stale entries.
    pub fn cache_key(&self) -> String {
        match self {
            Self::Texture { path, stamp } => format!("{path}?v={stamp}"),
            Self::Color { rgba: [r, g, b, a] } => format!("#{r:02x}{g:02x}{b:02x}{a:02x}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    #[default]
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogTimestamp {
    Millis(i64),
    /// Fractional epoch value, as emitted by hosts that log seconds.
    Float(f64),
    Text(String),
}

/// One line of the host's diagnostic log window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub timestamp: Option<LogTimestamp>,
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}
