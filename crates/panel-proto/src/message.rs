use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::row::{FlagDelta, KindDictionary, LogEntry, Row};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{name}'")]
pub struct UnknownName {
    pub kind: &'static str,
    pub name: String,
}

impl UnknownName {
    pub fn new(kind: &'static str, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// Host methods the panel knows how to call. Responses are routed back by
/// this name alone; there is no per-request id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GetFull,
    NormalizePreview,
    NormalizeAll,
    QuickApply,
    SetFlags,
    DeleteMaterial,
    SwapCodes,
    ExportCsv,
    KindsSave,
    GenerateBoards,
}

impl Method {
    pub const ALL: [Method; 10] = [
        Method::GetFull,
        Method::NormalizePreview,
        Method::NormalizeAll,
        Method::QuickApply,
        Method::SetFlags,
        Method::DeleteMaterial,
        Method::SwapCodes,
        Method::ExportCsv,
        Method::KindsSave,
        Method::GenerateBoards,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetFull => "get_full",
            Self::NormalizePreview => "normalize_preview",
            Self::NormalizeAll => "normalize_all",
            Self::QuickApply => "quick_apply",
            Self::SetFlags => "set_flags",
            Self::DeleteMaterial => "delete_material",
            Self::SwapCodes => "swap_codes",
            Self::ExportCsv => "export_csv",
            Self::KindsSave => "kinds_save",
            Self::GenerateBoards => "generate_boards",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = UnknownName;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|method| method.as_str() == value)
            .ok_or_else(|| UnknownName::new("method", value))
    }
}

/// The only shape ever handed to the host transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// Delivered through the host's resolve slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvePayload {
    pub name: String,
    #[serde(default)]
    pub result: Value,
}

/// Delivered through the host's reject slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectPayload {
    pub name: String,
    #[serde(default)]
    pub error: String,
}

/// Full authoritative state returned by `get_full`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub entries: Vec<Row>,
    #[serde(default)]
    pub kinds: KindDictionary,
    #[serde(default, deserialize_with = "lenient_logs")]
    pub logs: Vec<LogEntry>,
}

/// Log entries are diagnostics only: one the panel cannot read is dropped
/// instead of failing the whole snapshot.
fn lenient_logs<'de, D>(deserializer: D) -> Result<Vec<LogEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect())
}

/// Serializes as `{}`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct NoArgs {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickApplyArgs {
    pub id: u64,
    pub prefix: String,
    pub brand: String,
    pub subtype: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetFlagsArgs {
    pub ids: Vec<u64>,
    pub flags: FlagDelta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteMaterialArgs {
    pub id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapCodesArgs {
    pub a: u64,
    pub b: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportCsvArgs {
    pub cols: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindsSaveArgs {
    pub kinds: KindDictionary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateBoardsArgs {
    pub ids: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizePreview {
    #[serde(default)]
    pub changes: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickApplyResult {
    pub updated: Row,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportCsvResult {
    #[serde(default)]
    pub csv: String,
}
