//! Wire types shared between the material panel and its host.
//! Kept free of runtime code so host-side harnesses can depend on it directly.

pub mod message;
pub mod row;

pub use message::{
    DeleteMaterialArgs, ExportCsvArgs, ExportCsvResult, GenerateBoardsArgs, KindsSaveArgs,
    Method, NoArgs, NormalizePreview, OutboundMessage, QuickApplyArgs, QuickApplyResult,
    RejectPayload, ResolvePayload, SetFlagsArgs, Snapshot, SwapCodesArgs, UnknownName,
};
pub use row::{
    FlagDelta, FlagKey, Flags, KindDictionary, LogEntry, LogLevel, LogTimestamp, Row, Swatch,
};
