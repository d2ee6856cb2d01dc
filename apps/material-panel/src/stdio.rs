//! Line-delimited JSON host bridge over stdin/stdout.
//!
//! Every frame is one JSON object tagged by `t`. The transport only counts as
//! attached after the host sends `{"t":"attach"}`, which lets a host harness
//! reproduce late bridge injection.

use std::sync::atomic::{AtomicBool, Ordering};

use host_bridge::{BridgeError, BridgeResult, HostBridge};
use panel_proto::{FlagKey, KindDictionary, QuickApplyArgs, RejectPayload, ResolvePayload, Row};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::error::{PanelError, PanelResult};
use crate::session::PanelSession;
use crate::store::ActiveView;

/// Frames the host writes to our stdin.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum HostFrame {
    Attach,
    Detach,
    Resolve {
        name: String,
        #[serde(default)]
        result: Value,
    },
    Reject {
        name: String,
        #[serde(default)]
        error: String,
    },
    Selection {
        row: Row,
    },
    Focus,
    Ui {
        action: UiCommand,
    },
}

/// Scripted UI actions, standing in for clicks when the panel runs headless.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UiCommand {
    View {
        view: ActiveView,
    },
    Select {
        id: u64,
    },
    Flag {
        id: u64,
        flag: FlagKey,
        value: bool,
    },
    QuickApply(QuickApplyArgs),
    Delete {
        id: u64,
    },
    Swap {
        a: u64,
        b: u64,
    },
    Export {
        #[serde(default)]
        cols: Option<Vec<String>>,
    },
    Normalize,
    KindsSave {
        kinds: KindDictionary,
    },
    GenerateBoards {
        ids: Vec<u64>,
    },
    Refresh,
}

/// Frames we write to stdout for the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum PanelFrame {
    Call { message: String },
    Ready,
    Ping { message: String },
}

pub struct StdioBridge {
    attached: AtomicBool,
    tx: Mutex<Option<UnboundedSender<PanelFrame>>>,
}

impl StdioBridge {
    pub fn new(tx: UnboundedSender<PanelFrame>) -> Self {
        Self {
            attached: AtomicBool::new(false),
            tx: Mutex::new(Some(tx)),
        }
    }

    pub fn set_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::Release);
    }

    /// Drop the writer side so the writer loop drains and exits.
    pub fn close(&self) {
        self.tx.lock().take();
    }

    fn send(&self, frame: PanelFrame) -> BridgeResult<()> {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(BridgeError::Transport("stdout writer closed".into()));
        };
        tx.send(frame)
            .map_err(|_| BridgeError::Transport("stdout writer closed".into()))
    }
}

impl HostBridge for StdioBridge {
    fn has_transport(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    fn has_handshake(&self) -> bool {
        self.tx.lock().is_some()
    }

    fn call(&self, message: &str) -> BridgeResult<()> {
        if !self.has_transport() {
            return Err(BridgeError::TransportUnavailable);
        }
        self.send(PanelFrame::Call {
            message: message.to_string(),
        })
    }

    fn ready(&self) -> BridgeResult<()> {
        self.send(PanelFrame::Ready)
    }

    fn ping(&self, message: &str) -> BridgeResult<()> {
        self.send(PanelFrame::Ping {
            message: message.to_string(),
        })
    }
}

pub async fn writer_loop<W>(mut rx: UnboundedReceiver<PanelFrame>, mut writer: W) -> PanelResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        let mut line = serde_json::to_vec(&frame).map_err(PanelError::FrameEncode)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Feed host frames into the session until the host closes its end.
pub async fn pump_host_frames<R>(
    reader: R,
    session: &PanelSession,
    bridge: &StdioBridge,
) -> PanelResult<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<HostFrame>(line) {
            Ok(frame) => handle_frame(frame, session, bridge),
            Err(err) => warn!(target: "panel.stdio", error = %err, "skipping malformed host frame"),
        }
    }
    info!(target: "panel.stdio", "host closed stdin");
    Ok(())
}

pub fn handle_frame(frame: HostFrame, session: &PanelSession, bridge: &StdioBridge) {
    match frame {
        HostFrame::Attach => {
            bridge.set_attached(true);
            session.on_transport_attached();
        }
        HostFrame::Detach => {
            debug!(target: "panel.stdio", "host detached transport");
            bridge.set_attached(false);
        }
        HostFrame::Resolve { name, result } => session.on_resolve(ResolvePayload { name, result }),
        HostFrame::Reject { name, error } => session.on_reject(RejectPayload { name, error }),
        HostFrame::Selection { row } => session.on_selection(row),
        HostFrame::Focus => session.on_focus(),
        HostFrame::Ui { action } => apply_command(action, session),
    }
}

pub fn apply_command(command: UiCommand, session: &PanelSession) {
    match command {
        UiCommand::View { view } => session.show_view(view),
        UiCommand::Select { id } => session.select(id),
        UiCommand::Flag { id, flag, value } => session.set_flag(id, flag, value),
        UiCommand::QuickApply(args) => session.quick_apply(args),
        UiCommand::Delete { id } => session.delete_material(id),
        UiCommand::Swap { a, b } => session.swap_codes(a, b),
        UiCommand::Export { cols } => session.export_csv(cols),
        UiCommand::Normalize => session.request_normalize(),
        UiCommand::KindsSave { kinds } => session.save_kinds(kinds),
        UiCommand::GenerateBoards { ids } => session.generate_boards(ids),
        UiCommand::Refresh => session.refresh(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_resolve_and_ui_frames() {
        let frame: HostFrame = serde_json::from_str(
            r#"{"t":"resolve","name":"export_csv","result":{"csv":"code\nA"}}"#,
        )
        .expect("decode resolve");
        assert!(matches!(frame, HostFrame::Resolve { ref name, .. } if name == "export_csv"));

        let frame: HostFrame = serde_json::from_str(
            r#"{"t":"ui","action":{"kind":"flag","id":4,"flag":"sampleReceived","value":true}}"#,
        )
        .expect("decode flag");
        match frame {
            HostFrame::Ui {
                action: UiCommand::Flag { id, flag, value },
            } => {
                assert_eq!(id, 4);
                assert_eq!(flag, FlagKey::SampleReceived);
                assert!(value);
            }
            other => panic!("expected flag command, got {other:?}"),
        }

        let frame: HostFrame = serde_json::from_str(
            r#"{"t":"ui","action":{"kind":"quick_apply","id":2,"prefix":"WD","brand":"Acme","subtype":"oak","notes":""}}"#,
        )
        .expect("decode quick apply");
        assert!(matches!(
            frame,
            HostFrame::Ui {
                action: UiCommand::QuickApply(QuickApplyArgs { id: 2, .. })
            }
        ));
    }

    #[test]
    fn encodes_panel_frames() {
        let call = serde_json::to_value(PanelFrame::Call {
            message: r#"{"name":"get_full","args":{}}"#.into(),
        })
        .expect("encode call");
        assert_eq!(call["t"], "call");
        assert_eq!(call["message"], r#"{"name":"get_full","args":{}}"#);
        assert_eq!(
            serde_json::to_string(&PanelFrame::Ready).expect("encode ready"),
            r#"{"t":"ready"}"#
        );
    }

    #[test]
    fn bridge_requires_attach_for_calls_but_not_handshake() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let bridge = StdioBridge::new(tx);
        assert!(matches!(bridge.call("{}"), Err(BridgeError::TransportUnavailable)));
        bridge.ready().expect("ready");
        bridge.set_attached(true);
        bridge.call("{}").expect("call");
        assert_eq!(rx.try_recv().expect("ready frame"), PanelFrame::Ready);
        assert_eq!(
            rx.try_recv().expect("call frame"),
            PanelFrame::Call {
                message: "{}".into()
            }
        );

        bridge.close();
        assert!(!bridge.has_handshake());
        assert!(matches!(bridge.ping("x"), Err(BridgeError::Transport(_))));
    }

    #[tokio::test]
    async fn writer_emits_one_line_per_frame() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(PanelFrame::Ready).expect("queue");
        tx.send(PanelFrame::Ping {
            message: "boot".into(),
        })
        .expect("queue");
        drop(tx);

        let mut out = Vec::new();
        writer_loop(rx, &mut out).await.expect("writer");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text, "{\"t\":\"ready\"}\n{\"t\":\"ping\",\"message\":\"boot\"}\n");
    }
}
