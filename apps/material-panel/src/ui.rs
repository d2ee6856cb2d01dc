//! Collaborators the panel talks to but does not implement: the view
//! renderer, status line, toasts, confirmation prompt and file download.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{PanelError, PanelResult};
use crate::store::{ActiveView, StateStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub title: String,
    pub detail: String,
}

pub trait PanelUi: Send + Sync {
    /// Draw `view` from the store. Called with the store lock held, so
    /// implementations must not reach back into the shared store.
    fn render(&self, view: ActiveView, store: &StateStore) -> PanelResult<()>;

    /// Persistent one-line status (e.g. "host bridge unavailable").
    fn status(&self, message: &str);

    /// Transient notification for failures reported by the host.
    fn toast(&self, message: &str);

    fn confirm(&self, prompt: &ConfirmPrompt) -> bool;

    fn download(&self, filename: &str, contents: &str);

    /// Backgrounded panels skip rendering until they are visible again.
    fn is_visible(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Render {
        view: ActiveView,
        rows: Vec<u64>,
        selection: Option<u64>,
    },
    Status(String),
    Toast(String),
    Confirm(ConfirmPrompt),
    Download {
        filename: String,
        contents: String,
    },
}

/// UI double that records every interaction.
#[derive(Debug)]
pub struct RecordingUi {
    events: Mutex<Vec<UiEvent>>,
    confirm_answer: AtomicBool,
    visible: AtomicBool,
    fail_render: AtomicBool,
    panic_render: AtomicBool,
}

impl Default for RecordingUi {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingUi {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            confirm_answer: AtomicBool::new(true),
            visible: AtomicBool::new(true),
            fail_render: AtomicBool::new(false),
            panic_render: AtomicBool::new(false),
        }
    }

    pub fn answer_confirm(&self, answer: bool) {
        self.confirm_answer.store(answer, Ordering::Release);
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Release);
    }

    pub fn fail_render(&self, failing: bool) {
        self.fail_render.store(failing, Ordering::Release);
    }

    pub fn panic_render(&self, panicking: bool) {
        self.panic_render.store(panicking, Ordering::Release);
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().clone()
    }

    pub fn renders(&self) -> Vec<UiEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, UiEvent::Render { .. }))
            .cloned()
            .collect()
    }

    pub fn render_count(&self) -> usize {
        self.renders().len()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn push(&self, event: UiEvent) {
        self.events.lock().push(event);
    }
}

impl PanelUi for RecordingUi {
    fn render(&self, view: ActiveView, store: &StateStore) -> PanelResult<()> {
        if self.panic_render.load(Ordering::Acquire) {
            panic!("render exploded");
        }
        if self.fail_render.load(Ordering::Acquire) {
            return Err(PanelError::Render("simulated render failure".into()));
        }
        self.push(UiEvent::Render {
            view,
            rows: store.rows_for(view).iter().map(|row| row.id).collect(),
            selection: store.selection().map(|row| row.id),
        });
        Ok(())
    }

    fn status(&self, message: &str) {
        self.push(UiEvent::Status(message.to_string()));
    }

    fn toast(&self, message: &str) {
        self.push(UiEvent::Toast(message.to_string()));
    }

    fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        self.push(UiEvent::Confirm(prompt.clone()));
        self.confirm_answer.load(Ordering::Acquire)
    }

    fn download(&self, filename: &str, contents: &str) {
        self.push(UiEvent::Download {
            filename: filename.to_string(),
            contents: contents.to_string(),
        });
    }

    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }
}
