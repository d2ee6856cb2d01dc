use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::error::PanelResult;
use crate::store::{ActiveView, StateStore};
use crate::ui::{ConfirmPrompt, PanelUi};

/// Headless UI for the stdio binary: renders are summarized in the log,
/// prompts are answered from config and downloads land in a directory.
pub struct ConsoleUi {
    auto_confirm: bool,
    export_dir: PathBuf,
}

impl ConsoleUi {
    pub fn new(auto_confirm: bool, export_dir: PathBuf) -> Self {
        Self {
            auto_confirm,
            export_dir,
        }
    }
}

impl PanelUi for ConsoleUi {
    fn render(&self, view: ActiveView, store: &StateStore) -> PanelResult<()> {
        if view == ActiveView::Logs {
            info!(target: "panel.render", view = ?view, entries = store.logs().len(), "render");
            for entry in store.logs() {
                debug!(
                    target: "panel.render",
                    level = ?entry.level,
                    event = %entry.event,
                    data = %entry.data,
                    "log entry"
                );
            }
            return Ok(());
        }

        let rows = store.rows_for(view);
        info!(
            target: "panel.render",
            view = ?view,
            rows = rows.len(),
            kinds = store.kinds().len(),
            selection = ?store.selection().map(|row| row.id),
            "render"
        );
        for row in rows {
            debug!(
                target: "panel.render",
                id = row.id,
                code = %row.code,
                kind = store.kind_label(row).unwrap_or("-"),
                locked = row.flags.locked,
                sample = row.flags.sample,
                swatch = %row.swatch.as_ref().map(|swatch| swatch.cache_key()).unwrap_or_default(),
                "row"
            );
        }
        Ok(())
    }

    fn status(&self, message: &str) {
        info!(target: "panel.ui", text = message, "status");
    }

    fn toast(&self, message: &str) {
        warn!(target: "panel.ui", text = message, "toast");
    }

    fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        info!(
            target: "panel.ui",
            title = %prompt.title,
            detail = %prompt.detail,
            answer = self.auto_confirm,
            "confirm"
        );
        self.auto_confirm
    }

    fn download(&self, filename: &str, contents: &str) {
        let path = self.export_dir.join(filename);
        match std::fs::write(&path, contents) {
            Ok(()) => info!(target: "panel.ui", path = %path.display(), bytes = contents.len(), "export written"),
            Err(err) => warn!(target: "panel.ui", path = %path.display(), error = %err, "export failed"),
        }
    }
}
