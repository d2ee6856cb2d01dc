use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

pub const DEFAULT_FLUSH_WINDOW_MS: u64 = 200;
pub const DEFAULT_REFRESH_DELAY_MS: u64 = 450;
pub const DEFAULT_WATCHDOG_PERIOD_MS: u64 = 900;
pub const DEFAULT_FOCUS_DEBOUNCE_MS: u64 = 20;

pub const DEFAULT_EXPORT_COLUMNS: [&str; 6] = ["code", "kind", "brand", "subtype", "notes", "sample"];

#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub log_filter: String,
    pub flush_window_ms: u64,
    pub refresh_delay_ms: u64,
    pub watchdog_period_ms: u64,
    pub focus_debounce_ms: u64,
    pub auto_confirm: bool,
    pub export_dir: PathBuf,
    pub export_columns: Vec<String>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            log_filter: "info,material_panel=debug".into(),
            flush_window_ms: DEFAULT_FLUSH_WINDOW_MS,
            refresh_delay_ms: DEFAULT_REFRESH_DELAY_MS,
            watchdog_period_ms: DEFAULT_WATCHDOG_PERIOD_MS,
            focus_debounce_ms: DEFAULT_FOCUS_DEBOUNCE_MS,
            auto_confirm: false,
            export_dir: PathBuf::from("."),
            export_columns: DEFAULT_EXPORT_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl PanelConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let log_filter = std::env::var("RUST_LOG").unwrap_or(defaults.log_filter);
        let flush_window_ms = env_u64("MATERIAL_PANEL_FLUSH_WINDOW_MS", defaults.flush_window_ms);
        let refresh_delay_ms =
            env_u64("MATERIAL_PANEL_REFRESH_DELAY_MS", defaults.refresh_delay_ms);
        let watchdog_period_ms =
            env_u64("MATERIAL_PANEL_WATCHDOG_PERIOD_MS", defaults.watchdog_period_ms);
        let focus_debounce_ms =
            env_u64("MATERIAL_PANEL_FOCUS_DEBOUNCE_MS", defaults.focus_debounce_ms);
        let auto_confirm = std::env::var("MATERIAL_PANEL_AUTO_CONFIRM")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes" | "on"))
            .unwrap_or(defaults.auto_confirm);
        let export_dir = std::env::var("MATERIAL_PANEL_EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.export_dir);
        let export_columns = std::env::var("MATERIAL_PANEL_EXPORT_COLUMNS")
            .ok()
            .map(|v| parse_columns(&v))
            .filter(|cols| !cols.is_empty())
            .unwrap_or(defaults.export_columns);
        Self {
            log_filter,
            flush_window_ms,
            refresh_delay_ms,
            watchdog_period_ms,
            focus_debounce_ms,
            auto_confirm,
            export_dir,
            export_columns,
        }
    }

    pub fn flush_window(&self) -> Duration {
        Duration::from_millis(self.flush_window_ms)
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms)
    }

    pub fn watchdog_period(&self) -> Duration {
        // tokio intervals panic on a zero period
        Duration::from_millis(self.watchdog_period_ms.max(1))
    }

    pub fn focus_debounce(&self) -> Duration {
        Duration::from_millis(self.focus_debounce_ms)
    }
}

fn env_u64(var: &str, default: u64) -> u64 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_columns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|col| !col.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Parser, Debug, Default)]
#[command(name = "material-panel")]
#[command(about = "Material panel sync layer driven over a stdio host bridge")]
pub struct Cli {
    /// Tracing filter (overrides RUST_LOG)
    #[arg(long)]
    pub log_filter: Option<String>,

    /// Window for coalescing flag edits, in milliseconds
    #[arg(long)]
    pub flush_window_ms: Option<u64>,

    /// Delay before a scheduled full refresh, in milliseconds
    #[arg(long)]
    pub refresh_delay_ms: Option<u64>,

    /// Watchdog tick period, in milliseconds
    #[arg(long)]
    pub watchdog_period_ms: Option<u64>,

    /// Debounce applied to focus-regain ticks, in milliseconds
    #[arg(long)]
    pub focus_debounce_ms: Option<u64>,

    /// Answer every confirmation prompt with "yes"
    #[arg(long)]
    pub auto_confirm: bool,

    /// Directory CSV exports are written to
    #[arg(long)]
    pub export_dir: Option<PathBuf>,

    /// Comma separated columns requested by `export_csv`
    #[arg(long)]
    pub export_columns: Option<String>,
}

impl Cli {
    pub fn apply(self, config: &mut PanelConfig) {
        if let Some(filter) = self.log_filter {
            config.log_filter = filter;
        }
        if let Some(ms) = self.flush_window_ms {
            config.flush_window_ms = ms;
        }
        if let Some(ms) = self.refresh_delay_ms {
            config.refresh_delay_ms = ms;
        }
        if let Some(ms) = self.watchdog_period_ms {
            config.watchdog_period_ms = ms;
        }
        if let Some(ms) = self.focus_debounce_ms {
            config.focus_debounce_ms = ms;
        }
        if self.auto_confirm {
            config.auto_confirm = true;
        }
        if let Some(dir) = self.export_dir {
            config.export_dir = dir;
        }
        if let Some(cols) = self.export_columns {
            let cols = parse_columns(&cols);
            if !cols.is_empty() {
                config.export_columns = cols;
            }
        }
    }
}
