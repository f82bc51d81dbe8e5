//! Pipeline configuration.

use std::time::Duration;

/// Nanoseconds between two refreshes of a 60 Hz display.
pub const DEFAULT_REFRESH_PERIOD_NS: u64 = 16_666_667;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub refresh_period_ns: u64,
    /// The service renders every node, mirroring nodes that are otherwise
    /// drawn in-process.
    pub uni_render_enabled: bool,
    /// Vsyncs a transaction waits for a missing predecessor before the
    /// pipeline skips ahead.
    pub skip_command_frame_limit: u32,
    /// Consecutive self-requested vsyncs after which a warning is logged.
    pub request_vsync_warn_limit: u32,
    /// Upper bound a synchronous task waits for the pipeline thread.
    pub sync_task_timeout: Duration,
    /// Process id stamped on pipeline-origin transactions.
    pub pid: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            refresh_period_ns: DEFAULT_REFRESH_PERIOD_NS,
            uni_render_enabled: false,
            skip_command_frame_limit: 10,
            request_vsync_warn_limit: 1000,
            sync_task_timeout: Duration::from_millis(100),
            pid: std::process::id(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `STRATA_UNI_RENDER`, `STRATA_REFRESH_PERIOD_NS`,
    /// `STRATA_SKIP_COMMAND_FRAMES` and `STRATA_SYNC_TASK_TIMEOUT_MS`.
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    fn overlay(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = parse_var(&var, "STRATA_UNI_RENDER", parse_bool) {
            self.uni_render_enabled = value;
        }
        if let Some(value) = parse_var(&var, "STRATA_REFRESH_PERIOD_NS", |v| v.parse::<u64>().ok()) {
            if value > 0 {
                self.refresh_period_ns = value;
            }
        }
        if let Some(value) = parse_var(&var, "STRATA_SKIP_COMMAND_FRAMES", |v| v.parse().ok()) {
            self.skip_command_frame_limit = value;
        }
        if let Some(value) = parse_var(&var, "STRATA_SYNC_TASK_TIMEOUT_MS", |v| v.parse().ok()) {
            self.sync_task_timeout = Duration::from_millis(value);
        }
        self
    }

    pub fn refresh_period_ns(mut self, period_ns: u64) -> Self {
        self.refresh_period_ns = period_ns.max(1);
        self
    }

    pub fn uni_render_enabled(mut self, enabled: bool) -> Self {
        self.uni_render_enabled = enabled;
        self
    }

    pub fn skip_command_frame_limit(mut self, frames: u32) -> Self {
        self.skip_command_frame_limit = frames;
        self
    }

    pub fn request_vsync_warn_limit(mut self, limit: u32) -> Self {
        self.request_vsync_warn_limit = limit;
        self
    }

    pub fn sync_task_timeout(mut self, timeout: Duration) -> Self {
        self.sync_task_timeout = timeout;
        self
    }

    pub fn pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }
}

fn parse_var<T>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = var(key)?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        log::warn!("ignoring {key}={raw:?}: not a valid value");
    }
    parsed
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.refresh_period_ns, 16_666_667);
        assert_eq!(config.skip_command_frame_limit, 10);
        assert_eq!(config.sync_task_timeout, Duration::from_millis(100));
        assert!(!config.uni_render_enabled);
    }

    #[test]
    fn test_overlay_parses_and_ignores_garbage() {
        let vars: HashMap<&str, &str> = [
            ("STRATA_UNI_RENDER", "on"),
            ("STRATA_REFRESH_PERIOD_NS", "8333333"),
            ("STRATA_SKIP_COMMAND_FRAMES", "many"),
            ("STRATA_SYNC_TASK_TIMEOUT_MS", " 250 "),
        ]
        .into_iter()
        .collect();
        let config = PipelineConfig::default().overlay(|key| vars.get(key).map(|v| v.to_string()));
        assert!(config.uni_render_enabled);
        assert_eq!(config.refresh_period_ns, 8_333_333);
        assert_eq!(config.skip_command_frame_limit, 10);
        assert_eq!(config.sync_task_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_builder() {
        let config = PipelineConfig::new().pid(42).uni_render_enabled(true).refresh_period_ns(0);
        assert_eq!(config.pid, 42);
        assert!(config.uni_render_enabled);
        assert_eq!(config.refresh_period_ns, 1);
    }
}
