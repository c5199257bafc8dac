//! Crash logging: panic details written to JSON files for post-mortem
//! analysis, with a snapshot of where the solve loop was when it fell over.
//! The main loop calls [`record_loop_state`] once per batch; the panic
//! hook reads it back through [`log_panic`] so the report it saves
//! reflects the most recent batch rather than always going without one.

use std::fs::{self, File};
use std::io::Write;
use std::panic::PanicHookInfo;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Directory for crash logs
const CRASH_LOG_DIR: &str = "logs";

/// Most recently recorded loop state, updated once per batch by the main
/// loop and read back by the panic hook. `None` until the first batch
/// completes.
static LOOP_STATE: OnceLock<Mutex<Option<LoopStateSnapshot>>> = OnceLock::new();

/// Record where the main loop is, called once per batch so a panic
/// anywhere downstream of that call has a recent snapshot to report.
pub fn record_loop_state(state: LoopStateSnapshot) {
    let slot = LOOP_STATE.get_or_init(|| Mutex::new(None));
    if let Ok(mut guard) = slot.lock() {
        *guard = Some(state);
    }
}

/// The last loop state recorded via [`record_loop_state`], if any.
fn current_loop_state() -> Option<LoopStateSnapshot> {
    LOOP_STATE.get()?.lock().ok()?.clone()
}

/// Crash report with all relevant diagnostic information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashReport {
    /// Timestamp of the crash
    pub timestamp: DateTime<Utc>,

    /// Panic message
    pub message: String,

    /// Location where panic occurred (file:line:column)
    pub location: Option<String>,

    /// Backtrace (if available)
    pub backtrace: Option<String>,

    /// Loop state at time of crash (optional)
    pub loop_state: Option<LoopStateSnapshot>,

    /// Crate version
    pub version: String,
}

/// Snapshot of the main batch loop's state at crash time.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoopStateSnapshot {
    /// Number of tasks solved so far this run
    pub batches_completed: u64,

    /// Day/phase the circadian clock was in
    pub circadian_phase: Option<String>,

    /// Category of the task being solved, if any
    pub current_category: Option<String>,

    /// Title of the task being solved, if any
    pub current_task: Option<String>,
}

impl CrashReport {
    /// Create a new crash report from panic info
    pub fn from_panic_info(panic_info: &PanicHookInfo<'_>) -> Self {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic payload".to_string()
        };

        let location = panic_info.location().map(|loc| {
            format!("{}:{}:{}", loc.file(), loc.line(), loc.column())
        });

        // Capture backtrace
        let backtrace = std::backtrace::Backtrace::capture();
        let backtrace_str = match backtrace.status() {
            std::backtrace::BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };

        Self {
            timestamp: Utc::now(),
            message,
            location,
            backtrace: backtrace_str,
            loop_state: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Attach a loop-state snapshot to the report.
    pub fn with_loop_state(mut self, state: LoopStateSnapshot) -> Self {
        self.loop_state = Some(state);
        self
    }

    /// Get the filename for this crash report
    pub fn filename(&self) -> String {
        format!(
            "panic_{}.json",
            self.timestamp.format("%Y%m%d_%H%M%S")
        )
    }

    /// Save crash report to file
    pub fn save(&self) -> std::io::Result<PathBuf> {
        // Ensure logs directory exists
        fs::create_dir_all(CRASH_LOG_DIR)?;

        let path = PathBuf::from(CRASH_LOG_DIR).join(self.filename());
        let mut file = File::create(&path)?;

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        file.write_all(json.as_bytes())?;

        Ok(path)
    }
}

/// Log a panic to a crash file.
///
/// Called from the panic hook to record crash details.
pub fn log_panic(panic_info: &PanicHookInfo<'_>) -> std::io::Result<PathBuf> {
    let mut report = CrashReport::from_panic_info(panic_info);
    if let Some(state) = current_loop_state() {
        report = report.with_loop_state(state);
    }
    report.save()
}

/// Detect if there was a previous crash.
///
/// Returns the most recent crash report if one exists.
pub fn detect_previous_crash() -> Option<CrashReport> {
    let log_dir = PathBuf::from(CRASH_LOG_DIR);

    if !log_dir.exists() {
        return None;
    }

    // Find most recent panic log
    let mut crash_files: Vec<_> = fs::read_dir(&log_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_name()
                .to_string_lossy()
                .starts_with("panic_")
        })
        .collect();

    // Sort by name (which includes timestamp) descending
    crash_files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    // Read most recent
    let most_recent = crash_files.first()?;
    let contents = fs::read_to_string(most_recent.path()).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Get all crash reports.
pub fn get_all_crash_reports() -> Vec<CrashReport> {
    let log_dir = PathBuf::from(CRASH_LOG_DIR);

    if !log_dir.exists() {
        return Vec::new();
    }

    fs::read_dir(&log_dir)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_name()
                .to_string_lossy()
                .starts_with("panic_")
        })
        .filter_map(|entry| {
            let contents = fs::read_to_string(entry.path()).ok()?;
            serde_json::from_str(&contents).ok()
        })
        .collect()
}

/// Clear old crash logs (keep last N)
pub fn cleanup_old_logs(keep_count: usize) -> std::io::Result<usize> {
    let log_dir = PathBuf::from(CRASH_LOG_DIR);

    if !log_dir.exists() {
        return Ok(0);
    }

    let mut crash_files: Vec<_> = fs::read_dir(&log_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_name()
                .to_string_lossy()
                .starts_with("panic_")
        })
        .collect();

    // Sort by name descending (newest first)
    crash_files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    let mut deleted = 0;
    for entry in crash_files.into_iter().skip(keep_count) {
        fs::remove_file(entry.path())?;
        deleted += 1;
    }

    Ok(deleted)
}
