//! Crash recovery and self-healing for the main batch loop.
//!
//! # Philosophy
//!
//! Crashing is not an option. But when it happens:
//! - the process restarts automatically (the supervisor below)
//! - state is logged for post-mortem (crash logging)
//! - circadian and scheduler state are checkpointed so a restart resumes
//!   close to where it left off

pub mod crash_log;
pub mod checkpoint;
pub mod supervisor;

use std::panic;

/// Install a panic hook that logs crash details before the default hook
/// prints its report. Called once at process start.
pub fn install_panic_hooks() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        if let Err(e) = crash_log::log_panic(panic_info) {
            eprintln!("failed to log crash: {e}");
        }
        default_hook(panic_info);
    }));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_panic_hooks_does_not_panic() {
        // color_eyre::install() can only succeed once per process; in a
        // test binary a prior test may have already installed it, so we
        // only check that calling this doesn't itself panic.
        let _ = install_panic_hooks();
    }
}
