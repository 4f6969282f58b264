//! Fault injection trigger commands

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Paths;
use crate::output::{print_info, print_success};
use crate::{ClearTarget, Fault};

/// Create the sentinel for `fault`
pub fn raise(paths: &Paths, fault: Fault) -> Result<()> {
    let path = paths.trigger(fault);
    create_sentinel(path)?;

    let effect = match fault {
        Fault::Crash => "agent will exit on its next cycle",
        Fault::Freeze => "agent will stop heartbeating on its next cycle",
    };
    print_success(&format!("Raised {} ({effect})", path.display()));
    Ok(())
}

/// Remove the selected sentinels; missing ones are not an error
pub fn clear(paths: &Paths, target: ClearTarget) -> Result<()> {
    let selected: Vec<&Path> = match target {
        ClearTarget::Crash => vec![paths.crash_trigger.as_path()],
        ClearTarget::Freeze => vec![paths.freeze_trigger.as_path()],
        ClearTarget::All => vec![
            paths.crash_trigger.as_path(),
            paths.freeze_trigger.as_path(),
        ],
    };

    for path in selected {
        if remove_sentinel(path)? {
            print_success(&format!("Cleared {}", path.display()));
        } else {
            print_info(&format!("{} was not set", path.display()));
        }
    }
    Ok(())
}

pub fn create_sentinel(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, b"")
        .with_context(|| format!("Failed to create trigger {}", path.display()))
}

/// Returns whether a sentinel was actually removed
pub fn remove_sentinel(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to remove trigger {}", path.display())),
    }
}
