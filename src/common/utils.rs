//! Small helpers shared across modules.

use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::path::Path;

/// Render a path with the home directory replaced by `~` for log output.
pub fn private_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(rest) = path.strip_prefix(&home)
    {
        if rest.as_os_str().is_empty() {
            return "~".to_string();
        }
        return format!("~/{}", rest.display());
    }
    path.display().to_string()
}

/// Check whether a process with `pid` exists (signal 0 probe).
pub fn is_process_running(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        // Exists but owned by another user
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Format a duration in seconds the way config values are written.
pub fn format_seconds(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{secs:.0}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_path_replaces_home() {
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".config").join("keylight");
            assert_eq!(private_path(&path), "~/.config/keylight");
            assert_eq!(private_path(&home), "~");
        }
        assert_eq!(private_path(Path::new("/etc/keylight")), "/etc/keylight");
    }

    #[test]
    fn test_current_process_is_running() {
        assert!(is_process_running(std::process::id()));
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(4.0), "4s");
        assert_eq!(format_seconds(6.5), "6.5s");
    }
}
