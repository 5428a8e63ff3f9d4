//! File watching for hot config reloading.
//!
//! The config directory is watched rather than the file itself, so editors
//! that save by writing a temp file and renaming it over the original are
//! still seen. Events are debounced and forwarded as
//! [`SignalMessage::Reload`].

use anyhow::{Context, Result};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Instant;

use super::Config;
use crate::common::constants::CONFIG_WATCH_DEBOUNCE;
use crate::common::utils::private_path;
use crate::io::signals::SignalMessage;

pub struct ConfigWatcher {
    signal_sender: Sender<SignalMessage>,
    debug_enabled: bool,
    config_path: PathBuf,
}

impl ConfigWatcher {
    pub fn new(
        config_path: PathBuf,
        signal_sender: Sender<SignalMessage>,
        debug_enabled: bool,
    ) -> Self {
        Self {
            signal_sender,
            debug_enabled,
            config_path,
        }
    }

    /// Spawn the watcher thread. Returns an error if the directory cannot be
    /// watched; hot reload is then unavailable but SIGUSR2 still works.
    pub fn start(self) -> Result<()> {
        let watch_dir = self
            .config_path
            .parent()
            .context("Config path has no parent directory")?
            .to_path_buf();

        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    match event.kind {
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                            let _ = tx.send(event);
                        }
                        _ => {}
                    }
                }
            },
            NotifyConfig::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch directory: {}", private_path(&watch_dir)))?;

        if self.debug_enabled {
            log_pipe!();
            log_debug!("Watching {} for changes", private_path(&self.config_path));
        }

        let ConfigWatcher {
            signal_sender,
            debug_enabled,
            config_path,
        } = self;

        thread::spawn(move || {
            // The watcher stops when dropped
            let _watcher = watcher;
            let mut last_reload: Option<Instant> = None;

            for event in rx {
                if !event.paths.iter().any(|p| affects_config(p, &config_path)) {
                    continue;
                }

                if last_reload.is_some_and(|t| t.elapsed() < CONFIG_WATCH_DEBOUNCE) {
                    continue;
                }

                if debug_enabled {
                    log_pipe!();
                    log_debug!("Configuration file change detected");
                }

                if signal_sender.send(SignalMessage::Reload).is_err() {
                    break;
                }
                last_reload = Some(Instant::now());
            }
        });

        Ok(())
    }
}

/// Whether a change to `event_path` concerns the config file.
fn affects_config(event_path: &Path, config_path: &Path) -> bool {
    if event_path == config_path {
        return true;
    }
    if event_path.parent() != config_path.parent() {
        return false;
    }
    match (
        event_path.file_name().and_then(|n| n.to_str()),
        config_path.file_name().and_then(|n| n.to_str()),
    ) {
        // Editor temp files such as `keylight.toml~` or `keylight.toml.swp`
        (Some(event_name), Some(config_name)) => event_name.starts_with(config_name),
        _ => false,
    }
}

/// Start watching the active config file for hot reload.
pub fn start_config_watcher(
    signal_sender: Sender<SignalMessage>,
    debug_enabled: bool,
) -> Result<()> {
    let config_path = Config::get_config_path()?;
    ConfigWatcher::new(config_path, signal_sender, debug_enabled).start()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affects_config() {
        let config = Path::new("/home/u/.config/keylight/keylight.toml");
        assert!(affects_config(config, config));
        assert!(affects_config(
            Path::new("/home/u/.config/keylight/keylight.toml~"),
            config
        ));
        assert!(!affects_config(
            Path::new("/home/u/.config/keylight/other.toml"),
            config
        ));
        assert!(!affects_config(
            Path::new("/home/u/elsewhere/keylight.toml"),
            config
        ));
    }
}
