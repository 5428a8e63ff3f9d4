// Host I/O: notification sources, signals, process lock
pub mod dbus; // logind sleep and screensaver listeners
pub mod display; // DRM display power polling
pub mod lock; // Single-instance lock file
pub mod signals; // Unix signal handling and the core message channel
