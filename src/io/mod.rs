// External I/O operations module
pub mod dbus; // Suspend/resume and wall-clock change monitoring
pub mod focus; // Compositor focus events for app exclusion
pub mod instance; // High-level instance management
pub mod lock; // Low-level lock file operations
pub mod signals; // Unix signal handling and the command drop file
