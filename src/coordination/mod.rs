//! Cross-task coordination: the shared shutdown controller and the OS
//! signal wiring that feeds it.

pub mod shutdown;

pub use shutdown::{install_signal_handlers, ShutdownController, ShutdownMode};
