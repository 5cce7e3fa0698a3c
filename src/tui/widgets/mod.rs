//! TUI Widget components
//!
//! Modular widgets for the dashboard display.

pub mod footer;
pub mod header;
pub mod logs;
pub mod orders;
pub mod status;

pub use footer::render_footer;
pub use header::render_header;
pub use logs::render_logs;
pub use orders::render_orders;
pub use status::render_status;
