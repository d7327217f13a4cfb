pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod network;

#[doc(hidden)]
pub use tracing;

/// Target used by [`success!`] so the terminal formatter can render it apart from plain `info!`.
pub const SUCCESS_TARGET: &str = "lanprobe::success";

/// Logs a completed milestone. Rendered with a distinct symbol by the CLI formatter.
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        $crate::tracing::info!(target: "lanprobe::success", $($arg)*)
    };
}
