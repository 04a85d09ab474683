// common.rs -- console output and error dispatch
//
// Everything is routed through the `log` facade; the host decides where it
// ends up by installing a logger.

/// Severity passed to `com_error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    /// Abort the current operation, keep the process alive.
    Drop,
    /// Unrecoverable; the process goes down.
    Fatal,
}

const LOG_TARGET: &str = "etl";

/// General-purpose print.
pub fn com_printf(msg: &str) {
    log::info!(target: LOG_TARGET, "{}", msg.trim_end_matches('\n'));
}

/// Developer-only print. Filtered by the logger's debug level.
pub fn com_dprintf(msg: &str) {
    log::debug!(target: LOG_TARGET, "{}", msg.trim_end_matches('\n'));
}

pub fn com_warning(msg: &str) {
    log::warn!(target: LOG_TARGET, "{}", msg.trim_end_matches('\n'));
}

/// Engine error handler.
/// - `Fatal`: logs and panics.
/// - `Drop`: logs the error and returns to the caller.
pub fn com_error(code: ErrorCode, msg: &str) {
    match code {
        ErrorCode::Fatal => com_fatal(msg),
        ErrorCode::Drop => log::error!(target: LOG_TARGET, "{}", msg.trim_end_matches('\n')),
    }
}

/// Producer/consumer protocol violated. Never returns.
pub fn com_fatal(msg: &str) -> ! {
    let msg = msg.trim_end_matches('\n');
    log::error!(target: LOG_TARGET, "{}", msg);
    panic!("Fatal error: {}", msg);
}
