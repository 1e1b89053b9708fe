/// Router Module Index
///
/// Splits the routes by access level so authentication is applied per module
/// rather than per handler.

/// Routes accessible without a session.
pub mod public;

/// Routes that require a valid bearer token backed by a live cached session.
pub mod authenticated;
