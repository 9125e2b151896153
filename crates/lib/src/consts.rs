pub const APP_NAME: &str = "coursesync";

/// Environment variable overriding the state directory.
pub const STATE_DIR_ENV: &str = "COURSESYNC_STATE_DIR";

/// Environment variable holding the remote API token.
pub const API_TOKEN_ENV: &str = "CANVAS_API_TOKEN";

/// Version recorded in state files written by this engine.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Checksum recorded for a resource whose remote object is only a shell.
pub const SHELL_CHECKSUM: &str = "";
