//! Crate-wide constants.

pub const APP_NAME: &str = "kiln";

/// Length of the truncated object hash used in store paths.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Marker written into a package directory once it has been fully published.
pub const PACKAGE_COMPLETE_MARKER: &str = ".kiln-complete";

/// Package metadata file written next to the installed tree.
pub const PACKAGE_INFO_FILE: &str = "kiln-package.json";

/// Default timestamp authority used when signing release builds.
pub const DEFAULT_TIMESTAMP_URL: &str = "http://timestamp.digicert.com";
