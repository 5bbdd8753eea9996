/// Route component constants shared across crates
pub const APP_ROUTE_COMPONENT: &str = "_app";
pub const APP_ROUTE_PREFIX: &str = const_str::concat!("/", APP_ROUTE_COMPONENT);

pub const HEALTHCHECK_ROUTE_COMPONENT: &str = "healthcheck";
pub const HEALTHCHECK_ROUTE_PREFIX: &str =
    const_str::concat!(APP_ROUTE_PREFIX, "/", HEALTHCHECK_ROUTE_COMPONENT);

pub const WHOAMI_ROUTE_COMPONENT: &str = "whoami";
pub const WHOAMI_ROUTE_PREFIX: &str =
    const_str::concat!(APP_ROUTE_PREFIX, "/", WHOAMI_ROUTE_COMPONENT);

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "KUNAI_CONFIG";
/// Prefix for environment overrides, e.g. `KUNAI__SERVER__PORT`.
pub const ENV_PREFIX: &str = "KUNAI";
