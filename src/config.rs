use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

use crate::optimizer::{Algorithm, EngineConfig};

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub optimizer: OptimizerConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            optimizer: OptimizerConfig::from_env(),
            store: StoreConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "WAREHOUSE_OPT_API_HOST";
    const PORT_VAR: &'static str = "WAREHOUSE_OPT_API_PORT";

    fn from_env() -> Self {
        Self::from_values(env_string(Self::HOST_VAR), env_string(Self::PORT_VAR))
    }

    fn from_values(host: Option<String>, port: Option<String>) -> Self {
        let default_ip = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        let host_value = host.unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    var = Self::HOST_VAR,
                    value = %host_value,
                    error = %err,
                    "Could not parse host, using {}",
                    Self::DEFAULT_HOST
                );
                (default_ip, Self::DEFAULT_HOST.to_string())
            }
        };

        let port = parse_or_default(
            Self::PORT_VAR,
            port,
            Self::DEFAULT_PORT,
            |value| value != 0,
            "must not be 0",
        );

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Configuration of the placement engine and algorithm selection.
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    engine: EngineConfig,
    default_algorithm: Algorithm,
}

impl OptimizerConfig {
    const RESOLUTION_VAR: &'static str = "WAREHOUSE_OPT_GRID_RESOLUTION";
    const CLEARANCE_VAR: &'static str = "WAREHOUSE_OPT_CLEARANCE";
    const PATIENCE_VAR: &'static str = "WAREHOUSE_OPT_SCAN_PATIENCE";
    const TIME_BUDGET_VAR: &'static str = "WAREHOUSE_OPT_TIME_BUDGET_MS";
    const MAX_CELLS_VAR: &'static str = "WAREHOUSE_OPT_MAX_GRID_CELLS";
    const MAX_INSTANCES_VAR: &'static str = "WAREHOUSE_OPT_MAX_INSTANCES";
    const DEFAULT_ALGORITHM_VAR: &'static str = "WAREHOUSE_OPT_DEFAULT_ALGORITHM";

    fn from_env() -> Self {
        let resolution = load_with_warning(
            Self::RESOLUTION_VAR,
            EngineConfig::DEFAULT_RESOLUTION,
            |value: f64| value > 0.0 && value.is_finite(),
            "must be greater than 0",
        );
        if resolution != EngineConfig::DEFAULT_RESOLUTION {
            info!(
                resolution,
                "Adjusted grid resolution changes packing density and grid size"
            );
        }

        let clearance = load_with_warning(
            Self::CLEARANCE_VAR,
            EngineConfig::DEFAULT_CLEARANCE,
            |value: f64| value >= 0.0 && value.is_finite(),
            "must not be negative",
        );
        if clearance < EngineConfig::DEFAULT_CLEARANCE {
            warn!(
                clearance,
                "Clearance between item types is below the 1 m safety distance"
            );
        }

        let scan_patience = load_with_warning(
            Self::PATIENCE_VAR,
            EngineConfig::DEFAULT_SCAN_PATIENCE,
            |value: usize| value > 0,
            "must be greater than 0",
        );

        let max_grid_cells = load_with_warning(
            Self::MAX_CELLS_VAR,
            EngineConfig::DEFAULT_MAX_GRID_CELLS,
            |value: u64| value > 0,
            "must be greater than 0",
        );

        let max_instances = load_with_warning(
            Self::MAX_INSTANCES_VAR,
            EngineConfig::DEFAULT_MAX_INSTANCES,
            |value: u64| value > 0,
            "must be greater than 0",
        );

        let time_budget = parse_time_budget(env_string(Self::TIME_BUDGET_VAR));
        let default_algorithm =
            parse_algorithm(env_string(Self::DEFAULT_ALGORITHM_VAR), Algorithm::BinPacking);

        let engine = EngineConfig::builder()
            .resolution(resolution)
            .clearance(clearance)
            .scan_patience(scan_patience)
            .time_budget(time_budget)
            .max_grid_cells(max_grid_cells)
            .max_instances(max_instances)
            .build();

        Self {
            engine,
            default_algorithm,
        }
    }

    /// Returns the configured EngineConfig.
    pub fn engine_config(&self) -> EngineConfig {
        self.engine
    }

    /// Algorithm used when a request names none and no recommendation is available.
    pub fn default_algorithm(&self) -> Algorithm {
        self.default_algorithm
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            default_algorithm: Algorithm::BinPacking,
        }
    }
}

/// Configuration for persisting finished runs.
#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    enabled: bool,
    dir: Option<PathBuf>,
}

impl StoreConfig {
    const DIR_VAR: &'static str = "WAREHOUSE_OPT_STORE_DIR";
    const ENABLED_VAR: &'static str = "WAREHOUSE_OPT_PERSIST_RESULTS";

    fn from_env() -> Self {
        let enabled = env_string(Self::ENABLED_VAR)
            .and_then(|raw| parse_bool(&raw, Self::ENABLED_VAR))
            .unwrap_or(true);
        Self {
            enabled,
            dir: env_string(Self::DIR_VAR).map(PathBuf::from),
        }
    }

    /// Whether finished runs are stored at all.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Directory of the file store; `None` keeps sessions in memory.
    pub fn dir(&self) -> Option<&PathBuf> {
        self.dir.as_ref()
    }
}

fn parse_time_budget(raw: Option<String>) -> Option<Duration> {
    let raw = raw?;
    match raw.parse::<u64>() {
        Ok(0) => {
            warn!(
                var = OptimizerConfig::TIME_BUDGET_VAR,
                "Time budget of 0 ms would reject every item, running without budget"
            );
            None
        }
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(err) => {
            warn!(
                var = OptimizerConfig::TIME_BUDGET_VAR,
                value = %raw,
                error = %err,
                "Could not parse time budget, running without budget"
            );
            None
        }
    }
}

fn parse_algorithm(raw: Option<String>, default: Algorithm) -> Algorithm {
    match raw {
        Some(raw) => raw.parse::<Algorithm>().unwrap_or_else(|err| {
            warn!(
                var = OptimizerConfig::DEFAULT_ALGORITHM_VAR,
                error = %err,
                "Using {}",
                default
            );
            default
        }),
        None => default,
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(var = name, error = %err, "Environment access failed, using default value");
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                var = var_name,
                value = other,
                "Could not interpret value as boolean, using default value"
            );
            None
        }
    }
}

fn load_with_warning<T>(
    var_name: &str,
    default: T,
    validator: impl Fn(T) -> bool,
    invalid_hint: &str,
) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    parse_or_default(var_name, env_string(var_name), default, validator, invalid_hint)
}

fn parse_or_default<T>(
    var_name: &str,
    raw: Option<String>,
    default: T,
    validator: impl Fn(T) -> bool,
    invalid_hint: &str,
) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<T>() {
        Ok(value) if validator(value) => value,
        Ok(_) => {
            warn!(
                var = var_name,
                value = %raw,
                "Invalid value: {}. Using {}",
                invalid_hint,
                default
            );
            default
        }
        Err(err) => {
            warn!(
                var = var_name,
                value = %raw,
                error = %err,
                "Could not parse value. Using {}",
                default
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_flag_accepts_common_spellings() {
        let var = StoreConfig::ENABLED_VAR;
        for raw in ["1", "true", "Yes", " on ", "Y"] {
            assert_eq!(parse_bool(raw, var), Some(true), "{raw:?}");
        }
        for raw in ["0", "FALSE", "no", "  off  ", "n"] {
            assert_eq!(parse_bool(raw, var), Some(false), "{raw:?}");
        }
        for raw in ["", "2", "enabled"] {
            assert_eq!(parse_bool(raw, var), None, "{raw:?}");
        }
    }

    #[test]
    fn test_parse_or_default_validates() {
        let positive = |v: f64| v > 0.0;
        assert_eq!(
            parse_or_default("TEST_VAR", Some("0.25".into()), 0.5, positive, "> 0"),
            0.25
        );
        assert_eq!(
            parse_or_default("TEST_VAR", Some("-1".into()), 0.5, positive, "> 0"),
            0.5
        );
        assert_eq!(
            parse_or_default("TEST_VAR", Some("abc".into()), 0.5, positive, "> 0"),
            0.5
        );
        assert_eq!(parse_or_default("TEST_VAR", None, 0.5, positive, "> 0"), 0.5);
        assert_eq!(
            parse_or_default("TEST_VAR", Some("500".into()), 10usize, |v| v > 0, "> 0"),
            500
        );
    }

    #[test]
    fn test_api_config_falls_back_on_bad_values() {
        let config = ApiConfig::from_values(Some("not-an-ip".into()), Some("0".into()));
        assert_eq!(config.display_host(), "0.0.0.0");
        assert_eq!(config.port(), 8080);
        assert!(config.binds_to_all_interfaces());

        let config = ApiConfig::from_values(Some("127.0.0.1".into()), Some("9000".into()));
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9000");
        assert!(!config.binds_to_all_interfaces());
    }

    #[test]
    fn test_time_budget_parsing() {
        assert_eq!(parse_time_budget(None), None);
        assert_eq!(
            parse_time_budget(Some("250".into())),
            Some(Duration::from_millis(250))
        );
        assert_eq!(parse_time_budget(Some("0".into())), None);
        assert_eq!(parse_time_budget(Some("soon".into())), None);
    }

    #[test]
    fn test_default_algorithm_parsing() {
        assert_eq!(
            parse_algorithm(Some("hybrid".into()), Algorithm::BinPacking),
            Algorithm::Hybrid
        );
        assert_eq!(
            parse_algorithm(Some("ml_enhanced".into()), Algorithm::BinPacking),
            Algorithm::BinPacking
        );
        assert_eq!(parse_algorithm(None, Algorithm::SpaceFilling), Algorithm::SpaceFilling);
    }
}
