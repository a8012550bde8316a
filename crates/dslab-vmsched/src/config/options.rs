//! Parsing of config value strings.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::SchedulingError;

/// Splits config value string into name and options.
/// Example: `Stochastic[seed=42]` is split into name `Stochastic` and options string `seed=42`.
pub fn parse_config_value(config_str: &str) -> (String, Option<String>) {
    match config_str.split_once('[') {
        Some((l, r)) => (l.trim().to_string(), Some(r.replace(']', ""))),
        None => (config_str.trim().to_string(), None),
    }
}

/// Parses options string into map from option names to values.
///
/// # Examples
///
/// ```rust
/// use dslab_vmsched::config::options::parse_options;
///
/// let options = parse_options("value=0.8,path=trace.txt");
/// assert_eq!(options.get("value").unwrap(), "0.8");
/// assert_eq!(options.get("path").unwrap(), "trace.txt");
/// assert_eq!(options.get("seed"), None);
/// ```
pub fn parse_options(options_str: &str) -> HashMap<String, String> {
    let mut options = HashMap::new();
    for option_str in options_str.split(',') {
        if let Some((name, value)) = option_str.split_once('=') {
            options.insert(name.trim().to_string(), value.trim().to_string());
        }
    }
    options
}

/// Returns parsed value of required option.
pub fn required_option<T: FromStr>(options: &HashMap<String, String>, name: &str) -> Result<T, SchedulingError> {
    let value = options
        .get(name)
        .ok_or_else(|| SchedulingError::Config(format!("option '{}' is missing", name)))?;
    value
        .parse()
        .map_err(|_| SchedulingError::Config(format!("bad value '{}' of option '{}'", value, name)))
}
