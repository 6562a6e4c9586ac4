//! Run configuration from the command line and environment
//!
//! ```text
//! nbody [BODY_COUNT] [--headless [TICKS]]
//! ```
//!
//! `BODY_COUNT` falls back to `NBODY_COUNT`, then to the default scene size.
//! The time step comes from `NBODY_DT`.

use nbody_physics::{DEFAULT_BODY_COUNT, DEFAULT_DT};
use thiserror::Error;

/// Ticks run by `--headless` when no count is given
pub const DEFAULT_HEADLESS_TICKS: u64 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Window with the live point cloud
    Interactive,
    /// No window: run `ticks` steps and report throughput
    Headless { ticks: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunConfig {
    pub body_count: u32,
    pub dt: f32,
    pub mode: Mode,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid body count {0:?}: expected a positive integer")]
    BodyCount(String),

    #[error("invalid time step {0:?}: expected a positive number")]
    TimeStep(String),

    #[error("unexpected argument {0:?}")]
    UnexpectedArgument(String),
}

fn parse_body_count(value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(ConfigError::BodyCount(value.to_string())),
    }
}

fn parse_dt(value: &str) -> Result<f32, ConfigError> {
    match value.trim().parse::<f32>() {
        Ok(dt) if dt.is_finite() && dt > 0.0 => Ok(dt),
        _ => Err(ConfigError::TimeStep(value.to_string())),
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            body_count: DEFAULT_BODY_COUNT,
            dt: DEFAULT_DT,
            mode: Mode::Interactive,
        }
    }
}

impl RunConfig {
    /// Read the process arguments and environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::parse(std::env::args().skip(1), |key| std::env::var(key).ok())
    }

    /// `args` excludes the program name. `var` looks up environment variables.
    pub fn parse(
        args: impl IntoIterator<Item = String>,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = var("NBODY_COUNT") {
            config.body_count = parse_body_count(&value)?;
        }
        if let Some(value) = var("NBODY_DT") {
            config.dt = parse_dt(&value)?;
        }

        let mut args = args.into_iter().peekable();
        let mut count_given = false;

        while let Some(arg) = args.next() {
            if arg == "--headless" {
                let ticks = match args.peek().map(|next| next.parse::<u64>()) {
                    Some(Ok(ticks)) => {
                        args.next();
                        ticks
                    }
                    _ => DEFAULT_HEADLESS_TICKS,
                };
                config.mode = Mode::Headless { ticks };
            } else if !count_given && !arg.starts_with('-') {
                config.body_count = parse_body_count(&arg)?;
                count_given = true;
            } else {
                return Err(ConfigError::UnexpectedArgument(arg));
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str], env: &[(&str, &str)]) -> Result<RunConfig, ConfigError> {
        let env: Vec<(String, String)> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RunConfig::parse(args.iter().map(|s| s.to_string()), |key| {
            env.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
    }

    #[test]
    fn defaults_without_input() {
        assert_eq!(parse(&[], &[]), Ok(RunConfig::default()));
    }

    #[test]
    fn argument_overrides_environment() {
        let config = parse(&["2000"], &[("NBODY_COUNT", "300")]).unwrap();
        assert_eq!(config.body_count, 2000);

        let config = parse(&[], &[("NBODY_COUNT", "300")]).unwrap();
        assert_eq!(config.body_count, 300);
    }

    #[test]
    fn time_step_from_environment() {
        let config = parse(&[], &[("NBODY_DT", "0.05")]).unwrap();
        assert_eq!(config.dt, 0.05);
        assert!(matches!(
            parse(&[], &[("NBODY_DT", "-1")]),
            Err(ConfigError::TimeStep(_))
        ));
        assert!(matches!(
            parse(&[], &[("NBODY_DT", "NaN")]),
            Err(ConfigError::TimeStep(_))
        ));
    }

    #[test]
    fn headless_with_and_without_ticks() {
        let config = parse(&["--headless", "50"], &[]).unwrap();
        assert_eq!(config.mode, Mode::Headless { ticks: 50 });

        let config = parse(&["--headless"], &[]).unwrap();
        assert_eq!(
            config.mode,
            Mode::Headless {
                ticks: DEFAULT_HEADLESS_TICKS
            }
        );

        let config = parse(&["1024", "--headless", "10"], &[]).unwrap();
        assert_eq!(config.body_count, 1024);
        assert_eq!(config.mode, Mode::Headless { ticks: 10 });
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            parse(&["0"], &[]),
            Err(ConfigError::BodyCount("0".into()))
        );
        assert_eq!(
            parse(&["many"], &[]),
            Err(ConfigError::BodyCount("many".into()))
        );
        assert_eq!(
            parse(&["10", "20"], &[]),
            Err(ConfigError::UnexpectedArgument("20".into()))
        );
        assert_eq!(
            parse(&["--fast"], &[]),
            Err(ConfigError::UnexpectedArgument("--fast".into()))
        );
    }
}
