//! Backend selection.
//!
//! Every [`AccelEngine`](crate::ops::dispatch::AccelEngine) is built from an
//! [`EngineConfig`]. The config names the accelerator backend to attach and a
//! couple of adapter hints; nothing here is process-global, so two engines in
//! one process may use different backends.
//!
//! # Supported Backends
//!
//! - `Cpu`: no accelerator, every operation runs the CPU reference kernel (default).
//! - `Host`: in-process reference device implementing the accelerator contract.
//! - `Wgpu`: GPU compute through `wgpu` (requires the `wgpu` feature).
//!
//! # Environment
//!
//! [`EngineConfig::from_env`] reads `ACCEL_ENGINE_BACKEND` (`cpu`, `host`,
//! `wgpu`) and `ACCEL_ENGINE_POWER` (`low`, `high`).

use core::convert::TryFrom;
use core::str::FromStr;
use thiserror::Error;

/// Environment variable naming the backend.
pub const BACKEND_ENV: &str = "ACCEL_ENGINE_BACKEND";

/// Environment variable naming the adapter power preference.
pub const POWER_ENV: &str = "ACCEL_ENGINE_POWER";

/// Enumeration of accelerator backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Backend {
    /// No accelerator; the engine always falls back (default).
    #[default]
    Cpu = 0,
    /// In-process reference device.
    Host,
    /// GPU device driven through `wgpu`.
    Wgpu,
}

impl Backend {
    /// Lower-case name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Host => "host",
            Self::Wgpu => "wgpu",
        }
    }
}

/// A backend or power preference name that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseConfigError {
    kind: &'static str,
    value: String,
}

impl TryFrom<u8> for Backend {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Cpu),
            1 => Ok(Self::Host),
            2 => Ok(Self::Wgpu),
            other => Err(other),
        }
    }
}

impl FromStr for Backend {
    type Err = ParseConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" | "none" => Ok(Self::Cpu),
            "host" => Ok(Self::Host),
            "wgpu" | "gpu" => Ok(Self::Wgpu),
            _ => Err(ParseConfigError {
                kind: "backend",
                value: s.to_owned(),
            }),
        }
    }
}

/// Adapter power preference for GPU backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PowerPreference {
    /// Let the driver decide.
    #[default]
    Default,
    /// Prefer an integrated or otherwise low-power adapter.
    LowPower,
    /// Prefer a discrete adapter.
    HighPerformance,
}

impl FromStr for PowerPreference {
    type Err = ParseConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "default" => Ok(Self::Default),
            "low" | "low-power" => Ok(Self::LowPower),
            "high" | "high-performance" => Ok(Self::HighPerformance),
            _ => Err(ParseConfigError {
                kind: "power preference",
                value: s.to_owned(),
            }),
        }
    }
}

/// Construction parameters of an engine.
///
/// # Example
///
/// ```
/// use accel_engine::backend::{Backend, EngineConfig, PowerPreference};
///
/// let config = EngineConfig::default()
///     .with_backend(Backend::Host)
///     .with_power_preference(PowerPreference::LowPower);
/// assert_eq!(config.backend(), Backend::Host);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineConfig {
    backend: Backend,
    power_preference: PowerPreference,
    force_fallback_adapter: bool,
}

impl EngineConfig {
    /// Config for `backend` with default hints.
    #[must_use]
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    /// Reads the config from the process environment.
    ///
    /// Unset variables keep their defaults; unparsable values are logged and
    /// ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = lookup(BACKEND_ENV) {
            match value.parse() {
                Ok(backend) => config.backend = backend,
                Err(e) => log::warn!("ignoring {BACKEND_ENV}: {e}"),
            }
        }
        if let Some(value) = lookup(POWER_ENV) {
            match value.parse() {
                Ok(power) => config.power_preference = power,
                Err(e) => log::warn!("ignoring {POWER_ENV}: {e}"),
            }
        }
        config
    }

    /// Sets the backend.
    #[must_use]
    pub const fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the adapter power preference.
    #[must_use]
    pub const fn with_power_preference(mut self, power: PowerPreference) -> Self {
        self.power_preference = power;
        self
    }

    /// Requests a software adapter even when hardware is present.
    #[must_use]
    pub const fn with_force_fallback_adapter(mut self, force: bool) -> Self {
        self.force_fallback_adapter = force;
        self
    }

    /// Selected backend.
    #[must_use]
    pub const fn backend(&self) -> Backend {
        self.backend
    }

    /// Adapter power preference.
    #[must_use]
    pub const fn power_preference(&self) -> PowerPreference {
        self.power_preference
    }

    /// Whether a software adapter is requested.
    #[must_use]
    pub const fn force_fallback_adapter(&self) -> bool {
        self.force_fallback_adapter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_round_trips_through_u8() {
        for backend in [Backend::Cpu, Backend::Host, Backend::Wgpu] {
            assert_eq!(Backend::try_from(backend as u8), Ok(backend));
        }
        assert_eq!(Backend::try_from(7), Err(7));
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!("cpu".parse(), Ok(Backend::Cpu));
        assert_eq!(" Host ".parse(), Ok(Backend::Host));
        assert_eq!("WGPU".parse(), Ok(Backend::Wgpu));
        assert!("cuda".parse::<Backend>().is_err());
        for backend in [Backend::Cpu, Backend::Host, Backend::Wgpu] {
            assert_eq!(backend.as_str().parse(), Ok(backend));
        }
    }

    #[test]
    fn env_lookup_overrides_defaults() {
        let config = EngineConfig::from_lookup(|key| match key {
            BACKEND_ENV => Some("host".into()),
            POWER_ENV => Some("high".into()),
            _ => None,
        });
        assert_eq!(config.backend(), Backend::Host);
        assert_eq!(config.power_preference(), PowerPreference::HighPerformance);
        assert!(!config.force_fallback_adapter());
    }

    #[test]
    fn bad_env_values_keep_defaults() {
        let config = EngineConfig::from_lookup(|key| match key {
            BACKEND_ENV => Some("tpu".into()),
            _ => None,
        });
        assert_eq!(config, EngineConfig::default());
    }
}
