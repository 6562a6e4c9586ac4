//! Error types for the device engine.
//!
//! Every variant is fatal for the run: there are no retries and no partial
//! results. Callers are expected to report the error and stop.

use std::panic::Location;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("no compute adapter available: {0}")]
    AdapterUnavailable(#[from] wgpu::RequestAdapterError),

    #[error("failed to create compute device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("allocation of {buffer} ({bytes} bytes) failed: {reason}")]
    Allocation {
        buffer: &'static str,
        bytes: u64,
        reason: String,
    },

    #[error("{operation} failed at {location}: {reason}")]
    Launch {
        operation: &'static str,
        location: &'static Location<'static>,
        reason: String,
    },

    #[error("readback of {operation} failed: {reason}")]
    Readback {
        operation: &'static str,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, SimulationError>;

impl SimulationError {
    /// Launch failure attributed to the caller of the `#[track_caller]` chain
    #[track_caller]
    pub(crate) fn launch(operation: &'static str, reason: impl ToString) -> Self {
        Self::Launch {
            operation,
            location: Location::caller(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn readback(operation: &'static str, reason: impl ToString) -> Self {
        Self::Readback {
            operation,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_error_names_operation_and_call_site() {
        let error = SimulationError::launch("force pass", "workgroup count too large");
        let message = error.to_string();
        assert!(message.starts_with("force pass failed at "));
        assert!(message.contains(file!()));
        assert!(message.ends_with("workgroup count too large"));
    }

    #[test]
    fn allocation_error_reports_size() {
        let error = SimulationError::Allocation {
            buffer: "position buffer",
            bytes: 1024,
            reason: "out of memory".into(),
        };
        assert_eq!(
            error.to_string(),
            "allocation of position buffer (1024 bytes) failed: out of memory"
        );
    }
}
