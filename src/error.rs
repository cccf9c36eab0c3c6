//! Errors returned by configuration, routing and moves.

use snafu::Snafu;

use crate::peripherals::PortError;

/// Everything that can stop a drive routine.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DriveError {
    /// A drive configuration value is zero, negative or not finite.
    #[snafu(display("invalid drive configuration: {field} must be positive and finite, got {value}"))]
    InvalidConfig {
        /// The offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A move command failed validation before any motor was touched.
    #[snafu(display("invalid move command: {reason}"))]
    InvalidCommand {
        /// Why the command was rejected.
        reason: &'static str,
    },

    /// A requested field position lies outside the field.
    #[snafu(display("target ({x:.1}, {y:.1}) is outside the {size:.0} inch field"))]
    OutOfField {
        /// Requested x in inches.
        x:    f64,
        /// Requested y in inches.
        y:    f64,
        /// Side length of the square field in inches.
        size: f64,
    },

    /// A motor port failed.
    #[snafu(display("{source}"), context(false))]
    Port {
        /// The port fault.
        source: PortError,
    },

    /// The configuration file could not be read.
    #[snafu(display("could not read configuration {path}: {source}"))]
    ConfigRead {
        /// Path that was read.
        path:   String,
        /// The I/O failure.
        source: std::io::Error,
    },

    /// The configuration file is not valid.
    #[snafu(display("could not parse configuration: {source}"))]
    ConfigParse {
        /// The parser failure.
        source: serde_json::Error,
    },
}

/// Result alias used throughout the crate.
pub type Result<T, E = DriveError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_faults_convert() {
        fn fails() -> Result<()> {
            Err(PortError::new("motor 2 unplugged"))?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(matches!(err, DriveError::Port { .. }));
        assert_eq!(err.to_string(), "motor port fault: motor 2 unplugged");
    }

    #[test]
    fn config_messages_name_the_field() {
        let err = DriveError::InvalidConfig {
            field: "wheel_diameter_inches",
            value: -1.0,
        };
        assert!(err.to_string().contains("wheel_diameter_inches"));
    }
}
