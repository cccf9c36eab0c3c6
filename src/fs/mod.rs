//! Filesystem utilities.
//!
//! This module provides utilities that touch the filesystem, currently the
//! logger used by every drive routine.
//!
//! # Logging
//!
//! The `logger` submodule provides a logger that writes to both the console
//! and `log.txt` (or a file of your choosing). On the robot this lands on the
//! SD card, which helps with issues that only happen on the field.
//!
//! # Example
//!
//! ```ignore
//! use autodrive::fs::logger;
//! use log::{info, LevelFilter};
//!
//! // Initialize the logger at program start
//! logger::init(LevelFilter::Debug).expect("Failed to initialize logger");
//!
//! info!("Robot initialized successfully");
//! ```

/// Console and file logging.
pub mod logger;
