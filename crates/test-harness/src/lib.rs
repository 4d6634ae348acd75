//! Test harness for nestway
//!
//! Drives the protocol core without a display server or toolkit.
//!
//! # Modules
//!
//! - `registry`: Recording stand-in for the wire runtime
//! - `host`: Scripted stand-in for the host toolkit
//! - `headless`: [`TestCompositor`], playing clients and host against the core
//! - `assertions`: Protocol-level assertions over recorded events
//! - `fixtures`: Test fixture helpers

pub mod assertions;
pub mod fixtures;
pub mod headless;
pub mod host;
pub mod registry;

use std::sync::Once;

pub use headless::{PopupHandle, TestClient, TestCompositor, TestError, Toplevel};
pub use host::{HostCall, RecordingTarget, ScriptedHost};
pub use registry::{PostedError, RecordingRegistry, SentEvent};

static LOGGING: Once = Once::new();

/// Route `tracing` output through the test writer, filtered by `RUST_LOG`
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
