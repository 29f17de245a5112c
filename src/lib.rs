//! Verifies that every Mach-O binary inside an application bundle was built
//! for the expected CPU architecture.
pub mod args;
pub mod error;
pub mod header;
pub mod policy;
pub mod report;
pub mod sniff;
pub mod walk;

pub use error::{Error, Result};
pub use walk::scan;
