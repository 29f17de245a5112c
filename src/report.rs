use std::io::Write;
use std::path::PathBuf;

use crate::args::ArchitectureTarget;

/// Outcome of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub target: ArchitectureTarget,
    /// Number of Mach-O binaries whose header was inspected.
    pub checked: usize,
    /// Binaries built for the wrong architecture, in traversal order.
    pub invalid_files: Vec<PathBuf>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.invalid_files.is_empty()
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// Writes the human readable verdict, listing every invalid file.
    pub fn write_summary<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        if self.is_success() {
            writeln!(out, "All files are valid")?;
            return Ok(());
        }
        writeln!(
            out,
            "The following files are built for the wrong architecture:"
        )?;
        for file in &self.invalid_files {
            writeln!(out, "{}", file.display())?;
        }
        writeln!(
            out,
            "FAIL: {} of {} binaries are not {}",
            self.invalid_files.len(),
            self.checked,
            self.target
        )
    }
}
