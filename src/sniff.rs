//! Deciding whether a file is a Mach-O binary from its content rather than
//! its name.
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::Command;

use goblin::mach::fat::FAT_MAGIC;
use goblin::mach::header::{MH_CIGAM, MH_CIGAM_64, MH_MAGIC, MH_MAGIC_64};

use crate::args::ClassifierKind;
use crate::error::{Error, Result};

/// Prefix `file --brief` prints for every kind of Mach-O file.
pub const MACHO_PREFIX: &str = "Mach-O ";

// Java class files share the fat magic. Their major version sits where the
// slice count would be and starts at 45, so anything below is Mach-O and
// goes to the header parser, which rejects counts other than two.
const FIRST_JAVA_CLASS_VERSION: u32 = 45;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    NativeExecutable,
    Other,
}

pub trait Classifier: Send + Sync {
    fn classify(&self, path: &Path) -> Result<Classification>;
}

/// Shells out to `file(1)`.
///
/// A non-zero exit from `file` means it could not classify the path and is
/// treated as [`Classification::Other`]. Failing to run it at all is fatal.
#[derive(Debug, Clone)]
pub struct FileCommand {
    program: String,
}

impl FileCommand {
    pub fn new() -> Self {
        Self::with_program("file")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        FileCommand {
            program: program.into(),
        }
    }
}

impl Default for FileCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for FileCommand {
    fn classify(&self, path: &Path) -> Result<Classification> {
        let output = Command::new(&self.program)
            .arg("--brief")
            .arg("--no-pad")
            .arg(path)
            .output()
            .map_err(|source| Error::ClassifierUnavailable {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            log::trace!(
                "{} exited with {} for {}",
                self.program,
                output.status,
                path.display()
            );
            return Ok(Classification::Other);
        }
        let description = String::from_utf8_lossy(&output.stdout);
        log::trace!("{}: {}", path.display(), description.trim_end());
        Ok(classify_description(&description))
    }
}

/// Classifies a `file --brief` description.
pub fn classify_description(description: &str) -> Classification {
    if description.starts_with(MACHO_PREFIX) {
        Classification::NativeExecutable
    } else {
        Classification::Other
    }
}

/// Recognises Mach-O files by their magic number without spawning anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicSniffer;

impl MagicSniffer {
    pub fn classify_bytes(bytes: &[u8]) -> Classification {
        let word = |offset: usize| {
            bytes
                .get(offset..offset + 4)
                .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        };
        match word(0) {
            Some(MH_MAGIC | MH_CIGAM | MH_MAGIC_64 | MH_CIGAM_64) => {
                Classification::NativeExecutable
            }
            Some(FAT_MAGIC) => match word(4) {
                Some(count) if count < FIRST_JAVA_CLASS_VERSION => {
                    Classification::NativeExecutable
                }
                _ => Classification::Other,
            },
            _ => Classification::Other,
        }
    }
}

impl Classifier for MagicSniffer {
    fn classify(&self, path: &Path) -> Result<Classification> {
        let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut prefix = Vec::with_capacity(8);
        file.by_ref()
            .take(8)
            .read_to_end(&mut prefix)
            .map_err(|e| Error::io(path, e))?;
        Ok(Self::classify_bytes(&prefix))
    }
}

pub fn classifier(kind: ClassifierKind) -> Box<dyn Classifier> {
    match kind {
        ClassifierKind::File => Box::new(FileCommand::new()),
        ClassifierKind::Magic => Box::new(MagicSniffer),
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::header::fixtures;
    use goblin::mach::cputype::CPU_TYPE_ARM64;

    #[test]
    fn file_descriptions() {
        assert_eq!(
            classify_description("Mach-O 64-bit executable arm64"),
            Classification::NativeExecutable
        );
        assert_eq!(
            classify_description(
                "Mach-O universal binary with 2 architectures: [x86_64:Mach-O 64-bit executable x86_64]"
            ),
            Classification::NativeExecutable
        );
        assert_eq!(
            classify_description("ASCII text"),
            Classification::Other
        );
        assert_eq!(
            classify_description("Mach-Object notes"),
            Classification::Other
        );
    }

    #[test]
    fn magic_recognises_thin_and_fat() {
        assert_eq!(
            MagicSniffer::classify_bytes(&fixtures::thin(CPU_TYPE_ARM64)),
            Classification::NativeExecutable
        );
        assert_eq!(
            MagicSniffer::classify_bytes(&fixtures::fat(&[0x07000001, 0x0c000001])),
            Classification::NativeExecutable
        );
        // 32-bit big-endian thin header
        assert_eq!(
            MagicSniffer::classify_bytes(&MH_MAGIC.to_be_bytes()),
            Classification::NativeExecutable
        );
    }

    #[test]
    fn magic_hands_any_small_fat_count_to_the_parser() {
        for count in [0u32, 1, 3, 25, 44] {
            let mut bytes = FAT_MAGIC.to_be_bytes().to_vec();
            bytes.extend_from_slice(&count.to_be_bytes());
            assert_eq!(
                MagicSniffer::classify_bytes(&bytes),
                Classification::NativeExecutable,
                "slice count {count}"
            );
        }
    }

    #[test]
    fn magic_rejects_java_class_and_text() {
        for version in [0x2du8, 0x34] {
            let mut class = FAT_MAGIC.to_be_bytes().to_vec();
            class.extend_from_slice(&[0x00, 0x00, 0x00, version]);
            assert_eq!(MagicSniffer::classify_bytes(&class), Classification::Other);
        }
        assert_eq!(
            MagicSniffer::classify_bytes(b"#!/bin/sh\n"),
            Classification::Other
        );
        assert_eq!(MagicSniffer::classify_bytes(&[]), Classification::Other);
    }

    #[test]
    fn magic_sniffer_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("Electron Framework");
        let txt = dir.path().join("Info.plist");
        std::fs::write(&bin, fixtures::thin(CPU_TYPE_ARM64)).unwrap();
        std::fs::write(&txt, "<plist/>").unwrap();
        assert_eq!(
            MagicSniffer.classify(&bin).unwrap(),
            Classification::NativeExecutable
        );
        assert_eq!(MagicSniffer.classify(&txt).unwrap(), Classification::Other);
    }

    #[test]
    fn missing_classifier_program_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a");
        std::fs::write(&path, "x").unwrap();
        let err = FileCommand::with_program("machverify-no-such-program")
            .classify(&path)
            .unwrap_err();
        assert!(matches!(err, Error::ClassifierUnavailable { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn file_command_reporting_macho_makes_a_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("App");
        std::fs::write(&path, "anything").unwrap();
        let file = fake_file::macho(dir.path());
        assert_eq!(
            file.classify(&path).unwrap(),
            Classification::NativeExecutable
        );
    }

    #[cfg(unix)]
    #[test]
    fn file_command_non_zero_exit_is_not_a_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("App");
        std::fs::write(&path, "anything").unwrap();
        // stdout is ignored once the exit status is non-zero
        let file = fake_file::failing(dir.path());
        assert_eq!(file.classify(&path).unwrap(), Classification::Other);
    }
}
