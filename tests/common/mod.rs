#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const ARM64: u32 = 0x0100000c;
pub const ARM64_SWAPPED: u32 = 0x0c000001;
pub const X86_64: u32 = 0x01000007;
pub const X86_64_SWAPPED: u32 = 0x07000001;

/// A 64-bit thin Mach-O header.
pub fn thin(cpu_type: u32) -> Vec<u8> {
    let mut bytes = 0xfeedfacfu32.to_le_bytes().to_vec();
    bytes.extend_from_slice(&cpu_type.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 24]);
    bytes
}

/// A fat header as written by lipo: everything big-endian.
pub fn fat(cpu_types: &[u32]) -> Vec<u8> {
    let mut bytes = 0xcafebabeu32.to_be_bytes().to_vec();
    bytes.extend_from_slice(&(cpu_types.len() as u32).to_be_bytes());
    for cpu_type in cpu_types {
        bytes.extend_from_slice(&cpu_type.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
    }
    bytes
}

pub struct Bundle {
    tmp: TempDir,
}

impl Bundle {
    pub fn new() -> Self {
        Bundle {
            tmp: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write fixture");
        fs::canonicalize(&path).expect("canonicalize fixture")
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("machverify");
        cmd.env("APP_PATH", self.root())
            .env("MACHVERIFY_CLASSIFIER", "magic")
            .env_remove("RUST_LOG");
        cmd
    }
}
