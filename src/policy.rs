//! Which CPU types are acceptable for a given [`ArchitectureTarget`].
//!
//! Every recognised architecture has two acceptable codes: the native
//! `CPU_TYPE_*` value and its byte-swapped form. Fat slice records are
//! stored big-endian but read little-endian, so both spellings show up.
use goblin::mach::cputype::{CpuType, CPU_TYPE_ARM64, CPU_TYPE_X86_64};
use target_lexicon::{Aarch64Architecture, Architecture};

use crate::args::ArchitectureTarget;
use crate::header::ParsedHeader;

pub const MACHO_ARM64_CPU_TYPES: [CpuType; 2] = [CPU_TYPE_ARM64.swap_bytes(), CPU_TYPE_ARM64];
pub const MACHO_X86_64_CPU_TYPES: [CpuType; 2] =
    [CPU_TYPE_X86_64.swap_bytes(), CPU_TYPE_X86_64];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    Invalid,
}

pub fn is_arm64(cpu_type: CpuType) -> bool {
    MACHO_ARM64_CPU_TYPES.contains(&cpu_type)
}

pub fn is_x86_64(cpu_type: CpuType) -> bool {
    MACHO_X86_64_CPU_TYPES.contains(&cpu_type)
}

/// Maps a CPU type code, in either spelling, to the architecture it names.
pub fn cpu_architecture(cpu_type: CpuType) -> Option<Architecture> {
    if is_arm64(cpu_type) {
        Some(Architecture::Aarch64(Aarch64Architecture::Aarch64))
    } else if is_x86_64(cpu_type) {
        Some(Architecture::X86_64)
    } else {
        None
    }
}

pub(crate) fn describe_cpu_type(cpu_type: CpuType) -> String {
    match cpu_architecture(cpu_type) {
        Some(arch) => arch.to_string(),
        None => format!("unknown cpu type {:#010x}", cpu_type),
    }
}

fn matches_target(cpu_type: CpuType, target: ArchitectureTarget) -> bool {
    match target {
        ArchitectureTarget::X64 => is_x86_64(cpu_type),
        ArchitectureTarget::ARM64 => is_arm64(cpu_type),
        ArchitectureTarget::Universal => false,
    }
}

/// Decides whether a binary with `header` is acceptable for `target`.
///
/// Thin binaries must match `target` exactly and are never acceptable in a
/// universal build. Fat binaries only need every slice to be a recognised
/// architecture, whatever the target.
pub fn evaluate(header: &ParsedHeader, target: ArchitectureTarget) -> Verdict {
    let ok = match header {
        ParsedHeader::SingleArch { cpu_type, .. } => matches_target(*cpu_type, target),
        ParsedHeader::Fat { slices, .. } => slices
            .iter()
            .all(|slice| is_arm64(slice.cpu_type) || is_x86_64(slice.cpu_type)),
        ParsedHeader::Unrecognized => true,
    };
    if ok {
        Verdict::Ok
    } else {
        Verdict::Invalid
    }
}
