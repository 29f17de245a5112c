use std::{env::args_os, path::PathBuf};

use machverify::{
    args::ArchitectureTarget,
    header::{read_header, ParsedHeader},
    policy::{cpu_architecture, evaluate},
};

const TARGETS: [ArchitectureTarget; 3] = [
    ArchitectureTarget::X64,
    ArchitectureTarget::ARM64,
    ArchitectureTarget::Universal,
];

fn main() {
    let paths: Vec<PathBuf> = args_os().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        eprintln!("usage: dumpheader <FILE>...");
        std::process::exit(1);
    }
    let mut failed = false;
    for path in paths {
        let header = match read_header(&path) {
            Ok(header) => header,
            Err(e) => {
                eprintln!("{e}");
                failed = true;
                continue;
            }
        };
        println!("{}: {}", path.display(), header);
        if let ParsedHeader::Fat { slices, .. } = &header {
            for (i, slice) in slices.iter().enumerate() {
                let arch = cpu_architecture(slice.cpu_type)
                    .map(|arch| arch.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                println!(
                    "  slice {i}: cputype {:#010x} cpusubtype {:#010x} ({arch})",
                    slice.cpu_type, slice.cpu_subtype
                );
            }
        }
        for target in TARGETS {
            println!("  {target}: {:?}", evaluate(&header, target));
        }
    }
    if failed {
        std::process::exit(1);
    }
}
