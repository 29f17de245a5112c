use std::ffi::OsString;
use std::fmt::Display;
use std::{path::PathBuf, str::FromStr};

use crate::error::Error;

/// Environment variable naming the bundle to scan.
pub const APP_PATH_ENV: &str = "APP_PATH";
/// Environment variable selecting the classifier backend.
pub const CLASSIFIER_ENV: &str = "MACHVERIFY_CLASSIFIER";

/// The architecture a bundle is expected to be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchitectureTarget {
    X64,
    ARM64,
    /// Every binary must be a fat binary with an x64 and an arm64 slice.
    Universal,
}

impl Display for ArchitectureTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchitectureTarget::X64 => write!(f, "x64"),
            ArchitectureTarget::ARM64 => write!(f, "arm64"),
            ArchitectureTarget::Universal => write!(f, "universal"),
        }
    }
}

impl FromStr for ArchitectureTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use ArchitectureTarget::*;
        match &s.to_lowercase()[..] {
            "x64" => Ok(X64),
            "arm64" => Ok(ARM64),
            "universal" => Ok(Universal),
            _ => Err(format!("Invalid architecture {s} to check")),
        }
    }
}

/// Which backend decides whether a file is a Mach-O binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    /// Ask `file(1)`.
    File,
    /// Look at the magic number ourselves.
    Magic,
}

impl FromStr for ClassifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &s.to_lowercase()[..] {
            "file" => Ok(ClassifierKind::File),
            "magic" => Ok(ClassifierKind::Magic),
            _ => Err(format!("Unknown classifier {s}")),
        }
    }
}

#[derive(Debug)]
pub struct Args {
    pub target: ArchitectureTarget,
    pub app_path: PathBuf,
    pub classifier: ClassifierKind,
}

fn os_to_string(value: OsString) -> Result<String, Error> {
    value
        .into_string()
        .map_err(|v| Error::Usage(format!("{} is not valid UTF-8", v.to_string_lossy())))
}

impl Args {
    pub fn from_env() -> Result<Self, Error> {
        let mut args = std::env::args_os();
        // First arg is the name of the executable.
        args.next();
        Self::parse(args, |key| std::env::var_os(key))
    }

    /// Parses `args` (without the executable name), looking up environment
    /// variables through `env`.
    pub fn parse<I, E>(args: I, env: E) -> Result<Self, Error>
    where
        I: IntoIterator<Item = OsString>,
        E: Fn(&str) -> Option<OsString>,
    {
        let mut target: Option<ArchitectureTarget> = None;
        let mut app_path: Option<PathBuf> = env(APP_PATH_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let mut classifier = match env(CLASSIFIER_ENV) {
            Some(value) => os_to_string(value)?.parse().map_err(Error::Usage)?,
            None => ClassifierKind::File,
        };

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "-help" || arg == "--help" {
                return Err(Error::Usage("help requested".into()));
            } else if arg == "-app_path" {
                let value = args
                    .next()
                    .ok_or_else(|| Error::Usage("-app_path requires a value".into()))?;
                app_path = Some(value.into());
            } else if arg == "-classifier" {
                let value = args
                    .next()
                    .ok_or_else(|| Error::Usage("-classifier requires a value".into()))?;
                classifier = os_to_string(value)?.parse().map_err(Error::Usage)?;
            } else if arg.to_string_lossy().starts_with('-') {
                log::warn!("Unknown flag {}", arg.to_string_lossy());
            } else if target.is_none() {
                target = Some(os_to_string(arg)?.parse().map_err(Error::Usage)?);
            } else {
                return Err(Error::Usage(format!(
                    "Unexpected argument {}",
                    arg.to_string_lossy()
                )));
            }
        }

        let target = target.ok_or_else(|| Error::Usage("<ARCH> must be provided".into()))?;
        let app_path = app_path.ok_or_else(|| Error::Usage(format!("{APP_PATH_ENV} not set")))?;

        Ok(Args {
            target,
            app_path,
            classifier,
        })
    }
}

pub fn usage() {
    eprintln!(
        r#"
machverify <ARCH>

Checks that every Mach-O binary under $APP_PATH is built for <ARCH>,
one of x64, arm64 or universal.

Options:

-help                         Print this message
-app_path <DIR>               Bundle to scan (overrides $APP_PATH)
-classifier <file|magic>      How binaries are recognised (default: file,
                              or $MACHVERIFY_CLASSIFIER)

Exits with status 1 if any binary is built for the wrong architecture.
"#
    )
}
