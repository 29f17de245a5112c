use std::path::PathBuf;

/// Fatal conditions that abort a scan.
///
/// A binary built for the wrong architecture is not an error, it is
/// collected into the [`crate::report::Report`] instead.
#[derive(Debug)]
pub enum Error {
    /// Bad invocation: missing `APP_PATH`, unknown architecture, etc.
    Usage(String),
    /// A filesystem operation on `path` failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The external classifier could not be run at all.
    ClassifierUnavailable {
        program: String,
        source: std::io::Error,
    },
    /// A fat header declared a slice count other than two.
    UnsupportedSliceCount { path: PathBuf, count: u32 },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } | Error::ClassifierUnavailable { source, .. } => Some(source),
            Error::Usage(_) | Error::UnsupportedSliceCount { .. } => None,
        }
    }
}

impl From<walkdir::Error> for Error {
    fn from(e: walkdir::Error) -> Self {
        let path = e.path().map(PathBuf::from).unwrap_or_default();
        Error::Io {
            path,
            source: e.into(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Usage(s) => write!(f, "{}", s),
            Error::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            Error::ClassifierUnavailable { program, source } => {
                write!(f, "unable to run {}: {}", program, source)
            }
            Error::UnsupportedSliceCount { path, count } => write!(
                f,
                "{}: universal binary declares {} architectures, expected 2",
                path.display(),
                count
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slice_count_message_names_path_and_count() {
        let e = Error::UnsupportedSliceCount {
            path: PathBuf::from("/App/lib.dylib"),
            count: 3,
        };
        assert_eq!(
            e.to_string(),
            "/App/lib.dylib: universal binary declares 3 architectures, expected 2"
        );
    }

    #[test]
    fn io_error_exposes_source() {
        use std::error::Error as _;
        let e = Error::io(
            "/missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(e.source().is_some());
        assert_eq!(e.to_string(), "/missing: gone");
    }

    #[test]
    fn walk_error_keeps_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let walk_err = walkdir::WalkDir::new(&missing)
            .into_iter()
            .next()
            .unwrap()
            .unwrap_err();
        match Error::from(walk_err) {
            Error::Io { path, source } => {
                assert_eq!(path, missing);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
