use thiserror::Error;

/// Typed errors returned by `IndexBuilder` when it refuses input. The
/// builder validates before mutating, so a rejected call leaves its state
/// as it was.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("incompatible index format version {found} (builder writes {expected})")]
    IncompatibleVersion { found: u32, expected: u32 },
    #[error("no repository registered before adding {0:?}")]
    NoRepository(String),
    #[error("too many repositories (max {max})")]
    TooManyRepositories { max: usize },
    #[error("repository {repo:?} declares {count} branches (max {max})")]
    TooManyBranches {
        repo: String,
        count: usize,
        max: usize,
    },
    #[error("too many languages (max {max})")]
    TooManyLanguages { max: usize },
    #[error("invalid document name {0:?}")]
    InvalidName(String),
    #[error("{name}: content is {size} bytes (max {max})")]
    ContentTooLarge {
        name: String,
        size: usize,
        max: usize,
    },
    #[error("{name}: {sections} symbol sections but {symbols} symbol records")]
    SymbolMismatch {
        name: String,
        sections: usize,
        symbols: usize,
    },
    #[error("{name}: symbol section {index} ({start}..{end}) is out of order or out of bounds")]
    InvalidSection {
        name: String,
        index: usize,
        start: u32,
        end: u32,
    },
    #[error("{name}: branch {branch:?} not found in repository {repo:?}")]
    UnknownBranch {
        name: String,
        branch: String,
        repo: String,
    },
    #[error("{name}: sub-repository path {path:?} not declared by repository {repo:?}")]
    UnknownSubRepo {
        name: String,
        path: String,
        repo: String,
    },
    #[error("{name}: {field} is {len} bytes (max {max})")]
    FieldTooLong {
        name: String,
        field: &'static str,
        len: usize,
        max: usize,
    },
}
