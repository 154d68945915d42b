use crate::backup::result_error::{AddFunctionName, AddMsg};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    StripPrefix(#[from] std::path::StripPrefixError),
    #[error("storage mount {0:?} is not an active mount point")]
    MountNotActive(PathBuf),
    #[error("backup path {0:?} does not exist")]
    MissingBackup(PathBuf),
    #[error("entry {entry:?} not found in backup {backup:?}")]
    EntryNotFound { backup: PathBuf, entry: PathBuf },
    #[error("entry path {0:?} must be relative and must not contain '..'")]
    UnsafeEntryPath(PathBuf),
    #[error("no backup with number {0}, run `list` first")]
    NoSuchBackup(usize),
    #[error("unrecognized setting key {0:?}")]
    UnknownSetting(String),
    #[error("invalid value {value:?} for setting {key:?}")]
    InvalidSettingValue { key: String, value: String },
    #[error("webhook returned status {0}")]
    WebhookStatus(reqwest::StatusCode),
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("in {}:\n{}", fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithFnName { fn_name: String, error: Box<Error> },
}

impl<S: Into<String>> AddMsg<S> for Error {
    fn add_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl<S: Into<String>> AddFunctionName<S> for Error {
    fn add_fn_name(self, fn_name: S) -> Self {
        Self::WithFnName {
            fn_name: fn_name.into(),
            error: Box::new(self),
        }
    }
}

impl Error {
    /// True for failures that abort an operation before any write happened.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::MountNotActive(_) | Error::MissingBackup(_))
    }
}
