use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not list directory {}: {source}", dir.display())]
    ListDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not delete backup {}: {source}", path.display())]
    RemoveBackup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not rename backup {} into {}: {source}", from.display(), to.display())]
    RenameBackup {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not retire active file {} into {}: {source}", from.display(), to.display())]
    RenameActive {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not remove active file {}: {source}", path.display())]
    RemoveActive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not create active file {}: {source}", path.display())]
    CreateActive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write to active file failed: {0}")]
    Write(#[source] io::Error),
    #[error("flush of active file failed: {0}")]
    Flush(#[source] io::Error),
    #[error("close of active file failed: {0}")]
    Close(#[source] io::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("line reader thread panicked")]
    IngestPanicked,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
