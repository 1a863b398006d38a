//! Trait seams for the package manager.
//!
//! Storage access and process execution sit behind traits so the download and
//! install workflow can be driven by in-memory fakes in tests.

use std::path::Path;

use tokio_util::sync::CancellationToken;

use super::error::ManagerResult;

/// Read access to a bucket of package archives.
pub trait ObjectStore {
    /// Human-readable bucket identifier used in logs and errors.
    fn bucket(&self) -> &str;

    /// Fetch `object` and write it to `dest`.
    ///
    /// Returns the number of bytes written. Implementations check `cancel`
    /// before starting and between chunks.
    fn fetch(&self, object: &str, dest: &Path, cancel: &CancellationToken) -> ManagerResult<u64>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for Box<T> {
    fn bucket(&self) -> &str {
        (**self).bucket()
    }

    fn fetch(&self, object: &str, dest: &Path, cancel: &CancellationToken) -> ManagerResult<u64> {
        (**self).fetch(object, dest, cancel)
    }
}

/// Runs external commands to completion.
pub trait CommandRunner {
    /// Run `program` with `args`, failing on a non-zero exit.
    fn run(&self, program: &Path, args: &[String], cancel: &CancellationToken)
        -> ManagerResult<()>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for Box<T> {
    fn run(
        &self,
        program: &Path,
        args: &[String],
        cancel: &CancellationToken,
    ) -> ManagerResult<()> {
        (**self).run(program, args, cancel)
    }
}
