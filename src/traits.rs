use std::io::{Read, Result};

/// Implementing this trait allows library consumers to provide vc0 files from any source
/// (a directory, an archive, an evidence container), as long as each file can be read.
pub trait FileProvider {
    /// Provides an iterator of vc0 log files, in a stable order. Lock files (`lck.*`) should not be included.
    fn vc0_files(&self) -> Box<dyn Iterator<Item = Box<dyn SourceFile>>>;
}

/// Defines an interface for providing a single vc0 file.
pub trait SourceFile {
    /// A reader for the given source file. Opening may fail, the failure only affects this file.
    fn reader(&mut self) -> Result<&mut dyn Read>;
    /// The source path of the file on the machine from which it was collected, used when reporting results.
    fn source_path(&self) -> &str;
}
