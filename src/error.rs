use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Format Errors
/// - [`Error::Malformed`] - Corrupted or structurally invalid bitstream container
/// - [`Error::OutOfBounds`] - Attempted to read beyond the input boundaries
/// - [`Error::NotSupported`] - The input is not a `.swiftsourceinfo` file
/// - [`Error::Empty`] - Empty input provided
///
/// ## I/O Errors
/// - [`Error::FileError`] - Filesystem I/O errors, surfaced verbatim
///
/// # Examples
///
/// ```rust,no_run
/// use swiftsourceinfo::{Error, FileBuffer};
/// use std::path::Path;
///
/// match FileBuffer::from_file(Path::new("Module.swiftsourceinfo")) {
///     Ok(buffer) => {
///         println!("Loaded {} bytes", buffer.data().len());
///     }
///     Err(Error::FileError(io_err)) => {
///         eprintln!("I/O error: {}", io_err);
///     }
///     Err(e) => {
///         eprintln!("Other error: {}", e);
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The container is damaged and could not be parsed.
    ///
    /// This error indicates that the bitstream structure is corrupted or doesn't
    /// conform to the `.swiftsourceinfo` format. The error includes the source
    /// location where the malformation was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while reading the input.
    ///
    /// This error occurs when trying to read bits or bytes beyond the end of the
    /// buffer, typically on a truncated integer, blob, or region.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The input does not start with the `.swiftsourceinfo` magic signature.
    #[error("The input is not a .swiftsourceinfo file")]
    NotSupported,

    /// An empty input was provided for parsing.
    #[error("Provided input was empty")]
    Empty,

    /// An error occurred while accessing the filesystem.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// A generic error, with a custom message.
    #[error("{0}")]
    Error(String),
}
