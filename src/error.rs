use thiserror::Error;

use crate::model::Token;

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
/// The instrumentation pass, the model I/O layer and the reference interpreter return
/// errors. The runtime [`crate::tracker::DisposeRegistry`] never does: tracking anomalies
/// are written to the configured sink instead.
///
/// # Error Categories
///
/// ## Structural Errors (fatal to a weaving pass)
/// - [`Error::MissingCoreReference`] - The model does not reference a core library
/// - [`Error::TypeNotFound`] - A required type is missing from a module
/// - [`Error::MethodNotFound`] - A required method is missing from a type
/// - [`Error::Malformed`] - The code model violates a structural invariant
///
/// ## I/O Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::Json`] - The serialized model could not be read or written
///
/// # Examples
///
/// ```rust,no_run
/// use disposetrack::{Error, CodeModel, Weaver};
/// use std::path::Path;
///
/// let mut model = CodeModel::from_path(Path::new("assembly.json"))?;
/// match Weaver::default().execute(&mut model) {
///     Ok(stats) => println!("{stats}"),
///     Err(Error::MissingCoreReference(scope)) => eprintln!("no core library: {scope}"),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed model: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok::<(), disposetrack::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The code model is damaged and can not be instrumented.
    ///
    /// This error indicates that an entity references something that does not exist
    /// (a dangling token, a branch past the end of a body, a constructor without a
    /// trailing `ret`). It includes the source location where the malformation was
    /// detected for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The code model does not reference the core library.
    ///
    /// Instrumentation needs `System.Object` to describe the signature of the tracker
    /// entry points. The associated value names the scope that was looked for.
    #[error("The module does not reference the core library '{0}'")]
    MissingCoreReference(String),

    /// A required type could not be found.
    ///
    /// Raised while resolving the tracker type inside the runtime module. The associated
    /// value is the full name of the missing type.
    #[error("Could not find type '{0}'")]
    TypeNotFound(String),

    /// A required method could not be found on a type.
    #[error("Could not find '{method}' on '{owner}'")]
    MethodNotFound {
        /// The method name including its parameter list
        method: String,
        /// The full name of the type that was searched
        owner: String,
    },

    /// A token does not resolve inside the code model.
    #[error("Token {0} does not resolve in this module")]
    InvalidToken(Token),

    /// The reference interpreter could not execute a method.
    ///
    /// Raised for stack underflows, operands of the wrong kind, unresolvable call targets
    /// and explicit `throw` instructions reached during execution.
    #[error("Emulation failed - {0}")]
    Emulation(String),

    /// Recursion limit reached.
    ///
    /// The reference interpreter bounds its call depth. The associated value shows the
    /// limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while loading or storing a code model.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Serialization error.
    ///
    /// The serialized model could not be parsed or produced.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}
