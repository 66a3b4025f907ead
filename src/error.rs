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

macro_rules! unimplemented_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Unimplemented {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Unimplemented {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants fall into three groups which callers are expected to treat differently.
///
/// # Error Categories
///
/// ## Fatal analysis errors
/// - [`Error::Unimplemented`] - The interpreter does not model a program construct
/// - [`Error::Malformed`] - The program tree violates a structural requirement
/// - [`Error::UnresolvedName`] - A name was read or written without being declared
///
/// When one of these is returned no partial output of the analysis should be trusted.
///
/// ## Recoverable errors
/// - [`Error::ControlPlane`] - A single control-plane record could not be converted
///
/// These are reported per record; sibling records are still converted.
///
/// ## Consistency errors
/// - [`Error::MissingSubstitution`] - A recompute touched a program point that was never
///   registered in the substitution map
///
/// The failed recompute leaves the cache partially updated. Callers should fall back to a
/// full recompute.
///
/// # Examples
///
/// ```rust
/// use p4reach::Error;
///
/// fn describe(error: &Error) -> &'static str {
///     match error {
///         Error::Unimplemented { .. } => "the interpreter must be extended",
///         Error::ControlPlane(_) => "one record was skipped",
///         Error::MissingSubstitution(_) => "run a full recompute",
///         _ => "analysis failed",
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The interpreter encountered a construct it does not model.
    ///
    /// This covers unrecognised statement or expression kinds, unknown match kinds and
    /// unsupported extern calls. It indicates that the interpreter must be extended and is
    /// never a user error.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the unsupported construct
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Unimplemented - {file}:{line}: {message}")]
    Unimplemented {
        /// The message to be printed for the Unimplemented error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The program tree is structurally inconsistent.
    ///
    /// Raised for composite assignments whose flattened field counts differ, table keys
    /// without a name annotation, action calls whose argument count does not match the
    /// declaration, references to undeclared actions or tables, and pipelines that do not
    /// fit the target architecture.
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

    /// A variable was accessed that is neither bound nor declared.
    #[error("Unresolved name - {0}")]
    UnresolvedName(String),

    /// A control-plane record could not be converted into a constraint.
    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),

    /// A recompute referenced a program point without a substitution entry.
    ///
    /// The reachability map and the substitution map have fallen out of sync.
    #[error("Substitution mapping for {0} does not exist")]
    MissingSubstitution(String),
}

/// A structured description of a control-plane record that failed to convert.
///
/// The conversion of one record never affects other records of the same batch, so this
/// error is reported and the record skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "Invalid {entity_kind} '{entity}'{}: {reason}",
    .field.as_ref().map(|f| format!(" (field '{f}')")).unwrap_or_default()
)]
pub struct ControlPlaneError {
    /// The kind of entity the record addressed, e.g. `table entry`.
    pub entity_kind: &'static str,
    /// The control-plane name of the addressed entity.
    pub entity: String,
    /// The offending field, if the error is specific to one.
    pub field: Option<String>,
    /// Why the record was rejected.
    pub reason: String,
}

impl ControlPlaneError {
    /// Creates a new error for the given entity.
    ///
    /// # Arguments
    ///
    /// * `entity_kind` - The kind of entity the record addressed
    /// * `entity` - The control-plane name of the entity
    /// * `reason` - Why the record was rejected
    #[must_use]
    pub fn new(
        entity_kind: &'static str,
        entity: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            entity_kind,
            entity: entity.into(),
            field: None,
            reason: reason.into(),
        }
    }

    /// Attaches the name of the offending field.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}
