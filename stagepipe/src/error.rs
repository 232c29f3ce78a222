//! Error types and result definitions for pipeline operations.
//!
//! Stage workers never fail with an error of their own: a worker either drains its input or stops
//! early because of cancellation, and both outcomes simply close its output channel. The
//! [`PipelineError`] type covers what the pipeline owner can observe on top of that, such as
//! panicking workers, shutdowns that exceed their deadline, or invalid configuration.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use stagepipe_config::shared::ValidationError;

/// Convenient result type for pipeline operations using [`PipelineError`] as the error type.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Detailed payload stored for single [`PipelineError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

/// Main error type for pipeline operations.
///
/// [`PipelineError`] can represent a single error, optionally carrying dynamic detail and an
/// originating source, or an aggregation of several errors, which is how failures of multiple
/// workers are reported at once.
#[derive(Debug, Clone)]
pub struct PipelineError {
    repr: ErrorRepr,
}

/// Internal representation of error data.
#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Single error payload holding rich metadata.
    Single(ErrorPayload),
    /// Multiple aggregated errors.
    ///
    /// This variant is mainly useful to capture failures of several workers.
    Many {
        errors: Vec<PipelineError>,
        location: &'static Location<'static>,
    },
}

/// Specific categories of errors that can occur while running a pipeline.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Worker Errors
    StageWorkerPanic,

    // Lifecycle Errors
    ShutdownTimeout,
    InvalidState,

    // Configuration Errors
    ConfigError,

    // Unknown / Uncategorized
    Unknown,
}

impl PipelineError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => errors
                .iter()
                .flat_map(|err| err.kinds())
                .collect::<Vec<_>>(),
        }
    }

    /// Returns the detailed error information if available.
    ///
    /// For multiple errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// Has no effect on aggregated errors, which forward their first contained error as source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }

        self
    }

    /// Creates a [`PipelineError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
    ) -> Self {
        PipelineError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source: None,
                location: Location::caller(),
            }),
        }
    }
}

impl PartialEq for PipelineError {
    fn eq(&self, other: &PipelineError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (
                ErrorRepr::Many {
                    errors: errors_a, ..
                },
                ErrorRepr::Many {
                    errors: errors_b, ..
                },
            ) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if let Some(detail) = payload.detail.as_deref() {
                    write!(f, "\n  Detail:")?;
                    for line in detail.lines() {
                        write!(f, "\n    {line}")?;
                    }
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    if let Some(first_line) = lines.next() {
                        write!(f, "\n  {}. {}", index + 1, first_line)?;
                    }

                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Creates a [`PipelineError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for PipelineError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> PipelineError {
        PipelineError::from_components(kind, Cow::Borrowed(desc), None)
    }
}

/// Creates a [`PipelineError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for PipelineError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> PipelineError {
        PipelineError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()))
    }
}

/// Creates a [`PipelineError`] from a vector of errors for aggregation.
///
/// If the vector contains exactly one error, returns that error directly without wrapping
/// it in the [`ErrorRepr::Many`] variant.
impl<E> From<Vec<E>> for PipelineError
where
    E: Into<PipelineError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> PipelineError {
        let location = Location::caller();

        let mut errors: Vec<PipelineError> = errors.into_iter().map(Into::into).collect();
        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        PipelineError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Converts [`ValidationError`] to [`PipelineError`] with [`ErrorKind::ConfigError`].
impl From<ValidationError> for PipelineError {
    #[track_caller]
    fn from(err: ValidationError) -> PipelineError {
        let detail = err.to_string();
        PipelineError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid pipeline configuration"),
            Some(Cow::Owned(detail)),
        )
        .with_source(err)
    }
}
