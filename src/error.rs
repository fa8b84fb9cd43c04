//! Error types shared by every module of the crate.

use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used across the crate.
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Everything that can go wrong while configuring, building or training a network.
#[derive(Debug)]
pub enum NetworkError {
    /// A hyperparameter holds a value outside of its accepted domain.
    Configuration {
        option: String,
        value: String,
        expected: String,
    },
    /// The declared layers cannot be wired into a valid graph.
    GraphConstruction { layer: String, reason: String },
    /// Two connected layers disagree on the width flowing between them.
    ShapeMismatch {
        layer: String,
        expected: usize,
        actual: usize,
    },
    /// Data handed to the network doesn't fit the compiled graph.
    DataShape {
        what: String,
        expected: String,
        actual: String,
    },
    /// NaN or infinity showed up in the loss or in a gradient.
    NumericInstability {
        epoch: usize,
        batch: usize,
        what: String,
    },
    /// The optimizer received gradients that don't line up with its parameters.
    GradientMismatch {
        parameter: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    Io(io::Error),
    Json(serde_json::Error),
}

impl NetworkError {
    pub(crate) fn configuration(
        option: impl Into<String>,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            option: option.into(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }

    pub(crate) fn graph(layer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GraphConstruction {
            layer: layer.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn data_shape(
        what: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::DataShape {
            what: what.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub(crate) fn numeric(what: impl Into<String>) -> Self {
        Self::NumericInstability {
            epoch: 0,
            batch: 0,
            what: what.into(),
        }
    }

    /// Attach the training position to a numeric instability error.
    pub(crate) fn at_position(self, epoch: usize, batch: usize) -> Self {
        match self {
            Self::NumericInstability { what, .. } => Self::NumericInstability { epoch, batch, what },
            other => other,
        }
    }

    /// Whether the error was raised while building the layer graph.
    pub fn is_graph_construction(&self) -> bool {
        matches!(self, Self::GraphConstruction { .. } | Self::ShapeMismatch { .. })
    }

    /// Whether the error comes from an invalid hyperparameter.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Whether the error is a data shape mismatch.
    pub fn is_data_shape(&self) -> bool {
        matches!(self, Self::DataShape { .. })
    }

    /// Whether training diverged.
    pub fn is_numeric_instability(&self) -> bool {
        matches!(self, Self::NumericInstability { .. })
    }
}

impl Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration {
                option,
                value,
                expected,
            } => write!(
                f,
                "Invalid value `{value}` for option `{option}`, expected {expected}"
            ),
            Self::GraphConstruction { layer, reason } => {
                write!(f, "Cannot build graph at layer `{layer}`: {reason}")
            }
            Self::ShapeMismatch {
                layer,
                expected,
                actual,
            } => write!(
                f,
                "Layer `{layer}` expects an input of width {expected}, but the previous layer produces width {actual}"
            ),
            Self::DataShape {
                what,
                expected,
                actual,
            } => write!(f, "Invalid shape for {what}: expected {expected}, got {actual}"),
            Self::NumericInstability { epoch, batch, what } => write!(
                f,
                "Numeric instability in {what} at epoch {epoch}, batch {batch}"
            ),
            Self::GradientMismatch {
                parameter,
                expected,
                actual,
            } => write!(
                f,
                "Gradient for parameter `{parameter}` has shape {actual:?}, expected {expected:?}"
            ),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Json(e) => write!(f, "Invalid JSON: {e}"),
        }
    }
}

impl Error for NetworkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for NetworkError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
