//! Error taxonomy for the refresh pipeline

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced while fetching, aggregating, rendering or writing a frame
#[derive(Debug, Error)]
pub enum Error {
    /// A resource quantity string could not be parsed
    #[error("malformed resource quantity {raw:?}")]
    MalformedQuantity { raw: String },

    /// A label was asked to fit into fewer than three columns
    #[error("cannot render a label into {width} columns (minimum is 3)")]
    InvalidRenderWidth { width: usize },

    /// The cluster could not be queried or its response could not be decoded
    #[error("failed to retrieve {what}")]
    RetrievalFailure {
        what: &'static str,
        #[source]
        source: BoxError,
    },

    /// No node carries the pod's host address. Never fatal: rendered as a placeholder.
    #[error("no node found for pod {pod}")]
    UnknownAllocation { pod: String },

    /// Writing to the display failed
    #[error("failed to write frame to display")]
    Output(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn retrieval(what: &'static str, source: impl Into<BoxError>) -> Self {
        Self::RetrievalFailure {
            what,
            source: source.into(),
        }
    }

    /// Whether this error must terminate the run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::UnknownAllocation { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
