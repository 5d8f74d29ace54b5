use thiserror::Error;

/// Errors surfaced by the request-cycle API.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Only overlays can be accepted. The root layer always stays open.
    #[error("Cannot accept the root layer")]
    CannotAcceptRootLayer,

    /// Only overlays can be dismissed. The root layer always stays open.
    #[error("Cannot dismiss the root layer")]
    CannotDismissRootLayer,
}

pub type Result<T> = std::result::Result<T, Error>;
