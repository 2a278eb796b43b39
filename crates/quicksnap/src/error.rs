use thiserror::Error;

/// Reasons a snapping session cannot start
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("QuickSnap must be used from a 3D viewport")]
    NoViewport,

    #[error("Nothing is selected")]
    NothingSelected,

    #[error("No vertex or curve point is selected")]
    NothingPickable,
}
