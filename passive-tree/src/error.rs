use thiserror::Error;

#[derive(Debug, Error)]
pub enum TreeError {
    /// A node id was passed that does not exist in the loaded tree. This is a
    /// contract violation by the caller, not a recoverable runtime case.
    #[error("unknown node id {0:?}")]
    InvalidNodeReference(String),

    /// A decoded build references a class, ascendancy, or node id that does
    /// not exist in the loaded tree version. The session is reset to an
    /// empty-but-valid allocation before this is returned.
    #[error("inconsistent build: {0}")]
    InconsistentBuild(String),

    /// The tree definition violates a structural invariant and was refused.
    #[error("invalid tree definition: {0}")]
    InvalidTreeDef(String),

    /// The tree definition JSON could not be parsed.
    #[error("malformed tree definition: {0}")]
    Malformed(#[from] serde_json::Error),
}
