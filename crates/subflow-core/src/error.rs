/// Core errors shared across the workspace.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("batch of {len} exceeds the {max}-item limit")]
    BatchTooLarge { len: usize, max: usize },

    #[error("config error: {0}")]
    Config(String),
}
