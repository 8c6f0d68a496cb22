use thiserror::Error;

/// Failure of an external multiplexer operation.
#[derive(Debug, Error)]
pub enum MultiplexerError {
    /// The external program could not be started at all.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran but exited unsuccessfully.
    #[error("{operation} exited with {status}: {stderr}")]
    Exit {
        operation: &'static str,
        status: String,
        stderr: String,
    },

    /// The program succeeded but printed something we could not use.
    #[error("unexpected {operation} output: {output:?}")]
    Output {
        operation: &'static str,
        output: String,
    },
}

impl MultiplexerError {
    /// Short name of the operation that failed, for log fields.
    pub fn operation(&self) -> &str {
        match self {
            MultiplexerError::Spawn { program, .. } => program,
            MultiplexerError::Exit { operation, .. } => operation,
            MultiplexerError::Output { operation, .. } => operation,
        }
    }
}
