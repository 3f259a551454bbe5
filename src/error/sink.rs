use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write line: {source}")]
    WriteLine {
        #[source]
        source: std::fmt::Error,
    },
    #[error("Failed to write {artifact}: {source}")]
    Write {
        artifact: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize metric record: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to write sqlite metrics: {source}")]
    Sqlite {
        #[source]
        source: tokio_rusqlite::Error,
    },
    #[error("Writer for {artifact} was already finished.")]
    AlreadyFinished { artifact: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
