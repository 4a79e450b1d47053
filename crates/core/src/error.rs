/// Errors produced while parsing rule graphs or batch-test CSV files.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    /// The rule content is not a JDM decision graph.
    #[error("invalid decision graph: {message}")]
    InvalidGraph { message: String },

    /// The CSV reader or writer failed.
    #[error("csv error: {message}")]
    Csv { message: String },

    /// A required column is absent from the CSV header.
    #[error("missing CSV column '{column}'")]
    MissingColumn { column: String },

    /// A CSV data row could not be turned into a scenario.
    #[error("invalid CSV row {row}: {message}")]
    InvalidRow { row: usize, message: String },

    /// Two rows of the same file carry the same scenario title.
    #[error("duplicate scenario title '{title}'")]
    DuplicateTitle { title: String },
}

impl From<csv::Error> for CoreError {
    fn from(e: csv::Error) -> Self {
        CoreError::Csv {
            message: e.to_string(),
        }
    }
}
