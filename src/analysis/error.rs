use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AnalyzerError {
    /// A similarity comparison was requested with no reference benchmark.
    #[error(
        "no reference benchmark is set: call set_reference_keywords() with at least \
         one reference keyword that has fetched data before comparing"
    )]
    ReferenceNotSet,

    #[error("opportunity weights must sum to 1.0 (got {sum:.4})")]
    InvalidWeights { sum: f64 },
}
