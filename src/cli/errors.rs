use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Arguments {first} and {second} cannot be used together")]
    ConflictingArguments { first: String, second: String },

    #[error("Invalid reference time `{value}`: expected RFC 3339 or YYYY-MM-DD")]
    InvalidReferenceTime { value: String },

    #[error("`{arg}` needs forestcover built with the `{feature}` feature")]
    FeatureDisabled { arg: String, feature: String },

    #[error("{failed} of {total} export(s) failed")]
    ExportsFailed { failed: usize, total: usize },

    #[error(transparent)]
    Pipeline(#[from] forestcover::Error),
}
