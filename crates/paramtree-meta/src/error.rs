//! Error types for paramtree-meta

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Fact name or value must not be empty (name: \"{name}\", value: \"{value}\")")]
    EmptyFact { name: String, value: String },

    #[error("Fact \"{name}\" specified twice (\"{existing}\" and \"{value}\")")]
    DuplicateFact {
        name: String,
        existing: String,
        value: String,
    },

    #[error("Unknown config format: {name}")]
    UnknownFormat { name: String },

    #[error("Invalid restriction \"{text}\": {message}")]
    InvalidRestriction { text: String, message: String },

    #[error("Subconfig template {spec} expects {expected} instance name(s), got {actual}")]
    TemplateArity {
        spec: String,
        expected: usize,
        actual: usize,
    },

    #[error("No loaded subconfig template matches {spec}")]
    UnknownTemplate { spec: String },
}
