use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no usable data in {}: {reason}", path.display())]
    MissingData { path: PathBuf, reason: String },
    #[error("a linear fit needs at least two points in its domain, found {found}")]
    InsufficientPoints { found: usize },
    #[error("the normal equations are singular, all points share the same abscissa")]
    Singular,
    #[error("cannot compute {quantity}: {reason}")]
    DivisionByZero {
        quantity: &'static str,
        reason: &'static str,
    },
    #[error("{quantity} is not finite, the inputs overflow or carry NaN or infinity")]
    NonFinite { quantity: &'static str },
    #[error("failed to read the analysis configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error("invalid analysis configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to write the fit summary: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to render {}: {reason}", path.display())]
    Render { path: PathBuf, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) const fn division_by_zero(quantity: &'static str, reason: &'static str) -> Self {
        Self::DivisionByZero { quantity, reason }
    }
}
