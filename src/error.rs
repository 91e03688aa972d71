//! Error taxonomy shared by the pricing engine and the texture resampler

/// Convenience result type for the core modules
pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A selected option has no price item in its category
    #[error("no price item for option `{option_id}` in category `{category_id}`")]
    MissingPriceItem {
        category_id: String,
        option_id: String,
    },

    /// The design is wider than the last step of a width-stepped item
    #[error("width {width} is beyond the price steps of option `{option_id}` in category `{category_id}`")]
    WidthOutOfRange {
        category_id: String,
        option_id: String,
        width: f64,
    },

    /// An edit referenced an item id that is not in the price book
    #[error("unknown price item `{0}`")]
    UnknownItem(String),

    /// Malformed input data (import rows, formula types, price book shape)
    #[error("validation error: {0}")]
    Validation(String),

    /// Source image is empty, undecodable or has non-positive dimensions
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }

    /// True for the lookup family
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Error::MissingPriceItem { .. } | Error::WidthOutOfRange { .. } | Error::UnknownItem(_)
        )
    }
}
