use thiserror::Error;

pub type ShowResult<T> = Result<T, ShowError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShowError {
    #[error("unknown formation `{name}` in segment `{segment}`")]
    UnknownFormation { segment: String, name: String },

    #[error("segment `{segment}` addresses entity {id}, but the show has {count} entities")]
    EntityOutOfRange { segment: String, id: u32, count: u32 },

    #[error("segment `{segment}` addresses row {row}, but the last row is {max_row}")]
    RowOutOfRange { segment: String, row: u32, max_row: u32 },

    #[error("invalid segment `{segment}`: {reason}")]
    InvalidSegment { segment: String, reason: String },

    #[error("segment `{segment}` is a text formation without text")]
    MissingText { segment: String },

    #[error("no glyph for character {0:?}")]
    UnsupportedGlyph(char),

    #[error("text {text:?} does not fit a {resolution}x{resolution} raster")]
    TextTooLarge { text: String, resolution: u32 },

    #[error("entity count {0} is outside 1..={max}", max = crate::MAX_ENTITIES)]
    InvalidEntityCount(usize),

    #[error("invalid timeline json: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ShowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
