use thiserror::Error;

use crate::model::{ItemError, ParseIdError, SessionSummaryError, StageError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error(transparent)]
    Item(#[from] ItemError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
    #[error(transparent)]
    Summary(#[from] SessionSummaryError),
}
