use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConstiError {
    #[error("article {0} not found")]
    ArticleNotFound(u32),

    #[error("article {0} is not active")]
    ArticleNotActive(u32),

    #[error("article {0} is already repealed")]
    ArticleAlreadyRepealed(u32),

    #[error("amending article {0} requires founder approval")]
    FounderApprovalRequired(u32),

    #[error("constitutional supermajority not met: {have_bps} < {need_bps} basis points")]
    SupermajorityNotMet { have_bps: u32, need_bps: u32 },

    #[error("discussion period too short: {elapsed_days} of {required_days} days")]
    DiscussionTooShort { required_days: u32, elapsed_days: u64 },

    #[error("article {article} is not violated by {parameter} = {value}")]
    NotViolated {
        article: u32,
        parameter: String,
        value: String,
    },

    #[error("{0}")]
    Other(String),
}
