//! The constitution.
//!
//! A small set of articles that protect the platform's founding guarantees
//! (dual identity, humanity verification, no token derivatives, shadow
//! unlinkability, reversibility). Each article protects one or more
//! parameters with a rule; a poll proposing a change that breaks an active
//! rule is rejected at creation and never reaches a vote.
//!
//! Articles change only through [`ConstiDocument::amend_article`], which
//! enforces the article's own amendment requirements.

pub mod amendment;
pub mod article;
pub mod document;
pub mod error;
pub mod guard;

pub use amendment::{Amendment, AmendmentChange, AmendmentRequirements};
pub use article::{Article, ArticleStatus, Constraint, ProtectedRule};
pub use document::ConstiDocument;
pub use error::ConstiError;
pub use guard::{check_change, confirm_violations, Violation};
