//! The constitution document.

use serde::{Deserialize, Serialize};

use dyad_types::{ParamValue, Timestamp};

use crate::amendment::{Amendment, AmendmentChange, AmendmentRequirements};
use crate::article::{Article, ArticleStatus, Constraint, ProtectedRule};
use crate::error::ConstiError;

/// The current constitution state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstiDocument {
    /// Ordered list of articles, repealed ones included.
    pub articles: Vec<Article>,
    /// Version number (incremented with each amendment).
    pub version: u64,
}

fn genesis_article(number: u32, title: &str, text: &str, rules: Vec<ProtectedRule>) -> Article {
    Article {
        number,
        title: title.to_string(),
        text: text.to_string(),
        rules,
        requirements: AmendmentRequirements::genesis(),
        status: ArticleStatus::Active,
        version: 1,
    }
}

impl ConstiDocument {
    /// The founding constitution, version 1.
    pub fn genesis() -> Self {
        let articles = vec![
            genesis_article(
                1,
                "Dual Identity",
                "Every participant holds a True Self and a Shadow, and both may vote.",
                vec![ProtectedRule::new(
                    "enable_shadow_voting",
                    Constraint::MustNotEqual(ParamValue::Bool(false)),
                )],
            ),
            genesis_article(
                2,
                "Humanity Verification",
                "Only verified humans may vote, delegate, stake or petition.",
                vec![ProtectedRule::new(
                    "require_humanity_verification",
                    Constraint::MustNotEqual(ParamValue::Bool(false)),
                )],
            ),
            genesis_article(
                3,
                "No Token Derivatives",
                "Platform tokens may not back derivative or leveraged instruments.",
                vec![ProtectedRule::new(
                    "enable_token_derivatives",
                    Constraint::MustNotEqual(ParamValue::Bool(true)),
                )],
            ),
            genesis_article(
                4,
                "Shadow Unlinkability",
                "No mechanism may reveal which True Self a Shadow belongs to.",
                vec![ProtectedRule::new(
                    "expose_identity_links",
                    Constraint::MustNotEqual(ParamValue::Bool(true)),
                )],
            ),
            genesis_article(
                5,
                "Reversibility",
                "Enacted decisions stay reversible for at least one day after resolution.",
                vec![ProtectedRule::new(
                    "rollback_window_hours",
                    Constraint::MustNotBeBelow(24),
                )],
            ),
        ];
        Self {
            articles,
            version: 1,
        }
    }

    pub fn article(&self, number: u32) -> Option<&Article> {
        self.articles.iter().find(|a| a.number == number)
    }

    pub fn active_articles(&self) -> impl Iterator<Item = &Article> {
        self.articles.iter().filter(|a| a.is_active())
    }

    /// Apply an approved amendment to one article.
    ///
    /// Checks the article's own requirements (founder approval, 90 %
    /// approval, minimum discussion period) before changing anything.
    pub fn amend_article(&mut self, amendment: &Amendment, now: Timestamp) -> Result<(), ConstiError> {
        let number = amendment.article_number;
        let article = self
            .articles
            .iter_mut()
            .find(|a| a.number == number)
            .ok_or(ConstiError::ArticleNotFound(number))?;

        if article.status == ArticleStatus::Repealed {
            return Err(ConstiError::ArticleAlreadyRepealed(number));
        }

        let req = article.requirements;
        if req.founder_approval && !amendment.founder_approved {
            return Err(ConstiError::FounderApprovalRequired(number));
        }
        if req.supermajority_90 && amendment.approval_bps < AmendmentRequirements::SUPERMAJORITY_90_BPS {
            return Err(ConstiError::SupermajorityNotMet {
                have_bps: amendment.approval_bps,
                need_bps: AmendmentRequirements::SUPERMAJORITY_90_BPS,
            });
        }
        let elapsed_days = amendment.discussion_opened_at.elapsed_since(now) / Timestamp::DAY;
        if elapsed_days < req.min_discussion_days as u64 {
            return Err(ConstiError::DiscussionTooShort {
                required_days: req.min_discussion_days,
                elapsed_days,
            });
        }

        match &amendment.change {
            AmendmentChange::Replace { title, text, rules } => {
                article.title = title.clone();
                article.text = text.clone();
                article.rules = rules.clone();
                article.version += 1;
            }
            AmendmentChange::Repeal => {
                article.status = ArticleStatus::Repealed;
            }
        }
        self.version += 1;
        tracing::info!(article = number, version = self.version, "constitution amended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repeal(number: u32, approval_bps: u32, founder: bool, opened_days_ago: u64) -> (Amendment, Timestamp) {
        let now = Timestamp::new(100 * Timestamp::DAY);
        (
            Amendment {
                article_number: number,
                change: AmendmentChange::Repeal,
                founder_approved: founder,
                approval_bps,
                discussion_opened_at: now.minus_secs(opened_days_ago * Timestamp::DAY),
            },
            now,
        )
    }

    #[test]
    fn genesis_has_five_active_articles() {
        let doc = ConstiDocument::genesis();
        assert_eq!(doc.active_articles().count(), 5);
        assert_eq!(doc.article(1).map(|a| a.title.as_str()), Some("Dual Identity"));
    }

    #[test]
    fn amendment_requires_founder_approval() {
        let mut doc = ConstiDocument::genesis();
        let (a, now) = repeal(3, 9_500, false, 40);
        assert_eq!(doc.amend_article(&a, now), Err(ConstiError::FounderApprovalRequired(3)));
        assert_eq!(doc.version, 1);
    }

    #[test]
    fn amendment_requires_ninety_percent() {
        let mut doc = ConstiDocument::genesis();
        let (a, now) = repeal(3, 8_999, true, 40);
        assert!(matches!(
            doc.amend_article(&a, now),
            Err(ConstiError::SupermajorityNotMet { have_bps: 8_999, .. })
        ));
    }

    #[test]
    fn amendment_requires_discussion_period() {
        let mut doc = ConstiDocument::genesis();
        let (a, now) = repeal(3, 9_500, true, 29);
        assert!(matches!(
            doc.amend_article(&a, now),
            Err(ConstiError::DiscussionTooShort { required_days: 30, elapsed_days: 29 })
        ));
    }

    #[test]
    fn repeal_deactivates_and_bumps_version() {
        let mut doc = ConstiDocument::genesis();
        let (a, now) = repeal(3, 9_500, true, 30);
        doc.amend_article(&a, now).unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.active_articles().count(), 4);
        assert_eq!(doc.amend_article(&a, now), Err(ConstiError::ArticleAlreadyRepealed(3)));
    }

    #[test]
    fn replace_bumps_article_version() {
        let mut doc = ConstiDocument::genesis();
        let now = Timestamp::new(100 * Timestamp::DAY);
        let a = Amendment {
            article_number: 5,
            change: AmendmentChange::Replace {
                title: "Reversibility".into(),
                text: "Two days.".into(),
                rules: vec![ProtectedRule::new("rollback_window_hours", Constraint::MustNotBeBelow(48))],
            },
            founder_approved: true,
            approval_bps: 10_000,
            discussion_opened_at: Timestamp::EPOCH,
        };
        doc.amend_article(&a, now).unwrap();
        let article = doc.article(5).unwrap();
        assert_eq!(article.version, 2);
        assert!(article.is_active());
    }

    #[test]
    fn document_serializes_to_json() {
        let doc = ConstiDocument::genesis();
        let json = serde_json::to_string(&doc).unwrap();
        let back: ConstiDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
