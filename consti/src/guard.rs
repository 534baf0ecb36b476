//! Constitutional guard: is a proposed parameter change forbidden?

use serde::{Deserialize, Serialize};

use dyad_types::ParamValue;

use crate::document::ConstiDocument;
use crate::error::ConstiError;

/// One broken rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub article_number: u32,
    pub title: String,
    pub reason: String,
}

/// Every active rule that setting `parameter` to `value` would break.
///
/// Empty means the change is constitutionally permitted. Pure: reads the
/// document only.
pub fn check_change(doc: &ConstiDocument, parameter: &str, value: &ParamValue) -> Vec<Violation> {
    doc.active_articles()
        .flat_map(|article| {
            article
                .violated_rules(parameter, value)
                .map(move |rule| Violation {
                    article_number: article.number,
                    title: article.title.clone(),
                    reason: rule.describe(),
                })
        })
        .collect()
}

/// Confirm that each cited article exists, is active, and is actually broken
/// by `parameter = value`.
///
/// Used to validate externally reported violations before acting on them.
pub fn confirm_violations(
    doc: &ConstiDocument,
    cited: &[u32],
    parameter: &str,
    value: &ParamValue,
) -> Result<Vec<Violation>, ConstiError> {
    if cited.is_empty() {
        return Err(ConstiError::Other("no articles cited".into()));
    }
    let found = check_change(doc, parameter, value);
    let mut confirmed = Vec::with_capacity(cited.len());
    for &number in cited {
        let article = doc.article(number).ok_or(ConstiError::ArticleNotFound(number))?;
        if !article.is_active() {
            return Err(ConstiError::ArticleNotActive(number));
        }
        let violation = found
            .iter()
            .find(|v| v.article_number == number)
            .ok_or_else(|| ConstiError::NotViolated {
                article: number,
                parameter: parameter.to_string(),
                value: value.to_string(),
            })?;
        confirmed.push(violation.clone());
    }
    Ok(confirmed)
}
