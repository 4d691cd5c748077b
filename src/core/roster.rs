//! Returning-family lookup against the prior-year roster.

use crate::{
    entities::{PriorRoster, prior_roster},
    errors::Result,
};
use sea_orm::{QueryOrder, prelude::*, sea_query::LikeExpr};
use serde::Serialize;
use tracing::instrument;

/// Message shown when a returning-family search finds nobody.
pub const NOT_FOUND_MESSAGE: &str =
    "No child found with that name. Please try again or register as a new participant.";

/// Outcome of a returning-family search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "children", rename_all = "snake_case")]
pub enum ReturningSearch {
    /// Nobody matched
    NotFound,
    /// Exactly one match, used to pre-fill the form
    Single(prior_roster::Model),
    /// Several matches, the parent picks one
    Multiple(Vec<prior_roster::Model>),
}

impl ReturningSearch {
    /// Banner text for the outcome, if it needs one.
    #[must_use]
    pub const fn message(&self) -> Option<&'static str> {
        match self {
            Self::NotFound => Some(NOT_FOUND_MESSAGE),
            Self::Single(_) | Self::Multiple(_) => None,
        }
    }
}

/// `LIKE` pattern matching `term` anywhere, with `%`, `_` and `\` taken
/// literally.
pub(crate) fn substring_like(term: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape('\\')
}

/// Case-insensitive substring search on first name in last year's roster.
///
/// Returns `None` for a blank term; no query is issued.
#[instrument(skip(db))]
pub async fn search_prior_roster(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<ReturningSearch>> {
    let term = name.trim();
    if term.is_empty() {
        return Ok(None);
    }

    let mut children = PriorRoster::find()
        .filter(prior_roster::Column::FirstName.like(substring_like(term)))
        .order_by_asc(prior_roster::Column::FirstName)
        .order_by_asc(prior_roster::Column::Id)
        .all(db)
        .await?;

    let outcome = match children.len() {
        0 => ReturningSearch::NotFound,
        1 => ReturningSearch::Single(children.remove(0)),
        _ => ReturningSearch::Multiple(children),
    };
    Ok(Some(outcome))
}
