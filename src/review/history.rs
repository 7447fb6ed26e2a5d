//! Review history reduction.
//!
//! The platform hands back every review event of a pull request in order,
//! often several per reviewer. Only the latest verdict of each reviewer
//! counts; comments and unsubmitted drafts never change a verdict.

use crate::github::{Commit, Review, ReviewState};
use std::collections::{BTreeSet, HashMap};

/// Latest verdict-bearing review of each login, in order of that review.
fn latest_verdicts(reviews: &[Review]) -> Vec<&Review> {
    let mut latest: HashMap<&str, usize> = HashMap::new();
    let verdicts: Vec<&Review> = reviews.iter().filter(|r| r.state.is_verdict()).collect();
    for (i, review) in verdicts.iter().enumerate() {
        latest.insert(review.login.as_str(), i);
    }
    verdicts
        .iter()
        .enumerate()
        .filter(|(i, r)| latest.get(r.login.as_str()) == Some(i))
        .map(|(_, r)| *r)
        .collect()
}

/// Logins whose most recent verdict is APPROVED.
pub fn approved_reviewers(reviews: &[Review]) -> BTreeSet<String> {
    approved_reviews(reviews)
        .into_iter()
        .map(|r| r.login)
        .collect()
}

/// The review carrying each current approval. These are the reviews a
/// dismissal revokes.
pub fn approved_reviews(reviews: &[Review]) -> Vec<Review> {
    latest_verdicts(reviews)
        .into_iter()
        .filter(|r| r.state == ReviewState::Approved)
        .cloned()
        .collect()
}

/// Commits pushed after the most recent review.
///
/// With no reviews every commit is new. When the reviewed commit is no
/// longer part of the branch (rebase, force-push), every commit is new too.
pub fn new_commits(commits: &[Commit], reviews: &[Review]) -> Vec<Commit> {
    let Some(last) = reviews.last() else {
        return commits.to_vec();
    };
    match commits.iter().position(|c| c.sha == last.commit_id) {
        Some(i) => commits[i + 1..].to_vec(),
        None => {
            tracing::debug!(
                reviewed = %last.commit_id,
                "reviewed commit not in branch history, treating all commits as new"
            );
            commits.to_vec()
        }
    }
}
