//! Bounded, refillable inbox derived from the canonical set.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::github::types::{Notification, SubjectType};

/// Newest first; equal timestamps fall back to id in ascending byte order so
/// the result never depends on input order.
pub fn newest_first(a: &Notification, b: &Notification) -> Ordering {
  b.updated_at
    .cmp(&a.updated_at)
    .then_with(|| a.id.cmp(&b.id))
}

/// Tracks which notifications are in the working set.
///
/// Membership is only ever replaced wholesale by [`WorkingSetManager::recompute`]:
/// eligible notifications sorted newest first, the ones already active kept
/// ahead of the rest, truncated to `max_active`. Marking the top item done
/// therefore pulls in the next newest item without reshuffling the others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingSetManager {
  ids: Vec<String>,
  max_active: usize,
  issues_only: bool,
}

impl WorkingSetManager {
  pub fn new(max_active: usize, issues_only: bool) -> Self {
    Self {
      ids: Vec::new(),
      max_active,
      issues_only,
    }
  }

  /// Restore membership from a snapshot. Call `recompute` before trusting it.
  pub fn with_ids(mut self, ids: Vec<String>) -> Self {
    self.ids = ids;
    self
  }

  pub fn ids(&self) -> &[String] {
    &self.ids
  }

  pub fn len(&self) -> usize {
    self.ids.len()
  }

  pub fn max_active(&self) -> usize {
    self.max_active
  }

  pub fn is_full(&self) -> bool {
    self.ids.len() >= self.max_active
  }

  /// Whether a notification may be in the working set at all.
  pub fn is_eligible(&self, notification: &Notification) -> bool {
    if notification.is_done() {
      return false;
    }
    !self.issues_only || notification.subject.kind == SubjectType::Issue
  }

  /// Grow the limit by `extra`. Callers recompute afterwards.
  pub fn expand(&mut self, extra: usize) {
    self.max_active = self.max_active.saturating_add(extra);
  }

  /// Rebuild membership from the canonical set.
  pub fn recompute<'a>(&mut self, canonical: impl IntoIterator<Item = &'a Notification>) {
    let mut eligible: Vec<&Notification> = canonical
      .into_iter()
      .filter(|n| self.is_eligible(n))
      .collect();
    eligible.sort_by(|a, b| newest_first(a, b));

    let active: HashSet<&str> = self.ids.iter().map(String::as_str).collect();
    let (kept, rest): (Vec<&Notification>, Vec<&Notification>) = eligible
      .into_iter()
      .partition(|n| active.contains(n.id.as_str()));

    self.ids = kept
      .into_iter()
      .chain(rest)
      .take(self.max_active)
      .map(|n| n.id.clone())
      .collect();
  }
}
