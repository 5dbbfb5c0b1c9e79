//! Reconciling fetched notifications with local state.

use std::collections::BTreeMap;

use crate::github::types::{Notification, Overrides};

/// Canonical set keyed by notification id
pub type Canonical = BTreeMap<String, Notification>;

/// Local overrides keyed by notification id
pub type CustomStates = BTreeMap<String, Overrides>;

/// Merge a fetched batch into the canonical set.
///
/// Remote fields always come from the fetched copy. Each override field
/// resolves to the custom state value if set, else the existing canonical
/// value, else whatever was fetched. Notifications missing from `fetched`
/// are left untouched.
pub fn merge_fetched(canonical: &mut Canonical, custom_states: &CustomStates, fetched: Vec<Notification>) {
  for mut notification in fetched {
    let custom = custom_states
      .get(&notification.id)
      .cloned()
      .unwrap_or_default();
    let existing = canonical
      .get(&notification.id)
      .map(|n| n.overrides.clone())
      .unwrap_or_default();

    notification.overrides = custom.or(existing).or(notification.overrides);
    canonical.insert(notification.id.clone(), notification);
  }
}

/// Lay custom states over notifications loaded from disk.
pub fn apply_custom_states(canonical: &mut Canonical, custom_states: &CustomStates) {
  for (id, custom) in custom_states {
    if let Some(notification) = canonical.get_mut(id) {
      let stored = std::mem::take(&mut notification.overrides);
      notification.overrides = custom.clone().or(stored);
    }
  }
}
