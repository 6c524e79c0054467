//! Subscription filter policies.
//!
//! A policy maps attribute names to allow-lists. An envelope matches when,
//! for every attribute the policy names, the envelope carries that attribute
//! and its value is in the allow-list. An envelope lacking a filtered
//! attribute never matches. A policy naming no attributes matches everything,
//! same as having no policy at all.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::MessageAttributes;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPolicy {
    allow: BTreeMap<String, BTreeSet<String>>,
}

impl FilterPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or widen) the allow-list for `attribute`.
    pub fn allow<I, V>(mut self, attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.allow
            .entry(attribute.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn matches(&self, attributes: &MessageAttributes) -> bool {
        self.allow.iter().all(|(name, allowed)| {
            attributes
                .get(name)
                .is_some_and(|value| allowed.contains(value))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.allow.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn attrs(pairs: &[(&str, &str)]) -> MessageAttributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[rstest]
    #[case::exact(&[("commentType", "Caption")], true)]
    #[case::extra_attributes_ignored(&[("commentType", "Caption"), ("name", "cat.jpg")], true)]
    #[case::other_value(&[("commentType", "Review")], false)]
    #[case::missing_attribute(&[("name", "cat.jpg")], false)]
    #[case::no_attributes(&[], false)]
    #[case::case_sensitive(&[("commentType", "caption")], false)]
    fn caption_filter(#[case] pairs: &[(&str, &str)], #[case] expected: bool) {
        let policy = FilterPolicy::new().allow("commentType", ["Caption"]);
        assert_eq!(policy.matches(&attrs(pairs)), expected);
    }

    #[test]
    fn every_named_attribute_must_match() {
        let policy = FilterPolicy::new()
            .allow("commentType", ["Caption", "Title"])
            .allow("changeType", ["ObjectCreated"]);

        assert!(policy.matches(&attrs(&[("commentType", "Title"), ("changeType", "ObjectCreated")])));
        assert!(!policy.matches(&attrs(&[("commentType", "Title")])));
        assert!(!policy.matches(&attrs(&[("commentType", "Title"), ("changeType", "ObjectRemoved")])));
    }

    #[test]
    fn allow_widens_existing_list() {
        let policy = FilterPolicy::new()
            .allow("changeType", ["ObjectCreated"])
            .allow("changeType", ["ObjectRemoved"]);

        assert!(policy.matches(&attrs(&[("changeType", "ObjectRemoved")])));
        assert!(policy.matches(&attrs(&[("changeType", "ObjectCreated")])));
    }

    #[test]
    fn empty_policy_matches_everything() {
        let policy = FilterPolicy::new();
        assert!(policy.is_empty());
        assert!(policy.matches(&attrs(&[])));
    }
}
