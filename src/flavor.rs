//! Flavor selection policy.

use crate::model::Flavor;

/// Chooses the flavor named `preferred`, or else the flavor whose name sorts
/// first. Returns `None` only when `flavors` is empty.
#[must_use]
pub fn select_flavor<'a>(flavors: &'a [Flavor], preferred: &str) -> Option<&'a Flavor> {
    flavors
        .iter()
        .find(|flavor| flavor.name == preferred)
        .or_else(|| {
            flavors
                .iter()
                .min_by(|left, right| left.name.cmp(&right.name).then(left.id.cmp(&right.id)))
        })
}

#[cfg(test)]
mod tests {
    //! Tests for flavor selection.

    use rstest::rstest;

    use super::*;
    use crate::model::FlavorId;

    fn flavors(names: &[&str]) -> Vec<Flavor> {
        names
            .iter()
            .map(|name| Flavor {
                id: FlavorId::from(format!("id-{name}")),
                name: (*name).to_owned(),
            })
            .collect()
    }

    #[rstest]
    #[case::listed_first(&["m2.c1m2", "m1.small", "m3.large"])]
    #[case::listed_middle(&["m1.small", "m2.c1m2", "m3.large"])]
    #[case::listed_last(&["m3.large", "m1.small", "m2.c1m2"])]
    fn prefers_exact_name(#[case] names: &[&str]) {
        let list = flavors(names);
        let chosen = select_flavor(&list, "m2.c1m2").map(|flavor| flavor.name.as_str());
        assert_eq!(chosen, Some("m2.c1m2"));
    }

    #[rstest]
    #[case::sorted(&["a1.tiny", "b2.small", "c3.large"])]
    #[case::reversed(&["c3.large", "b2.small", "a1.tiny"])]
    fn falls_back_to_first_by_name(#[case] names: &[&str]) {
        let list = flavors(names);
        let chosen = select_flavor(&list, "m2.c1m2").map(|flavor| flavor.name.as_str());
        assert_eq!(chosen, Some("a1.tiny"));
    }

    #[test]
    fn empty_list_selects_nothing() {
        assert_eq!(select_flavor(&[], "m2.c1m2"), None);
    }
}
