//! Property tests for the data model

use paramtree_meta::{
    ConfigFormat, ElementKind, FactCondition, Facts, LoadedData, LoadedElement, LoadedParameter,
    LoadedReference, Metadata, StorageLocation,
};
use proptest::prelude::*;

fn element_strategy() -> impl Strategy<Value = LoadedElement> {
    (
        prop::sample::select(vec!["a.x", "a.y", "b.x", "b.z"]),
        any::<bool>(),
        "[a-z0-9]{1,4}",
        prop::option::of(prop::sample::select(vec!["tower", "lab"])),
    )
        .prop_map(|(name, is_ref, value, site)| {
            let mut location = StorageLocation::file("cfg", "main", ConfigFormat::Cstyle);
            if let Some(site) = site {
                location.push_condition(FactCondition::with_values(0, "site", [site]));
            }
            if is_ref {
                LoadedElement::Reference(LoadedReference {
                    target: format!("other.{value}"),
                    metadata: Metadata::typed(name, "int"),
                    location,
                })
            } else {
                LoadedElement::Parameter(LoadedParameter {
                    value,
                    metadata: Metadata::typed(name, "int"),
                    location,
                })
            }
        })
}

proptest! {
    #[test]
    fn prop_parameter_and_reference_never_coexist(elements in prop::collection::vec(element_strategy(), 0..40)) {
        let data: LoadedData = elements.into_iter().collect();
        for element in data.iter() {
            let rival = match element.kind() {
                ElementKind::Parameter => ElementKind::Reference,
                _ => ElementKind::Parameter,
            };
            prop_assert!(data.get_with_facts(rival, element.name(), element.facts()).is_none());
        }
    }

    #[test]
    fn prop_identity_is_unique(elements in prop::collection::vec(element_strategy(), 0..40)) {
        let data: LoadedData = elements.into_iter().collect();
        let all: Vec<&LoadedElement> = data.iter().collect();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                prop_assert!(!(a.kind() == b.kind() && a.name() == b.name() && a.facts() == b.facts()));
            }
        }
    }

    #[test]
    fn prop_last_added_value_wins(values in prop::collection::vec("[a-z]{1,5}", 1..10)) {
        let mut data = LoadedData::new();
        for value in &values {
            data.add_element(LoadedElement::Parameter(LoadedParameter {
                value: value.clone(),
                metadata: Metadata::typed("a.x", "string"),
                location: StorageLocation::file("cfg", "main", ConfigFormat::Cstyle),
            }));
        }
        prop_assert_eq!(data.len(), 1);
        prop_assert_eq!(&data.parameter("a.x").unwrap().value, values.last().unwrap());
    }

    #[test]
    fn prop_condition_met_iff_value_listed(
        allowed in prop::collection::vec("[a-c]", 1..3),
        current in "[a-d]",
    ) {
        let condition = FactCondition::with_values(0, "site", allowed.clone());
        let facts = Facts::from_pairs([("site", current.clone())]).unwrap();
        prop_assert_eq!(condition.is_met(&facts), allowed.contains(&current));
    }
}
