// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for akri-admission-webhook.
//!
//! Uses proptest to generate random inputs and verify invariants.

#[path = "../common/mod.rs"]
mod common;

use proptest::prelude::*;
use serde_json::{Map, Value, json};

use akri_admission_webhook::json::compare;
use akri_admission_webhook::{Check, ValidationProfile, Validator};

use common::*;

/// Strategy for generating arbitrary JSON documents of bounded depth.
fn any_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z0-9]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

/// Strategy for generating limits resource names other than the placeholder.
fn resource_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("cpu".to_string()),
        Just("memory".to_string()),
        Just("akri.sh/udev-camera".to_string()),
        "[a-z]{1,10}",
    ]
}

/// Strategy for a broker container without the placeholder.
fn plain_container() -> impl Strategy<Value = ContainerBuilder> {
    ("[a-z]{1,8}", prop::collection::vec(resource_name(), 0..3)).prop_map(|(name, keys)| {
        keys.into_iter()
            .fold(ContainerBuilder::new(name), |c, key| c.limit(key, "1"))
    })
}

/// Strategy for any combination of enabled checks.
fn any_checks() -> impl Strategy<Value = Vec<Check>> {
    prop::collection::vec(prop::sample::select(Check::ALL.to_vec()), 0..4)
}

proptest! {
    /// Comparing a document against itself never diverges.
    #[test]
    fn compare_is_reflexive(value in any_json()) {
        prop_assert!(compare(&value, &value).is_ok());
    }

    /// Removing any field present on the left is always detected.
    #[test]
    fn compare_detects_dropped_field(
        fields in prop::collection::btree_map("[a-z]{1,6}", any_json(), 1..6),
        pick in any::<prop::sample::Index>(),
    ) {
        let left = Value::Object(fields.clone().into_iter().collect());
        let keys: Vec<&String> = fields.keys().collect();
        let dropped = keys[pick.index(keys.len())].clone();
        prop_assume!(!fields[&dropped].is_null());

        let mut right = left.clone();
        right.as_object_mut().unwrap().remove(&dropped);

        let divergence = compare(&left, &right).unwrap_err();
        prop_assert_eq!(divergence.path(), format!(".{}", dropped));
        prop_assert!(divergence.actual.is_none());
    }

    /// Extra fields on the right never cause a divergence.
    #[test]
    fn compare_ignores_extra_right_fields(left in any_json(), extra in any_json()) {
        let mut right = left.clone();
        if let Some(object) = right.as_object_mut() {
            object.insert("zzzextra".to_string(), extra);
        }
        prop_assert!(compare(&left, &right).is_ok());
    }

    /// The placeholder is accepted in any container position.
    #[test]
    fn placeholder_found_in_any_position(
        others in prop::collection::vec(plain_container(), 0..5),
        position in any::<prop::sample::Index>(),
    ) {
        let at = position.index(others.len() + 1);
        let mut containers = others;
        containers.insert(at, ContainerBuilder::new("broker").placeholder());

        let raw = containers
            .into_iter()
            .fold(ConfigurationBuilder::new("zeroconf"), ConfigurationBuilder::container)
            .build_bytes();

        let validator = Validator::new(ValidationProfile::new([Check::Placeholder])).unwrap();
        prop_assert!(validator.validate(&raw, "uid").is_allowed());
    }

    /// Without the placeholder, the placeholder check always denies.
    #[test]
    fn placeholder_missing_always_denied(
        containers in prop::collection::vec(plain_container(), 1..5),
    ) {
        let raw = containers
            .into_iter()
            .fold(ConfigurationBuilder::new("zeroconf"), ConfigurationBuilder::container)
            .build_bytes();

        let validator = Validator::new(ValidationProfile::new([Check::Placeholder])).unwrap();
        let verdict = validator.validate(&raw, "uid");
        prop_assert!(!verdict.is_allowed());
        prop_assert_eq!(verdict.code(), Some("MissingPlaceholder"));
    }

    /// Validation is a pure function of profile and bytes.
    #[test]
    fn validation_is_idempotent(
        checks in any_checks(),
        object in any_json(),
        uid in "[a-f0-9-]{1,36}",
    ) {
        let validator = Validator::new(ValidationProfile::new(checks)).unwrap();
        let raw = serde_json::to_vec(&object).unwrap();
        let first = validator.validate(&raw, &uid);
        let second = validator.validate(&raw, &uid);
        prop_assert_eq!(first.uid(), uid.as_str());
        prop_assert_eq!(first, second);
    }

    /// Every denial carries a reason and every allow carries none.
    #[test]
    fn denial_always_has_reason(checks in any_checks(), object in any_json()) {
        let validator = Validator::new(ValidationProfile::new(checks)).unwrap();
        let raw = serde_json::to_vec(&object).unwrap();
        let verdict = validator.validate(&raw, "uid");
        prop_assert_eq!(verdict.is_allowed(), verdict.reason().is_none());
    }
}
