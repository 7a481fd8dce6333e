// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service identity round-trip laws and boundary behaviors.

use proptest::prelude::*;
use tcs_core::{ServiceId, ServiceIdError};

proptest! {
    /// parse(build(t, v)) == (t, v) for any valid type and dotless variant.
    #[test]
    fn build_parse_round_trip(
        service_type in "[a-z_][a-z0-9_]{0,10}(\\.[a-z][a-z0-9_]{0,6}){0,3}",
        variant in "[A-Za-z0-9_-]{1,10}",
    ) {
        let id = ServiceId::new(service_type.clone(), variant.clone()).unwrap();
        let parsed = ServiceId::parse(&id.to_string()).unwrap();
        prop_assert_eq!(parsed.service_type(), service_type.as_str());
        prop_assert_eq!(parsed.variant(), variant.as_str());
    }
}

#[test]
fn variant_with_dot_is_a_construction_error() {
    assert!(matches!(
        ServiceId::new("guider", "jk.15"),
        Err(ServiceIdError::DottedVariant(_))
    ));
}

#[test]
fn service_id_without_dot_is_a_parse_error() {
    assert!(matches!(
        ServiceId::parse("lonely"),
        Err(ServiceIdError::MissingVariant(_))
    ));
}

#[test]
fn variant_is_always_the_last_segment() {
    let id = ServiceId::parse("examples.minimal.tutorial").unwrap();
    assert_eq!(id.service_type(), "examples.minimal");
    assert_eq!(id.variant(), "tutorial");
}
