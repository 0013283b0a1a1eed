//! Property and integration tests for the wire format and the registry.
//!
//! # Test Strategy
//!
//! 1. **Round-trip**: every value kind decodes to itself, type tag included
//! 2. **Hostile input**: arbitrary bytes never panic the decoder
//! 3. **Registry**: overwrite semantics and lookups racing registrations

use std::collections::BTreeMap;
use std::sync::Arc;

use corelib::serialization::{deserialize, serialize, serialize_message};
use corelib::service::ServiceObject;
use corelib::{Error, ErrorValue, Routes, Service, Value};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Undefined),
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<f64>()
            .prop_filter("NaN never equals itself", |n| !n.is_nan())
            .prop_map(Value::Number),
        ".*".prop_map(Value::String),
        any::<i64>().prop_map(Value::Date),
        (".*", proptest::option::of("[A-Za-z]{1,12}"))
            .prop_map(|(message, kind)| Value::Error(ErrorValue { message, kind })),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
            prop::collection::btree_map(".*", inner, 0..8).prop_map(Value::Object),
        ]
    })
}

// ============================================================================
// Round-trip
// ============================================================================

proptest! {
    #[test]
    fn prop_round_trip(v in value()) {
        let decoded = deserialize(&serialize(&v)).unwrap();
        prop_assert_eq!(decoded.type_name(), v.type_name());
        prop_assert_eq!(decoded, v);
    }

    #[test]
    fn prop_decoder_never_panics(input in ".*") {
        match deserialize(&input) {
            Ok(_) | Err(Error::Deserialization(_)) => {}
            Err(other) => prop_assert!(false, "unexpected error kind {:?}", other),
        }
    }

    #[test]
    fn prop_scalar_message_matches_singleton(v in leaf()) {
        prop_assert_eq!(
            serialize_message(v.clone()).unwrap(),
            serialize_message(Value::Array(vec![v])).unwrap()
        );
    }
}

#[test]
fn test_argument_list_keeps_falsy_entries_in_order() {
    let args = Value::Array(vec![
        Value::Number(0.0),
        Value::String(String::new()),
        Value::Bool(false),
        Value::Null,
        Value::Undefined,
        Value::Object(BTreeMap::new()),
    ]);
    assert_eq!(deserialize(&serialize(&args)).unwrap(), args);
}

// ============================================================================
// Registry
// ============================================================================

fn tagged(tag: &'static str) -> Arc<dyn Service> {
    Arc::new(
        ServiceObject::builder(tag)
            .method("tag", move |_args: Vec<Value>| async move { Ok(Value::from(tag)) })
            .method("other", |_args: Vec<Value>| async move { Ok(Value::Null) })
            .build(),
    )
}

#[tokio::test]
async fn test_second_registration_fully_replaces_first() {
    let routes = Routes::new();
    routes
        .put(
            Arc::new(
                ServiceObject::builder("first")
                    .method("only_on_first", |_args: Vec<Value>| async move { Ok(Value::Null) })
                    .build(),
            ),
            "routes",
        )
        .unwrap();
    routes.put(tagged("second"), "routes").unwrap();

    assert_eq!(
        routes.dispatch("routes", "tag", vec![]).await.unwrap(),
        Value::from("second")
    );
    // Methods of the first object are gone, not merged in.
    let err = routes.dispatch("routes", "only_on_first", vec![]).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn test_unknown_lookup_is_not_found() {
    let routes = Routes::new();
    match routes.get("doesNotExist") {
        Err(Error::NotFound(msg)) => assert!(msg.contains("doesNotExist")),
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("lookup of an unknown service succeeded"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lookups_see_whole_entries_during_overwrites() {
    let routes = Arc::new(Routes::new());
    routes.put(tagged("a"), "svc").unwrap();

    let writer = {
        let routes = Arc::clone(&routes);
        tokio::spawn(async move {
            for i in 0..500 {
                let tag = if i % 2 == 0 { "b" } else { "a" };
                routes.put(tagged(tag), "svc").unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let routes = Arc::clone(&routes);
        readers.push(tokio::spawn(async move {
            for _ in 0..500 {
                let service = routes.get("svc").unwrap();
                assert_eq!(service.methods(), vec!["other".to_string(), "tag".to_string()]);
                let tag = service.call("tag", vec![]).await.unwrap();
                assert!(tag == Value::from("a") || tag == Value::from("b"));
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}
