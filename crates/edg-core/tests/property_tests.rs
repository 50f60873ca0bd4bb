//! # Property-Based Tests
//!
//! Invariants of the registry, store and validator checked with proptest.

#![allow(clippy::unwrap_used, clippy::panic)]

use chrono::{TimeZone, Utc};
use edg_core::{
    Asset, AssetData, AssetRelation, AssetResource, AssetTemplate, EdgError, MetadataStore,
    RelationType, SchemaRegistry, TagReading, TagValue, ValueType,
};
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// STRATEGIES
// =============================================================================

fn value_type() -> impl Strategy<Value = ValueType> {
    prop_oneof![
        Just(ValueType::Number),
        Just(ValueType::Text),
        Just(ValueType::Flag)
    ]
}

fn relation_type() -> impl Strategy<Value = RelationType> {
    prop_oneof![
        Just(RelationType::PartOf),
        Just(RelationType::ConnectedTo),
        Just(RelationType::LocatedIn)
    ]
}

fn reading_of(kind: &ValueType) -> TagReading {
    match kind {
        ValueType::Number => TagReading::Number(1.0),
        ValueType::Flag => TagReading::Flag(true),
        ValueType::Text | ValueType::Other(_) => TagReading::Text("x".into()),
    }
}

/// Tag names drawn from a small pool so readings and templates overlap.
fn tag_name() -> impl Strategy<Value = String> {
    "[a-e]".prop_map(|s| format!("tag-{s}"))
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Any valid asset reads back equal to what was stored.
    #[test]
    fn stored_asset_reads_back_equal(
        name in "[a-zA-Z0-9 _.-]{1,40}",
        template in proptest::option::of("[a-z-]{1,20}"),
        labels in vec("\\PC{0,16}", 0..6),
        secs in 0i64..4_000_000_000,
    ) {
        let store = MetadataStore::in_memory().expect("store");
        let created_at = Utc.timestamp_opt(secs, 0).single().expect("timestamp");
        let mut asset = Asset::new("asset-1", name, created_at).with_labels(labels);
        asset.template_name = template;

        store.create_asset(&asset).expect("create");
        prop_assert_eq!(store.get_asset("asset-1").expect("get"), Some(asset.clone()));
        prop_assert_eq!(store.get_asset_by_name(&asset.name).expect("get"), Some(asset));
    }

    /// Validation fails iff some tag names a resource of a different type.
    #[test]
    fn validation_matches_declared_types(
        resources in proptest::collection::btree_map(tag_name(), value_type(), 0..5),
        tags in vec((tag_name(), value_type()), 0..8),
    ) {
        let registry = SchemaRegistry::new();
        registry.insert(AssetTemplate {
            name: "tpl".into(),
            resources: resources
                .iter()
                .map(|(name, kind)| AssetResource {
                    name: name.clone(),
                    value_type: kind.clone(),
                    unit: None,
                })
                .collect(),
        });

        let expect_ok = tags
            .iter()
            .all(|(name, kind)| resources.get(name).is_none_or(|declared| declared == kind));
        let data = AssetData::new(
            "a1",
            tags.iter()
                .map(|(name, kind)| TagValue::new(name.clone(), reading_of(kind)))
                .collect(),
        );

        let result = registry.validate("tpl", &data);
        prop_assert_eq!(result.is_ok(), expect_ok);
        if let Err(e) = result {
            let is_mismatch = matches!(e, EdgError::TypeMismatch { .. });
            prop_assert!(is_mismatch);
        }
        // an unknown template never rejects
        prop_assert!(registry.validate("other", &data).is_ok());
    }

    /// A tag decodes iff exactly one of number/text/flag is present.
    #[test]
    fn tag_decodes_iff_exactly_one_value(
        number in proptest::option::of(-1.0e6f64..1.0e6),
        text in proptest::option::of("[a-z]{0,8}"),
        flag in proptest::option::of(any::<bool>()),
    ) {
        let mut obj = serde_json::Map::new();
        obj.insert("name".into(), "t".into());
        if let Some(n) = number {
            obj.insert("number".into(), n.into());
        }
        if let Some(t) = &text {
            obj.insert("text".into(), t.clone().into());
        }
        if let Some(f) = flag {
            obj.insert("flag".into(), f.into());
        }

        let present = [number.is_some(), text.is_some(), flag.is_some()]
            .into_iter()
            .filter(|p| *p)
            .count();
        let decoded = serde_json::from_value::<TagValue>(serde_json::Value::Object(obj));
        prop_assert_eq!(decoded.is_ok(), present == 1);
    }

    /// Relation creation fails iff an endpoint is missing or the triple exists.
    #[test]
    fn relation_create_fails_iff_invalid(
        attempts in vec((0usize..4, 0usize..4, relation_type()), 1..20),
    ) {
        // ids 0..3 exist, id 3 never does
        let store = MetadataStore::in_memory().expect("store");
        for i in 0..3 {
            store
                .create_asset(&Asset::new(format!("a{i}"), format!("s{i}"), Utc::now()))
                .expect("create");
        }

        let mut seen = BTreeSet::new();
        for (n, (src, tgt, kind)) in attempts.into_iter().enumerate() {
            let relation = AssetRelation::new(
                format!("r{n}"),
                format!("a{src}"),
                format!("a{tgt}"),
                kind,
                Utc::now(),
            );
            let should_succeed = src < 3 && tgt < 3 && !seen.contains(&(src, tgt, kind));
            let result = store.create_relation(&relation);
            prop_assert_eq!(result.is_ok(), should_succeed);
            if should_succeed {
                seen.insert((src, tgt, kind));
            }
        }
        prop_assert_eq!(
            store.stats().expect("stats").total_relations,
            u64::try_from(seen.len()).expect("fits")
        );
    }

    /// After deleting an asset no remaining relation references it.
    #[test]
    fn delete_asset_cascades(
        edges in btree_set((0usize..5, 0usize..5, relation_type()), 0..15),
        victim in 0usize..5,
    ) {
        let store = MetadataStore::in_memory().expect("store");
        for i in 0..5 {
            store
                .create_asset(&Asset::new(format!("a{i}"), format!("s{i}"), Utc::now()))
                .expect("create");
        }
        let mut ids = BTreeMap::new();
        for (n, (src, tgt, kind)) in edges.iter().enumerate() {
            let id = format!("r{n}");
            store
                .create_relation(&AssetRelation::new(
                    id.clone(),
                    format!("a{src}"),
                    format!("a{tgt}"),
                    *kind,
                    Utc::now(),
                ))
                .expect("relation");
            ids.insert(id, (*src, *tgt));
        }

        store.delete_asset(&format!("a{victim}")).expect("delete");

        for (id, (src, tgt)) in &ids {
            let touches = *src == victim || *tgt == victim;
            prop_assert_eq!(store.get_relation(id).expect("get").is_none(), touches);
        }
        let victim_id = format!("a{victim}");
        for i in (0..5).filter(|i| *i != victim) {
            let asset = format!("a{i}");
            for r in store.get_relations_by_source(&asset).expect("by source") {
                prop_assert!(!r.touches(&victim_id));
            }
            for r in store.get_relations_by_target(&asset).expect("by target") {
                prop_assert!(!r.touches(&victim_id));
            }
        }
    }
}
