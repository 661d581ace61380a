//! Integration tests for the ORM plugin
//!
//! # Test Coverage
//!
//! - Schema memoization across contexts and threads
//! - Request body shape (no relations, keys or generated fields)
//! - Required / nullable flags mirroring the ORM
//! - `to_dict` awaiting relation loading
//! - Plugin lookup and mapping of validated values to instances

mod common;

use serde_json::{json, Map, Value};
use starling::config::SchemaCacheMode;
use starling::orm::{ModelInstance, RelationState};
use starling::plugins::{
    get_plugin_for_value, orm_plugin, OrmPlugin, Plugin, PluginMapping, SchemaContext,
    SchemaValue, TypeHint,
};
use std::sync::Arc;
use std::thread;

#[test]
fn test_schema_memoized_per_context() {
    let m = common::models();
    let plugin = OrmPlugin::new(m.registry.clone());

    let general = plugin
        .to_schema_model(&m.event, SchemaContext::General)
        .unwrap();
    let again = plugin
        .to_schema_model(&m.event, SchemaContext::General)
        .unwrap();
    assert!(Arc::ptr_eq(&general, &again), "same (model, context) must reuse the schema");

    let body = plugin
        .to_schema_model(&m.event, SchemaContext::RequestBody)
        .unwrap();
    assert!(!Arc::ptr_eq(&general, &body));
    assert_eq!(body.name(), "EventRequestBody");
}

#[test]
fn test_concurrent_first_use_converges() {
    let m = common::models();
    let plugin = Arc::new(OrmPlugin::new(m.registry.clone()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let plugin = Arc::clone(&plugin);
            let event = m.event.clone();
            thread::spawn(move || {
                plugin
                    .to_schema_model(&event, SchemaContext::General)
                    .unwrap()
            })
        })
        .collect();
    let schemas: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let cached = plugin
        .to_schema_model(&m.event, SchemaContext::General)
        .unwrap();
    assert!(schemas.iter().all(|s| Arc::ptr_eq(s, &cached)));
}

#[test]
fn test_request_body_has_no_relations_or_keys() {
    let m = common::models();
    let plugin = OrmPlugin::new(m.registry.clone());
    for class in [&m.tournament, &m.event, &m.team] {
        let body = plugin
            .to_schema_model(class, SchemaContext::RequestBody)
            .unwrap();
        for field in class.meta().fields() {
            if field.is_relation() || field.pk || field.generated || field.read_only {
                assert!(
                    body.field(&field.name).is_none(),
                    "{} must not be in {}",
                    field.name,
                    body.name()
                );
            }
        }
        assert!(body.fields().all(|f| !f.required));
    }
}

#[test]
fn test_flags_mirror_orm_fields() {
    let m = common::models();
    let plugin = OrmPlugin::new(m.registry.clone());
    let schema = plugin
        .to_schema_model(&m.event, SchemaContext::General)
        .unwrap();

    let name = schema.field("name").unwrap();
    assert!(name.required);
    assert!(!name.allow_none);
    assert_eq!(name.description.as_deref(), Some("Event title"));

    let prize = schema.field("prize").unwrap();
    assert!(!prize.required);
    assert!(prize.allow_none);

    let public = schema.field("public").unwrap();
    assert!(!public.required);
    assert_eq!(public.default, Some(json!(true)));

    let json_schema = schema.json_schema();
    assert_eq!(json_schema["properties"]["name"]["maxLength"], 100);
    assert_eq!(json_schema["properties"]["participants"]["type"], "array");
}

#[tokio::test]
async fn test_to_dict_loads_relations() {
    let m = common::models();
    let loader = Arc::new(common::CannedLoader::default());
    let plugin = OrmPlugin::new(m.registry.clone()).with_loader(loader.clone());

    let mut values = Map::new();
    values.insert("id".into(), json!(3));
    values.insert("name".into(), json!("Final"));
    values.insert("tournament_id".into(), json!(9));
    let event = plugin.from_dict(&m.event, values).unwrap();
    assert_eq!(event.unloaded_relations().count(), 2);

    let dict = plugin.to_dict(&event).await.unwrap();
    assert_eq!(loader.fetches(), 2);
    assert_eq!(dict["name"], "Final");
    assert_eq!(dict["tournament"], json!({"id": 9, "name": "Open"}));
    // loaded rows are cut down to the nested schema
    assert_eq!(
        dict["participants"],
        json!([{"id": 1, "name": "Reds"}, {"id": 2, "name": "Blues"}])
    );
    assert_eq!(dict["public"], true);
    assert_eq!(dict["prize"], Value::Null);

    // the caller's instance is left as it was
    assert!(matches!(
        event.relation("tournament"),
        Some(RelationState::Unloaded)
    ));
}

#[tokio::test]
async fn test_to_dict_skips_loader_when_loaded() {
    let m = common::models();
    let loader = Arc::new(common::CannedLoader::default());
    let plugin = OrmPlugin::new(m.registry.clone()).with_loader(loader.clone());

    let mut team = ModelInstance::new(&m.team);
    team.set("id", json!(1)).unwrap();
    team.set("name", json!("Reds")).unwrap();
    let dict = plugin.to_dict(&team).await.unwrap();
    assert_eq!(loader.fetches(), 0);
    assert_eq!(Value::Object(dict), json!({"id": 1, "name": "Reds"}));
}

#[test]
fn test_lookup_and_mapping_through_orm_plugin() {
    let m = common::models();
    let plugin: Arc<dyn Plugin> = Arc::new(OrmPlugin::new(m.registry.clone()));
    let plugins = vec![Arc::clone(&plugin)];

    let hint = TypeHint::list_of(TypeHint::model(&m.team));
    let found = get_plugin_for_value(&hint, &plugins).unwrap();
    assert!(Arc::ptr_eq(found, &plugin));
    assert!(get_plugin_for_value(&TypeHint::Sequence(vec![]), &plugins).is_none());

    let body = plugin
        .to_schema_model(&m.team, SchemaContext::RequestBody)
        .unwrap();
    let items = ["Reds", "Blues", "Greens"]
        .iter()
        .map(|n| body.validate(json!({"name": n})).unwrap())
        .collect();
    let mapping = PluginMapping::new(Arc::clone(&plugin), m.team.clone());
    let converted = mapping
        .get_value_converted_to_model_class(SchemaValue::Many(items))
        .unwrap();
    let names: Vec<_> = converted
        .as_many()
        .unwrap()
        .iter()
        .map(|t| t.get("name").cloned().unwrap())
        .collect();
    assert_eq!(names, vec![json!("Reds"), json!("Blues"), json!("Greens")]);
}

#[test]
fn test_orm_plugin_eager_cache() {
    let m = common::models();
    let plugin = orm_plugin(m.registry.clone(), None, SchemaCacheMode::Eager).unwrap();
    let first = plugin
        .to_schema_model(&m.tournament, SchemaContext::General)
        .unwrap();
    let second = plugin
        .to_schema_model(&m.tournament, SchemaContext::General)
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}
