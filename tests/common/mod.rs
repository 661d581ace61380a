//! Shared fixtures: a small tournament schema and a loader that serves canned
//! relation data.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use starling::orm::{ModelClass, ModelInstance, ModelRegistry, OrmError, OrmField, RelationLoader};
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct Models {
    pub registry: ModelRegistry,
    pub tournament: ModelClass,
    pub event: ModelClass,
    pub team: ModelClass,
}

pub fn models() -> Models {
    let tournament = ModelClass::builder("Tournament")
        .field(OrmField::int("id").pk().generated())
        .field(OrmField::text("name", Some(100)))
        .field(OrmField::datetime("created").generated().read_only())
        .field(OrmField::reverse_relation("events", "Event"))
        .build()
        .unwrap();
    let event = ModelClass::builder("Event")
        .field(OrmField::int("id").pk().generated())
        .field(OrmField::text("name", Some(100)).description("Event title"))
        .field(OrmField::foreign_key("tournament", "Tournament"))
        .field(OrmField::many_to_many("participants", "Team"))
        .field(OrmField::float("prize").null())
        .field(OrmField::boolean("public").default_value(true))
        .build()
        .unwrap();
    let team = ModelClass::builder("Team")
        .field(OrmField::int("id").pk().generated())
        .field(OrmField::text("name", Some(50)))
        .build()
        .unwrap();
    let registry = ModelRegistry::new();
    registry.register(&tournament).register(&event).register(&team);
    Models {
        registry,
        tournament,
        event,
        team,
    }
}

/// Serves fixed relation values and counts fetches.
#[derive(Default)]
pub struct CannedLoader {
    pub fetches: AtomicUsize,
}

impl CannedLoader {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelationLoader for CannedLoader {
    async fn fetch_related(&self, instance: &ModelInstance, relation: &str) -> Result<Value, OrmError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match relation {
            // full rows, as a database would return them
            "tournament" => Ok(json!({
                "id": instance.get("tournament_id"),
                "name": "Open",
                "organizer_email": "ops@example.com",
                "events": [{"id": 3}],
            })),
            "participants" => Ok(json!([
                {"id": 1, "name": "Reds", "password_hash": "x"},
                {"id": 2, "name": "Blues", "password_hash": "y"},
            ])),
            "events" => Ok(json!([])),
            other => Err(OrmError::Loader {
                model: instance.class().name().to_string(),
                relation: other.to_string(),
                message: "no canned value".to_string(),
            }),
        }
    }
}
