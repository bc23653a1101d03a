#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use objgraph::{
    Cache, Document, Entity, EntityBase, EntityKind, ObjectStore, Payload, PlainObject, Result,
};

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

impl Payload for TaskData {
    const NAME: &'static str = "task";
}

pub type Task = Document<TaskData>;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LabelData {
    #[serde(default)]
    pub text: String,
}

impl Payload for LabelData {
    const NAME: &'static str = "label";
}

pub type Label = Document<LabelData>;

/// A kind that embeds its tasks as an id list.
pub struct Project {
    base: EntityBase,
    pub name: String,
    tasks: Mutex<Cache<Task>>,
}

impl Project {
    pub fn tasks(&self) -> MutexGuard<'_, Cache<Task>> {
        self.tasks.lock().unwrap()
    }
}

impl Entity for Project {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn to_plain_object(&self) -> PlainObject {
        let mut plain = self.base.plain_object();
        plain.insert("name".to_string(), json!(self.name));
        plain.insert("tasks".to_string(), json!(self.tasks().ids()));
        plain
    }
}

impl EntityKind for Project {
    const NAME: &'static str = "project";

    fn from_plain(mut data: PlainObject) -> Result<Self> {
        let base = EntityBase::from_plain(Self::NAME, &mut data)?;
        let name = data
            .get("name")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string();
        let ids: Vec<String> = data
            .get("tasks")
            .and_then(JsonValue::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let tasks = Mutex::new(Cache::with_ids(&base, ids));

        Ok(Self { base, name, tasks })
    }
}

pub fn seed(value: JsonValue) -> PlainObject {
    match value {
        JsonValue::Object(map) => map,
        _ => panic!("seed must be an object"),
    }
}

pub fn store() -> ObjectStore {
    let store = ObjectStore::new();
    store
        .register_as::<Project>("projects")
        .register_as::<Task>("tasks")
        .register_as::<Label>("labels");
    store
}

pub fn task(store: &ObjectStore, title: &str) -> Arc<Task> {
    store
        .create_with::<Task>(seed(json!({ "title": title })))
        .unwrap()
}
