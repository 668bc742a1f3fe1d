#![allow(dead_code)]

use recordstore_core::{
    EntityDescriptor, FieldDescriptor, FieldError, FieldKind, FieldMap, InMemoryRegistry,
    Operand, Predicate, QueryTemplate, Record, RecordId, RequestKind, ResultShape, Schema,
    SortKey, Value,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: RecordId,
    pub title: String,
    pub done: bool,
    pub priority: i64,
    pub note: Option<String>,
}

impl Record for Task {
    const ENTITY: &'static str = "Task";
    const TYPE_NAME: &'static str = "Task";

    fn blank(id: RecordId) -> Self {
        Self {
            id,
            title: String::new(),
            done: false,
            priority: 0,
            note: None,
        }
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_field(&mut self, field: &str, value: Value) -> Result<(), FieldError> {
        match field {
            "title" => self.title = value.into_text(field)?,
            "done" => self.done = value.into_bool(field)?,
            "priority" => self.priority = value.into_i64(field)?,
            "note" => self.note = value.into_optional_text(field)?,
            other => return Err(FieldError::unknown(other)),
        }
        Ok(())
    }

    fn to_fields(&self) -> FieldMap {
        FieldMap::from([
            ("title".to_string(), Value::from(self.title.as_str())),
            ("done".to_string(), Value::from(self.done)),
            ("priority".to_string(), Value::from(self.priority)),
            ("note".to_string(), Value::from(self.note.clone())),
        ])
    }
}

/// Record type whose name differs from every backing type in the model.
#[derive(Debug)]
pub struct Stranger {
    pub id: RecordId,
}

impl Record for Stranger {
    const ENTITY: &'static str = "Task";
    const TYPE_NAME: &'static str = "Stranger";

    fn blank(id: RecordId) -> Self {
        Self { id }
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_field(&mut self, field: &str, _value: Value) -> Result<(), FieldError> {
        Err(FieldError::unknown(field))
    }

    fn to_fields(&self) -> FieldMap {
        FieldMap::new()
    }
}

pub fn todo_schema() -> Schema {
    Schema::new("Todo")
        .with_entity(
            EntityDescriptor::new("Task", "Task")
                .with_field(FieldDescriptor::required("title", FieldKind::Text))
                .with_field(FieldDescriptor::required("done", FieldKind::Bool))
                .with_field(FieldDescriptor::required("priority", FieldKind::Integer))
                .with_field(FieldDescriptor::optional("note", FieldKind::Text)),
        )
        .with_entity(
            EntityDescriptor::new("Tag", "Tag")
                .with_field(FieldDescriptor::required("label", FieldKind::Text)),
        )
        .with_template(QueryTemplate {
            name: "open_tasks".to_string(),
            entity: "Task".to_string(),
            kind: RequestKind::Fetch,
            shape: ResultShape::Object,
            filter: Some(Predicate::eq("done", false)),
            order: Some(vec![SortKey::descending("priority")]),
            projection_fields: None,
            distinct: false,
        })
        .with_template(QueryTemplate {
            name: "tasks_with_priority".to_string(),
            entity: "Task".to_string(),
            kind: RequestKind::Fetch,
            shape: ResultShape::Identifier,
            filter: Some(Predicate::compare(
                "priority",
                recordstore_core::Comparison::Eq,
                Operand::var("priority"),
            )),
            order: None,
            projection_fields: None,
            distinct: false,
        })
        .with_template(QueryTemplate {
            name: "purge_done".to_string(),
            entity: "Task".to_string(),
            kind: RequestKind::BatchDelete,
            shape: ResultShape::Object,
            filter: Some(Predicate::eq("done", true)),
            order: None,
            projection_fields: None,
            distinct: false,
        })
}

pub fn todo_registry() -> InMemoryRegistry {
    InMemoryRegistry::new().register(todo_schema())
}

pub fn task_fields(title: &str, priority: i64) -> FieldMap {
    FieldMap::from([
        ("title".to_string(), Value::from(title)),
        ("priority".to_string(), Value::from(priority)),
    ])
}
