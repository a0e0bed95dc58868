//! Resource actions and their accumulated changes and log lines.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use orchstate_core::Value;
use orchstate_store::{Driver, Filter, FindOptions, SortOrder};
use tracing::Level;
use uuid::Uuid;

use crate::document::Document;
use crate::enums::{ResourceActionKind, ResourceState};
use crate::error::{DataError, Result};
use crate::field::{defaults, Field, FieldType, StoredEnum};
use crate::schema::{Entity, Index, Schema};

/// One executed action against a set of resource versions.
#[derive(Debug, Clone, Copy)]
pub struct ResourceAction;

pub(crate) static RESOURCE_ACTION: Schema = Schema {
    collection: "ResourceAction",
    fields: &[
        Field::required("environment", FieldType::Uuid),
        Field::required("resource_version_ids", FieldType::List),
        Field::required("action_id", FieldType::Uuid),
        Field::required("action", FieldType::Enum(ResourceActionKind::TABLE)),
        Field::required("started", FieldType::DateTime),
        Field::nullable("finished", FieldType::DateTime),
        Field::optional("messages", FieldType::List, defaults::empty_list),
        Field::nullable("status", FieldType::Enum(ResourceState::TABLE)),
        Field::optional("changes", FieldType::Map, defaults::empty_map),
    ],
    indexes: &[
        Index {
            fields: &["environment", "action_id"],
            unique: false,
        },
        Index {
            fields: &["environment", "started"],
            unique: false,
        },
    ],
    children: &[],
};

impl Entity for ResourceAction {
    fn schema() -> &'static Schema {
        &RESOURCE_ACTION
    }
}

impl Document<ResourceAction> {
    /// Merge per-resource field changes into `changes`.
    ///
    /// `changes` maps a resource id to a map of field name to an
    /// `{"old": .., "new": ..}` record. A field named again replaces its
    /// earlier record as a whole, and fields not named are kept. An empty
    /// record marks a field as touched without a diff.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Validation` if a resource entry or a field record is
    /// not a map.
    pub fn add_changes(&mut self, changes: BTreeMap<String, Value>) -> Result<()> {
        let merged = self.map_mut("changes")?;
        for (resource, fields) in changes {
            let Value::Map(fields) = fields else {
                return Err(DataError::validation(
                    "changes",
                    format!("changes of {resource} must be a map"),
                ));
            };
            let slot = merged.entry(resource.clone()).or_insert_with(Value::empty_map);
            if !matches!(slot, Value::Map(_)) {
                *slot = Value::empty_map();
            }
            let Some(known) = slot.as_map_mut() else {
                continue;
            };
            for (field, record) in fields {
                let Value::Map(record) = record else {
                    return Err(DataError::validation(
                        "changes",
                        format!("change record of {resource}.{field} must be a map"),
                    ));
                };
                known.insert(field, Value::Map(record));
            }
        }
        Ok(())
    }

    /// Append log entries to `messages`.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Validation` if `messages` is not a list.
    pub fn add_logs(&mut self, logs: impl IntoIterator<Item = Value>) -> Result<()> {
        self.list_mut("messages")?.extend(logs);
        Ok(())
    }

    /// The actions that touched a resource version, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or a record is corrupt.
    pub async fn get_log(
        driver: &dyn Driver,
        environment: Uuid,
        resource_version_id: &str,
        action: Option<ResourceActionKind>,
        limit: usize,
    ) -> Result<Vec<Self>> {
        let mut filter = Filter::new()
            .eq("environment", environment)
            .contains("resource_version_ids", resource_version_id);
        if let Some(action) = action {
            filter = filter.eq("action", action);
        }
        let options = FindOptions::default()
            .sort("started", SortOrder::Descending)
            .limit(limit);
        Self::find(driver, filter, options).await
    }

    /// The action recorded under `action_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the record is corrupt.
    pub async fn get_by_action_id(driver: &dyn Driver, action_id: Uuid) -> Result<Option<Self>> {
        Self::find_one(driver, Filter::new().eq("action_id", action_id)).await
    }
}

/// A structured log line attached to a resource action.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    /// Severity, by `tracing` level name.
    pub level: Level,
    /// The message with its placeholders filled in.
    pub msg: String,
    /// The arguments the message was rendered from.
    pub args: BTreeMap<String, Value>,
    /// When the line was recorded.
    pub timestamp: DateTime<Utc>,
}

impl LogLine {
    /// Record a log line, rendering `{name}` placeholders in `template` from `args`.
    ///
    /// Placeholders without a matching argument are kept as written.
    #[must_use]
    pub fn log<I, K, V>(level: Level, template: &str, args: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let args: BTreeMap<String, Value> =
            args.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self {
            level,
            msg: render(template, &args),
            args,
            timestamp: Utc::now(),
        }
    }

    /// The stored form of this line.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("level".to_string(), Value::from(self.level.to_string()));
        map.insert("msg".to_string(), Value::from(self.msg.clone()));
        map.insert("args".to_string(), Value::Map(self.args.clone()));
        map.insert("timestamp".to_string(), Value::DateTime(self.timestamp));
        Value::Map(map)
    }
}

impl From<LogLine> for Value {
    fn from(line: LogLine) -> Self {
        line.to_value()
    }
}

fn render(template: &str, args: &BTreeMap<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let Some(close) = tail.find('}') else {
            rest = tail;
            break;
        };
        match args.get(&tail[1..close]) {
            Some(Value::String(s)) => out.push_str(s),
            Some(value) => out.push_str(&value.to_json().to_string()),
            None => out.push_str(&tail[..=close]),
        }
        rest = &tail[close + 1..];
    }
    out.push_str(rest);
    out
}
