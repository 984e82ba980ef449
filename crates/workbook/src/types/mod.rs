//! Item type behaviors and the registry that dispatches on an item's tag.
//!
//! Each type implements the capability set `{save_response, validate_config,
//! is_completed}`. Adding a type means one implementation and one
//! [`ItemTypeRegistry::register`] call; nothing else in the crate changes.

mod date_picker;
mod file_upload;
mod select_menu;
mod text_input;

pub use date_picker::{selected_date, DatePicker};
pub use file_upload::FileUpload;
pub use select_menu::{parse_options, SelectMenu, SelectOption};
pub use text_input::TextInput;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::checklist::{Item, ItemId};
use crate::evaluation::SubjectId;
use crate::responses::{Response, ResponseRepository, SaveOutcome};
use crate::store::RepositoryError;

/// Built-in type tags.
pub const TEXT_INPUT: &str = "text_input";
pub const SELECT_MENU: &str = "select_menu";
pub const DATE_PICKER: &str = "date_picker";
pub const FILE_UPLOAD: &str = "file_upload";

/// Value kind a config key accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    Text,
    Integer,
    /// Structured payload the type validates itself (see `select_menu`).
    Raw,
}

/// One allowed key in a type's config schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigField {
    pub key: &'static str,
    pub kind: ConfigKind,
}

/// Rejections produced by config validation. Nothing is persisted when any
/// key fails: validate-then-write-all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("unknown config key '{0}'")]
    UnknownKey(String),
    #[error("config key '{key}' expects a {expected} value")]
    InvalidValue { key: String, expected: &'static str },
    #[error("options must be a list of objects with integer 'id' and text 'value' fields")]
    MalformedOptions,
}

/// Storage abstraction for per-item config rows. Writes go through the
/// registry-validated path only; `replace_config` swaps the whole key set.
pub trait ConfigRepository: Send + Sync {
    fn replace_config(
        &self,
        item: ItemId,
        entries: BTreeMap<String, String>,
    ) -> Result<(), RepositoryError>;
    fn fetch_config(&self, item: ItemId) -> Result<BTreeMap<String, String>, RepositoryError>;
}

/// External file area handling uploaded bytes. The core only records that an
/// upload round-trip was invoked for a (item, subject, version) key.
pub trait FileStorage: Send + Sync {
    fn record_upload(
        &self,
        item: ItemId,
        subject: SubjectId,
        version: u32,
        filetypes: Option<&str>,
    ) -> Result<(), FileStorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FileStorageError {
    #[error("file area unavailable: {0}")]
    Unavailable(String),
}

/// Collaborators a type behavior may touch while saving a response.
pub struct SaveContext<'a> {
    pub item: &'a Item,
    pub subject: SubjectId,
    pub version: u32,
    pub responses: &'a dyn ResponseRepository,
    pub configs: &'a dyn ConfigRepository,
    pub files: &'a dyn FileStorage,
}

/// Behavior of one item type.
pub trait ItemTypeBehavior: Send + Sync {
    /// Stable tag stored on items of this type.
    fn tag(&self) -> &'static str;

    /// Allowed config keys and their value kinds.
    fn config_schema(&self) -> &'static [ConfigField];

    /// Persist a response for (item, subject, version). Most types call
    /// [`persist_response`]; overrides may decline or reinterpret the value.
    fn save_response(
        &self,
        ctx: &SaveContext<'_>,
        raw: Option<&str>,
    ) -> Result<SaveOutcome, crate::responses::ResponseError>;

    /// Validate a raw config payload into the stored key/value map.
    fn validate_config(
        &self,
        raw: &Map<String, Value>,
    ) -> Result<BTreeMap<String, String>, ConfigValidationError> {
        validate_against_schema(self.config_schema(), raw)
    }

    /// Completion predicate: by default an item counts as done once a
    /// response row exists for the key.
    fn is_completed(
        &self,
        responses: &dyn ResponseRepository,
        item: ItemId,
        subject: SubjectId,
        version: u32,
    ) -> Result<bool, RepositoryError> {
        responses.response_exists(item, subject, version)
    }
}

/// Shared save path: upsert the value, recompute `completed` through the
/// type's predicate, persist the flag. The flag write comes second because
/// completion may depend on the value that was just written.
pub fn persist_response(
    behavior: &dyn ItemTypeBehavior,
    ctx: &SaveContext<'_>,
    value: Option<&str>,
) -> Result<SaveOutcome, crate::responses::ResponseError> {
    let response = ctx.responses.upsert_response(
        ctx.item.id,
        ctx.subject,
        ctx.version,
        value.map(str::to_string),
    )?;
    let completed = behavior.is_completed(ctx.responses, ctx.item.id, ctx.subject, ctx.version)?;
    ctx.responses.mark_completed(response.id, completed)?;
    Ok(SaveOutcome::Saved(Response {
        completed,
        ..response
    }))
}

pub(crate) fn validate_against_schema(
    schema: &[ConfigField],
    raw: &Map<String, Value>,
) -> Result<BTreeMap<String, String>, ConfigValidationError> {
    let mut validated = BTreeMap::new();
    for (key, value) in raw {
        let field = schema
            .iter()
            .find(|field| field.key == key)
            .ok_or_else(|| ConfigValidationError::UnknownKey(key.clone()))?;
        let stored = match field.kind {
            ConfigKind::Text => match value {
                Value::String(text) => text.clone(),
                _ => {
                    return Err(ConfigValidationError::InvalidValue {
                        key: key.clone(),
                        expected: "text",
                    })
                }
            },
            ConfigKind::Integer => coerce_integer(key, value)?,
            ConfigKind::Raw => value.to_string(),
        };
        validated.insert(key.clone(), stored);
    }
    Ok(validated)
}

fn coerce_integer(key: &str, value: &Value) -> Result<String, ConfigValidationError> {
    let parsed = match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(number) => Ok(number.to_string()),
        None => Err(ConfigValidationError::InvalidValue {
            key: key.to_string(),
            expected: "integer",
        }),
    }
}

/// Maps a type tag to its behavior. Built-ins are registered at
/// construction; callers may register further types before sharing the
/// registry.
pub struct ItemTypeRegistry {
    behaviors: BTreeMap<&'static str, Arc<dyn ItemTypeBehavior>>,
}

impl ItemTypeRegistry {
    /// Registry holding the four built-in types.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            behaviors: BTreeMap::new(),
        };
        registry.register(Arc::new(TextInput));
        registry.register(Arc::new(SelectMenu));
        registry.register(Arc::new(DatePicker));
        registry.register(Arc::new(FileUpload));
        registry
    }

    pub fn register(&mut self, behavior: Arc<dyn ItemTypeBehavior>) {
        self.behaviors.insert(behavior.tag(), behavior);
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn ItemTypeBehavior>> {
        self.behaviors.get(tag).cloned()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.behaviors.contains_key(tag)
    }

    /// Registered tags in stable order.
    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.behaviors.keys().copied()
    }
}
