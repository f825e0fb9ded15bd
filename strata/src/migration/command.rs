use crate::common::SortDirection;
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::migration::options::FieldOptions;
use crate::migration::target::{Compression, Target, ViewLink};
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// The recognized field types a validation node can be synthesized from.
///
/// # Purpose
/// Closed set of primitive and composite field types accepted by `add`,
/// `modify`, and typed `remove` subcommands. Each family maps to one code
/// path in the schema compiler.
///
/// # Characteristics
/// - **Closed**: Alias-qualified external types are rejected at parse time
///   with `InvalidFieldType`
/// - **Composite**: `Array` wraps a boxed element type
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Decimal,
    Float,
    Boolean,
    Date,
    Datetime,
    UtcDatetime,
    UtcDatetimeUsec,
    NaiveDatetime,
    NaiveDatetimeUsec,
    Uuid,
    Map,
    Enum,
    Const,
    Array(Box<FieldType>),
}

impl FieldType {
    /// Parses a field type from its textual name.
    ///
    /// Array types use an `array:` prefix, e.g. `array:string`.
    ///
    /// # Errors
    /// `InvalidFieldType` for anything outside the recognized set, including
    /// alias-qualified external types such as `MyApp.CustomType`.
    pub fn parse(name: &str) -> StrataResult<FieldType> {
        if let Some(subtype) = name.strip_prefix("array:") {
            return Ok(FieldType::Array(Box::new(FieldType::parse(subtype)?)));
        }
        match name {
            "string" => Ok(FieldType::String),
            "integer" => Ok(FieldType::Integer),
            "number" => Ok(FieldType::Number),
            "decimal" => Ok(FieldType::Decimal),
            "float" => Ok(FieldType::Float),
            "boolean" => Ok(FieldType::Boolean),
            "date" => Ok(FieldType::Date),
            "datetime" => Ok(FieldType::Datetime),
            "utc_datetime" => Ok(FieldType::UtcDatetime),
            "utc_datetime_usec" => Ok(FieldType::UtcDatetimeUsec),
            "naive_datetime" => Ok(FieldType::NaiveDatetime),
            "naive_datetime_usec" => Ok(FieldType::NaiveDatetimeUsec),
            "uuid" => Ok(FieldType::Uuid),
            "map" => Ok(FieldType::Map),
            "enum" => Ok(FieldType::Enum),
            "const" => Ok(FieldType::Const),
            other => Err(StrataError::new(
                &format!("unknown field type `{}`", other),
                ErrorKind::InvalidFieldType,
            )),
        }
    }

    /// Returns the textual name of this type.
    pub fn name(&self) -> String {
        match self {
            FieldType::String => "string".to_string(),
            FieldType::Integer => "integer".to_string(),
            FieldType::Number => "number".to_string(),
            FieldType::Decimal => "decimal".to_string(),
            FieldType::Float => "float".to_string(),
            FieldType::Boolean => "boolean".to_string(),
            FieldType::Date => "date".to_string(),
            FieldType::Datetime => "datetime".to_string(),
            FieldType::UtcDatetime => "utc_datetime".to_string(),
            FieldType::UtcDatetimeUsec => "utc_datetime_usec".to_string(),
            FieldType::NaiveDatetime => "naive_datetime".to_string(),
            FieldType::NaiveDatetimeUsec => "naive_datetime_usec".to_string(),
            FieldType::Uuid => "uuid".to_string(),
            FieldType::Map => "map".to_string(),
            FieldType::Enum => "enum".to_string(),
            FieldType::Const => "const".to_string(),
            FieldType::Array(subtype) => format!("array:{}", subtype.name()),
        }
    }
}

impl FromStr for FieldType {
    type Err = StrataError;

    fn from_str(s: &str) -> StrataResult<FieldType> {
        FieldType::parse(s)
    }
}

/// A raw migration action: database-native text or an opaque closure.
///
/// Closures are compared by identity and rendered opaquely, like the
/// type-erased argument closures of the underlying migration machinery.
#[derive(Clone)]
pub enum RawAction {
    Text(String),
    Closure(Arc<dyn Fn() -> StrataResult<()> + Send + Sync>),
}

impl RawAction {
    pub fn text(text: &str) -> Self {
        RawAction::Text(text.to_string())
    }

    pub fn closure<F>(f: F) -> Self
    where
        F: Fn() -> StrataResult<()> + Send + Sync + 'static,
    {
        RawAction::Closure(Arc::new(f))
    }

    /// The carried text, when the action is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawAction::Text(text) => Some(text.as_str()),
            RawAction::Closure(_) => None,
        }
    }
}

impl Debug for RawAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RawAction::Text(text) => write!(f, "Text({:?})", text),
            RawAction::Closure(_) => write!(f, "Closure(<closure>)"),
        }
    }
}

impl PartialEq for RawAction {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RawAction::Text(a), RawAction::Text(b)) => a == b,
            (RawAction::Closure(a), RawAction::Closure(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A field- or link-level edit nested inside a create/alter command.
#[derive(Clone, Debug, PartialEq)]
pub enum Subcommand {
    /// Adds a field of the given type.
    Add {
        name: String,
        field_type: FieldType,
        opts: FieldOptions,
    },
    /// Adds a field only when it does not already exist.
    AddIfAbsent {
        name: String,
        field_type: FieldType,
        opts: FieldOptions,
    },
    /// Adds a nested field group compiled into an object node.
    AddEmbeddedGroup {
        name: String,
        opts: FieldOptions,
        subcommands: Vec<Subcommand>,
    },
    /// Adds a repeated field group compiled into an array of object nodes.
    AddEmbeddedGroupMany {
        name: String,
        opts: FieldOptions,
        subcommands: Vec<Subcommand>,
    },
    /// Replaces a field's type and options.
    Modify {
        name: String,
        field_type: FieldType,
        opts: FieldOptions,
    },
    /// Removes a field. The recorded type and options, when given, make the
    /// removal reversible.
    Remove {
        name: String,
        recorded: Option<(FieldType, FieldOptions)>,
    },
    /// Removes a field only when it exists.
    RemoveIfExists {
        name: String,
        recorded: Option<(FieldType, FieldOptions)>,
    },
    /// Renames a field.
    Rename { from: String, to: String },
    /// Adds a primary-sort entry to a view.
    AddSort {
        field: String,
        direction: SortDirection,
    },
    /// Adds a stored-values entry to a view.
    AddStore {
        fields: Vec<String>,
        compression: Compression,
    },
    /// Adds a collection link to a view.
    AddLink { name: String, link: ViewLink },
    /// Removes a collection link from a view. The recorded link payload, when
    /// given, makes the removal reversible.
    RemoveLink {
        name: String,
        link: Option<ViewLink>,
    },
}

impl Subcommand {
    pub fn add(name: &str, field_type: FieldType, opts: FieldOptions) -> Self {
        Subcommand::Add {
            name: name.to_string(),
            field_type,
            opts,
        }
    }

    pub fn add_if_absent(name: &str, field_type: FieldType, opts: FieldOptions) -> Self {
        Subcommand::AddIfAbsent {
            name: name.to_string(),
            field_type,
            opts,
        }
    }

    pub fn modify(name: &str, field_type: FieldType, opts: FieldOptions) -> Self {
        Subcommand::Modify {
            name: name.to_string(),
            field_type,
            opts,
        }
    }

    pub fn remove(name: &str) -> Self {
        Subcommand::Remove {
            name: name.to_string(),
            recorded: None,
        }
    }

    pub fn remove_typed(name: &str, field_type: FieldType, opts: FieldOptions) -> Self {
        Subcommand::Remove {
            name: name.to_string(),
            recorded: Some((field_type, opts)),
        }
    }

    pub fn remove_if_exists(name: &str) -> Self {
        Subcommand::RemoveIfExists {
            name: name.to_string(),
            recorded: None,
        }
    }

    pub fn remove_if_exists_typed(name: &str, field_type: FieldType, opts: FieldOptions) -> Self {
        Subcommand::RemoveIfExists {
            name: name.to_string(),
            recorded: Some((field_type, opts)),
        }
    }

    pub fn rename(from: &str, to: &str) -> Self {
        Subcommand::Rename {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn embedded_group(name: &str, opts: FieldOptions, subcommands: Vec<Subcommand>) -> Self {
        Subcommand::AddEmbeddedGroup {
            name: name.to_string(),
            opts,
            subcommands,
        }
    }

    pub fn embedded_group_many(
        name: &str,
        opts: FieldOptions,
        subcommands: Vec<Subcommand>,
    ) -> Self {
        Subcommand::AddEmbeddedGroupMany {
            name: name.to_string(),
            opts,
            subcommands,
        }
    }

    pub fn add_sort(field: &str, direction: SortDirection) -> Self {
        Subcommand::AddSort {
            field: field.to_string(),
            direction,
        }
    }

    pub fn add_store(fields: &[&str], compression: Compression) -> Self {
        Subcommand::AddStore {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            compression,
        }
    }

    pub fn add_link(name: &str, link: ViewLink) -> Self {
        Subcommand::AddLink {
            name: name.to_string(),
            link,
        }
    }

    pub fn remove_link(name: &str) -> Self {
        Subcommand::RemoveLink {
            name: name.to_string(),
            link: None,
        }
    }

    pub fn remove_link_recorded(name: &str, link: ViewLink) -> Self {
        Subcommand::RemoveLink {
            name: name.to_string(),
            link: Some(link),
        }
    }

    /// Short human-readable description, used in messages and logs.
    pub fn describe(&self) -> String {
        match self {
            Subcommand::Add { name, .. } => format!("add field `{}`", name),
            Subcommand::AddIfAbsent { name, .. } => {
                format!("add field `{}` if not exists", name)
            }
            Subcommand::AddEmbeddedGroup { name, .. } => {
                format!("add embedded group `{}`", name)
            }
            Subcommand::AddEmbeddedGroupMany { name, .. } => {
                format!("add embedded group `{}` (many)", name)
            }
            Subcommand::Modify { name, .. } => format!("modify field `{}`", name),
            Subcommand::Remove { name, .. } => format!("remove field `{}`", name),
            Subcommand::RemoveIfExists { name, .. } => {
                format!("remove field `{}` if exists", name)
            }
            Subcommand::Rename { from, to } => {
                format!("rename field `{}` to `{}`", from, to)
            }
            Subcommand::AddSort { field, .. } => format!("add sort on `{}`", field),
            Subcommand::AddStore { fields, .. } => {
                format!("add stored values on `{}`", fields.join(", "))
            }
            Subcommand::AddLink { name, .. } => format!("add link `{}`", name),
            Subcommand::RemoveLink { name, .. } => format!("remove link `{}`", name),
        }
    }
}

/// A top-level create/alter/drop/raw operation bound to one target.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Create(Target, Vec<Subcommand>),
    CreateIfAbsent(Target, Vec<Subcommand>),
    Alter(Target, Vec<Subcommand>),
    Drop(Target),
    DropIfExists(Target),
    Rename(Target, String),
    Raw(RawAction),
    RawReversible(RawAction, RawAction),
}

impl Command {
    /// Returns the structural target this command is bound to, if any.
    pub fn target(&self) -> Option<&Target> {
        match self {
            Command::Create(t, _)
            | Command::CreateIfAbsent(t, _)
            | Command::Alter(t, _)
            | Command::Drop(t)
            | Command::DropIfExists(t)
            | Command::Rename(t, _) => Some(t),
            Command::Raw(_) | Command::RawReversible(_, _) => None,
        }
    }

    /// Short human-readable description, used in messages and logs.
    pub fn describe(&self) -> String {
        match self {
            Command::Create(t, _) => format!("create {} `{}`", t.kind_name(), t.name()),
            Command::CreateIfAbsent(t, _) => {
                format!("create {} `{}` if not exists", t.kind_name(), t.name())
            }
            Command::Alter(t, _) => format!("alter {} `{}`", t.kind_name(), t.name()),
            Command::Drop(t) => format!("drop {} `{}`", t.kind_name(), t.name()),
            Command::DropIfExists(t) => {
                format!("drop {} `{}` if exists", t.kind_name(), t.name())
            }
            Command::Rename(t, to) => {
                format!("rename {} `{}` to `{}`", t.kind_name(), t.name(), to)
            }
            Command::Raw(_) => "raw command".to_string(),
            Command::RawReversible(_, _) => "raw reversible command".to_string(),
        }
    }
}

/// Produces the two timestamp field additions used by `Runner::timestamps`.
///
/// The field names and type come from the migration context configuration.
pub fn timestamp_fields(
    inserted_at: &str,
    updated_at: &str,
    field_type: FieldType,
) -> Vec<Subcommand> {
    vec![
        Subcommand::add(inserted_at, field_type.clone(), FieldOptions::new()),
        Subcommand::add(updated_at, field_type, FieldOptions::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opts;

    // ==================== FieldType Tests ====================

    #[test]
    fn test_field_type_parse_primitives() {
        assert_eq!(FieldType::parse("string").unwrap(), FieldType::String);
        assert_eq!(FieldType::parse("integer").unwrap(), FieldType::Integer);
        assert_eq!(FieldType::parse("uuid").unwrap(), FieldType::Uuid);
        assert_eq!(
            FieldType::parse("naive_datetime_usec").unwrap(),
            FieldType::NaiveDatetimeUsec
        );
    }

    #[test]
    fn test_field_type_parse_array() {
        assert_eq!(
            FieldType::parse("array:string").unwrap(),
            FieldType::Array(Box::new(FieldType::String))
        );
        assert_eq!(
            FieldType::parse("array:array:integer").unwrap(),
            FieldType::Array(Box::new(FieldType::Array(Box::new(FieldType::Integer))))
        );
    }

    #[test]
    fn test_field_type_parse_rejects_external_types() {
        let err = FieldType::parse("MyApp.CustomType").expect_err("should be rejected");
        assert_eq!(err.kind(), &ErrorKind::InvalidFieldType);
        assert!(err.message().contains("MyApp.CustomType"));
    }

    #[test]
    fn test_field_type_name_round_trip() {
        for name in ["string", "decimal", "utc_datetime", "array:float"] {
            let parsed = FieldType::parse(name).unwrap();
            assert_eq!(parsed.name(), name);
            assert_eq!(name.parse::<FieldType>().unwrap(), parsed);
        }
    }

    // ==================== RawAction Tests ====================

    #[test]
    fn test_raw_action_text_equality() {
        assert_eq!(RawAction::text("FOR u IN users"), RawAction::text("FOR u IN users"));
        assert_ne!(RawAction::text("a"), RawAction::text("b"));
    }

    #[test]
    fn test_raw_action_closure_identity_equality() {
        let action = RawAction::closure(|| Ok(()));
        assert_eq!(action.clone(), action);
        assert_ne!(action, RawAction::closure(|| Ok(())));
        assert_ne!(action, RawAction::text("x"));
    }

    #[test]
    fn test_raw_action_debug_is_opaque_for_closures() {
        let action = RawAction::closure(|| Ok(()));
        assert_eq!(format!("{:?}", action), "Closure(<closure>)");
    }

    // ==================== Command Tests ====================

    #[test]
    fn test_command_target_accessor() {
        let cmd = Command::Create(Target::collection("users"), vec![]);
        assert_eq!(cmd.target().map(|t| t.name()), Some("users"));
        assert!(Command::Raw(RawAction::text("x")).target().is_none());
    }

    #[test]
    fn test_command_describe() {
        let cmd = Command::Drop(Target::index("users", &["email"]));
        assert_eq!(cmd.describe(), "drop index `idx_users_email`");
        let cmd = Command::Rename(Target::collection("users"), "customers".to_string());
        assert_eq!(cmd.describe(), "rename collection `users` to `customers`");
    }

    #[test]
    fn test_subcommand_describe() {
        assert_eq!(
            Subcommand::add("age", FieldType::Integer, opts! {}).describe(),
            "add field `age`"
        );
        assert_eq!(
            Subcommand::rename("a", "b").describe(),
            "rename field `a` to `b`"
        );
    }

    // ==================== Timestamp Helper Tests ====================

    #[test]
    fn test_timestamp_fields() {
        let subs = timestamp_fields("inserted_at", "updated_at", FieldType::NaiveDatetime);
        assert_eq!(subs.len(), 2);
        assert_eq!(
            subs[0],
            Subcommand::add("inserted_at", FieldType::NaiveDatetime, FieldOptions::new())
        );
        assert_eq!(
            subs[1],
            Subcommand::add("updated_at", FieldType::NaiveDatetime, FieldOptions::new())
        );
    }
}
