use crate::common::Value;
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::migration::command::{FieldType, Subcommand};
use crate::migration::options::FieldOptions;
use indexmap::IndexMap;
use log::warn;
use regex::Regex;

/// Pattern matched by `naive_datetime` fields (second precision).
pub const NAIVE_DATETIME_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}$";

/// Pattern matched by `naive_datetime_usec` fields (microsecond precision).
pub const NAIVE_DATETIME_USEC_PATTERN: &str =
    r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}\.\d{1,6}$";

/// Pattern matched by `uuid` fields.
pub const UUID_PATTERN: &str =
    "^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$";

/// The kind tag of a validation node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl NodeKind {
    /// Returns the JSON Schema type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::String => "string",
            NodeKind::Number => "number",
            NodeKind::Boolean => "boolean",
            NodeKind::Object => "object",
            NodeKind::Array => "array",
        }
    }
}

/// One node of a compiled validation tree.
///
/// # Purpose
/// Recursive JSON-Schema-equivalent rule node. Object nodes carry an
/// insertion-ordered `properties` mapping, array nodes carry one `items`
/// child, and every node carries the validation keywords its type family
/// consumed.
///
/// # Characteristics
/// - **Root asymmetry**: The root of a compiled collection document carries
///   no kind tag of its own; every nested object node does
/// - **Nullability**: A nullable node serializes its kind as a two-element
///   union with `"null"`
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationNode {
    kind: Option<NodeKind>,
    nullable: bool,
    keywords: IndexMap<String, Value>,
    properties: IndexMap<String, ValidationNode>,
    items: Option<Box<ValidationNode>>,
}

impl ValidationNode {
    fn leaf(kind: NodeKind, nullable: bool) -> Self {
        ValidationNode {
            kind: Some(kind),
            nullable,
            keywords: IndexMap::new(),
            properties: IndexMap::new(),
            items: None,
        }
    }

    pub(crate) fn root(properties: IndexMap<String, ValidationNode>) -> Self {
        ValidationNode {
            kind: None,
            nullable: false,
            keywords: IndexMap::new(),
            properties,
            items: None,
        }
    }

    /// The node's kind tag; `None` only for a compiled root.
    pub fn kind(&self) -> Option<NodeKind> {
        self.kind
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// Returns a consumed validation keyword by its serialized name.
    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keywords.get(name)
    }

    /// Child nodes of an object node, in insertion order.
    pub fn properties(&self) -> &IndexMap<String, ValidationNode> {
        &self.properties
    }

    /// The element node of an array node.
    pub fn items(&self) -> Option<&ValidationNode> {
        self.items.as_deref()
    }

    /// Renders the node tree into the emitted value model.
    ///
    /// The kind tag serializes as `type`, a union with `"null"` when the node
    /// is nullable; the root node emits no `type` key at all.
    pub fn to_value(&self) -> Value {
        let mut map = IndexMap::new();
        if let Some(kind) = self.kind {
            let type_value = if self.nullable {
                Value::Array(vec![Value::from(kind.as_str()), Value::from("null")])
            } else {
                Value::from(kind.as_str())
            };
            map.insert("type".to_string(), type_value);
        }
        for (key, value) in &self.keywords {
            map.insert(key.clone(), value.clone());
        }
        if self.kind.is_none() || !self.properties.is_empty() {
            let children = self
                .properties
                .iter()
                .map(|(name, node)| (name.clone(), node.to_value()))
                .collect();
            map.insert("properties".to_string(), Value::Object(children));
        }
        if let Some(items) = &self.items {
            map.insert("items".to_string(), items.to_value());
        }
        Value::Object(map)
    }
}

/// Enforcement level recorded in the emitted validation envelope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValidationLevel {
    /// Validation disabled.
    None,
    /// Only newly inserted documents are validated.
    New,
    /// New and already-valid modified documents are validated.
    Moderate,
    /// All inserts and updates are validated.
    #[default]
    Strict,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationLevel::None => "none",
            ValidationLevel::New => "new",
            ValidationLevel::Moderate => "moderate",
            ValidationLevel::Strict => "strict",
        }
    }
}

/// The compiled validation document attached to a collection command.
///
/// The three-key envelope — `rule`, `level`, `message` — is the contract the
/// executor and any schema-consuming layer depend on.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationDocument {
    pub rule: ValidationNode,
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationDocument {
    pub fn new(rule: ValidationNode, level: ValidationLevel, message: &str) -> Self {
        ValidationDocument {
            rule,
            level,
            message: message.to_string(),
        }
    }

    /// Renders the three-key envelope.
    pub fn to_value(&self) -> Value {
        let mut map = IndexMap::new();
        map.insert("rule".to_string(), self.rule.to_value());
        map.insert("level".to_string(), Value::from(self.level.as_str()));
        map.insert("message".to_string(), Value::from(self.message.as_str()));
        Value::Object(map)
    }
}

/// Compiles an ordered subcommand list into a validation tree.
///
/// # Arguments
/// * `subcommands` - Field edits in declaration order
/// * `prior` - The existing root node when altering; `None` when creating
///
/// # Returns
/// The compiled root node (no kind tag of its own).
///
/// # Errors
/// `InvalidOption` when any consumed option value fails its per-key predicate.
pub fn compile(
    subcommands: &[Subcommand],
    prior: Option<&ValidationNode>,
) -> StrataResult<ValidationNode> {
    let mut properties = prior.map(|node| node.properties.clone()).unwrap_or_default();
    fold_into(&mut properties, subcommands)?;
    Ok(ValidationNode::root(properties))
}

fn fold_into(
    properties: &mut IndexMap<String, ValidationNode>,
    subcommands: &[Subcommand],
) -> StrataResult<()> {
    for subcommand in subcommands {
        match subcommand {
            Subcommand::Add {
                name,
                field_type,
                opts,
            }
            | Subcommand::AddIfAbsent {
                name,
                field_type,
                opts,
            } => {
                // later add silently overwrites; existence is the executor's concern
                properties.insert(name.clone(), type_to_node(field_type, opts)?);
            }
            Subcommand::Modify {
                name,
                field_type,
                opts,
            } => {
                if !properties.contains_key(name) {
                    warn!(
                        "modify targets field `{}` which is absent from the validation tree",
                        name
                    );
                }
                properties.insert(name.clone(), type_to_node(field_type, opts)?);
            }
            Subcommand::Remove { name, .. } | Subcommand::RemoveIfExists { name, .. } => {
                properties.shift_remove(name);
            }
            Subcommand::Rename { from, to } => {
                if properties.contains_key(from) {
                    let rebuilt = properties
                        .drain(..)
                        .map(|(key, node)| {
                            if key == *from {
                                (to.clone(), node)
                            } else {
                                (key, node)
                            }
                        })
                        .collect();
                    *properties = rebuilt;
                }
            }
            Subcommand::AddEmbeddedGroup {
                name,
                opts,
                subcommands,
            } => {
                let mut nested = properties
                    .get(name)
                    .map(|node| node.properties.clone())
                    .unwrap_or_default();
                fold_into(&mut nested, subcommands)?;
                properties.insert(name.clone(), object_node(opts, nested)?);
            }
            Subcommand::AddEmbeddedGroupMany {
                name,
                opts,
                subcommands,
            } => {
                let mut nested = properties
                    .get(name)
                    .and_then(|node| node.items.as_deref())
                    .map(|items| items.properties.clone())
                    .unwrap_or_default();
                fold_into(&mut nested, subcommands)?;
                let inner_opts =
                    opts.without(&["comment", "min_items", "max_items", "unique_items", "null"]);
                let mut inner = object_node(&inner_opts, nested)?;
                inner.nullable = false;
                let mut wrapper = ValidationNode::leaf(NodeKind::Array, opts.nullable());
                put_uint(&mut wrapper, opts, "min_items", "minItems")?;
                put_uint(&mut wrapper, opts, "max_items", "maxItems")?;
                put_bool(&mut wrapper, opts, "unique_items", "uniqueItems")?;
                put_string(&mut wrapper, opts, "comment", "comment")?;
                wrapper.items = Some(Box::new(inner));
                properties.insert(name.clone(), wrapper);
            }
            // view-level edits carry no validation semantics
            Subcommand::AddSort { .. }
            | Subcommand::AddStore { .. }
            | Subcommand::AddLink { .. }
            | Subcommand::RemoveLink { .. } => {}
        }
    }
    Ok(())
}

/// Synthesizes one validation node from a field type and its options.
///
/// One code path per type family; every consumed option value is checked
/// against its per-key predicate before any node is produced.
pub fn type_to_node(field_type: &FieldType, opts: &FieldOptions) -> StrataResult<ValidationNode> {
    match field_type {
        FieldType::String => string_node(opts, None, None),
        FieldType::Integer | FieldType::Number | FieldType::Decimal | FieldType::Float => {
            number_node(opts)
        }
        FieldType::Boolean => {
            let mut node = ValidationNode::leaf(NodeKind::Boolean, opts.nullable());
            put_string(&mut node, opts, "comment", "comment")?;
            Ok(node)
        }
        FieldType::Date => string_node(opts, Some("date"), None),
        FieldType::Datetime | FieldType::UtcDatetime | FieldType::UtcDatetimeUsec => {
            string_node(opts, Some("date-time"), None)
        }
        FieldType::NaiveDatetime => string_node(opts, None, Some(NAIVE_DATETIME_PATTERN)),
        FieldType::NaiveDatetimeUsec => string_node(opts, None, Some(NAIVE_DATETIME_USEC_PATTERN)),
        FieldType::Uuid => string_node(opts, None, Some(UUID_PATTERN)),
        FieldType::Map => {
            // untyped mapping placeholder, nothing but nullability and comment
            let mut node = ValidationNode::leaf(NodeKind::Object, opts.nullable());
            put_string(&mut node, opts, "comment", "comment")?;
            Ok(node)
        }
        FieldType::Enum => enum_node(opts),
        FieldType::Const => const_node(opts),
        FieldType::Array(subtype) => array_node(subtype, opts),
    }
}

fn string_node(
    opts: &FieldOptions,
    forced_format: Option<&str>,
    forced_pattern: Option<&str>,
) -> StrataResult<ValidationNode> {
    let mut node = ValidationNode::leaf(NodeKind::String, opts.nullable());
    put_uint(&mut node, opts, "min_length", "minLength")?;
    put_uint(&mut node, opts, "max_length", "maxLength")?;
    put_pattern(&mut node, opts, "pattern", "pattern")?;
    put_string(&mut node, opts, "format", "format")?;
    put_string(&mut node, opts, "content_encoding", "contentEncoding")?;
    put_string(&mut node, opts, "content_media_type", "contentMediaType")?;
    put_string(&mut node, opts, "comment", "comment")?;
    if let Some(format) = forced_format {
        node.keywords
            .insert("format".to_string(), Value::from(format));
    }
    if let Some(pattern) = forced_pattern {
        node.keywords
            .insert("pattern".to_string(), Value::from(pattern));
    }
    Ok(node)
}

fn number_node(opts: &FieldOptions) -> StrataResult<ValidationNode> {
    let mut node = ValidationNode::leaf(NodeKind::Number, opts.nullable());
    put_number(&mut node, opts, "minimum", "minimum")?;
    put_number(&mut node, opts, "exclusive_minimum", "exclusiveMinimum")?;
    put_number(&mut node, opts, "maximum", "maximum")?;
    put_number(&mut node, opts, "exclusive_maximum", "exclusiveMaximum")?;
    put_positive_number(&mut node, opts, "multiple_of", "multipleOf")?;
    put_string(&mut node, opts, "comment", "comment")?;
    Ok(node)
}

fn enum_node(opts: &FieldOptions) -> StrataResult<ValidationNode> {
    // enums are a fixed string kind, never a union with null
    let mut node = ValidationNode::leaf(NodeKind::String, false);
    match opts.get("values") {
        Some(value @ Value::Array(items)) => {
            if items.is_empty() || !items.iter().all(|item| item.as_str().is_some()) {
                return Err(invalid_option("values", value));
            }
            node.keywords.insert("enum".to_string(), value.clone());
        }
        Some(value) => return Err(invalid_option("values", value)),
        None => return Err(invalid_option("values", &Value::Null)),
    }
    put_string(&mut node, opts, "comment", "comment")?;
    Ok(node)
}

fn const_node(opts: &FieldOptions) -> StrataResult<ValidationNode> {
    let mut node = ValidationNode::leaf(NodeKind::String, false);
    match opts.get("value") {
        Some(value @ Value::String(_)) => {
            node.keywords.insert("const".to_string(), value.clone());
        }
        Some(value) => return Err(invalid_option("value", value)),
        None => return Err(invalid_option("value", &Value::Null)),
    }
    put_string(&mut node, opts, "comment", "comment")?;
    Ok(node)
}

fn array_node(subtype: &FieldType, opts: &FieldOptions) -> StrataResult<ValidationNode> {
    let inner_opts = opts.without(&["comment", "min_items", "max_items", "unique_items"]);
    let items = type_to_node(subtype, &inner_opts)?;
    let mut node = ValidationNode::leaf(NodeKind::Array, opts.nullable());
    put_uint(&mut node, opts, "min_items", "minItems")?;
    put_uint(&mut node, opts, "max_items", "maxItems")?;
    put_bool(&mut node, opts, "unique_items", "uniqueItems")?;
    put_string(&mut node, opts, "comment", "comment")?;
    node.items = Some(Box::new(items));
    Ok(node)
}

fn object_node(
    opts: &FieldOptions,
    properties: IndexMap<String, ValidationNode>,
) -> StrataResult<ValidationNode> {
    let mut node = ValidationNode::leaf(NodeKind::Object, opts.nullable());
    put_object(&mut node, opts, "pattern_properties", "patternProperties")?;
    put_bool_or_object(&mut node, opts, "additional_properties", "additionalProperties")?;
    put_string_array(&mut node, opts, "required", "required")?;
    put_uint(&mut node, opts, "min_properties", "minProperties")?;
    put_uint(&mut node, opts, "max_properties", "maxProperties")?;
    put_string(&mut node, opts, "comment", "comment")?;
    node.properties = properties;
    Ok(node)
}

fn invalid_option(key: &str, value: &Value) -> StrataError {
    StrataError::new(
        &format!("invalid value for option `{}`: {}", key, value),
        ErrorKind::InvalidOption,
    )
}

fn put_uint(
    node: &mut ValidationNode,
    opts: &FieldOptions,
    key: &str,
    keyword: &str,
) -> StrataResult<()> {
    if let Some(value) = opts.get(key) {
        let parsed = value.as_uint().ok_or_else(|| invalid_option(key, value))?;
        node.keywords
            .insert(keyword.to_string(), Value::Int(parsed as i64));
    }
    Ok(())
}

fn put_number(
    node: &mut ValidationNode,
    opts: &FieldOptions,
    key: &str,
    keyword: &str,
) -> StrataResult<()> {
    if let Some(value) = opts.get(key) {
        if value.as_number().is_none() {
            return Err(invalid_option(key, value));
        }
        node.keywords.insert(keyword.to_string(), value.clone());
    }
    Ok(())
}

fn put_positive_number(
    node: &mut ValidationNode,
    opts: &FieldOptions,
    key: &str,
    keyword: &str,
) -> StrataResult<()> {
    if let Some(value) = opts.get(key) {
        match value.as_number() {
            Some(number) if number > 0.0 => {
                node.keywords.insert(keyword.to_string(), value.clone());
            }
            _ => return Err(invalid_option(key, value)),
        }
    }
    Ok(())
}

fn put_bool(
    node: &mut ValidationNode,
    opts: &FieldOptions,
    key: &str,
    keyword: &str,
) -> StrataResult<()> {
    if let Some(value) = opts.get(key) {
        let parsed = value.as_bool().ok_or_else(|| invalid_option(key, value))?;
        node.keywords
            .insert(keyword.to_string(), Value::Bool(parsed));
    }
    Ok(())
}

fn put_string(
    node: &mut ValidationNode,
    opts: &FieldOptions,
    key: &str,
    keyword: &str,
) -> StrataResult<()> {
    if let Some(value) = opts.get(key) {
        if value.as_str().is_none() {
            return Err(invalid_option(key, value));
        }
        node.keywords.insert(keyword.to_string(), value.clone());
    }
    Ok(())
}

fn put_pattern(
    node: &mut ValidationNode,
    opts: &FieldOptions,
    key: &str,
    keyword: &str,
) -> StrataResult<()> {
    if let Some(value) = opts.get(key) {
        let pattern = value.as_str().ok_or_else(|| invalid_option(key, value))?;
        if Regex::new(pattern).is_err() {
            return Err(invalid_option(key, value));
        }
        node.keywords.insert(keyword.to_string(), value.clone());
    }
    Ok(())
}

fn put_string_array(
    node: &mut ValidationNode,
    opts: &FieldOptions,
    key: &str,
    keyword: &str,
) -> StrataResult<()> {
    if let Some(value) = opts.get(key) {
        match value {
            Value::Array(items) if items.iter().all(|item| item.as_str().is_some()) => {
                node.keywords.insert(keyword.to_string(), value.clone());
            }
            _ => return Err(invalid_option(key, value)),
        }
    }
    Ok(())
}

fn put_object(
    node: &mut ValidationNode,
    opts: &FieldOptions,
    key: &str,
    keyword: &str,
) -> StrataResult<()> {
    if let Some(value) = opts.get(key) {
        if value.as_object().is_none() {
            return Err(invalid_option(key, value));
        }
        node.keywords.insert(keyword.to_string(), value.clone());
    }
    Ok(())
}

fn put_bool_or_object(
    node: &mut ValidationNode,
    opts: &FieldOptions,
    key: &str,
    keyword: &str,
) -> StrataResult<()> {
    if let Some(value) = opts.get(key) {
        if value.as_bool().is_none() && value.as_object().is_none() {
            return Err(invalid_option(key, value));
        }
        node.keywords.insert(keyword.to_string(), value.clone());
    }
    Ok(())
}
