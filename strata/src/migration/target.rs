use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::common::SortDirection;
use crate::migration::options::FieldOptions;
use crate::migration::schema::{ValidationDocument, ValidationLevel};
use indexmap::IndexMap;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W").expect("valid regex"));

/// The structural object a command acts on.
///
/// # Purpose
/// Closed four-variant sum type over everything a migration command can
/// target: document/edge collections, indexes, search views, and text
/// analyzers. `create`/`alter`/`drop` dispatch exhaustively on the variant.
///
/// # Characteristics
/// - **Immutable**: All fields are fixed once built; the tenant scope marker
///   is attached exactly once at command-open time via [`Target::scoped`]
/// - **Cloneable**: Value object, freely copied into commands and inverses
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    Collection(Collection),
    Index(Index),
    View(View),
    Analyzer(Analyzer),
}

impl Target {
    /// Creates a document collection target with default options.
    pub fn collection(name: &str) -> Target {
        Target::Collection(Collection::new(name))
    }

    /// Creates an edge collection target with default options.
    pub fn edge_collection(name: &str) -> Target {
        Target::Collection(Collection::edge(name))
    }

    /// Creates an index target over the given collection fields.
    ///
    /// The index name is derived deterministically from the collection name
    /// and field list unless overridden, so a later `drop` referencing the
    /// same inputs resolves to the same name.
    pub fn index(collection_name: &str, fields: &[&str]) -> Target {
        Target::Index(Index::new(collection_name, fields))
    }

    /// Creates a search view target.
    pub fn view(name: &str) -> Target {
        Target::View(View::new(name))
    }

    /// Creates a text analyzer target.
    pub fn analyzer(
        name: &str,
        kind: AnalyzerKind,
        features: Vec<AnalyzerFeature>,
        properties: FieldOptions,
    ) -> Target {
        Target::Analyzer(Analyzer {
            name: name.to_string(),
            kind,
            features,
            properties,
            scope: None,
        })
    }

    /// Returns the target's own name (the index name for indexes).
    pub fn name(&self) -> &str {
        match self {
            Target::Collection(c) => &c.name,
            Target::Index(i) => &i.name,
            Target::View(v) => &v.name,
            Target::Analyzer(a) => &a.name,
        }
    }

    /// Returns a copy of this target carrying a different name.
    pub fn with_name(&self, name: &str) -> Target {
        let mut target = self.clone();
        match &mut target {
            Target::Collection(c) => c.name = name.to_string(),
            Target::Index(i) => i.name = name.to_string(),
            Target::View(v) => v.name = name.to_string(),
            Target::Analyzer(a) => a.name = name.to_string(),
        }
        target
    }

    /// Returns the structural kind name, for messages and logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Target::Collection(_) => "collection",
            Target::Index(_) => "index",
            Target::View(_) => "view",
            Target::Analyzer(_) => "analyzer",
        }
    }

    /// Returns true for collection-shaped targets, which receive a compiled
    /// validation document at command close.
    pub fn is_collection(&self) -> bool {
        matches!(self, Target::Collection(_))
    }

    /// Returns the resolved tenant scope, if attached.
    pub fn scope(&self) -> Option<&str> {
        match self {
            Target::Collection(c) => c.scope.as_deref(),
            Target::Index(i) => i.scope.as_deref(),
            Target::View(v) => v.scope.as_deref(),
            Target::Analyzer(a) => a.scope.as_deref(),
        }
    }

    /// Attaches the resolved tenant scope from the migration context.
    ///
    /// Called once at command-open time. A scope already declared on the
    /// target must agree with the context's scope.
    ///
    /// # Errors
    /// `ScopeMismatch` when both scopes are present and differ.
    pub(crate) fn scoped(mut self, context_scope: Option<&str>) -> StrataResult<Target> {
        let declared = self.scope().map(|s| s.to_string());
        let resolved = match (declared, context_scope) {
            (Some(declared), Some(context)) if declared != context => {
                return Err(StrataError::new(
                    &format!(
                        "{} `{}` declares scope `{}` but the migration context scope is `{}`",
                        self.kind_name(),
                        self.name(),
                        declared,
                        context
                    ),
                    ErrorKind::ScopeMismatch,
                ));
            }
            (Some(declared), _) => Some(declared),
            (None, context) => context.map(|s| s.to_string()),
        };
        match &mut self {
            Target::Collection(c) => c.scope = resolved,
            Target::Index(i) => i.scope = resolved,
            Target::View(v) => v.scope = resolved,
            Target::Analyzer(a) => a.scope = resolved,
        }
        Ok(self)
    }
}

/// Whether a collection stores plain documents or graph edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CollectionKind {
    #[default]
    Document,
    Edge,
}

/// Collection-level options consumed by the executor and the schema envelope.
///
/// `level` and `message` feed the compiled validation document; the remaining
/// options travel with the command untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionOptions {
    /// Enforcement level recorded in the emitted validation envelope.
    pub level: ValidationLevel,
    /// Free-text message recorded in the emitted validation envelope.
    pub message: String,
    /// Whether writes should wait for durable sync.
    pub wait_for_sync: bool,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        CollectionOptions {
            level: ValidationLevel::Strict,
            message: String::new(),
            wait_for_sync: false,
        }
    }
}

/// A document or edge collection target.
#[derive(Clone, Debug, PartialEq)]
pub struct Collection {
    pub name: String,
    pub kind: CollectionKind,
    pub options: CollectionOptions,
    /// Pre-existing validation document; seeds the compiler when altering.
    pub validation: Option<ValidationDocument>,
    pub(crate) scope: Option<String>,
}

impl Collection {
    /// Creates a document collection with default options.
    pub fn new(name: &str) -> Self {
        Collection {
            name: name.to_string(),
            kind: CollectionKind::Document,
            options: CollectionOptions::default(),
            validation: None,
            scope: None,
        }
    }

    /// Creates an edge collection with default options.
    pub fn edge(name: &str) -> Self {
        Collection {
            kind: CollectionKind::Edge,
            ..Collection::new(name)
        }
    }

    /// Replaces the collection options.
    pub fn with_options(mut self, options: CollectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Attaches the collection's current validation document, used to seed
    /// the schema compiler when the collection is altered.
    pub fn with_validation(mut self, validation: ValidationDocument) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Declares an explicit tenant scope, checked against the context at
    /// command-open time.
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }
}

impl From<Collection> for Target {
    fn from(c: Collection) -> Target {
        Target::Collection(c)
    }
}

/// The index access structure kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndexKind {
    #[default]
    Persistent,
    Fulltext,
    Geo,
    Ttl,
    Inverted,
}

/// Index-level options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexOptions {
    pub unique: bool,
    pub sparse: bool,
    pub deduplicate: bool,
}

/// An index target over one or more collection fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Index {
    pub collection_name: String,
    pub fields: Vec<String>,
    pub kind: IndexKind,
    pub options: IndexOptions,
    pub name: String,
    pub(crate) scope: Option<String>,
}

impl Index {
    /// Creates a persistent index with the derived default name.
    pub fn new(collection_name: &str, fields: &[&str]) -> Self {
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let name = default_index_name(collection_name, &fields);
        Index {
            collection_name: collection_name.to_string(),
            fields,
            kind: IndexKind::Persistent,
            options: IndexOptions::default(),
            name,
            scope: None,
        }
    }

    /// Overrides the derived index name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Sets the index kind.
    pub fn with_kind(mut self, kind: IndexKind) -> Self {
        self.kind = kind;
        self
    }

    /// Marks the index unique.
    pub fn unique(mut self) -> Self {
        self.options.unique = true;
        self
    }

    /// Replaces the index options.
    pub fn with_options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }
}

impl From<Index> for Target {
    fn from(i: Index) -> Target {
        Target::Index(i)
    }
}

/// Derives the deterministic default index name.
///
/// Format is `idx_<collection>_<field1>_<field2>...` with every non-word
/// character replaced by `_` and trailing underscores trimmed. The same
/// collection and field list always derive the same name, which is what lets
/// a later `drop` resolve the index without the author restating the name.
pub fn default_index_name(collection_name: &str, fields: &[String]) -> String {
    let raw = format!("idx_{}_{}", collection_name, fields.iter().join("_"));
    NON_WORD
        .replace_all(&raw, "_")
        .trim_end_matches('_')
        .to_string()
}

/// Compression applied to stored values in a view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Compression {
    #[default]
    None,
    Lz4,
}

/// A primary-sort entry on a search view.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewSort {
    pub field: String,
    pub direction: SortDirection,
}

/// A stored-values entry on a search view.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredValues {
    pub fields: Vec<String>,
    pub compression: Compression,
}

/// A collection link inside a search view.
///
/// Links describe which collection fields the view indexes and with which
/// analyzers; `fields` nests links recursively for sub-attributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewLink {
    pub analyzers: Vec<String>,
    pub include_all_fields: bool,
    pub track_list_positions: bool,
    pub fields: IndexMap<String, ViewLink>,
}

impl ViewLink {
    pub fn new() -> Self {
        ViewLink::default()
    }

    /// Adds an analyzer name to the link.
    pub fn analyzer(mut self, name: &str) -> Self {
        self.analyzers.push(name.to_string());
        self
    }

    /// Indexes every field of the linked collection.
    pub fn include_all_fields(mut self) -> Self {
        self.include_all_fields = true;
        self
    }

    /// Tracks list positions for array values.
    pub fn track_list_positions(mut self) -> Self {
        self.track_list_positions = true;
        self
    }

    /// Adds a nested per-field link.
    pub fn field(mut self, name: &str, link: ViewLink) -> Self {
        self.fields.insert(name.to_string(), link);
        self
    }
}

/// View-wide options.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewOptions {
    pub primary_sort_compression: Compression,
    pub commit_interval_msec: Option<u64>,
    pub consolidation_interval_msec: Option<u64>,
}

/// A search view target.
#[derive(Clone, Debug, PartialEq)]
pub struct View {
    pub name: String,
    pub options: ViewOptions,
    pub links: IndexMap<String, ViewLink>,
    pub sorts: Vec<ViewSort>,
    pub stored_values: Vec<StoredValues>,
    pub(crate) scope: Option<String>,
}

impl View {
    pub fn new(name: &str) -> Self {
        View {
            name: name.to_string(),
            options: ViewOptions::default(),
            links: IndexMap::new(),
            sorts: Vec::new(),
            stored_values: Vec::new(),
            scope: None,
        }
    }

    /// Replaces the view options.
    pub fn with_options(mut self, options: ViewOptions) -> Self {
        self.options = options;
        self
    }

    /// Adds a collection link.
    pub fn link(mut self, collection_name: &str, link: ViewLink) -> Self {
        self.links.insert(collection_name.to_string(), link);
        self
    }

    /// Adds a primary-sort entry.
    pub fn sort(mut self, field: &str, direction: SortDirection) -> Self {
        self.sorts.push(ViewSort {
            field: field.to_string(),
            direction,
        });
        self
    }

    /// Adds a stored-values entry.
    pub fn store(mut self, fields: &[&str], compression: Compression) -> Self {
        self.stored_values.push(StoredValues {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            compression,
        });
        self
    }
}

impl From<View> for Target {
    fn from(v: View) -> Target {
        Target::View(v)
    }
}

/// The analyzer implementation kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalyzerKind {
    Identity,
    Delimiter,
    Stem,
    Norm,
    Ngram,
    Text,
}

/// Features an analyzer records per indexed token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalyzerFeature {
    Frequency,
    Norm,
    Position,
}

/// A text analyzer target.
#[derive(Clone, Debug, PartialEq)]
pub struct Analyzer {
    pub name: String,
    pub kind: AnalyzerKind,
    pub features: Vec<AnalyzerFeature>,
    pub properties: FieldOptions,
    pub(crate) scope: Option<String>,
}

impl From<Analyzer> for Target {
    fn from(a: Analyzer) -> Target {
        Target::Analyzer(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opts;

    // ==================== Index Name Tests ====================

    #[test]
    fn test_default_index_name() {
        let target = Target::index("users", &["email", "ph_number"]);
        assert_eq!(target.name(), "idx_users_email_ph_number");
    }

    #[test]
    fn test_default_index_name_sanitizes_non_word_characters() {
        let fields = vec!["profile.age".to_string()];
        assert_eq!(
            default_index_name("user-accounts", &fields),
            "idx_user_accounts_profile_age"
        );
    }

    #[test]
    fn test_default_index_name_trims_trailing_underscores() {
        let fields = vec!["email!".to_string()];
        assert_eq!(default_index_name("users", &fields), "idx_users_email");
    }

    #[test]
    fn test_default_index_name_is_deterministic() {
        let fields = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            default_index_name("users", &fields),
            default_index_name("users", &fields)
        );
    }

    #[test]
    fn test_index_name_override() {
        let index = Index::new("users", &["email"]).with_name("custom_idx");
        assert_eq!(index.name, "custom_idx");
    }

    // ==================== Target Tests ====================

    #[test]
    fn test_collection_target_defaults() {
        let target = Target::collection("users");
        assert!(target.is_collection());
        assert_eq!(target.name(), "users");
        assert_eq!(target.kind_name(), "collection");
        assert_eq!(target.scope(), None);
        match &target {
            Target::Collection(c) => {
                assert_eq!(c.kind, CollectionKind::Document);
                assert_eq!(c.options.level, ValidationLevel::Strict);
                assert!(c.validation.is_none());
            }
            _ => panic!("expected collection"),
        }
    }

    #[test]
    fn test_edge_collection_kind() {
        match Target::edge_collection("knows") {
            Target::Collection(c) => assert_eq!(c.kind, CollectionKind::Edge),
            _ => panic!("expected collection"),
        }
    }

    #[test]
    fn test_with_name_copies() {
        let target = Target::collection("users");
        let renamed = target.with_name("customers");
        assert_eq!(target.name(), "users");
        assert_eq!(renamed.name(), "customers");
    }

    #[test]
    fn test_non_collection_targets_are_not_collection_shaped() {
        assert!(!Target::index("users", &["email"]).is_collection());
        assert!(!Target::view("user_search").is_collection());
        assert!(!Target::analyzer(
            "norm_en",
            AnalyzerKind::Norm,
            vec![AnalyzerFeature::Frequency],
            opts! { locale: "en" },
        )
        .is_collection());
    }

    // ==================== Scope Tests ====================

    #[test]
    fn test_scope_resolution_from_context() {
        let target = Target::collection("users")
            .scoped(Some("tenant_a"))
            .unwrap();
        assert_eq!(target.scope(), Some("tenant_a"));
    }

    #[test]
    fn test_scope_declared_matches_context() {
        let target = Target::Collection(Collection::new("users").with_scope("tenant_a"))
            .scoped(Some("tenant_a"))
            .unwrap();
        assert_eq!(target.scope(), Some("tenant_a"));
    }

    #[test]
    fn test_scope_mismatch() {
        let result = Target::Collection(Collection::new("users").with_scope("tenant_a"))
            .scoped(Some("tenant_b"));
        let err = result.expect_err("conflicting scopes should fail");
        assert_eq!(err.kind(), &crate::errors::ErrorKind::ScopeMismatch);
    }

    #[test]
    fn test_declared_scope_kept_without_context() {
        let target = Target::Collection(Collection::new("users").with_scope("tenant_a"))
            .scoped(None)
            .unwrap();
        assert_eq!(target.scope(), Some("tenant_a"));
    }

    // ==================== View Builder Tests ====================

    #[test]
    fn test_view_builder() {
        let view = View::new("user_search")
            .link(
                "users",
                ViewLink::new().analyzer("text_en").include_all_fields(),
            )
            .sort("created_at", SortDirection::Descending)
            .store(&["email"], Compression::Lz4);
        assert_eq!(view.links.len(), 1);
        assert!(view.links["users"].include_all_fields);
        assert_eq!(view.sorts[0].field, "created_at");
        assert_eq!(view.stored_values[0].compression, Compression::Lz4);
    }

    #[test]
    fn test_view_link_nested_fields() {
        let link = ViewLink::new().field("name", ViewLink::new().analyzer("identity"));
        assert_eq!(link.fields["name"].analyzers, vec!["identity".to_string()]);
    }
}
