use crate::migration::command::FieldType;

/// Replay direction of a migration run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Field names and type used by the timestamp convenience operation.
#[derive(Clone, Debug, PartialEq)]
pub struct TimestampConfig {
    pub inserted_at: String,
    pub updated_at: String,
    pub field_type: FieldType,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        TimestampConfig {
            inserted_at: "inserted_at".to_string(),
            updated_at: "updated_at".to_string(),
            field_type: FieldType::NaiveDatetime,
        }
    }
}

/// Ambient settings a migration runs under.
///
/// # Purpose
/// Supplies the tenant scope applied to every target, the replay direction,
/// and the timestamp conventions. Implement this to plug migrations into a
/// deployment's own tenancy and naming rules; [`DefaultContext`] covers the
/// common case.
pub trait MigrationContext: Send + Sync {
    /// The tenant scope stamped onto targets that do not declare their own.
    fn scope(&self) -> Option<String> {
        None
    }

    /// Which way the migration is being replayed.
    fn direction(&self) -> Direction;

    /// Field conventions for the timestamp convenience operation.
    fn timestamps(&self) -> TimestampConfig {
        TimestampConfig::default()
    }
}

/// The stock context: a direction, an optional scope, and default timestamps.
#[derive(Clone, Debug)]
pub struct DefaultContext {
    scope: Option<String>,
    direction: Direction,
    timestamps: TimestampConfig,
}

impl DefaultContext {
    pub fn forward() -> Self {
        DefaultContext {
            scope: None,
            direction: Direction::Forward,
            timestamps: TimestampConfig::default(),
        }
    }

    pub fn backward() -> Self {
        DefaultContext {
            scope: None,
            direction: Direction::Backward,
            timestamps: TimestampConfig::default(),
        }
    }

    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    pub fn with_timestamps(mut self, timestamps: TimestampConfig) -> Self {
        self.timestamps = timestamps;
        self
    }
}

impl MigrationContext for DefaultContext {
    fn scope(&self) -> Option<String> {
        self.scope.clone()
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn timestamps(&self) -> TimestampConfig {
        self.timestamps.clone()
    }
}
