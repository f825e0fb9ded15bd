use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use log::info;

use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::migration::context::{Direction, MigrationContext};
use crate::migration::runner::{Executor, Runner};

type Definition = Box<dyn Fn(&Runner) -> StrataResult<()> + Send + Sync>;

/// A named migration holding its replay definitions.
///
/// # Purpose
/// One migration is either a pair of explicit `up`/`down` definitions or a
/// single `change` definition whose inverse is derived automatically. Running
/// it builds a runner for the context's direction, applies the matching
/// definition, and delivers the queued commands to the executor.
///
/// # Usage
/// ```ignore
/// use strata::migration::{Migration, Target, Subcommand, FieldType};
/// use strata::opts;
///
/// let migration = Migration::change("create_users", |r| {
///     r.create(Target::collection("users"), |r| {
///         r.subcommand(Subcommand::add("name", FieldType::String, opts! {}))?;
///         r.timestamps()
///     })
/// });
/// ```
pub struct Migration {
    name: String,
    up: Option<Definition>,
    down: Option<Definition>,
    change: Option<Definition>,
}

impl Migration {
    /// Creates a migration from explicit forward and backward definitions.
    pub fn new<U, D>(name: &str, up: U, down: D) -> Self
    where
        U: Fn(&Runner) -> StrataResult<()> + Send + Sync + 'static,
        D: Fn(&Runner) -> StrataResult<()> + Send + Sync + 'static,
    {
        Migration {
            name: name.to_string(),
            up: Some(Box::new(up)),
            down: Some(Box::new(down)),
            change: None,
        }
    }

    /// Creates a forward-only migration.
    pub fn forward_only<U>(name: &str, up: U) -> Self
    where
        U: Fn(&Runner) -> StrataResult<()> + Send + Sync + 'static,
    {
        Migration {
            name: name.to_string(),
            up: Some(Box::new(up)),
            down: None,
            change: None,
        }
    }

    /// Creates a migration from a single change definition. Backward replay
    /// re-runs the definition with every command inverted, so every command
    /// it queues must be reversible.
    pub fn change<C>(name: &str, change: C) -> Self
    where
        C: Fn(&Runner) -> StrataResult<()> + Send + Sync + 'static,
    {
        Migration {
            name: name.to_string(),
            up: None,
            down: None,
            change: Some(Box::new(change)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replays the migration in the context's direction and delivers the
    /// resulting commands to the executor.
    ///
    /// # Errors
    /// `InvalidOperation` when no definition covers the forward direction;
    /// `Irreversible` when a backward replay meets a definition or command
    /// without an inverse.
    pub fn run(
        &self,
        context: Arc<dyn MigrationContext>,
        executor: &mut dyn Executor,
    ) -> StrataResult<()> {
        let direction = context.direction();
        info!("running migration `{}` {:?}", self.name, direction);
        match direction {
            Direction::Forward => {
                let definition = self.up.as_ref().or(self.change.as_ref()).ok_or_else(|| {
                    StrataError::new(
                        &format!("migration `{}` has no forward definition", self.name),
                        ErrorKind::InvalidOperation,
                    )
                })?;
                let runner = Runner::new(context);
                definition(&runner)?;
                runner.finish(executor)
            }
            Direction::Backward => {
                if let Some(down) = &self.down {
                    let runner = Runner::new(context);
                    down(&runner)?;
                    return runner.finish(executor);
                }
                if let Some(change) = &self.change {
                    let runner = Runner::auto_reverse(context);
                    change(&runner)?;
                    return runner.finish(executor);
                }
                Err(StrataError::new(
                    &format!(
                        "migration `{}` cannot be replayed backward: no down or change definition",
                        self.name
                    ),
                    ErrorKind::Irreversible,
                ))
            }
        }
    }
}

impl Debug for Migration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("name", &self.name)
            .field("up", &self.up.is_some())
            .field("down", &self.down.is_some())
            .field("change", &self.change.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::command::{Command, FieldType, Subcommand};
    use crate::migration::context::DefaultContext;
    use crate::migration::target::Target;
    use crate::opts;

    #[derive(Default)]
    struct RecordingExecutor {
        executed: Vec<Command>,
    }

    impl Executor for RecordingExecutor {
        fn execute(&mut self, command: &Command) -> StrataResult<()> {
            self.executed.push(command.clone());
            Ok(())
        }
    }

    fn create_users(runner: &Runner) -> StrataResult<()> {
        runner.create(Target::collection("users"), |r| {
            r.subcommand(Subcommand::add("name", FieldType::String, opts! {}))
        })
    }

    #[test]
    fn test_up_runs_forward() {
        let migration = Migration::new("create_users", create_users, |r: &Runner| {
            r.drop_target(Target::collection("users"))
        });
        let mut executor = RecordingExecutor::default();
        migration
            .run(Arc::new(DefaultContext::forward()), &mut executor)
            .unwrap();
        assert!(matches!(executor.executed[0], Command::Create(_, _)));
    }

    #[test]
    fn test_down_runs_backward() {
        let migration = Migration::new("create_users", create_users, |r: &Runner| {
            r.drop_target(Target::collection("users"))
        });
        let mut executor = RecordingExecutor::default();
        migration
            .run(Arc::new(DefaultContext::backward()), &mut executor)
            .unwrap();
        assert!(matches!(executor.executed[0], Command::Drop(_)));
    }

    #[test]
    fn test_change_derives_backward_replay() {
        let migration = Migration::change("create_users", create_users);
        let mut executor = RecordingExecutor::default();
        migration
            .run(Arc::new(DefaultContext::backward()), &mut executor)
            .unwrap();
        match &executor.executed[0] {
            Command::Drop(target) => assert_eq!(target.name(), "users"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_change_runs_forward_too() {
        let migration = Migration::change("create_users", create_users);
        let mut executor = RecordingExecutor::default();
        migration
            .run(Arc::new(DefaultContext::forward()), &mut executor)
            .unwrap();
        assert!(matches!(executor.executed[0], Command::Create(_, _)));
    }

    #[test]
    fn test_forward_only_refuses_backward_replay() {
        let migration = Migration::forward_only("create_users", create_users);
        let mut executor = RecordingExecutor::default();
        let err = migration
            .run(Arc::new(DefaultContext::backward()), &mut executor)
            .expect_err("no backward definition");
        assert_eq!(err.kind(), &ErrorKind::Irreversible);
        assert!(executor.executed.is_empty());
    }

    #[test]
    fn test_missing_forward_definition() {
        let migration = Migration {
            name: "empty".to_string(),
            up: None,
            down: None,
            change: None,
        };
        let mut executor = RecordingExecutor::default();
        let err = migration
            .run(Arc::new(DefaultContext::forward()), &mut executor)
            .expect_err("no forward definition");
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }
}
