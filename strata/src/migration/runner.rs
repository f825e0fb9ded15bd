use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::migration::command::{timestamp_fields, Command, RawAction, Subcommand};
use crate::migration::context::MigrationContext;
use crate::migration::options::FieldOptions;
use crate::migration::reverse::reverse_command;
use crate::migration::schema::{compile, ValidationDocument};
use crate::migration::target::Target;

/// Delivers compiled commands to a database backend.
///
/// # Purpose
/// The single seam between the migration engine and a deployment: the engine
/// compiles and orders commands, an executor carries them out. Test suites
/// plug in a recording executor; production plugs in a driver.
pub trait Executor {
    fn execute(&mut self, command: &Command) -> StrataResult<()>;
}

/// How queued commands are replayed when the run finishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReplayMode {
    /// Deliver the queue in declaration order.
    Direct,
    /// Deliver the queue in reverse order with every command inverted.
    AutoReverse,
}

/// The structural operation a command is being built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOp {
    Create,
    CreateIfAbsent,
    Alter,
    Drop,
    DropIfExists,
}

impl CommandOp {
    fn verb(&self) -> &'static str {
        match self {
            CommandOp::Create => "create",
            CommandOp::CreateIfAbsent => "create-if-absent",
            CommandOp::Alter => "alter",
            CommandOp::Drop => "drop",
            CommandOp::DropIfExists => "drop-if-exists",
        }
    }
}

#[derive(Debug)]
struct GroupFrame {
    name: String,
    opts: FieldOptions,
    many: bool,
    subcommands: Vec<Subcommand>,
}

#[derive(Debug)]
struct OpenCommand {
    op: CommandOp,
    target: Target,
    subcommands: Vec<Subcommand>,
    groups: Vec<GroupFrame>,
}

#[derive(Debug)]
struct RunnerState {
    mode: ReplayMode,
    queue: Vec<Command>,
    open: Option<OpenCommand>,
}

/// Builds and queues migration commands for one run.
///
/// # Purpose
/// The author-facing surface of a migration definition. A runner is a small
/// state machine: at most one command is open at a time, field edits land in
/// the open command (or its innermost embedded group), and closing a command
/// compiles its validation tree and appends it to the ordered queue. Nothing
/// touches the executor until [`flush`](Runner::flush) or the end of the run.
///
/// # Characteristics
/// - **Thread Safety**: State lives behind `Arc<Mutex<..>>`, so clones of a
///   runner share one queue, mirroring how definition closures borrow it
/// - **Scoping**: Every target passing through the runner is stamped with the
///   context scope; a conflicting declared scope is rejected
#[derive(Clone)]
pub struct Runner {
    context: Arc<dyn MigrationContext>,
    state: Arc<Mutex<RunnerState>>,
}

impl Runner {
    /// Creates a runner that replays its queue in declaration order.
    pub fn new(context: Arc<dyn MigrationContext>) -> Runner {
        Runner::with_mode(context, ReplayMode::Direct)
    }

    /// Creates a runner whose queue is inverted and reversed at the end of
    /// the run. Used when a single change definition is replayed backward.
    pub(crate) fn auto_reverse(context: Arc<dyn MigrationContext>) -> Runner {
        Runner::with_mode(context, ReplayMode::AutoReverse)
    }

    fn with_mode(context: Arc<dyn MigrationContext>, mode: ReplayMode) -> Runner {
        Runner {
            context,
            state: Arc::new(Mutex::new(RunnerState {
                mode,
                queue: Vec::new(),
                open: None,
            })),
        }
    }

    /// The context this run executes under.
    pub fn context(&self) -> &Arc<dyn MigrationContext> {
        &self.context
    }

    /// Opens a command over a target.
    ///
    /// # Errors
    /// `NestedCommand` when another command is already open; `ScopeMismatch`
    /// when the target declares a scope conflicting with the context.
    pub fn start_command(&self, op: CommandOp, target: impl Into<Target>) -> StrataResult<()> {
        let target = target.into();
        let mut state = self.state.lock();
        if let Some(open) = &state.open {
            return Err(StrataError::new(
                &format!(
                    "cannot {} {} `{}` while a {} of `{}` is open",
                    op.verb(),
                    target.kind_name(),
                    target.name(),
                    open.op.verb(),
                    open.target.name()
                ),
                ErrorKind::NestedCommand,
            ));
        }
        let scope = self.context.scope();
        let target = target.scoped(scope.as_deref())?;
        state.open = Some(OpenCommand {
            op,
            target,
            subcommands: Vec::new(),
            groups: Vec::new(),
        });
        Ok(())
    }

    /// Appends a field edit to the open command, or to its innermost
    /// embedded group when one is open.
    ///
    /// # Errors
    /// `InvalidOperation` when no command is open.
    pub fn subcommand(&self, subcommand: Subcommand) -> StrataResult<()> {
        let mut state = self.state.lock();
        let open = state.open.as_mut().ok_or_else(|| {
            StrataError::new(
                &format!(
                    "cannot {} outside of an open command",
                    subcommand.describe()
                ),
                ErrorKind::InvalidOperation,
            )
        })?;
        match open.groups.last_mut() {
            Some(frame) => frame.subcommands.push(subcommand),
            None => open.subcommands.push(subcommand),
        }
        Ok(())
    }

    /// Opens an embedded group holding a single nested document.
    pub fn start_group(&self, name: &str, opts: FieldOptions) -> StrataResult<()> {
        self.push_group(name, opts, false)
    }

    /// Opens an embedded group holding an array of nested documents.
    pub fn start_group_many(&self, name: &str, opts: FieldOptions) -> StrataResult<()> {
        self.push_group(name, opts, true)
    }

    fn push_group(&self, name: &str, opts: FieldOptions, many: bool) -> StrataResult<()> {
        let mut state = self.state.lock();
        let open = state.open.as_mut().ok_or_else(|| {
            StrataError::new(
                &format!("cannot open embedded group `{}` outside of a command", name),
                ErrorKind::InvalidOperation,
            )
        })?;
        open.groups.push(GroupFrame {
            name: name.to_string(),
            opts,
            many,
            subcommands: Vec::new(),
        });
        Ok(())
    }

    /// Closes the innermost embedded group and folds it into its parent.
    pub fn end_group(&self) -> StrataResult<()> {
        let mut state = self.state.lock();
        let open = state.open.as_mut().ok_or_else(|| {
            StrataError::new(
                "cannot close an embedded group outside of a command",
                ErrorKind::InvalidOperation,
            )
        })?;
        let frame = open.groups.pop().ok_or_else(|| {
            StrataError::new(
                "no embedded group is open",
                ErrorKind::InvalidOperation,
            )
        })?;
        let subcommand = if frame.many {
            Subcommand::embedded_group_many(&frame.name, frame.opts, frame.subcommands)
        } else {
            Subcommand::embedded_group(&frame.name, frame.opts, frame.subcommands)
        };
        match open.groups.last_mut() {
            Some(parent) => parent.subcommands.push(subcommand),
            None => open.subcommands.push(subcommand),
        }
        Ok(())
    }

    /// Closes the open command, compiles its validation tree when the target
    /// is a collection, and appends it to the queue.
    ///
    /// # Errors
    /// `InvalidOperation` when no command or an embedded group is still open,
    /// or when a drop carries field edits; `InvalidOption` when validation
    /// compilation rejects an option value.
    pub fn end_command(&self) -> StrataResult<()> {
        let mut state = self.state.lock();
        match &state.open {
            None => {
                return Err(StrataError::new(
                    "no command is open",
                    ErrorKind::InvalidOperation,
                ))
            }
            Some(open) => {
                if let Some(frame) = open.groups.last() {
                    return Err(StrataError::new(
                        &format!("embedded group `{}` is still open", frame.name),
                        ErrorKind::InvalidOperation,
                    ));
                }
            }
        }
        let open = state.open.take().ok_or_else(|| {
            StrataError::new("no command is open", ErrorKind::InvalidOperation)
        })?;
        let command = assemble(open.op, open.target, open.subcommands)?;
        debug!("queued command: {}", command.describe());
        state.queue.push(command);
        Ok(())
    }

    /// Discards the open command, if any. Used when a build closure fails.
    fn abandon_open(&self) {
        self.state.lock().open = None;
    }

    // ==================== Convenience Surface ====================

    /// Opens, builds, and closes a create command in one call.
    pub fn create<T, F>(&self, target: T, build: F) -> StrataResult<()>
    where
        T: Into<Target>,
        F: FnOnce(&Runner) -> StrataResult<()>,
    {
        self.command(CommandOp::Create, target, build)
    }

    /// Like [`create`](Runner::create) but skipped by the executor when the
    /// target already exists.
    pub fn create_if_absent<T, F>(&self, target: T, build: F) -> StrataResult<()>
    where
        T: Into<Target>,
        F: FnOnce(&Runner) -> StrataResult<()>,
    {
        self.command(CommandOp::CreateIfAbsent, target, build)
    }

    /// Opens, builds, and closes an alter command in one call.
    pub fn alter<T, F>(&self, target: T, build: F) -> StrataResult<()>
    where
        T: Into<Target>,
        F: FnOnce(&Runner) -> StrataResult<()>,
    {
        self.command(CommandOp::Alter, target, build)
    }

    fn command<T, F>(&self, op: CommandOp, target: T, build: F) -> StrataResult<()>
    where
        T: Into<Target>,
        F: FnOnce(&Runner) -> StrataResult<()>,
    {
        self.start_command(op, target)?;
        if let Err(err) = build(self) {
            self.abandon_open();
            return Err(err);
        }
        self.end_command()
    }

    /// Queues a drop of the target.
    pub fn drop_target(&self, target: impl Into<Target>) -> StrataResult<()> {
        self.start_command(CommandOp::Drop, target)?;
        self.end_command()
    }

    /// Queues a drop that the executor skips when the target is absent.
    pub fn drop_target_if_exists(&self, target: impl Into<Target>) -> StrataResult<()> {
        self.start_command(CommandOp::DropIfExists, target)?;
        self.end_command()
    }

    /// Queues a rename of the target to a new name.
    pub fn rename(&self, target: impl Into<Target>, new_name: &str) -> StrataResult<()> {
        let target = target.into();
        self.ensure_no_open("rename", target.name())?;
        let scope = self.context.scope();
        let target = target.scoped(scope.as_deref())?;
        let command = Command::Rename(target, new_name.to_string());
        debug!("queued command: {}", command.describe());
        self.state.lock().queue.push(command);
        Ok(())
    }

    /// Queues a raw command carrying backend-specific text.
    pub fn raw(&self, text: &str) -> StrataResult<()> {
        self.push_raw(Command::Raw(RawAction::text(text)))
    }

    /// Queues a raw command carrying an arbitrary action.
    pub fn raw_closure<F>(&self, action: F) -> StrataResult<()>
    where
        F: Fn() -> StrataResult<()> + Send + Sync + 'static,
    {
        self.push_raw(Command::Raw(RawAction::closure(action)))
    }

    /// Queues a raw command paired with its hand-written inverse.
    pub fn raw_reversible(&self, forward: &str, backward: &str) -> StrataResult<()> {
        self.push_raw(Command::RawReversible(
            RawAction::text(forward),
            RawAction::text(backward),
        ))
    }

    fn push_raw(&self, command: Command) -> StrataResult<()> {
        self.ensure_no_open("queue raw command", "")?;
        debug!("queued command: {}", command.describe());
        self.state.lock().queue.push(command);
        Ok(())
    }

    fn ensure_no_open(&self, action: &str, name: &str) -> StrataResult<()> {
        let state = self.state.lock();
        if let Some(open) = &state.open {
            return Err(StrataError::new(
                &format!(
                    "cannot {} `{}` while a {} of `{}` is open",
                    action,
                    name,
                    open.op.verb(),
                    open.target.name()
                ),
                ErrorKind::NestedCommand,
            ));
        }
        Ok(())
    }

    /// Opens, builds, and closes an embedded group in one call.
    pub fn group<F>(&self, name: &str, opts: FieldOptions, build: F) -> StrataResult<()>
    where
        F: FnOnce(&Runner) -> StrataResult<()>,
    {
        self.start_group(name, opts)?;
        build(self)?;
        self.end_group()
    }

    /// Opens, builds, and closes an array-of-documents group in one call.
    pub fn group_many<F>(&self, name: &str, opts: FieldOptions, build: F) -> StrataResult<()>
    where
        F: FnOnce(&Runner) -> StrataResult<()>,
    {
        self.start_group_many(name, opts)?;
        build(self)?;
        self.end_group()
    }

    /// Appends the insertion and update timestamp fields configured on the
    /// context to the open command.
    pub fn timestamps(&self) -> StrataResult<()> {
        let config = self.context.timestamps();
        for subcommand in timestamp_fields(
            &config.inserted_at,
            &config.updated_at,
            config.field_type,
        ) {
            self.subcommand(subcommand)?;
        }
        Ok(())
    }

    // ==================== Delivery ====================

    /// Delivers every queued command to the executor now, in order, and
    /// clears the queue.
    ///
    /// # Errors
    /// `FlushDuringRollback` when the run is being replayed backward through
    /// a single change definition, since commands queued after the flush
    /// would already have been delivered when their inverses run.
    pub fn flush(&self, executor: &mut dyn Executor) -> StrataResult<()> {
        let commands = {
            let mut state = self.state.lock();
            if state.mode == ReplayMode::AutoReverse {
                return Err(StrataError::new(
                    "cannot flush while replaying a change definition backward",
                    ErrorKind::FlushDuringRollback,
                ));
            }
            if let Some(open) = &state.open {
                return Err(StrataError::new(
                    &format!(
                        "cannot flush while a {} of `{}` is open",
                        open.op.verb(),
                        open.target.name()
                    ),
                    ErrorKind::InvalidOperation,
                ));
            }
            std::mem::take(&mut state.queue)
        };
        deliver(&commands, executor)
    }

    /// Ends the run: delivers the queue in declaration order, or, in
    /// auto-reverse mode, derives every inverse first and delivers them in
    /// reverse order. No command reaches the executor unless the whole queue
    /// is reversible.
    pub fn finish(&self, executor: &mut dyn Executor) -> StrataResult<()> {
        let (mode, commands) = {
            let mut state = self.state.lock();
            if let Some(open) = &state.open {
                return Err(StrataError::new(
                    &format!(
                        "a {} of `{}` is still open",
                        open.op.verb(),
                        open.target.name()
                    ),
                    ErrorKind::InvalidOperation,
                ));
            }
            (state.mode, std::mem::take(&mut state.queue))
        };
        match mode {
            ReplayMode::Direct => deliver(&commands, executor),
            ReplayMode::AutoReverse => {
                let mut inverted = Vec::with_capacity(commands.len());
                for command in commands.iter().rev() {
                    inverted.push(reverse_command(command).map_err(|i| i.into_error())?);
                }
                deliver(&inverted, executor)
            }
        }
    }

    /// A snapshot of the queued commands, for inspection.
    pub fn commands(&self) -> Vec<Command> {
        self.state.lock().queue.clone()
    }
}

fn deliver(commands: &[Command], executor: &mut dyn Executor) -> StrataResult<()> {
    for command in commands {
        debug!("executing command: {}", command.describe());
        executor.execute(command)?;
    }
    Ok(())
}

fn assemble(op: CommandOp, target: Target, subcommands: Vec<Subcommand>) -> StrataResult<Command> {
    match op {
        CommandOp::Create | CommandOp::CreateIfAbsent | CommandOp::Alter => {
            let target = match target {
                Target::Collection(mut collection) => {
                    let prior = if op == CommandOp::Alter {
                        collection.validation.as_ref().map(|doc| doc.rule.clone())
                    } else {
                        None
                    };
                    let rule = compile(&subcommands, prior.as_ref())?;
                    collection.validation = Some(ValidationDocument::new(
                        rule,
                        collection.options.level,
                        &collection.options.message,
                    ));
                    Target::Collection(collection)
                }
                other => other,
            };
            Ok(match op {
                CommandOp::Create => Command::Create(target, subcommands),
                CommandOp::CreateIfAbsent => Command::CreateIfAbsent(target, subcommands),
                _ => Command::Alter(target, subcommands),
            })
        }
        CommandOp::Drop | CommandOp::DropIfExists => {
            if !subcommands.is_empty() {
                return Err(StrataError::new(
                    &format!(
                        "cannot drop {} `{}` with field edits attached",
                        target.kind_name(),
                        target.name()
                    ),
                    ErrorKind::InvalidOperation,
                ));
            }
            Ok(match op {
                CommandOp::Drop => Command::Drop(target),
                _ => Command::DropIfExists(target),
            })
        }
    }
}
