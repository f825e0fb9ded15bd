use std::fmt::{Display, Formatter};

use crate::common::Value;
use crate::errors::{ErrorKind, StrataError};
use crate::migration::command::{Command, FieldType, Subcommand};
use crate::migration::options::FieldOptions;

/// Why a command or subcommand cannot be replayed backward.
///
/// # Purpose
/// Carries the human-readable description of the irreversible operation and
/// the reason no inverse exists, so authors can tell exactly which edit blocks
/// an automatic rollback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Irreversible {
    /// Description of the operation that has no inverse.
    pub operation: String,
    /// Why the inverse cannot be derived.
    pub reason: String,
}

impl Irreversible {
    fn new(operation: String, reason: &str) -> Self {
        Irreversible {
            operation,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn into_error(self) -> StrataError {
        StrataError::new(
            &format!("cannot reverse {}: {}", self.operation, self.reason),
            ErrorKind::Irreversible,
        )
    }
}

impl Display for Irreversible {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot reverse {}: {}", self.operation, self.reason)
    }
}

/// Derives the inverse of a command.
///
/// # Purpose
/// Total over the command space: every command either maps to its exact
/// inverse or to an [`Irreversible`] explaining what is missing. Used when a
/// migration written with a single change definition is replayed backward.
///
/// # Returns
/// The inverse command, or `Irreversible` when none can be derived.
pub fn reverse_command(command: &Command) -> Result<Command, Irreversible> {
    match command {
        Command::Create(target, _) => Ok(Command::Drop(target.clone())),
        Command::CreateIfAbsent(target, _) => Ok(Command::DropIfExists(target.clone())),
        Command::Alter(target, subcommands) => {
            let mut reversed = Vec::with_capacity(subcommands.len());
            for subcommand in subcommands.iter().rev() {
                reversed.push(reverse_subcommand(subcommand)?);
            }
            Ok(Command::Alter(target.clone(), reversed))
        }
        Command::Drop(target) | Command::DropIfExists(target) => Err(Irreversible::new(
            command.describe(),
            &format!(
                "the dropped {} definition is not recorded",
                target.kind_name()
            ),
        )),
        Command::Rename(target, new_name) => Ok(Command::Rename(
            target.with_name(new_name),
            target.name().to_string(),
        )),
        Command::Raw(_) => Err(Irreversible::new(
            command.describe(),
            "no inverse action was provided",
        )),
        Command::RawReversible(forward, backward) => {
            Ok(Command::RawReversible(backward.clone(), forward.clone()))
        }
    }
}

/// Derives the inverse of a single field edit.
pub fn reverse_subcommand(subcommand: &Subcommand) -> Result<Subcommand, Irreversible> {
    match subcommand {
        Subcommand::Add {
            name,
            field_type,
            opts,
        } => Ok(Subcommand::Remove {
            name: name.clone(),
            recorded: Some((field_type.clone(), opts.clone())),
        }),
        Subcommand::AddIfAbsent { .. } => Err(Irreversible::new(
            subcommand.describe(),
            "a conditional add has no exact inverse",
        )),
        Subcommand::Remove {
            name,
            recorded: Some((field_type, opts)),
        } => Ok(Subcommand::Add {
            name: name.clone(),
            field_type: field_type.clone(),
            opts: opts.clone(),
        }),
        Subcommand::Remove { recorded: None, .. } => Err(Irreversible::new(
            subcommand.describe(),
            "the removed field's type is not recorded",
        )),
        Subcommand::RemoveIfExists { .. } => Err(Irreversible::new(
            subcommand.describe(),
            "a conditional remove has no exact inverse",
        )),
        Subcommand::Modify { name, opts, .. } => reverse_modify(subcommand, name, opts),
        Subcommand::Rename { from, to } => Ok(Subcommand::Rename {
            from: to.clone(),
            to: from.clone(),
        }),
        Subcommand::AddEmbeddedGroup { name, .. }
        | Subcommand::AddEmbeddedGroupMany { name, .. } => Ok(Subcommand::Remove {
            name: name.clone(),
            recorded: None,
        }),
        Subcommand::AddSort { .. } | Subcommand::AddStore { .. } => Err(Irreversible::new(
            subcommand.describe(),
            "the previous view configuration is not recorded",
        )),
        Subcommand::AddLink { name, link } => Ok(Subcommand::RemoveLink {
            name: name.clone(),
            link: Some(link.clone()),
        }),
        Subcommand::RemoveLink {
            name,
            link: Some(link),
        } => Ok(Subcommand::AddLink {
            name: name.clone(),
            link: link.clone(),
        }),
        Subcommand::RemoveLink { link: None, .. } => Err(Irreversible::new(
            subcommand.describe(),
            "the removed link definition is not recorded",
        )),
    }
}

// A modify reverses only when its options recorded the previous definition
// under `from`, either as a bare type name or as an object with a `type` key
// plus the previous options.
fn reverse_modify(
    subcommand: &Subcommand,
    name: &str,
    opts: &FieldOptions,
) -> Result<Subcommand, Irreversible> {
    match opts.get("from") {
        Some(Value::String(type_name)) => {
            let field_type = parse_recorded_type(subcommand, type_name)?;
            Ok(Subcommand::Modify {
                name: name.to_string(),
                field_type,
                opts: FieldOptions::new(),
            })
        }
        Some(Value::Object(previous)) => {
            let type_name = previous
                .get("type")
                .and_then(|value| value.as_str())
                .ok_or_else(|| {
                    Irreversible::new(
                        subcommand.describe(),
                        "the `from` option carries no previous type",
                    )
                })?;
            let field_type = parse_recorded_type(subcommand, type_name)?;
            let mut previous_opts = FieldOptions::new();
            for (key, value) in previous {
                if key != "type" {
                    previous_opts.insert(key, value.clone());
                }
            }
            Ok(Subcommand::Modify {
                name: name.to_string(),
                field_type,
                opts: previous_opts,
            })
        }
        Some(_) => Err(Irreversible::new(
            subcommand.describe(),
            "the `from` option carries no previous type",
        )),
        None => Err(Irreversible::new(
            subcommand.describe(),
            "no `from` option recorded the previous definition",
        )),
    }
}

fn parse_recorded_type(
    subcommand: &Subcommand,
    type_name: &str,
) -> Result<FieldType, Irreversible> {
    FieldType::parse(type_name).map_err(|err| {
        Irreversible::new(
            subcommand.describe(),
            &format!("the recorded previous type is invalid: {}", err),
        )
    })
}
