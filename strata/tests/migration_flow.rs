use std::sync::Arc;

use strata::common::Value;
use strata::errors::{ErrorKind, StrataResult};
use strata::migration::{
    Command, DefaultContext, Executor, FieldType, Migration, Runner, Subcommand, Target, ViewLink,
};
use strata::opts;

#[ctor::ctor]
fn init() {
    colog::init();
}

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

fn user_schema() -> Migration {
    Migration::change("create_user_schema", |r| {
        r.create(Target::collection("users"), |r| {
            r.subcommand(Subcommand::add(
                "email",
                FieldType::String,
                opts! { format: "email", null: false },
            ))?;
            r.subcommand(Subcommand::add(
                "age",
                FieldType::Integer,
                opts! { minimum: 0, maximum: 150 },
            ))?;
            r.group("profile", opts! { required: ["display_name"] }, |r| {
                r.subcommand(Subcommand::add(
                    "display_name",
                    FieldType::String,
                    opts! { min_length: 1 },
                ))
            })?;
            r.timestamps()
        })?;
        r.create(Target::index("users", &["email"]), |_| Ok(()))?;
        r.create(Target::view("user_search"), |r| {
            r.subcommand(Subcommand::add_link(
                "users",
                ViewLink::new().analyzer("text_en").include_all_fields(),
            ))
        })
    })
}

#[test]
fn test_forward_replay_delivers_ordered_commands() {
    let mut executor = RecordingExecutor::default();
    user_schema()
        .run(Arc::new(DefaultContext::forward()), &mut executor)
        .unwrap();

    assert_eq!(executor.executed.len(), 3);
    match &executor.executed[0] {
        Command::Create(Target::Collection(collection), subcommands) => {
            assert_eq!(collection.name, "users");
            // email, age, profile group, two timestamps
            assert_eq!(subcommands.len(), 5);
        }
        other => panic!("unexpected command: {:?}", other),
    }
    match &executor.executed[1] {
        Command::Create(Target::Index(index), _) => {
            assert_eq!(index.name, "idx_users_email");
        }
        other => panic!("unexpected command: {:?}", other),
    }
    assert!(matches!(
        &executor.executed[2],
        Command::Create(Target::View(_), _)
    ));
}

#[test]
fn test_forward_replay_compiles_validation_document() {
    let mut executor = RecordingExecutor::default();
    user_schema()
        .run(Arc::new(DefaultContext::forward()), &mut executor)
        .unwrap();

    let collection = match &executor.executed[0] {
        Command::Create(Target::Collection(collection), _) => collection,
        other => panic!("unexpected command: {:?}", other),
    };
    let validation = collection.validation.as_ref().expect("validation attached");

    let rendered = validation.to_value();
    let envelope = rendered.as_object().unwrap();
    let keys: Vec<&str> = envelope.keys().map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["rule", "level", "message"]);
    assert_eq!(envelope.get("level"), Some(&Value::from("strict")));

    let rule = envelope.get("rule").unwrap().as_object().unwrap();
    // the root node carries no type tag of its own
    assert!(!rule.contains_key("type"));
    let properties = rule.get("properties").unwrap().as_object().unwrap();
    let field_names: Vec<&str> = properties.keys().map(|k| k.as_str()).collect();
    assert_eq!(
        field_names,
        vec!["email", "age", "profile", "inserted_at", "updated_at"]
    );

    let email = properties.get("email").unwrap().as_object().unwrap();
    assert_eq!(email.get("type"), Some(&Value::from("string")));
    assert_eq!(email.get("format"), Some(&Value::from("email")));

    let age = properties.get("age").unwrap().as_object().unwrap();
    assert_eq!(
        age.get("type"),
        Some(&Value::Array(vec![
            Value::from("number"),
            Value::from("null")
        ]))
    );
    assert_eq!(age.get("minimum"), Some(&Value::Int(0)));

    let profile = properties.get("profile").unwrap().as_object().unwrap();
    let nested = profile.get("properties").unwrap().as_object().unwrap();
    assert!(nested.contains_key("display_name"));
}

#[test]
fn test_backward_replay_inverts_and_reverses() {
    let mut executor = RecordingExecutor::default();
    user_schema()
        .run(Arc::new(DefaultContext::backward()), &mut executor)
        .unwrap();

    assert_eq!(executor.executed.len(), 3);
    match &executor.executed[0] {
        Command::Drop(Target::View(view)) => assert_eq!(view.name, "user_search"),
        other => panic!("unexpected command: {:?}", other),
    }
    match &executor.executed[1] {
        Command::Drop(Target::Index(index)) => assert_eq!(index.name, "idx_users_email"),
        other => panic!("unexpected command: {:?}", other),
    }
    match &executor.executed[2] {
        Command::Drop(Target::Collection(collection)) => assert_eq!(collection.name, "users"),
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_backward_replay_fails_up_front_on_irreversible_commands() {
    let migration = Migration::change("cleanup", |r| {
        r.create(Target::collection("audit"), |_| Ok(()))?;
        r.raw("FOR d IN audit REMOVE d IN audit")
    });
    let mut executor = RecordingExecutor::default();
    let err = migration
        .run(Arc::new(DefaultContext::backward()), &mut executor)
        .expect_err("raw command has no inverse");
    assert_eq!(err.kind(), &ErrorKind::Irreversible);
    assert!(executor.executed.is_empty());
}

#[test]
fn test_flush_is_rejected_during_derived_rollback() {
    let migration = Migration::change("with_flush", |r| {
        r.create(Target::collection("events"), |_| Ok(()))?;
        let mut executor = RecordingExecutor::default();
        r.flush(&mut executor)
    });
    let mut executor = RecordingExecutor::default();
    let err = migration
        .run(Arc::new(DefaultContext::backward()), &mut executor)
        .expect_err("flush is meaningless while rolling back");
    assert_eq!(err.kind(), &ErrorKind::FlushDuringRollback);

    // the same definition replays forward, flushing mid-run
    let mut executor = RecordingExecutor::default();
    migration
        .run(Arc::new(DefaultContext::forward()), &mut executor)
        .unwrap();
    assert_eq!(executor.executed.len(), 1);
}

#[test]
fn test_scoped_context_stamps_every_target() {
    let mut executor = RecordingExecutor::default();
    user_schema()
        .run(
            Arc::new(DefaultContext::forward().with_scope("tenant_a")),
            &mut executor,
        )
        .unwrap();
    for command in &executor.executed {
        let target = command.target().expect("structural command");
        assert_eq!(target.scope(), Some("tenant_a"));
    }
}

#[test]
fn test_explicit_up_and_down_pair() {
    let migration = Migration::new(
        "add_age",
        |r: &Runner| {
            r.alter(Target::collection("users"), |r| {
                r.subcommand(Subcommand::add("age", FieldType::Integer, opts! {}))
            })
        },
        |r: &Runner| {
            r.alter(Target::collection("users"), |r| {
                r.subcommand(Subcommand::remove("age"))
            })
        },
    );

    let mut executor = RecordingExecutor::default();
    migration
        .run(Arc::new(DefaultContext::backward()), &mut executor)
        .unwrap();
    match &executor.executed[0] {
        Command::Alter(_, subcommands) => {
            assert_eq!(subcommands, &vec![Subcommand::remove("age")]);
        }
        other => panic!("unexpected command: {:?}", other),
    }
}
