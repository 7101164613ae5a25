//! Todo subcommand: CRUD operations, each followed by one reconcile.

use clap::Subcommand;
use tasklink_core::{TodoDraft, TodoPatch};

use crate::common::{self, format_reminder};

#[derive(Subcommand)]
pub enum TodoAction {
    /// Add a new todo
    Add {
        /// Title of the todo
        title: String,
        /// Optional longer description
        #[arg(long)]
        description: Option<String>,
        /// Reminder time (RFC 3339 or "YYYY-MM-DD HH:MM" local time);
        /// mirrored onto the calendar when an account is linked
        #[arg(long)]
        reminder: Option<String>,
    },
    /// List todos
    List {
        /// Print as JSON instead of the table
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing todo
    Edit {
        /// Todo id
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// New reminder time
        #[arg(long)]
        reminder: Option<String>,
        /// Remove the reminder (and its calendar event)
        #[arg(long, conflicts_with = "reminder")]
        clear_reminder: bool,
    },
    /// Mark a todo as completed
    Done {
        /// Todo id
        id: String,
    },
    /// Delete a todo
    Rm {
        /// Todo id
        id: String,
    },
}

pub async fn run(action: TodoAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = common::context()?;
    let user = ctx.config.account.user.clone();

    match action {
        TodoAction::Add {
            title,
            description,
            reminder,
        } => {
            let reminder_at = reminder.as_deref().map(common::parse_reminder).transpose()?;
            let draft = TodoDraft {
                title,
                description,
                reminder_at,
            };
            let todo = ctx.db.insert_todo(&user, draft)?;
            println!("added {}  {}", todo.id, todo.title);
            common::sync_mutation(&ctx, None, Some(&todo), &todo.id).await?;
        }
        TodoAction::List { json } => {
            let todos = ctx.db.list_todos(&user)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&todos)?);
                return Ok(());
            }
            if todos.is_empty() {
                println!("no todos yet; add one with `tasklink todo add <title>`");
                return Ok(());
            }
            for todo in &todos {
                let done = if todo.completed { "x" } else { " " };
                let synced = if todo.remote_event_id.is_some() {
                    "  [synced]"
                } else {
                    ""
                };
                println!(
                    "[{done}] {}  {}  reminder: {}{synced}",
                    todo.id,
                    todo.title,
                    format_reminder(todo),
                );
            }
        }
        TodoAction::Edit {
            id,
            title,
            description,
            reminder,
            clear_reminder,
        } => {
            let previous = ctx
                .db
                .get_todo(&user, &id)?
                .ok_or_else(|| format!("todo not found: {id}"))?;

            let reminder_at = if clear_reminder {
                Some(None)
            } else {
                reminder
                    .as_deref()
                    .map(common::parse_reminder)
                    .transpose()?
                    .map(Some)
            };
            let patch = TodoPatch {
                title,
                description: description.map(Some),
                reminder_at,
                completed: None,
            };
            if patch.is_empty() {
                println!("nothing to change");
                return Ok(());
            }

            let next = ctx
                .db
                .update_todo(&user, &id, &patch)?
                .ok_or_else(|| format!("todo not found: {id}"))?;
            println!("updated {}  {}", next.id, next.title);
            common::sync_mutation(&ctx, Some(&previous), Some(&next), &id).await?;
        }
        TodoAction::Done { id } => {
            let previous = ctx
                .db
                .get_todo(&user, &id)?
                .ok_or_else(|| format!("todo not found: {id}"))?;
            let patch = TodoPatch {
                completed: Some(true),
                ..Default::default()
            };
            let next = ctx
                .db
                .update_todo(&user, &id, &patch)?
                .ok_or_else(|| format!("todo not found: {id}"))?;
            println!("completed {}  {}", next.id, next.title);
            // Completion is not mirrored; this reconcile is a no-op.
            common::sync_mutation(&ctx, Some(&previous), Some(&next), &id).await?;
        }
        TodoAction::Rm { id } => {
            let previous = ctx
                .db
                .delete_todo(&user, &id)?
                .ok_or_else(|| format!("todo not found: {id}"))?;
            println!("deleted {}  {}", previous.id, previous.title);
            common::sync_mutation(&ctx, Some(&previous), None, &id).await?;
        }
    }

    Ok(())
}
