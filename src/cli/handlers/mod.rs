mod auth;
mod init;
pub use auth::{cmd_login, cmd_logout, cmd_passwd, cmd_reset_password, cmd_signup, cmd_whoami};
pub use init::{cmd_config, cmd_init};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::cli::overlay::StatusOverlay;
use crate::io::auth::AuthClient;
use crate::io::config_io;
use crate::io::generator::ProxyClient;
use crate::io::rest_store::RestStore;
use crate::io::session_io;
use crate::model::config::AppConfig;
use crate::model::session::{Session, SessionContext};
use crate::model::task::{TITLE_MAX, Task, TaskId, TaskStatus, title_len};
use crate::ops::expand::{self, ExpandOutcome};
use crate::ops::sync::TaskSync;
use crate::server;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

pub const SIGNED_OUT_MESSAGE: &str = "You've been signed out. Please log in";

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub async fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let config_path = config_io::config_path(cli.config.as_deref());

    match cli.command {
        // Setup
        Commands::Init(args) => cmd_init(&config_path, args),
        Commands::Config(args) => cmd_config(&config_path, args, json),

        // Account
        Commands::Login(args) => cmd_login(&config_path, args, json).await,
        Commands::Signup(args) => cmd_signup(&config_path, args, json).await,
        Commands::ResetPassword(args) => cmd_reset_password(&config_path, args).await,
        Commands::Passwd(args) => cmd_passwd(&config_path, args).await,
        Commands::Logout => cmd_logout(&config_path).await,
        Commands::Whoami => cmd_whoami(&config_path, json).await,

        // Read commands
        Commands::List(args) => cmd_list(&config_path, args, json).await,
        Commands::Show(args) => cmd_show(&config_path, args, json).await,

        // Write commands
        Commands::Add(args) => cmd_add(&config_path, args, json).await,
        Commands::Edit(args) => cmd_edit(&config_path, args, json).await,
        Commands::Status(args) => cmd_status(&config_path, args, json).await,
        Commands::Next(args) => cmd_next(&config_path, args, json).await,
        Commands::Delete(args) => cmd_delete(&config_path, args, json).await,
        Commands::Expand(args) => cmd_expand(&config_path, args, json).await,

        // Relay
        Commands::Serve(args) => cmd_serve(&config_path, args).await,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Everything a task command needs: the sync layer bound to the signed-in
/// identity, and the presentation-side status overlay.
struct TaskContext {
    config: AppConfig,
    sync: TaskSync<RestStore>,
    overlay: StatusOverlay,
    /// Keeps the identity channel open for the sync layer
    _session: SessionContext,
}

fn session_file(config_path: &Path) -> PathBuf {
    session_io::session_path(config_path)
}

/// The saved session, refreshed when its access token has expired.
///
/// A session that cannot be refreshed is forgotten.
async fn load_session(config_path: &Path, config: &AppConfig) -> Result<Option<Session>, Box<dyn std::error::Error>> {
    let path = session_file(config_path);
    let Some(session) = session_io::read_session(&path) else {
        return Ok(None);
    };
    if !session.is_expired(Utc::now()) {
        return Ok(Some(session));
    }

    let Some(refresh_token) = session.refresh_token.as_deref() else {
        session_io::clear_session(&path)?;
        return Ok(None);
    };
    match AuthClient::new(&config.store).refresh(refresh_token).await {
        Ok(fresh) => {
            session_io::write_session(&path, &fresh)?;
            info!(user = %fresh.user_id, "session refreshed");
            Ok(Some(fresh))
        }
        Err(e) => {
            warn!(error = %e, "could not refresh session");
            session_io::clear_session(&path)?;
            Ok(None)
        }
    }
}

/// A signed-in session or the signed-out error
async fn require_session(config_path: &Path, config: &AppConfig) -> Result<Session, Box<dyn std::error::Error>> {
    load_session(config_path, config)
        .await?
        .ok_or_else(|| format!("{} (run `tim login`)", SIGNED_OUT_MESSAGE).into())
}

async fn open_tasks(config_path: &Path) -> Result<TaskContext, Box<dyn std::error::Error>> {
    let config = config_io::effective_config(config_path)?;
    let session_ctx = SessionContext::new();
    let session = require_session(config_path, &config).await?;

    let store = RestStore::new(&config.store)?.with_access_token(session.access_token.clone());
    let sync = TaskSync::new(Arc::new(store), session_ctx.subscribe(), config.list.sort);
    session_ctx.sign_in(session);

    Ok(TaskContext {
        config,
        sync,
        overlay: StatusOverlay::new(),
        _session: session_ctx,
    })
}

/// Fetch and look up one task by id
async fn fetch_task(ctx: &mut TaskContext, id: &str) -> Result<Task, Box<dyn std::error::Error>> {
    let id = TaskId::from(id);
    ctx.sync.fetch_tasks().await?;
    ctx.sync
        .find(&id)
        .cloned()
        .ok_or_else(|| format!("task not found: {}", id).into())
}

fn check_title(title: &str) -> CmdResult {
    if title.trim().is_empty() {
        return Err("Title is required".into());
    }
    if title_len(title) > TITLE_MAX {
        return Err(format!("title is longer than {} characters", TITLE_MAX).into());
    }
    Ok(())
}

/// Refetch and print the list (JSON) or the notification (human)
async fn finish_mutation(ctx: &mut TaskContext, notice: &str, json: bool) -> CmdResult {
    let refetch = ctx.sync.fetch_tasks().await;
    if json {
        let tasks = refetch?;
        ctx.overlay.reconcile(tasks);
        print_tasks_json(tasks, &ctx.overlay)?;
    } else {
        println!("{}", notice);
        match refetch {
            Ok(tasks) => ctx.overlay.reconcile(tasks),
            Err(e) => eprintln!("could not refresh the list: {}", e),
        }
    }
    Ok(())
}

fn print_tasks_json(tasks: &[Task], overlay: &StatusOverlay) -> CmdResult {
    let out: Vec<TaskJson> = tasks
        .iter()
        .map(|t| task_to_json(t, overlay.effective(t)))
        .collect();
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

async fn cmd_list(config_path: &Path, args: ListArgs, json: bool) -> CmdResult {
    let filter = parse_status_filter(&args.status)?;
    let mut ctx = open_tasks(config_path).await?;
    let tasks = ctx.sync.fetch_tasks().await?;

    if json {
        let shown: Vec<Task> = tasks
            .iter()
            .filter(|t| filter.is_none_or(|f| ctx.overlay.effective(t) == f))
            .cloned()
            .collect();
        print_tasks_json(&shown, &ctx.overlay)?;
    } else {
        for line in format_listing(tasks, filter, &ctx.overlay) {
            println!("{}", line);
        }
    }
    Ok(())
}

async fn cmd_show(config_path: &Path, args: ShowArgs, json: bool) -> CmdResult {
    let mut ctx = open_tasks(config_path).await?;
    let task = fetch_task(&mut ctx, &args.id).await?;
    let status = ctx.overlay.effective(&task);
    if json {
        println!("{}", serde_json::to_string_pretty(&task_to_json(&task, status))?);
    } else {
        for line in format_task_detail(&task, status) {
            println!("{}", line);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

async fn cmd_add(config_path: &Path, args: AddArgs, json: bool) -> CmdResult {
    check_title(&args.title)?;
    let mut ctx = open_tasks(config_path).await?;
    ctx.sync.add_task(&args.title, &args.description).await?;
    finish_mutation(&mut ctx, "Task added successfully", json).await
}

async fn cmd_edit(config_path: &Path, args: EditArgs, json: bool) -> CmdResult {
    if args.title.is_none() && args.description.is_none() {
        return Err("nothing to change (use --title or --description)".into());
    }
    if let Some(title) = &args.title {
        check_title(title)?;
    }
    let mut ctx = open_tasks(config_path).await?;
    let task = fetch_task(&mut ctx, &args.id).await?;
    let title = args.title.unwrap_or(task.title);
    let description = args.description.unwrap_or(task.description);

    let affected = ctx.sync.update_task(&task.id, &title, &description).await?;
    if affected == 0 {
        return Err(format!("task not found: {}", task.id).into());
    }
    finish_mutation(&mut ctx, "Task updated successfully!", json).await
}

/// Show `status` for the task right away, then confirm with the store.
/// The override is dropped if the store rejects the change.
async fn change_status(ctx: &mut TaskContext, task: &Task, status: TaskStatus, json: bool) -> CmdResult {
    ctx.overlay.set(task.id.clone(), status);
    if !json {
        println!("{}", format_task_line(task, ctx.overlay.effective(task)));
    }

    match ctx.sync.update_status(&task.id, status).await {
        Ok(0) => {
            ctx.overlay.clear(&task.id);
            Err(format!("task not found: {}", task.id).into())
        }
        Ok(_) => {
            let notice = format!("Status changed to {}", status.label());
            finish_mutation(ctx, &notice, json).await
        }
        Err(e) => {
            ctx.overlay.clear(&task.id);
            Err(e.into())
        }
    }
}

async fn cmd_status(config_path: &Path, args: StatusArgs, json: bool) -> CmdResult {
    let status = parse_status(&args.status)?;
    let mut ctx = open_tasks(config_path).await?;
    let task = fetch_task(&mut ctx, &args.id).await?;
    change_status(&mut ctx, &task, status, json).await
}

async fn cmd_next(config_path: &Path, args: NextArgs, json: bool) -> CmdResult {
    let mut ctx = open_tasks(config_path).await?;
    let task = fetch_task(&mut ctx, &args.id).await?;
    let status = task.status.next();
    change_status(&mut ctx, &task, status, json).await
}

async fn cmd_delete(config_path: &Path, args: DeleteArgs, json: bool) -> CmdResult {
    let mut ctx = open_tasks(config_path).await?;
    let id = TaskId::from(args.id.as_str());
    let affected = ctx.sync.delete_task(&id).await?;
    if affected == 0 {
        return Err(format!("task not found: {}", id).into());
    }
    ctx.overlay.clear(&id);
    finish_mutation(&mut ctx, "Task deleted successfully!", json).await
}

async fn cmd_expand(config_path: &Path, args: ExpandArgs, json: bool) -> CmdResult {
    let input = args.text.join(" ");
    if input.trim().is_empty() {
        return Err(expand::ExpandError::EmptyInput.into());
    }
    let mut ctx = open_tasks(config_path).await?;
    let generator = ProxyClient::new(&ctx.config.generator.proxy_url);

    match expand::expand_task(&mut ctx.sync, &generator, &input).await? {
        ExpandOutcome::NothingToDo => {
            if json {
                println!("{}", serde_json::to_string_pretty(&nothing_to_do_json())?);
            } else {
                println!("{}", expand::NOTHING_TO_DO_MESSAGE);
            }
        }
        ExpandOutcome::Expanded(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report_to_json(&report))?);
                return Ok(());
            }
            if report.created() > 0 {
                println!("{}", expand::EXPANDED_MESSAGE);
            }
            for line in format_expansion(&report) {
                println!("{}", line);
            }
            if report.refetch.is_ok() {
                println!();
                for line in format_listing(ctx.sync.tasks(), None, &ctx.overlay) {
                    println!("{}", line);
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

async fn cmd_serve(config_path: &Path, args: ServeArgs) -> CmdResult {
    let mut config = config_io::effective_config(config_path)?.server;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    let api_key = std::env::var(server::API_KEY_VAR).ok();
    eprintln!("relay listening on http://{} (Ctrl+C to stop)", config.bind);
    server::serve(&config, api_key).await?;
    Ok(())
}
