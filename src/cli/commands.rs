use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tim", about = concat!("[>] tim v", env!("CARGO_PKG_VERSION"), " - TiM the Task Cat, in your terminal"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a commented config file
    Init(InitArgs),
    /// Show or edit configuration
    Config(ConfigCmd),
    /// Sign in with e-mail and password
    Login(LoginArgs),
    /// Create an account
    Signup(SignupArgs),
    /// Send a password-reset e-mail
    ResetPassword(ResetPasswordArgs),
    /// Set a new password for the signed-in account
    Passwd(PasswdArgs),
    /// Sign out and forget the saved session
    Logout,
    /// Show the signed-in account
    Whoami,
    /// List tasks
    List(ListArgs),
    /// Show task details
    Show(ShowArgs),
    /// Add a task
    Add(AddArgs),
    /// Change a task's title and description
    Edit(EditArgs),
    /// Set a task's status
    Status(StatusArgs),
    /// Advance a task to the next status (todo → in_progress → done → todo)
    Next(NextArgs),
    /// Permanently delete a task
    Delete(DeleteArgs),
    /// Let TiM break a big task into sub-tasks
    Expand(ExpandArgs),
    /// Run the text-generation relay
    Serve(ServeArgs),
}

// ---------------------------------------------------------------------------
// Setup args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (file + environment)
    Show,
    /// Set a value, e.g. `tim config set list.sort desc`
    Set {
        key: String,
        value: String,
    },
}

// ---------------------------------------------------------------------------
// Account args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct PasswordSource {
    /// Read the password from stdin instead of prompting
    #[arg(long)]
    pub password_stdin: bool,
}

#[derive(Args)]
pub struct LoginArgs {
    pub email: String,
    #[command(flatten)]
    pub password: PasswordSource,
}

#[derive(Args)]
pub struct SignupArgs {
    pub email: String,
    /// Display name stored with the account
    #[arg(long)]
    pub username: Option<String>,
    #[command(flatten)]
    pub password: PasswordSource,
}

#[derive(Args)]
pub struct ResetPasswordArgs {
    pub email: String,
    /// Where the e-mailed link should send the browser
    #[arg(long, value_name = "URL")]
    pub redirect_to: Option<String>,
}

#[derive(Args)]
pub struct PasswdArgs {
    /// Read the new password (first line) and its confirmation (second line) from stdin
    #[arg(long)]
    pub password_stdin: bool,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    /// Only tasks with this status (todo, in_progress, done, all)
    #[arg(long, default_value = "all")]
    pub status: String,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Task ID to show
    pub id: String,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Task title
    pub title: String,
    /// Task description
    #[arg(short, long, default_value = "")]
    pub description: String,
}

#[derive(Args)]
pub struct EditArgs {
    /// Task ID to edit
    pub id: String,
    /// New title (default: keep)
    #[arg(long)]
    pub title: Option<String>,
    /// New description (default: keep)
    #[arg(short, long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Task ID
    pub id: String,
    /// New status (todo, in_progress, done)
    pub status: String,
}

#[derive(Args)]
pub struct NextArgs {
    /// Task ID
    pub id: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Task ID to delete
    pub id: String,
}

#[derive(Args)]
pub struct ExpandArgs {
    /// The high-level task, in your own words
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on (default: server.bind from config)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
}
