use std::io::{self, BufRead};
use std::path::Path;

use chrono::Utc;

use crate::cli::commands::{LoginArgs, PasswdArgs, PasswordSource, ResetPasswordArgs, SignupArgs};
use crate::cli::output::session_to_json;
use crate::io::auth::{AuthClient, SignUp};
use crate::io::config_io;
use crate::io::session_io;
use crate::model::session::Session;

use super::{CmdResult, load_session, require_session, session_file};

fn read_line_from_stdin() -> io::Result<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn read_password(prompt: &str, source: &PasswordSource) -> io::Result<String> {
    if source.password_stdin {
        read_line_from_stdin()
    } else {
        rpassword::prompt_password(prompt)
    }
}

fn save_and_report(config_path: &Path, session: &Session, json: bool) -> CmdResult {
    session_io::write_session(&session_file(config_path), session)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&session_to_json(session))?);
    } else {
        println!(
            "Signed in as {}",
            session.email.as_deref().unwrap_or(&session.user_id)
        );
    }
    Ok(())
}

pub async fn cmd_login(config_path: &Path, args: LoginArgs, json: bool) -> CmdResult {
    let config = config_io::effective_config(config_path)?;
    let password = read_password("Password: ", &args.password)?;
    let session = AuthClient::new(&config.store)
        .sign_in_with_password(&args.email, &password)
        .await?;
    save_and_report(config_path, &session, json)
}

pub async fn cmd_signup(config_path: &Path, args: SignupArgs, json: bool) -> CmdResult {
    let config = config_io::effective_config(config_path)?;
    let password = read_password("Choose a password: ", &args.password)?;
    let outcome = AuthClient::new(&config.store)
        .sign_up(&args.email, &password, args.username.as_deref())
        .await?;
    match outcome {
        SignUp::SignedIn(session) => save_and_report(config_path, &session, json),
        SignUp::ConfirmationSent => {
            println!("Account request processed");
            println!("  - If this is a new email, check your inbox for confirmation");
            println!("  - If you already have an account, run `tim login`");
            Ok(())
        }
    }
}

pub async fn cmd_reset_password(config_path: &Path, args: ResetPasswordArgs) -> CmdResult {
    let config = config_io::effective_config(config_path)?;
    AuthClient::new(&config.store)
        .request_password_reset(&args.email, args.redirect_to.as_deref())
        .await?;
    println!("If {} has an account, a password reset link is on its way", args.email);
    Ok(())
}

pub async fn cmd_passwd(config_path: &Path, args: PasswdArgs) -> CmdResult {
    let config = config_io::effective_config(config_path)?;
    let session = require_session(config_path, &config).await?;
    let (password, confirm) = if args.password_stdin {
        (read_line_from_stdin()?, read_line_from_stdin()?)
    } else {
        (
            rpassword::prompt_password("New password: ")?,
            rpassword::prompt_password("Confirm password: ")?,
        )
    };
    AuthClient::new(&config.store)
        .update_password(&session, &password, &confirm)
        .await?;
    println!("Your password has been reset successfully!");
    Ok(())
}

pub async fn cmd_logout(config_path: &Path) -> CmdResult {
    let config = config_io::effective_config(config_path)?;
    let path = session_file(config_path);
    // an expired token cannot be revoked remotely; forgetting it is enough
    if let Some(session) = session_io::read_session(&path).filter(|s| !s.is_expired(Utc::now())) {
        AuthClient::new(&config.store)
            .sign_out(&session)
            .await
            .map_err(|e| format!("I tried, but the logout didn't work: {}", e))?;
    }
    session_io::clear_session(&path)?;
    println!("You've logged out. I'll be napping until you return");
    Ok(())
}

pub async fn cmd_whoami(config_path: &Path, json: bool) -> CmdResult {
    let config = config_io::effective_config(config_path)?;
    match load_session(config_path, &config).await? {
        Some(session) if json => {
            println!("{}", serde_json::to_string_pretty(&session_to_json(&session))?);
        }
        Some(session) => {
            match &session.email {
                Some(email) => println!("{} ({})", email, session.user_id),
                None => println!("{}", session.user_id),
            }
        }
        None if json => println!("null"),
        None => println!("not signed in"),
    }
    Ok(())
}
