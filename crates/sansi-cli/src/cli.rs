//! Command-line argument parsing.

use anyhow::{bail, Context, Result};
use sansi_core::api::Method;
use serde_json::Value;

pub const USAGE: &str = "\
Usage: sansi <command> [args]

Commands:
  login [email]                  Sign in (prompts for the password)
  logout                         Sign out and forget the session
  whoami                         Show the signed-in user and session expiry
  request <METHOD> <PATH> [JSON] Send an authenticated request, print the JSON reply
  reset-password <reset-token>   Set a new password using an emailed reset token
  help                           Show this message

Environment:
  SANSI_API_ROOT   Backend root URL (overrides config)
  SANSI_STORAGE    Session storage: file, keyring or memory
  RUST_LOG         Log filter, e.g. RUST_LOG=sansi_core=debug";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login { email: Option<String> },
    Logout,
    WhoAmI,
    Request {
        method: Method,
        path: String,
        body: Option<Value>,
    },
    ResetPassword { reset_token: String },
    Help,
}

impl Command {
    /// Parse arguments, excluding the program name.
    pub fn parse(args: &[String]) -> Result<Self> {
        let (name, rest) = match args.split_first() {
            Some((name, rest)) => (name.as_str(), rest),
            None => return Ok(Command::Help),
        };

        match name {
            "login" => {
                expect_at_most(name, rest, 1)?;
                Ok(Command::Login {
                    email: rest.first().cloned(),
                })
            }
            "logout" => {
                expect_at_most(name, rest, 0)?;
                Ok(Command::Logout)
            }
            "whoami" | "status" => {
                expect_at_most(name, rest, 0)?;
                Ok(Command::WhoAmI)
            }
            "request" => {
                expect_at_most(name, rest, 3)?;
                let (method, path) = match (rest.first(), rest.get(1)) {
                    (Some(method), Some(path)) => (method, path),
                    _ => bail!("request needs a method and a path\n\n{}", USAGE),
                };
                let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                    .with_context(|| format!("Invalid HTTP method '{}'", method))?;
                let body = rest
                    .get(2)
                    .map(|raw| serde_json::from_str(raw).context("Request body is not valid JSON"))
                    .transpose()?;
                Ok(Command::Request {
                    method,
                    path: path.clone(),
                    body,
                })
            }
            "reset-password" => {
                expect_at_most(name, rest, 1)?;
                let reset_token = rest
                    .first()
                    .cloned()
                    .with_context(|| format!("reset-password needs the reset token\n\n{}", USAGE))?;
                Ok(Command::ResetPassword { reset_token })
            }
            "help" | "--help" | "-h" => Ok(Command::Help),
            other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
        }
    }
}

fn expect_at_most(name: &str, rest: &[String], max: usize) -> Result<()> {
    if rest.len() > max {
        bail!("Too many arguments for '{}'\n\n{}", name, USAGE);
    }
    Ok(())
}
