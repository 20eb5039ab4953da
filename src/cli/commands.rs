use reqwest::Method;
use serde_json::Value;

use super::output;
use crate::error::{AppError, AppResult};
use crate::identity::{RegisterRequest, Role, SessionController, SessionState};
use crate::services::{CourseQuery, CourseService};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login { email: String, password: String },
    Register(RegisterRequest),
    Logout,
    Whoami,
    Request { method: Method, path: String, body: Option<Value> },
    Courses { search: Option<String> },
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub const COMMAND_HELP: &str = "Commands:\n  login <email> <password>                          sign in and load the profile\n  register <email> <password> <first> <last> [role] create an account (role: learner|instructor)\n  logout                                            sign out (always clears local credentials)\n  whoami                                            resolve the current user from stored tokens\n  get|delete <path>                                 authenticated request, e.g. get courses/42\n  post|put <path> <json>                            authenticated request with a JSON body\n  courses [search text]                             list or search the catalogue\n  status                                            show session state and token storage\n  help                                              show this help\n  quit | exit                                       leave the interpreter";

/// Parse one command line.
pub fn parse(line: &str) -> AppResult<Command> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((h, r)) => (h, r.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();
    match head.to_ascii_lowercase().as_str() {
        "login" => match args.as_slice() {
            [email, password] => Ok(Command::Login { email: email.to_string(), password: password.to_string() }),
            _ => Err(usage("login <email> <password>")),
        },
        "register" => match args.as_slice() {
            [email, password, first, last, role @ ..] if role.len() <= 1 => {
                let role = match role.first() { Some(r) => r.parse::<Role>()?, None => Role::Learner };
                Ok(Command::Register(RegisterRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                    first_name: first.to_string(),
                    last_name: last.to_string(),
                    role,
                }))
            }
            _ => Err(usage("register <email> <password> <first> <last> [role]")),
        },
        "logout" => Ok(Command::Logout),
        "whoami" | "me" => Ok(Command::Whoami),
        "get" | "delete" | "post" | "put" => {
            let method = match head.to_ascii_lowercase().as_str() {
                "get" => Method::GET,
                "delete" => Method::DELETE,
                "post" => Method::POST,
                _ => Method::PUT,
            };
            let (path, body_text) = match rest.split_once(char::is_whitespace) {
                Some((p, b)) => (p, b.trim()),
                None => (rest, ""),
            };
            if path.is_empty() {
                return Err(usage("get|post|put|delete <path> [json]"));
            }
            let body = if body_text.is_empty() {
                None
            } else {
                Some(serde_json::from_str::<Value>(body_text).map_err(|e| AppError::user("invalid_json".to_string(), format!("request body is not JSON: {}", e)))?)
            };
            Ok(Command::Request { method, path: path.to_string(), body })
        }
        "courses" => Ok(Command::Courses { search: if rest.is_empty() { None } else { Some(rest.to_string()) } }),
        "status" => Ok(Command::Status),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        "" => Err(usage("help")),
        other => Err(AppError::user("unknown_command".to_string(), format!("unknown command '{}' (try help)", other))),
    }
}

fn usage(text: &str) -> AppError { AppError::user("usage".to_string(), format!("usage: {}", text)) }

/// Run a parsed command against the session, printing its result.
pub async fn execute(ctl: &SessionController, cmd: Command) -> AppResult<Flow> {
    match cmd {
        Command::Login { email, password } => {
            let p = ctl.login(&email, &password).await?;
            output::print_profile(&p);
        }
        Command::Register(fields) => {
            let p = ctl.register(&fields).await?;
            output::print_profile(&p);
        }
        Command::Logout => {
            ctl.logout().await;
            println!("signed out");
        }
        Command::Whoami => match ctl.resolve_current_user().await? {
            Some(p) => output::print_profile(&p),
            None => println!("not signed in"),
        },
        Command::Request { method, path, body } => {
            let resp = ctl.api().request(method, &path, body.as_ref(), None).await?;
            match resp.value() {
                Ok(v) => output::print_value(&v),
                Err(_) => println!("{}", resp.body),
            }
        }
        Command::Courses { search } => {
            let query = CourseQuery { search, ..Default::default() };
            let courses = CourseService::new(ctl.api().clone()).list(&query).await?;
            output::print_value(&serde_json::to_value(&courses)?);
        }
        Command::Status => {
            let state = match ctl.state() {
                SessionState::Anonymous => "anonymous".to_string(),
                SessionState::Authenticating => "authenticating".to_string(),
                SessionState::Authenticated(p) => format!("authenticated as {} ({})", p.email, p.role),
            };
            println!("api: {}", ctl.api().config().base_url);
            println!("tokens: {}", ctl.session().tokens().describe());
            println!("session: {}", state);
        }
        Command::Help => println!("{}", COMMAND_HELP),
        Command::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}
