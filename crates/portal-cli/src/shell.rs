//! Line-oriented command loop over the session context.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, warn};

use portal_core::auth::demo_accounts;
use portal_core::utils::truncate_string;
use portal_core::{Config, Identity, IdentityUpdate, SessionContext};

/// Environment variables that prefill the login prompt
const EMAIL_ENV: &str = "PORTAL_EMAIL";
const PASSWORD_ENV: &str = "PORTAL_PASSWORD";

/// Column widths for the directory listing
const NAME_WIDTH: usize = 22;
const EMAIL_WIDTH: usize = 28;

const HELP: &str = "\
Commands:
  login [email]     Sign in (prompts for anything missing)
  register          Create an account and sign in
  logout            Sign out
  whoami            Show the signed-in identity
  status            Show session state
  refresh           Extend the current session
  rename <name>     Change your display name
  users [query]     Search the directory by name or email
  reset             Drop registered accounts (development only)
  help              Show this help
  quit              Exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login(Option<String>),
    Register,
    Logout,
    WhoAmI,
    Status,
    Refresh,
    Rename(String),
    Users(String),
    Reset,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_lowercase().as_str() {
            "" => Command::Empty,
            "login" | "signin" => {
                Command::Login((!rest.is_empty()).then(|| rest.to_string()))
            }
            "register" | "signup" => Command::Register,
            "logout" | "signout" => Command::Logout,
            "whoami" | "me" => Command::WhoAmI,
            "status" => Command::Status,
            "refresh" => Command::Refresh,
            "rename" if !rest.is_empty() => Command::Rename(rest.to_string()),
            "users" | "directory" => Command::Users(rest.to_string()),
            "reset" => Command::Reset,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => Command::Unknown(line.to_string()),
        }
    }
}

/// One directory row: id, name, email, role
pub fn format_identity(identity: &Identity) -> String {
    let admin = if identity.is_admin { " *" } else { "" };
    format!(
        "{:>7}  {:<name_w$} {:<email_w$} {}{}  (since {})",
        identity.id,
        truncate_string(identity.display_name(), NAME_WIDTH),
        truncate_string(&identity.email, EMAIL_WIDTH),
        identity.role,
        admin,
        identity.created_at.format("%b %d, %Y"),
        name_w = NAME_WIDTH,
        email_w = EMAIL_WIDTH,
    )
}

/// Tracks sign-in transitions and reports the ones the shell did not start.
#[derive(Debug)]
pub struct SessionEndWatch {
    was_authenticated: bool,
    logout_requested: Arc<AtomicBool>,
}

impl SessionEndWatch {
    pub fn new(was_authenticated: bool, logout_requested: Arc<AtomicBool>) -> Self {
        Self {
            was_authenticated,
            logout_requested,
        }
    }

    /// Feed the latest state; true when a session ended without a logout command
    pub fn observe(&mut self, is_authenticated: bool) -> bool {
        let ended = self.was_authenticated && !is_authenticated;
        self.was_authenticated = is_authenticated;
        if !ended {
            return false;
        }
        !self.logout_requested.swap(false, Ordering::SeqCst)
    }
}

pub struct Shell {
    context: SessionContext,
    config: Config,
    input: Lines<BufReader<Stdin>>,
    logout_requested: Arc<AtomicBool>,
}

impl Shell {
    pub fn new(context: SessionContext, config: Config) -> Self {
        Self {
            context,
            config,
            input: BufReader::new(tokio::io::stdin()).lines(),
            logout_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        println!("Intranet portal shell. Type 'help' for commands.");
        if !self.context.is_authenticated() {
            println!("Demo accounts:");
            for account in demo_accounts() {
                println!("  {:<24} {}", account.email, account.password);
            }
        }
        self.watch_session_end();

        loop {
            let prompt = match self.context.identity() {
                Some(identity) => format!("{}> ", identity.email),
                None => "portal> ".to_string(),
            };
            let Some(line) = self.prompt(&prompt).await? else {
                break;
            };

            let command = Command::parse(&line);
            debug!(?command, "Command received");
            if command == Command::Quit {
                break;
            }
            self.execute(command).await?;
        }
        Ok(())
    }

    /// Announce sign-outs the user did not ask for (token expiry)
    fn watch_session_end(&self) {
        let mut rx = self.context.subscribe();
        let mut watch = SessionEndWatch::new(
            rx.borrow_and_update().is_authenticated,
            self.logout_requested.clone(),
        );
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let is_authenticated = rx.borrow_and_update().is_authenticated;
                if watch.observe(is_authenticated) {
                    println!("\n[session ended]");
                }
            }
        });
    }

    async fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Login(email) => self.login(email).await?,
            Command::Register => self.register().await?,
            Command::Logout => {
                if self.context.is_authenticated() {
                    self.logout_requested.store(true, Ordering::SeqCst);
                }
                self.context.logout();
                println!("Signed out.");
            }
            Command::WhoAmI => match self.context.identity() {
                Some(identity) => println!("{}", format_identity(&identity)),
                None => println!("Not signed in."),
            },
            Command::Status => {
                let state = self.context.state();
                println!("authenticated: {}", state.is_authenticated);
                println!("loading:       {}", state.is_loading);
                if let Some(identity) = state.identity {
                    println!("identity:      {} <{}>", identity.display_name(), identity.email);
                }
                if let Some(session) = self.context.session() {
                    let hint = if session.needs_refresh() { " (refresh soon)" } else { "" };
                    println!(
                        "expires in:    {} min{}",
                        session.minutes_until_expiry(),
                        hint
                    );
                }
                if let Some(error) = state.error {
                    println!("last error:    {}", error);
                }
            }
            Command::Refresh => {
                if self.context.refresh() {
                    println!("Session extended.");
                } else {
                    println!("No active session.");
                }
            }
            Command::Rename(name) => match self.context.update_identity(IdentityUpdate::name(name)) {
                Some(identity) => println!("Now known as {}.", identity.name),
                None => println!("Sign in first."),
            },
            Command::Users(query) => {
                let matches = self.context.directory(&query);
                if matches.is_empty() {
                    println!("No matches.");
                }
                for identity in matches {
                    println!("{}", format_identity(&identity));
                }
            }
            Command::Reset => {
                self.context.reset_directory();
                println!("Directory reset to demo accounts.");
            }
            Command::Help => println!("{}", HELP),
            Command::Empty | Command::Quit => {}
            Command::Unknown(line) => println!("Unknown command: {} (try 'help')", line),
        }
        Ok(())
    }

    async fn login(&mut self, email: Option<String>) -> Result<()> {
        let default_email = std::env::var(EMAIL_ENV)
            .ok()
            .or_else(|| self.config.last_email.clone());

        let email = match email {
            Some(email) => email,
            None => {
                let label = match default_email {
                    Some(ref d) => format!("Email [{}]: ", d),
                    None => "Email: ".to_string(),
                };
                let entered = self.prompt(&label).await?.unwrap_or_default();
                if entered.trim().is_empty() {
                    default_email.unwrap_or_default()
                } else {
                    entered.trim().to_string()
                }
            }
        };

        let password = match std::env::var(PASSWORD_ENV) {
            Ok(password) => password,
            Err(_) => read_password().await?,
        };

        println!("Signing in...");
        match self.context.login(&email, &password).await {
            Some(identity) => {
                println!("Welcome, {}.", identity.display_name());
                self.remember_email(&identity.email);
            }
            None => self.print_error(),
        }
        Ok(())
    }

    async fn register(&mut self) -> Result<()> {
        let name = self.prompt("Name: ").await?.unwrap_or_default();
        let email = self.prompt("Email: ").await?.unwrap_or_default();
        let password = read_password().await?;

        println!("Creating account...");
        match self.context.register(&name, email.trim(), &password).await {
            Some(identity) => {
                println!("Account created. Welcome, {}.", identity.display_name());
                self.remember_email(&identity.email);
            }
            None => self.print_error(),
        }
        Ok(())
    }

    fn print_error(&self) {
        let message = self
            .context
            .error()
            .unwrap_or_else(|| "Request failed. Please try again.".to_string());
        println!("Error: {}", message);
    }

    fn remember_email(&mut self, email: &str) {
        self.config.last_email = Some(email.to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }

    /// Print a prompt and read one line; `None` on end of input
    async fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        print!("{}", label);
        std::io::stdout().flush()?;
        self.input.next_line().await.context("Failed to read input")
    }
}

async fn read_password() -> Result<String> {
    let password = tokio::task::spawn_blocking(|| rpassword::prompt_password("Password: "))
        .await?
        .context("Failed to read password")?;
    Ok(password)
}
