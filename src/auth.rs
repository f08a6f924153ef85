//! Interactive login for an existing Telegram account
//!
//! The login handshake itself belongs to grammers. This module supplies the
//! values it asks for (phone, one-time code, two-factor password) and refuses
//! to create new accounts.

use std::io::{self, BufRead, Write};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use grammers_client::SignInError;
use grammers_client::Client;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Source of login credentials.
pub trait Authenticator: Send + Sync {
    fn phone(&self) -> Result<String>;

    fn code(&self) -> Result<String>;

    fn password(&self, hint: Option<&str>) -> Result<String>;

    /// Account creation is not supported.
    fn sign_up(&self) -> Result<()> {
        Err(Error::NotImplemented("sign up".to_string()))
    }

    /// Reached when Telegram wants the terms of service accepted for a new account.
    fn accept_terms_of_service(&self, _terms: Option<&str>) -> Result<()> {
        Err(Error::SignUpRequired)
    }
}

/// Reads the code from stdin and the password from a masked terminal prompt.
#[derive(Debug, Clone)]
pub struct TerminalAuth {
    phone: String,
}

impl TerminalAuth {
    pub fn new(phone: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
        }
    }
}

impl Authenticator for TerminalAuth {
    fn phone(&self) -> Result<String> {
        Ok(self.phone.clone())
    }

    fn code(&self) -> Result<String> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        prompt_line(&mut stdin.lock(), &mut stdout, "Enter code: ")
    }

    fn password(&self, hint: Option<&str>) -> Result<String> {
        let prompt = match hint {
            Some(hint) if !hint.is_empty() => format!("Enter 2FA password (hint: {}): ", hint),
            _ => "Enter 2FA password: ".to_string(),
        };
        read_masked(&prompt)
    }
}

/// Print `prompt` and read one trimmed line.
pub fn prompt_line<R: BufRead, W: Write>(reader: &mut R, writer: &mut W, prompt: &str) -> Result<String> {
    write!(writer, "{}", prompt)?;
    writer.flush()?;

    let mut line = String::new();
    let read = reader.read_line(&mut line)?;
    if read == 0 {
        return Err(Error::AuthorizationFailed(
            "input closed before a value was entered".to_string(),
        ));
    }
    Ok(line.trim().to_string())
}

/// Read a line from the terminal without echoing it.
fn read_masked(prompt: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", prompt)?;
    stdout.flush()?;

    terminal::enable_raw_mode()?;
    let result = read_masked_keys();
    terminal::disable_raw_mode()?;
    writeln!(stdout)?;

    result
}

fn read_masked_keys() -> Result<String> {
    let mut secret = String::new();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Enter => break,
            KeyCode::Backspace => {
                secret.pop();
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(Error::AuthorizationFailed("password entry cancelled".to_string()));
            }
            KeyCode::Char(c) => secret.push(c),
            _ => {}
        }
    }
    Ok(secret.trim().to_string())
}

/// Log in if the session is not authorized yet.
///
/// Returns `true` when a new login was performed.
pub async fn authorize<A>(client: &Client, api_hash: &str, auth: &A) -> Result<bool>
where
    A: Authenticator + Clone + 'static,
{
    if client.is_authorized().await? {
        return Ok(false);
    }

    let phone = auth.phone()?;
    info!(%phone, "Session is not authorized, requesting login code");

    let token = client
        .request_login_code(&phone, api_hash)
        .await
        .map_err(|e| Error::AuthorizationFailed(format!("Failed to request code: {}", e)))?;

    let code = blocking(auth, |a| a.code()).await?;

    let user = match client.sign_in(&token, &code).await {
        Ok(user) => user,
        Err(SignInError::PasswordRequired(password_token)) => {
            let hint = password_token.hint().map(str::to_string);
            let password = blocking(auth, move |a| a.password(hint.as_deref())).await?;
            client
                .check_password(password_token, password.trim())
                .await
                .map_err(|e| Error::AuthorizationFailed(format!("Password rejected: {}", e)))?
        }
        Err(SignInError::SignUpRequired { .. }) => {
            warn!(%phone, "Phone number is not registered with Telegram");
            auth.accept_terms_of_service(None)?;
            auth.sign_up()?;
            return Err(Error::SignUpRequired);
        }
        Err(e) => {
            return Err(Error::AuthorizationFailed(format!("Failed to sign in: {}", e)));
        }
    };

    info!(name = %user.full_name(), "Signed in");
    Ok(true)
}

/// Run a blocking prompt off the async runtime.
async fn blocking<A, T, F>(auth: &A, f: F) -> Result<T>
where
    A: Authenticator + Clone + 'static,
    T: Send + 'static,
    F: FnOnce(&A) -> Result<T> + Send + 'static,
{
    let auth = auth.clone();
    tokio::task::spawn_blocking(move || f(&auth))
        .await
        .map_err(|e| Error::AuthorizationFailed(format!("prompt task failed: {}", e)))?
}
