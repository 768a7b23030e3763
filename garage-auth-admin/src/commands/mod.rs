pub mod maintenance;
pub mod password;
pub mod session;
pub mod user;

pub use maintenance::*;
pub use password::*;
pub use session::*;
pub use user::*;

use anyhow::{anyhow, Result};

/// Use the given password or prompt for one without echo
pub fn read_password(prompt: &str, provided: Option<String>) -> Result<String> {
    let password = match provided {
        Some(p) => p,
        None => rpassword::prompt_password(prompt)?,
    };
    if password.is_empty() {
        return Err(anyhow!("Password cannot be empty"));
    }
    Ok(password)
}
