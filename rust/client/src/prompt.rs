use zeroize::Zeroizing;

use crate::error::ClientError;
use crate::vault::{password_len, MIN_PASSWORD_LEN};

/// Source of operator passwords. The terminal in the CLI, a fixed value in
/// tests and unattended services.
pub trait PasswordPrompt: Send + Sync {
    fn read_password(&self, message: &str) -> Result<Zeroizing<String>, ClientError>;
}

/// Hidden-input terminal prompt. Keeps asking until the answer is long enough.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl PasswordPrompt for TerminalPrompt {
    fn read_password(&self, message: &str) -> Result<Zeroizing<String>, ClientError> {
        loop {
            let answer = Zeroizing::new(rpassword::prompt_password(message)?);
            if password_len(&answer) >= MIN_PASSWORD_LEN {
                return Ok(answer);
            }
            eprintln!("password must be at least {MIN_PASSWORD_LEN} characters");
        }
    }
}

/// Always answers with the same password.
pub struct StaticPassword(Zeroizing<String>);

impl StaticPassword {
    pub fn new(password: impl Into<String>) -> Self {
        Self(Zeroizing::new(password.into()))
    }
}

impl PasswordPrompt for StaticPassword {
    fn read_password(&self, _message: &str) -> Result<Zeroizing<String>, ClientError> {
        Ok(self.0.clone())
    }
}

/// Asks for a new password twice; both answers must match.
pub fn prompt_new_password(prompt: &dyn PasswordPrompt) -> Result<Zeroizing<String>, ClientError> {
    let first = prompt.read_password("New key file password: ")?;
    let second = prompt.read_password("Confirm password: ")?;
    if *first != *second {
        return Err(ClientError::InvalidInput("passwords do not match".to_string()));
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Scripted(Mutex<Vec<&'static str>>);

    impl PasswordPrompt for Scripted {
        fn read_password(&self, _message: &str) -> Result<Zeroizing<String>, ClientError> {
            let mut answers = self.0.lock().expect("lock");
            Ok(Zeroizing::new(answers.remove(0).to_string()))
        }
    }

    #[test]
    fn new_password_requires_matching_confirmation() {
        let prompt = Scripted(Mutex::new(vec!["longenough", "longenough"]));
        assert_eq!(prompt_new_password(&prompt).unwrap().as_str(), "longenough");

        let prompt = Scripted(Mutex::new(vec!["longenough", "different!"]));
        let err = prompt_new_password(&prompt).unwrap_err();
        assert!(
            matches!(err, ClientError::InvalidInput(ref msg) if msg == "passwords do not match")
        );
    }

    #[test]
    fn static_password_repeats() {
        let prompt = StaticPassword::new("same-every-time");
        assert_eq!(prompt.read_password("a").unwrap().as_str(), "same-every-time");
        assert_eq!(prompt.read_password("b").unwrap().as_str(), "same-every-time");
    }
}
