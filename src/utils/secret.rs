//! Reading the user-supplied secret.
//!
//! The secret is an opaque byte string. It is never stored; the app loader
//! only forwards its digest to the firmware.

use std::fs;
use std::io::{self, Read};

use dialoguer::{theme::ColorfulTheme, Password};

/// Prompt for a phrase on the terminal, without echo and with confirmation.
pub fn input_secret() -> io::Result<Vec<u8>> {
    let phrase = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Enter phrase for the user supplied secret")
        .with_confirmation("Repeat the phrase", "The phrases don't match")
        .interact()?;
    Ok(phrase.into_bytes())
}

/// Read the whole content of `path` as the secret, unmodified (trailing
/// newlines are kept). `-` reads standard input.
pub fn read_secret_file(path: &str) -> io::Result<Vec<u8>> {
    if path == "-" {
        let mut secret = Vec::new();
        io::stdin().read_to_end(&mut secret)?;
        return Ok(secret);
    }
    fs::read(path)
}

// =============================================================================
// Unit Tests
// =============================================================================
