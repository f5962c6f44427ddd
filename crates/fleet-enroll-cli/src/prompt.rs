use colored::*;
use fleet_enroll_core::Error;
use std::io::{self, Write};

/// Ask until `parse` accepts the answer. `initial` (from the command line)
/// is tried first. Recoverable errors re-prompt; anything else is returned.
pub fn prompt_until<T, F>(label: &str, initial: Option<&str>, parse: F) -> Result<T, Error>
where
    F: Fn(&str) -> Result<T, Error>,
{
    let mut pending = initial.map(str::to_string);

    loop {
        let raw = match pending.take() {
            Some(value) => value,
            None => read_answer(label)?,
        };

        match parse(&raw) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_recoverable() => {
                eprintln!("  {} {}", "✗".red(), err);
            }
            Err(err) => return Err(err),
        }
    }
}

fn read_answer(label: &str) -> Result<String, Error> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Err(Error::Environment("standard input closed".to_string()));
    }
    Ok(input.trim().to_string())
}

pub fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
