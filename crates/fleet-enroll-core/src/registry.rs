use crate::error::Error;
use crate::model::{HostRegistryEntry, RegistryOutcome};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Hosts-file backed (ip, name) registry.
///
/// Matching is case-insensitive on whole whitespace-delimited tokens, so
/// `dev1` never matches a line for `dev10`. The write lock is held across
/// the existence check and the append.
pub struct HostRegistry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl HostRegistry {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncate the whole file in one call. Irreversible.
    pub fn clear(&self) -> Result<(), Error> {
        let _guard = self.lock()?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| self.classify(e))?;
        file.sync_all().map_err(|e| self.classify(e))?;
        info!("Registry {} cleared", self.path.display());
        Ok(())
    }

    pub fn exists(&self, ip: &str, short_name: &str) -> Result<bool, Error> {
        let content = self.read()?;
        Ok(contains_entry(&content, ip, short_name))
    }

    pub fn append(&self, ip: &str, short_name: &str) -> Result<RegistryOutcome, Error> {
        validate_entry(ip, short_name)?;
        let _guard = self.lock()?;

        let content = self.read()?;
        if contains_entry(&content, ip, short_name) {
            debug!("{} {} already registered", ip, short_name);
            return Ok(RegistryOutcome::AlreadyPresent);
        }

        let mut line = String::new();
        if !content.is_empty() && !content.ends_with('\n') {
            line.push('\n');
        }
        line.push_str(&format!("{} {} \n", ip, short_name));

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.classify(e))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| self.classify(e))?;

        debug!("Registered {} {} in {}", ip, short_name, self.path.display());
        Ok(RegistryOutcome::Added)
    }

    pub fn entries(&self) -> Result<Vec<HostRegistryEntry>, Error> {
        let content = self.read()?;
        Ok(content
            .lines()
            .flat_map(|line| {
                let mut tokens = tokens(line);
                let ip = tokens.next().map(str::to_string);
                tokens.filter_map(move |name| {
                    ip.as_ref().map(|ip| HostRegistryEntry {
                        ip: ip.clone(),
                        short_name: name.to_string(),
                    })
                })
            })
            .collect())
    }

    fn read(&self) -> Result<String, Error> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(self.classify(e)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, Error> {
        self.write_lock
            .lock()
            .map_err(|e| Error::Environment(format!("registry lock poisoned: {}", e)))
    }

    fn classify(&self, err: io::Error) -> Error {
        unavailable(&self.path, err)
    }
}

/// Any I/O failure on the registry file makes the registry unavailable,
/// which ends the run.
fn unavailable(path: &Path, err: io::Error) -> Error {
    let what = match err.kind() {
        io::ErrorKind::PermissionDenied => "permission denied on",
        _ => "cannot use",
    };
    Error::Environment(format!("{} registry {}: {}", what, path.display(), err))
}

fn tokens(line: &str) -> std::str::SplitWhitespace<'_> {
    line.split('#').next().unwrap_or_default().split_whitespace()
}

fn contains_entry(content: &str, ip: &str, short_name: &str) -> bool {
    content.lines().any(|line| {
        let mut tokens = tokens(line);
        match tokens.next() {
            Some(first) if first.eq_ignore_ascii_case(ip) => {
                tokens.any(|name| name.eq_ignore_ascii_case(short_name))
            }
            _ => false,
        }
    })
}

fn validate_entry(ip: &str, short_name: &str) -> Result<(), Error> {
    if ip.parse::<IpAddr>().is_err() {
        return Err(Error::InvalidInput(format!("'{}' is not an IP address", ip)));
    }
    if short_name.is_empty()
        || short_name
            .chars()
            .any(|c| c.is_whitespace() || c == '#')
    {
        return Err(Error::InvalidInput(format!(
            "'{}' is not a valid host name",
            short_name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_token_match() {
        let content = "10.0.0.5 dev10 \n";
        assert!(!contains_entry(content, "10.0.0.5", "dev1"));
        assert!(contains_entry(content, "10.0.0.5", "dev10"));
        assert!(!contains_entry(content, "10.0.0.50", "dev10"));
        assert!(!contains_entry("10.0.0.50 dev10\n", "10.0.0.5", "dev10"));
    }

    #[test]
    fn test_match_ignores_case_comments_and_aliases() {
        let content = "# 10.0.0.7 ghost\n127.0.0.1 localhost\n10.0.0.7\tWeb01 web01.corp # note\n";
        assert!(contains_entry(content, "10.0.0.7", "web01"));
        assert!(contains_entry(content, "10.0.0.7", "WEB01.CORP"));
        assert!(!contains_entry(content, "10.0.0.7", "ghost"));
        assert!(!contains_entry(content, "10.0.0.7", "note"));
    }

    #[test]
    fn test_io_failures_are_fatal() {
        let path = Path::new("/etc/hosts");
        for kind in [io::ErrorKind::PermissionDenied, io::ErrorKind::Other] {
            let err = unavailable(path, io::Error::new(kind, "boom"));
            assert!(err.is_fatal(), "{:?}", err);
        }
        let err = unavailable(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(err.to_string().contains("permission denied on registry /etc/hosts"));
    }

    #[test]
    fn test_validate_entry() {
        assert!(validate_entry("10.0.0.1", "dev1").is_ok());
        assert!(validate_entry("fe80::1", "dev1").is_ok());
        assert!(validate_entry("not-an-ip", "dev1").is_err());
        assert!(validate_entry("10.0.0.1", "dev 1").is_err());
        assert!(validate_entry("10.0.0.1", "").is_err());
    }
}
