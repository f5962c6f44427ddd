use crate::error::Error;
use crate::model::ResolvedDevice;
use std::process::Command;
use tracing::debug;

/// Opens an interactive management session to a device. Best effort:
/// errors are reported to the caller but never change the device result.
pub trait SessionLauncher: Send + Sync {
    fn open(&self, device: &ResolvedDevice) -> Result<(), Error>;
}

/// Runs a configured command, substituting `{host}` and `{fqdn}`, and waits
/// for it to exit.
pub struct CommandSession {
    template: Vec<String>,
}

impl CommandSession {
    pub fn new(template: Vec<String>) -> Self {
        Self { template }
    }

    pub fn render(&self, device: &ResolvedDevice) -> Vec<String> {
        self.template
            .iter()
            .map(|part| {
                part.replace("{host}", &device.short_name)
                    .replace("{fqdn}", &device.fqdn)
            })
            .collect()
    }
}

impl SessionLauncher for CommandSession {
    fn open(&self, device: &ResolvedDevice) -> Result<(), Error> {
        let argv = self.render(device);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::InvalidInput("session_command is empty".to_string()))?;

        debug!("Opening session to {}: {:?}", device.short_name, argv);
        let status = Command::new(program).args(args).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::ChannelUnhealthy(format!(
                "session to {} exited with {}",
                device.short_name, status
            )))
        }
    }
}
