//! Certificate bundle acquisition.
//!
//! Possible scenarios on [`TrustBootstrap::ensure`]:
//! - Bundle is valid: nothing to be done.
//! - Bundle does not exist (first use): download a new one.
//! - Bundle cannot be loaded: drop all trust state for the host, then download.
//!
//! Downloading needs the operator: they confirm the download, describe how to
//! reach the server, and type the SSH password.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::operator::Operator;

use super::connection::{ConnectionConfig, SocksVersion};
use super::shell::{ConnectError, RemoteShell, RemoteShellConnector};
use super::store::{BundleStatus, TrustRecord, TrustStore};

pub const REMOTE_BUNDLE_PATH: &str = "/etc/pki/tls/certs/ca-bundle.crt";
pub const HOSTNAME_COMMAND: &str = "/opt/qradar/bin/myver -vh";
pub const DEFAULT_SERVER_USER: &str = "root";

const MSG_CERT_DOWNLOAD: &str = "No certificate bundle found for host {host}\n\
     You can use the appdev server command to download the certificate bundle";
const MSG_CERT_REFRESH: &str = "Invalid certificate bundle found for host {host}\n\
     You can use the appdev server command to refresh the certificate bundle";

/// How HTTPS requests to a host are verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Certificate checks are switched off globally.
    Disabled,
    /// Verify against the bundle at this path.
    Bundle(PathBuf),
}

/// Raise an advisory error when `host` has no usable bundle. Never prompts.
pub fn check_bootstrapped(store: &TrustStore, host: &str) -> Result<()> {
    match TrustStore::validate(&store.bundle_path(host)) {
        BundleStatus::Valid => Ok(()),
        BundleStatus::NotFound => Err(Error::Cert(MSG_CERT_DOWNLOAD.replace("{host}", host))),
        BundleStatus::Invalid(_) => Err(Error::Cert(MSG_CERT_REFRESH.replace("{host}", host))),
    }
}

pub struct TrustBootstrap<'a> {
    store: &'a TrustStore,
    operator: &'a dyn Operator,
    connector: &'a dyn RemoteShellConnector,
    settings: &'a Settings,
}

impl<'a> TrustBootstrap<'a> {
    pub fn new(
        store: &'a TrustStore,
        operator: &'a dyn Operator,
        connector: &'a dyn RemoteShellConnector,
        settings: &'a Settings,
    ) -> Self {
        Self {
            store,
            operator,
            connector,
            settings,
        }
    }

    /// Return a usable verification mode for `host`, downloading a bundle if needed.
    pub fn ensure(&self, host: &str) -> Result<Verification> {
        if self.settings.disable_security {
            return Ok(Verification::Disabled);
        }

        let bundle_path = self.store.bundle_path(host);
        let removed = match TrustStore::validate(&bundle_path) {
            BundleStatus::Valid => return Ok(Verification::Bundle(bundle_path)),
            BundleStatus::NotFound => false,
            BundleStatus::Invalid(reason) => {
                warn!(host, %reason, "invalid certificate bundle");
                self.operator.say(&format!(
                    "Removing invalid certificate bundle {}",
                    bundle_path.display()
                ));
                self.store.remove(host);
                true
            }
        };

        self.print_header(host, removed);
        self.acquire(host)?;
        Ok(Verification::Bundle(bundle_path))
    }

    fn print_header(&self, host: &str, removed: bool) {
        if !removed {
            let banner = "!".repeat(60);
            self.operator.say(&banner);
            self.operator
                .say(&format!("No CA certificate bundle found for {host}"));
            self.operator.say(&banner);
        }
        self.operator.say(
            "To enable verification of server certificates, \
             the CA certificate bundle must be downloaded from the server",
        );
    }

    fn acquire(&self, host: &str) -> Result<()> {
        let mut connection = self.prompt_connection()?;
        connection.server_hostname = self.download(host, &connection)?;

        self.store.save(
            &TrustRecord {
                bundle: None,
                connection,
            },
            host,
        )?;
        self.operator.say(&format!(
            "Server configuration for {host} saved to {}",
            self.store.config_path(host).display()
        ));
        Ok(())
    }

    fn prompt_connection(&self) -> Result<ConnectionConfig> {
        let proceed = self.operator.confirm(
            "Do you wish to proceed with the CA certificate bundle download?",
            true,
        )?;
        if !proceed {
            return Err(Error::Declined(
                "Certificate bundle download was rejected".to_string(),
            ));
        }

        let mut config = ConnectionConfig::default();
        self.operator
            .say("Please answer the following questions detailing how to connect to the server");

        if self
            .operator
            .confirm("Do you use a SOCKS proxy to connect to the server?", false)?
        {
            let version =
                self.operator
                    .prompt_choice("Enter SOCKS protocol version", &["4", "5"], 1)?;
            config.socks_proxy_protocol_version = Some(if version == 0 {
                SocksVersion::V4
            } else {
                SocksVersion::V5
            });
            config.socks_proxy_host = Some(
                self.operator
                    .prompt_text("Enter SOCKS proxy server", Some("localhost"))?,
            );
            config.socks_proxy_port = Some(self.prompt_port()?);
        }

        let user = self.operator.prompt_text(
            "Enter user ID for connecting to the server",
            Some(DEFAULT_SERVER_USER),
        )?;
        let user = user.trim();
        config.server_user_id = Some(if user.is_empty() {
            DEFAULT_SERVER_USER.to_string()
        } else {
            user.to_string()
        });

        Ok(config)
    }

    fn prompt_port(&self) -> Result<u16> {
        loop {
            let answer = self
                .operator
                .prompt_text("Enter SOCKS proxy port", Some("1080"))?;
            match answer.trim().parse::<u16>() {
                Ok(port) if port >= 1 => return Ok(port),
                _ => self
                    .operator
                    .say(&format!("{} is not in the range 1 to 65535", answer.trim())),
            }
        }
    }

    /// Fetch hostname and bundle over one session. Returns the resolved hostname.
    fn download(&self, host: &str, connection: &ConnectionConfig) -> Result<Option<String>> {
        let mut session = ShellGuard(self.connect(host, connection)?);

        let hostname = self.resolve_hostname(host, session.shell());

        let bundle_path = self.store.bundle_path(host);
        if let Some(dir) = bundle_path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::io(format!("Unable to create {}", dir.display()), e))?;
        }

        self.operator
            .say("Initialising transfer of CA certificate bundle from server, please wait...");
        let partial = bundle_path.with_extension("crt.part");
        let result = transfer(session.shell(), &partial);
        if result.is_err() {
            let _ = std::fs::remove_file(&partial);
        }
        let bytes = result?;
        std::fs::rename(&partial, &bundle_path)
            .map_err(|e| Error::io(format!("Unable to write {}", bundle_path.display()), e))?;

        debug!(host, bytes, "bundle transferred");
        self.operator.say("Transfer complete");
        self.operator.say(&format!(
            "CA certificate bundle for {host} saved to {}",
            bundle_path.display()
        ));
        Ok(hostname)
    }

    fn connect(&self, host: &str, connection: &ConnectionConfig) -> Result<Box<dyn RemoteShell>> {
        let user = connection
            .server_user_id
            .as_deref()
            .unwrap_or(DEFAULT_SERVER_USER);
        loop {
            let password = self
                .operator
                .prompt_secret(&format!("Enter {host} password for user {user}"))?;
            match self
                .connector
                .connect(host, connection, &password, self.settings)
            {
                Ok(shell) => return Ok(shell),
                Err(ConnectError::AuthenticationFailed) => self.operator.say(
                    "Authentication failed. Please check user ID and password and try again",
                ),
                Err(ConnectError::Connection(message)) => {
                    return Err(Error::ServerConnection(message));
                }
            }
        }
    }

    fn resolve_hostname(&self, host: &str, shell: &mut dyn RemoteShell) -> Option<String> {
        let reason = match shell.exec(HOSTNAME_COMMAND) {
            Ok(output) if output.exit_status == 0 => {
                let hostname = output.stdout.trim();
                if !hostname.is_empty() {
                    return Some(hostname.to_string());
                }
                "empty hostname".to_string()
            }
            Ok(output) => output.stderr.trim().to_string(),
            Err(e) => e.to_string(),
        };
        warn!(host, %reason, "hostname lookup failed");
        self.operator.say(&format!(
            "WARNING: Unable to retrieve hostname for {host}. \
             Subsequent certificate validation may fail. Reason: {reason}"
        ));
        None
    }
}

fn transfer(shell: &mut dyn RemoteShell, destination: &Path) -> Result<u64> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{bytes}/{total_bytes} [{bar:40}] {bytes_per_sec}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    let mut report = |done: u64, total: Option<u64>| {
        if let Some(total) = total {
            bar.set_length(total);
        }
        bar.set_position(done);
    };
    let result = shell.download(Path::new(REMOTE_BUNDLE_PATH), destination, &mut report);
    bar.finish_and_clear();
    result
}

/// Closes the session however acquisition ends.
struct ShellGuard(Box<dyn RemoteShell>);

impl ShellGuard {
    fn shell(&mut self) -> &mut dyn RemoteShell {
        self.0.as_mut()
    }
}

impl Drop for ShellGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}
