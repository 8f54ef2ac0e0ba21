//! Application context shared by every command.

use std::cell::OnceCell;
use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::api::RestAppClient;
use crate::config::{ConfigPaths, ResolvedServer, ServerDefaultsStore, Settings, resolve_server};
use crate::error::Result;
use crate::operator::Operator;
use crate::trust::{RemoteShellConnector, TrustBootstrap, TrustStore, with_trust_recovery};

/// Installation paths and settings, created once per invocation.
///
/// Frontends build this and hand it to commands along with an [`Operator`].
/// The password is asked for at most once per context.
#[derive(Clone)]
pub struct AppContext {
    paths: ConfigPaths,
    settings: Settings,
    password: OnceCell<String>,
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("paths", &self.paths)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    pub fn new(paths: ConfigPaths, settings: Settings) -> Self {
        Self {
            paths,
            settings,
            password: OnceCell::new(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ConfigPaths::from_env()?, Settings::from_env()))
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn trust_store(&self) -> TrustStore {
        TrustStore::new(self.paths.clone())
    }

    pub fn server_defaults(&self) -> ServerDefaultsStore {
        ServerDefaultsStore::new(self.paths.server_defaults_path())
    }

    /// Merge stored defaults with overrides, saving them when overridden.
    ///
    /// With `print_details` the resolved values and any save are reported.
    pub fn resolve_server(
        &self,
        host: Option<&str>,
        user: Option<&str>,
        operator: &dyn Operator,
        print_details: bool,
    ) -> Result<ResolvedServer> {
        let store = self.server_defaults();
        let stored = store.load();

        if print_details {
            let shown_host = host.filter(|h| !h.is_empty()).unwrap_or(&stored.ip);
            let shown_user = user.filter(|u| !u.is_empty()).unwrap_or(&stored.user);
            operator.say(&format!("Server: {shown_host}\nUser: {shown_user}"));
        }

        let resolved = resolve_server(&stored, host, user)?;
        if resolved.overridden {
            store.save(&resolved.as_defaults())?;
            debug!(path = %store.path().display(), "saved server defaults");
            if print_details {
                operator.say(&format!(
                    "Server [{}] and user [{}] are set as defaults for all commands",
                    resolved.host, resolved.user
                ));
            }
        }
        Ok(resolved)
    }

    /// Run `action` against an authenticated client for `server`.
    ///
    /// Trust material is acquired first, prompting when needed. An SSL failure
    /// drops the host's trust state and runs bootstrap plus `action` once more.
    pub fn with_client<T, F>(
        &self,
        server: &ResolvedServer,
        operator: &dyn Operator,
        connector: &dyn RemoteShellConnector,
        upload_timeout: Option<Duration>,
        mut action: F,
    ) -> Result<T>
    where
        F: FnMut(&RestAppClient) -> Result<T>,
    {
        let store = self.trust_store();

        with_trust_recovery(&store, &server.host, operator, || {
            let verification =
                TrustBootstrap::new(&store, operator, connector, &self.settings).ensure(&server.host)?;
            let connection = store.load(&server.host).connection;
            let password = match self.password.get() {
                Some(password) => password,
                None => {
                    let entered = self.read_password(&server.user, operator)?;
                    self.password.get_or_init(|| entered)
                }
            };

            let mut client = RestAppClient::connect(
                &server.host,
                &server.user,
                password,
                &verification,
                &connection,
            )?;
            if let Some(timeout) = upload_timeout {
                client.set_upload_timeout(timeout);
            }
            action(&client)
        })
    }

    fn read_password(&self, user: &str, operator: &dyn Operator) -> Result<String> {
        match &self.settings.test_password {
            Some(password) => Ok(password.clone()),
            None => operator.prompt_secret(&format!("Please enter password for user {user}")),
        }
    }
}
