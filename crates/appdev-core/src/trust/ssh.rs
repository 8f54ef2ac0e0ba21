//! SSH remote shell built on libssh2.
//!
//! Password authentication only; agent and key files are never consulted.
//! When a SOCKS proxy is configured the TCP stream is tunnelled through it.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use ssh2::{ErrorCode, Session};
use tracing::debug;

use crate::config::Settings;
use crate::error::{Error, Result};

use super::connection::{self, ConnectionConfig, SocksVersion};
use super::shell::{CommandOutput, ConnectError, Progress, RemoteShell, RemoteShellConnector};

pub const SSH_PORT: u16 = 22;

/// libssh2's LIBSSH2_ERROR_AUTHENTICATION_FAILED.
const AUTHENTICATION_FAILED: i32 = -18;

const DOWNLOAD_CHUNK: usize = 32 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct Ssh2Connector;

impl RemoteShellConnector for Ssh2Connector {
    fn connect(
        &self,
        host: &str,
        config: &ConnectionConfig,
        password: &str,
        settings: &Settings,
    ) -> std::result::Result<Box<dyn RemoteShell>, ConnectError> {
        let connection_error = |e: &dyn std::fmt::Display| {
            ConnectError::Connection(format!("Unable to connect to host {host}: {e}"))
        };

        let stream = open_stream(host, config, settings.socket_timeout)
            .map_err(|e| connection_error(&e))?;

        let mut session = Session::new().map_err(|e| connection_error(&e))?;
        session.set_timeout(millis(settings.ssh_client_timeout));
        session.set_tcp_stream(stream);
        session.handshake().map_err(|e| connection_error(&e))?;

        let user = config.server_user_id.as_deref().unwrap_or("root");
        if let Err(e) = session.userauth_password(user, password) {
            if e.code() == ErrorCode::Session(AUTHENTICATION_FAILED) {
                return Err(ConnectError::AuthenticationFailed);
            }
            return Err(connection_error(&e));
        }
        if !session.authenticated() {
            return Err(ConnectError::AuthenticationFailed);
        }

        debug!(host, user, "ssh session established");
        Ok(Box::new(Ssh2Shell {
            host: host.to_string(),
            session: Some(session),
        }))
    }
}

fn open_stream(
    host: &str,
    config: &ConnectionConfig,
    timeout: Duration,
) -> std::io::Result<TcpStream> {
    let stream = match connection::socks_proxy(config) {
        Some((SocksVersion::V5, proxy_host, proxy_port)) => {
            socks::Socks5Stream::connect((proxy_host, proxy_port), (host, SSH_PORT))?.into_inner()
        }
        Some((SocksVersion::V4, proxy_host, proxy_port)) => {
            socks::Socks4Stream::connect((proxy_host, proxy_port), (host, SSH_PORT), "")?
                .into_inner()
        }
        None => connect_with_timeout(host, timeout)?,
    };
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    Ok(stream)
}

fn connect_with_timeout(host: &str, timeout: Duration) -> std::io::Result<TcpStream> {
    let mut last_error = None;
    for addr in (host, SSH_PORT).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no address found for {host}"),
        )
    }))
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

struct Ssh2Shell {
    host: String,
    session: Option<Session>,
}

impl Ssh2Shell {
    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| Error::ServerConnection(format!("Session to {} is closed", self.host)))
    }
}

impl RemoteShell for Ssh2Shell {
    fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        let request_error = |e: &dyn std::fmt::Display| Error::ServerRequest(e.to_string());

        let session = self.session()?;
        let mut channel = session.channel_session().map_err(|e| request_error(&e))?;
        channel.exec(command).map_err(|e| request_error(&e))?;

        let mut stdout = String::new();
        channel
            .read_to_string(&mut stdout)
            .map_err(|e| request_error(&e))?;
        let mut stderr = String::new();
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .map_err(|e| request_error(&e))?;

        channel.wait_close().map_err(|e| request_error(&e))?;
        let exit_status = channel.exit_status().map_err(|e| request_error(&e))?;

        Ok(CommandOutput {
            exit_status,
            stdout,
            stderr,
        })
    }

    fn download(&mut self, remote: &Path, local: &Path, progress: Progress<'_>) -> Result<u64> {
        let host = self.host.clone();
        let transfer_error = |e: &dyn std::fmt::Display| {
            Error::ServerConnection(format!(
                "Unable to retrieve CA certificate bundle from host {host}: {e}"
            ))
        };

        let sftp = self.session()?.sftp().map_err(|e| transfer_error(&e))?;
        let total = sftp.stat(remote).ok().and_then(|stat| stat.size);
        let mut source = sftp.open(remote).map_err(|e| transfer_error(&e))?;
        let mut target = std::fs::File::create(local).map_err(|e| transfer_error(&e))?;

        let mut buffer = vec![0u8; DOWNLOAD_CHUNK];
        let mut transferred = 0u64;
        progress(0, total);
        loop {
            let read = source.read(&mut buffer).map_err(|e| transfer_error(&e))?;
            if read == 0 {
                break;
            }
            target
                .write_all(&buffer[..read])
                .map_err(|e| transfer_error(&e))?;
            transferred += read as u64;
            progress(transferred, total);
        }
        target.flush().map_err(|e| transfer_error(&e))?;
        Ok(transferred)
    }

    fn close(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.disconnect(None, "closing", None) {
                debug!(host = %self.host, error = %e, "ssh disconnect failed");
            }
        }
    }
}

impl Drop for Ssh2Shell {
    fn drop(&mut self) {
        self.close();
    }
}
