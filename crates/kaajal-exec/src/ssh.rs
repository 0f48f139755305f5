//! SSH transport using russh crate

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use russh::keys::known_hosts::{check_known_hosts, learn_known_hosts};
use russh::keys::ssh_key;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key};
use russh::{ChannelMsg, Disconnect, client};
use russh_sftp::client::SftpSession;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{AuthMethod, ConnectTarget, ConnectionConfig};
use crate::error::ExecError;
use crate::result::{CommandResult, ExecOptions};
use crate::traits::RemoteExecutor;

/// SSH client handler for russh
///
/// Unknown hosts are learned into `known_hosts`; a key that contradicts an
/// existing entry is refused.
#[derive(Debug)]
struct SshClientHandler {
    host: String,
    port: u16,
}

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        match check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => Ok(true),
            Ok(false) => {
                if let Err(e) = learn_known_hosts(&self.host, self.port, server_public_key) {
                    warn!(host = %self.host, error = %e, "failed to record host key");
                } else {
                    info!(host = %self.host, "added host key to known_hosts");
                }
                Ok(true)
            }
            Err(russh::keys::Error::KeyChanged { line }) => {
                error!(
                    host = %self.host,
                    line,
                    "server host key does not match known_hosts"
                );
                Ok(false)
            }
            Err(e) => {
                warn!(host = %self.host, error = %e, "could not read known_hosts");
                Ok(true)
            }
        }
    }
}

/// An authenticated session
struct Session {
    handle: client::Handle<SshClientHandler>,
    /// Opened opportunistically after authentication
    sftp: Option<SftpSession>,
    home_dir: String,
    host: String,
}

/// SSH transport to a single host
///
/// Starts disconnected; [`SshTransport::connect`] and [`SshTransport::close`]
/// toggle the state and the transport may be reconnected after closing.
/// Commands are serialized on the session lock, so only one is ever in
/// flight.
pub struct SshTransport {
    session: Mutex<Option<Session>>,
}

impl std::fmt::Debug for SshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTransport")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SshTransport {
    /// Create a disconnected transport
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
        }
    }

    /// Connect and authenticate
    ///
    /// The configuration is validated before any network activity.
    ///
    /// # Errors
    /// Returns `ExecError::AlreadyConnected` on a live session, configuration
    /// and local file errors from [`ConnectionConfig::resolve`], and
    /// connection, host key, authentication or protocol errors from the
    /// handshake. The transport stays disconnected on any error.
    #[instrument(skip(self, config), fields(connection_type = %config.connection_type()))]
    pub async fn connect(&self, config: &ConnectionConfig) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;
        ensure_vacant(&*session_lock, |s| s.host.as_str())?;

        let target = config.resolve()?;

        info!(
            host = %target.host,
            port = target.port,
            user = %target.user,
            "connecting to SSH"
        );

        let client_config = Arc::new(client::Config::default());
        let handler = SshClientHandler {
            host: target.host.clone(),
            port: target.port,
        };

        let mut handle = timeout(
            target.connect_timeout,
            client::connect(client_config, (target.host.as_str(), target.port), handler),
        )
        .await
        .map_err(|_| {
            let err = ExecError::ConnectionFailed(format!(
                "{}:{} timed out after {:?}",
                target.host, target.port, target.connect_timeout
            ));
            error!(host = %target.host, error = %err, "connect timed out");
            err
        })?
        .map_err(|e| {
            let err = map_russh_error(e);
            error!(host = %target.host, error = %err, "SSH handshake failed");
            err
        })?;

        authenticate(&mut handle, &target).await?;

        info!(host = %target.host, "SSH connected and authenticated");

        let sftp = match open_sftp(&handle).await {
            Ok(sftp) => Some(sftp),
            Err(e) => {
                warn!(host = %target.host, error = %e, "SFTP subsystem unavailable");
                None
            }
        };

        let home_dir = resolve_home(&handle, sftp.as_ref()).await;
        debug!(home = %home_dir, "resolved session home directory");

        *session_lock = Some(Session {
            handle,
            sftp,
            home_dir,
            host: target.host,
        });
        Ok(())
    }

    /// Disconnect from remote host; does nothing when not connected
    ///
    /// # Errors
    /// Returns `ExecError::IoError` if the disconnect message cannot be sent.
    /// The transport is disconnected either way.
    pub async fn close(&self) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        if let Some(session) = session_lock.take() {
            drop(session.sftp);
            session
                .handle
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
            info!(host = %session.host, "SSH disconnected");
        }
        Ok(())
    }

    /// Whether the SFTP sub-channel was opened
    pub async fn has_sftp(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| s.sftp.is_some())
    }
}

#[async_trait]
impl RemoteExecutor for SshTransport {
    #[instrument(skip(self, cmd, options))]
    async fn exec(&self, cmd: &str, options: &ExecOptions) -> Result<CommandResult, ExecError> {
        if cmd.trim().is_empty() {
            return Err(ExecError::EmptyCommand);
        }

        let session_lock = self.session.lock().await;
        let session = session_lock.as_ref().ok_or(ExecError::NotConnected)?;

        execute_on(&session.handle, cmd, options).await
    }

    fn is_connected(&self) -> bool {
        // Only a contended lock reads as disconnected; the engine never
        // checks state while a command is running
        let session_opt = self.session.try_lock();
        session_opt.map(|s| s.is_some()).unwrap_or(false)
    }

    async fn home_dir(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.home_dir.clone())
    }

    fn executor_type(&self) -> &'static str {
        "ssh"
    }
}

/// Refuse a second session; the stored one is left untouched
fn ensure_vacant<S>(slot: &Option<S>, host: impl Fn(&S) -> &str) -> Result<(), ExecError> {
    match slot {
        Some(session) => {
            info!(host = %host(session), "already connected");
            Err(ExecError::AlreadyConnected)
        }
        None => Ok(()),
    }
}

async fn authenticate(
    handle: &mut client::Handle<SshClientHandler>,
    target: &ConnectTarget,
) -> Result<(), ExecError> {
    let auth_res = match &target.auth {
        // Only the password method is offered, so a wrong password fails
        // instead of falling through to keys or an agent
        AuthMethod::Password(password) => handle
            .authenticate_password(&target.user, password)
            .await
            .map_err(map_russh_error)?,
        AuthMethod::Key(key_path) => {
            let key_pair = load_secret_key(key_path, None).map_err(|e| {
                ExecError::Configuration(format!(
                    "cannot load private key {}: {e}",
                    key_path.display()
                ))
            })?;

            let hash_alg = handle
                .best_supported_rsa_hash()
                .await
                .ok()
                .flatten()
                .flatten();

            handle
                .authenticate_publickey(
                    &target.user,
                    PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
                )
                .await
                .map_err(map_russh_error)?
        }
    };

    if !auth_res.success() {
        let method = match target.auth {
            AuthMethod::Password(_) => "password",
            AuthMethod::Key(_) => "public key",
        };
        error!(host = %target.host, user = %target.user, method, "SSH authentication failed");
        return Err(ExecError::AuthenticationFailed(format!(
            "{method} authentication rejected for {}@{}",
            target.user, target.host
        )));
    }

    Ok(())
}

async fn open_sftp(handle: &client::Handle<SshClientHandler>) -> Result<SftpSession, String> {
    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| e.to_string())?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| e.to_string())?;
    SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| e.to_string())
}

/// Home directory of the session user, via SFTP or `$HOME`
async fn resolve_home(
    handle: &client::Handle<SshClientHandler>,
    sftp: Option<&SftpSession>,
) -> String {
    if let Some(sftp) = sftp {
        match sftp.canonicalize(".").await {
            Ok(path) => return path,
            Err(e) => debug!(error = %e, "SFTP realpath failed"),
        }
    }

    match execute_on(handle, "echo $HOME", &ExecOptions::default()).await {
        Ok(result) if result.success() => result.stdout.trim().to_string(),
        Ok(result) => {
            warn!(stderr = %result.error_text(), "could not resolve home directory");
            String::new()
        }
        Err(e) => {
            warn!(error = %e, "could not resolve home directory");
            String::new()
        }
    }
}

async fn execute_on(
    handle: &client::Handle<SshClientHandler>,
    cmd: &str,
    options: &ExecOptions,
) -> Result<CommandResult, ExecError> {
    debug!(command = %cmd, "executing remote command");

    let start = Instant::now();

    let mut channel = handle
        .channel_open_session()
        .await
        .map_err(|e| ExecError::IoError(e.to_string()))?;

    channel
        .exec(true, cmd)
        .await
        .map_err(|e| ExecError::IoError(e.to_string()))?;

    if let Some(input) = &options.stdin {
        channel
            .data(input.as_bytes())
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;
        channel
            .eof()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;
    }

    let mut status = -1;
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    // exit-status may follow EOF, so drain until the channel closes
    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => {
                stdout.extend_from_slice(&data);
            }
            ChannelMsg::ExtendedData { data, ext } => {
                if ext == 1 {
                    // stderr
                    stderr.extend_from_slice(&data);
                }
            }
            ChannelMsg::ExitStatus { exit_status } => {
                status = exit_status.cast_signed();
            }
            ChannelMsg::ExitSignal { signal_name, .. } => {
                warn!(command = %cmd, signal = ?signal_name, "remote command killed by signal");
            }
            _ => {}
        }
    }

    let duration = start.elapsed();
    let stdout = String::from_utf8_lossy(&stdout).to_string();
    let stderr = String::from_utf8_lossy(&stderr).to_string();

    debug!(
        command = %cmd,
        status = status,
        duration = ?duration,
        "remote command completed"
    );

    Ok(CommandResult {
        status,
        stdout,
        stderr,
        duration,
    })
}

fn map_russh_error(e: russh::Error) -> ExecError {
    match e {
        russh::Error::UnknownKey | russh::Error::Keys(russh::keys::Error::KeyChanged { .. }) => {
            ExecError::HostKeyRejected(e.to_string())
        }
        russh::Error::IO(_) | russh::Error::ConnectionTimeout | russh::Error::Disconnect => {
            ExecError::ConnectionFailed(e.to_string())
        }
        _ => ExecError::Protocol(e.to_string()),
    }
}
