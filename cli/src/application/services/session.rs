//! Application service: open the remote session with auth fallback.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use crate::application::ports::{ProgressReporter, SessionConnector};
use crate::domain::{AuthMethod, ConnectError, DeployError, ServerConfig, SshTarget};

/// An open session plus the method that authenticated it.
pub struct Connected<S> {
    pub session: S,
    pub auth: &'static str,
}

/// Connect with the password, falling back to the private key once.
///
/// Only an authentication rejection triggers the key attempt; any other
/// failure is returned immediately.
///
/// # Errors
///
/// Returns [`DeployError::Authentication`] when both methods are rejected and
/// [`DeployError::Connection`] for any transport failure.
pub async fn open_session<C: SessionConnector>(
    connector: &C,
    reporter: &impl ProgressReporter,
    server: &ServerConfig,
) -> Result<Connected<C::Session>, DeployError> {
    reporter.step("Connecting to the server...");
    let target = SshTarget::from(server);
    let [password, key] = AuthMethod::fallback_chain(server);

    let password_reason = match connector.connect(&target, &password).await {
        Ok(session) => return Ok(connected(reporter, session, &password)),
        Err(ConnectError::Authentication(reason)) => reason,
        Err(ConnectError::Transport(source)) => return Err(DeployError::Connection { source }),
    };

    tracing::warn!(
        host = %target.host,
        reason = %password_reason,
        "password authentication rejected, retrying with SSH key"
    );

    match connector.connect(&target, &key).await {
        Ok(session) => Ok(connected(reporter, session, &key)),
        Err(ConnectError::Authentication(key_reason)) => Err(DeployError::Authentication {
            source: anyhow::anyhow!(
                "password: {password_reason}; key {}: {key_reason}",
                server.key_path.display()
            ),
        }),
        Err(ConnectError::Transport(source)) => Err(DeployError::Connection { source }),
    }
}

fn connected<S>(reporter: &impl ProgressReporter, session: S, auth: &AuthMethod) -> Connected<S> {
    reporter.success(&format!("Connected to the server with {}", auth.label()));
    Connected {
        session,
        auth: auth.label(),
    }
}
