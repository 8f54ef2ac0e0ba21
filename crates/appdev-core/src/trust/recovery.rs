//! Recovery from SSL failures during remote calls.

use tracing::warn;

use crate::error::{Error, Result};
use crate::operator::Operator;

use super::store::TrustStore;

/// Run `action`; on an SSL failure drop the host's trust state and run it once more.
///
/// `action` must acquire its own trust material so the second attempt goes
/// through bootstrap again. A second SSL failure removes the state again and is
/// returned as a fatal [`Error::Cert`].
pub fn with_trust_recovery<T, F>(
    store: &TrustStore,
    host: &str,
    operator: &dyn Operator,
    mut action: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    match action() {
        Err(e) if e.is_ssl() => {
            warn!(host, error = %e, "ssl failure, refreshing trust state");
            store.remove(host);
            operator.say(&e.to_string());
            operator.say(&format!(
                "Removed invalid certificate bundle for server {host}"
            ));
        }
        other => return other,
    }

    match action() {
        Err(e) if e.is_ssl() => {
            store.remove(host);
            Err(Error::Cert(format!(
                "{e}\nRemoved certificate bundle for server {host}. \
                 To replace it, retry this command or use the appdev server command"
            )))
        }
        other => other,
    }
}
