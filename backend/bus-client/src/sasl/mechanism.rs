//! SASL mechanisms offered during the handshake.
//!
//! Mechanisms are pluggable: anything implementing [`AuthMechanism`] can be
//! placed in the ordered list handed to the state machine.

use crate::error::auth::AuthError;

use common::{ErrorLocation, RedactedSecret};

use std::fs;
use std::panic::Location;
use std::path::{Path, PathBuf};

use log::trace;
use nix::unistd::{Uid, User, getuid};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use uuid::Uuid;

pub const EXTERNAL: &str = "EXTERNAL";
pub const DBUS_COOKIE_SHA1: &str = "DBUS_COOKIE_SHA1";
pub const ANONYMOUS: &str = "ANONYMOUS";

const KEYRING_DIR_NAME: &str = ".dbus-keyrings";
const ANONYMOUS_TRACE: &str = "bus-client";

/// One SASL mechanism.
///
/// Responses are raw bytes; hex encoding for the wire is done by the caller.
pub trait AuthMechanism: Send {
    fn name(&self) -> &str;

    /// Response sent along with `AUTH`. An error skips this mechanism.
    fn initial_response(&mut self) -> Result<Option<Vec<u8>>, AuthError>;

    /// Answer a `DATA` challenge. An error cancels this mechanism.
    fn challenge(&mut self, data: &[u8]) -> Result<Vec<u8>, AuthError>;
}

/// Mechanisms that can be named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MechanismKind {
    External,
    CookieSha1,
    Anonymous,
}

impl MechanismKind {
    pub fn name(&self) -> &'static str {
        match self {
            MechanismKind::External => EXTERNAL,
            MechanismKind::CookieSha1 => DBUS_COOKIE_SHA1,
            MechanismKind::Anonymous => ANONYMOUS,
        }
    }

    /// Build a fresh mechanism instance. `keyring_dir` overrides `~/.dbus-keyrings`.
    pub fn build(&self, keyring_dir: Option<&Path>) -> Box<dyn AuthMechanism> {
        match self {
            MechanismKind::External => Box::new(External::new()),
            MechanismKind::CookieSha1 => match keyring_dir {
                Some(dir) => Box::new(CookieSha1::with_keyring_dir(dir)),
                None => Box::new(CookieSha1::new()),
            },
            MechanismKind::Anonymous => Box::new(Anonymous::new()),
        }
    }
}

/// The default preference order: credentials, then cookie, then anonymous.
pub fn default_mechanisms() -> Vec<MechanismKind> {
    vec![
        MechanismKind::External,
        MechanismKind::CookieSha1,
        MechanismKind::Anonymous,
    ]
}

/// Identity is proven by the kernel-passed socket credentials; the response
/// is just the decimal uid.
pub struct External {
    uid: Uid,
}

impl External {
    pub fn new() -> Self {
        Self { uid: getuid() }
    }

    pub fn with_uid(uid: u32) -> Self {
        Self {
            uid: Uid::from_raw(uid),
        }
    }
}

impl Default for External {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthMechanism for External {
    fn name(&self) -> &str {
        EXTERNAL
    }

    fn initial_response(&mut self) -> Result<Option<Vec<u8>>, AuthError> {
        Ok(Some(self.uid.to_string().into_bytes()))
    }

    fn challenge(&mut self, _data: &[u8]) -> Result<Vec<u8>, AuthError> {
        // Identity was already sent.
        Ok(Vec::new())
    }
}

pub struct Anonymous {
    trace: String,
}

impl Anonymous {
    pub fn new() -> Self {
        Self {
            trace: ANONYMOUS_TRACE.to_string(),
        }
    }
}

impl Default for Anonymous {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthMechanism for Anonymous {
    fn name(&self) -> &str {
        ANONYMOUS
    }

    fn initial_response(&mut self) -> Result<Option<Vec<u8>>, AuthError> {
        Ok(Some(self.trace.clone().into_bytes()))
    }

    fn challenge(&mut self, _data: &[u8]) -> Result<Vec<u8>, AuthError> {
        Err(AuthError::Mechanism {
            message: "ANONYMOUS does not answer challenges".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

/// Challenge-response against a cookie shared through the user's keyring
/// directory.
pub struct CookieSha1 {
    keyring_dir: Option<PathBuf>,
    username: Option<String>,
}

impl CookieSha1 {
    pub fn new() -> Self {
        Self {
            keyring_dir: dirs::home_dir().map(|home| home.join(KEYRING_DIR_NAME)),
            username: None,
        }
    }

    pub fn with_keyring_dir(dir: &Path) -> Self {
        Self {
            keyring_dir: Some(dir.to_path_buf()),
            username: None,
        }
    }

    /// Override the username sent as the initial response.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    fn username(&self) -> Result<String, AuthError> {
        if let Some(ref username) = self.username {
            return Ok(username.clone());
        }

        match User::from_uid(getuid()) {
            Ok(Some(user)) => Ok(user.name),
            Ok(None) => Err(AuthError::Mechanism {
                message: "Current uid has no passwd entry".to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
            Err(errno) => Err(AuthError::Mechanism {
                message: format!("Unable to look up current user: {errno}"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    fn read_cookie(&self, context: &str, cookie_id: &str) -> Result<RedactedSecret, AuthError> {
        if context.is_empty() || context.starts_with('.') || context.contains(['/', '\\']) {
            return Err(AuthError::Mechanism {
                message: format!("Invalid keyring context {context:?}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let Some(ref keyring_dir) = self.keyring_dir else {
            return Err(AuthError::Mechanism {
                message: "No keyring directory available".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        let path = keyring_dir.join(context);
        let contents = fs::read_to_string(&path).map_err(|e| AuthError::Mechanism {
            message: format!("Unable to read keyring {}: {e}", path.display()),
            location: ErrorLocation::from(Location::caller()),
        })?;

        // Each line: <id> <creation-time> <cookie>
        contents
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                match (fields.next(), fields.next(), fields.next()) {
                    (Some(id), Some(_created), Some(cookie)) if id == cookie_id => {
                        Some(RedactedSecret::from(cookie))
                    }
                    _ => None,
                }
            })
            .next()
            .ok_or_else(|| AuthError::Mechanism {
                message: format!("Cookie {cookie_id} not found in {}", path.display()),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

impl Default for CookieSha1 {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthMechanism for CookieSha1 {
    fn name(&self) -> &str {
        DBUS_COOKIE_SHA1
    }

    fn initial_response(&mut self) -> Result<Option<Vec<u8>>, AuthError> {
        Ok(Some(self.username()?.into_bytes()))
    }

    fn challenge(&mut self, data: &[u8]) -> Result<Vec<u8>, AuthError> {
        let text = std::str::from_utf8(data).map_err(|e| AuthError::Protocol {
            message: format!("Cookie challenge is not UTF-8: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let fields: Vec<&str> = text.split_whitespace().collect();
        let &[context, cookie_id, server_challenge] = fields.as_slice() else {
            return Err(AuthError::Protocol {
                message: format!("Malformed cookie challenge {text:?}"),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        let cookie = self.read_cookie(context, cookie_id)?;
        let client_challenge = Uuid::new_v4().simple().to_string();
        let digest = cookie_digest(server_challenge, &client_challenge, &cookie);

        trace!("Answering cookie challenge for context {context}, cookie {cookie_id}");
        Ok(format!("{client_challenge} {digest}").into_bytes())
    }
}

/// Hex SHA-1 of `server:client:cookie`.
pub(crate) fn cookie_digest(
    server_challenge: &str,
    client_challenge: &str,
    cookie: &RedactedSecret,
) -> String {
    let mut hasher = Sha1::new();
    hasher.update(server_challenge.as_bytes());
    hasher.update(b":");
    hasher.update(client_challenge.as_bytes());
    hasher.update(b":");
    hasher.update(cookie.expose().as_bytes());
    hex::encode(hasher.finalize())
}
