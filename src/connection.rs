/*
 * SPDX-License-Identifier: MIT
 *
 * Permission is hereby granted, free of charge, to any person obtaining a
 * copy of this software and associated documentation files (the "Software"),
 * to deal in the Software without restriction, including without limitation
 * the rights to use, copy, modify, merge, publish, distribute, sublicense,
 * and/or sell copies of the Software, and to permit persons to whom the
 * Software is furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in
 * all copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL
 * THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
 * FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
 * DEALINGS IN THE SOFTWARE.
 */
//! Session lifecycle for a single invocation.
//!
//! A handle comes from exactly one of three places: a starship proxy, a
//! session opened earlier by someone else, or a fresh login with credentials.
//! Only the last one is ours to close.

use std::{collections::HashMap, fmt};

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use tracing::{debug, info};

use crate::model::StringOrInt;
use crate::network::Endpoint;
use crate::{Connector, Imc, ImcError};

// The starship path needs a handle object but never authenticates with it.
const STARSHIP_PLACEHOLDER_HOST: &str = "192.168.1.1";
const STARSHIP_PLACEHOLDER_USER: &str = "admin";
const STARSHIP_PLACEHOLDER_PASSWORD: &str = "password";

const DEFAULT_USERNAME: &str = "admin";

/// Routes all requests through a starship proxy, authenticated by its cookies.
#[derive(Clone, Deserialize)]
pub struct StarshipOptions {
    pub url: String,
    #[serde(default)]
    pub cookies: HashMap<String, String>,
}

impl fmt::Debug for StarshipOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StarshipOptions")
            .field("url", &self.url)
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A session opened by an earlier task. It is used as is and never logged out here.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    pub ip: String,
    #[serde(default, deserialize_with = "deserialize_opt_port")]
    pub port: Option<u16>,
    #[serde(default, deserialize_with = "deserialize_opt_bool")]
    pub secure: Option<bool>,
    pub proxy: Option<String>,
    pub token: SecretString,
    pub session_uri: Option<String>,
}

/// Connection arguments as the automation framework passes them.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionParams {
    pub imc_ip: Option<String>,
    #[serde(default = "default_username")]
    pub imc_username: String,
    pub imc_password: Option<SecretString>,
    #[serde(default, deserialize_with = "deserialize_opt_port")]
    pub imc_port: Option<u16>,
    #[serde(default, deserialize_with = "deserialize_opt_bool")]
    pub imc_secure: Option<bool>,
    pub imc_proxy: Option<String>,
    pub imc_server: Option<SessionInfo>,
    pub starship_options: Option<StarshipOptions>,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        ConnectionParams {
            imc_ip: None,
            imc_username: default_username(),
            imc_password: None,
            imc_port: None,
            imc_secure: None,
            imc_proxy: None,
            imc_server: None,
            starship_options: None,
        }
    }
}

impl ConnectionParams {
    pub const KEYS: &'static [&'static str] = &[
        "imc_ip",
        "imc_username",
        "imc_password",
        "imc_port",
        "imc_secure",
        "imc_proxy",
        "imc_server",
        "starship_options",
    ];

    /// Picks the login path. Starship options win over an existing session,
    /// which wins over credentials.
    pub fn into_login_mode(self) -> LoginMode {
        if let Some(opts) = self.starship_options {
            return LoginMode::Starship(opts);
        }
        if let Some(session) = self.imc_server {
            return LoginMode::Existing(session);
        }
        LoginMode::Credentials(Endpoint {
            host: self.imc_ip.unwrap_or_default(),
            port: self.imc_port,
            secure: self.imc_secure,
            proxy: self.imc_proxy,
            user: Some(self.imc_username),
            password: self.imc_password,
        })
    }
}

#[derive(Debug, Clone)]
pub enum LoginMode {
    Starship(StarshipOptions),
    Existing(SessionInfo),
    Credentials(Endpoint),
}

impl fmt::Display for LoginMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginMode::Starship(_) => write!(f, "starship"),
            LoginMode::Existing(_) => write!(f, "existing session"),
            LoginMode::Credentials(_) => write!(f, "credentials"),
        }
    }
}

/// Owns the handle for the duration of one operation.
pub struct ImcConnection {
    connector: Box<dyn Connector>,
    mode: LoginMode,
    handle: Option<Box<dyn Imc>>,
}

impl ImcConnection {
    /// `connector` is None when the client library could not be set up. That is
    /// reported here, before any network activity.
    pub fn new(
        params: ConnectionParams,
        connector: Option<Box<dyn Connector>>,
    ) -> Result<Self, ImcError> {
        Self::with_mode(params.into_login_mode(), connector)
    }

    pub fn with_mode(
        mode: LoginMode,
        connector: Option<Box<dyn Connector>>,
    ) -> Result<Self, ImcError> {
        let connector = connector.ok_or(ImcError::ClientUnavailable)?;
        Ok(Self {
            connector,
            mode,
            handle: None,
        })
    }

    /// Produces a usable handle. Only the credentials path talks to the IMC;
    /// its failures come back as `ImcError::Connection`.
    pub fn login(&mut self) -> Result<&dyn Imc, ImcError> {
        if self.handle.is_some() {
            debug!("Already logged in, reusing handle");
        } else {
            debug!("Login mode: {}", self.mode);
            let handle = match &self.mode {
                LoginMode::Starship(opts) => {
                    let placeholder = Endpoint {
                        host: STARSHIP_PLACEHOLDER_HOST.to_string(),
                        user: Some(STARSHIP_PLACEHOLDER_USER.to_string()),
                        password: Some(SecretString::from(STARSHIP_PLACEHOLDER_PASSWORD)),
                        ..Default::default()
                    };
                    let mut handle = self.connector.create_handle(placeholder)?;
                    handle.set_starship_proxy(&opts.url);
                    handle.set_starship_headers(opts.cookies.clone());
                    info!("Using starship proxy {}", opts.url);
                    handle
                }
                LoginMode::Existing(session) => {
                    info!("Reusing existing session on {}", session.ip);
                    self.connector.attach(session.clone())?
                }
                LoginMode::Credentials(endpoint) => {
                    if endpoint.host.is_empty() {
                        return Err(ImcError::Connection(
                            "missing required argument: imc_ip".to_string(),
                        ));
                    }
                    info!(
                        "Logging in to {} as {}",
                        endpoint.host,
                        endpoint.user.as_deref().unwrap_or_default()
                    );
                    let mut handle = self
                        .connector
                        .create_handle(endpoint.clone())
                        .map_err(|e| ImcError::Connection(e.to_string()))?;
                    handle
                        .login()
                        .map_err(|e| ImcError::Connection(e.to_string()))?;
                    handle
                }
            };
            self.handle = Some(handle);
        }
        match self.handle.as_deref() {
            Some(handle) => Ok(handle),
            None => Err(ImcError::NotLoggedIn),
        }
    }

    /// Releases the handle if we own it. Returns true when this call handled
    /// the logout, false when the session belongs to the caller or login never
    /// completed.
    pub fn logout(&mut self) -> Result<bool, ImcError> {
        match &self.mode {
            LoginMode::Starship(_) => Ok(true),
            // we used a pre-existing session, do not logout
            LoginMode::Existing(_) => Ok(false),
            LoginMode::Credentials(endpoint) => match self.handle.take() {
                Some(mut handle) => {
                    info!("Logging out of {}", endpoint.host);
                    handle.logout()?;
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }
}

fn default_username() -> String {
    DEFAULT_USERNAME.to_string()
}

pub(crate) fn deserialize_opt_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StringOrInt>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => {
            let raw = raw.into_string();
            raw.trim()
                .parse()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("invalid port: {raw}")))
        }
    }
}

pub(crate) fn deserialize_opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }
    match Option::<BoolOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(BoolOrString::Bool(b)) => Ok(Some(b)),
        Some(BoolOrString::String(s)) => match s.to_lowercase().as_str() {
            "yes" | "true" | "on" | "1" => Ok(Some(true)),
            "no" | "false" | "off" | "0" => Ok(Some(false)),
            _ => Err(serde::de::Error::custom(format!("invalid boolean: {s}"))),
        },
    }
}

#[cfg(test)]
mod test {
    use secrecy::ExposeSecret;

    use super::*;
    use crate::fake::{FakeConnector, FakeImc};
    use crate::model::EnabledDisabled;
    use crate::sol::SolInterface;

    fn fake() -> FakeImc {
        FakeImc::new(SolInterface {
            admin_state: EnabledDisabled::Disabled,
            speed: None,
            comport: None,
            ssh_port: None,
        })
    }

    fn session() -> SessionInfo {
        SessionInfo {
            ip: "10.0.0.9".to_string(),
            port: None,
            secure: None,
            proxy: None,
            token: SecretString::from("tok"),
            session_uri: None,
        }
    }

    fn starship() -> StarshipOptions {
        StarshipOptions {
            url: "https://starship.example.com".to_string(),
            cookies: HashMap::from([("sid".to_string(), "s3cr3t".to_string())]),
        }
    }

    fn credentials() -> ConnectionParams {
        ConnectionParams {
            imc_ip: Some("10.0.0.5".to_string()),
            imc_password: Some(SecretString::from("pw")),
            ..Default::default()
        }
    }

    #[test]
    fn test_login_mode_resolution_order() {
        let mut params = credentials();
        params.imc_server = Some(session());
        params.starship_options = Some(starship());
        assert!(matches!(
            params.clone().into_login_mode(),
            LoginMode::Starship(_)
        ));

        params.starship_options = None;
        assert!(matches!(
            params.clone().into_login_mode(),
            LoginMode::Existing(_)
        ));
        assert_eq!(params.clone().into_login_mode().to_string(), "existing session");

        params.imc_server = None;
        match params.into_login_mode() {
            LoginMode::Credentials(endpoint) => {
                assert_eq!(endpoint.host, "10.0.0.5");
                assert_eq!(endpoint.user.as_deref(), Some("admin"));
            }
            other => panic!("unexpected mode {other}"),
        }
    }

    #[test]
    fn test_starship_never_logs_in() {
        let imc = fake();
        let connector = FakeConnector::new(imc.clone());
        let mut params = credentials();
        params.starship_options = Some(starship());
        let mut conn = ImcConnection::new(params, Some(Box::new(connector.clone()))).unwrap();
        conn.login().unwrap();
        assert!(conn.logout().unwrap());

        let calls = imc.calls();
        assert_eq!(calls.logins, 0);
        assert_eq!(calls.logouts, 0);
        assert_eq!(
            calls.starship_url.as_deref(),
            Some("https://starship.example.com")
        );
        assert_eq!(calls.starship_cookies.get("sid").map(String::as_str), Some("s3cr3t"));
        let endpoints = connector.endpoints();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].host, STARSHIP_PLACEHOLDER_HOST);
    }

    #[test]
    fn test_existing_session_is_not_closed() {
        let imc = fake();
        let connector = FakeConnector::new(imc.clone());
        let params = ConnectionParams {
            imc_server: Some(session()),
            ..credentials()
        };
        let mut conn = ImcConnection::new(params, Some(Box::new(connector.clone()))).unwrap();
        conn.login().unwrap();
        assert!(!conn.logout().unwrap());

        let calls = imc.calls();
        assert_eq!(calls.logins, 0);
        assert_eq!(calls.logouts, 0);
        assert_eq!(connector.attached(), vec!["10.0.0.9".to_string()]);
    }

    #[test]
    fn test_credentials_login_and_logout_once() {
        let imc = fake();
        let connector = FakeConnector::new(imc.clone());
        let mut conn = ImcConnection::new(credentials(), Some(Box::new(connector))).unwrap();
        assert!(!conn.logout().unwrap());
        conn.login().unwrap();
        conn.login().unwrap();
        assert!(conn.logout().unwrap());
        assert!(!conn.logout().unwrap());

        let calls = imc.calls();
        assert_eq!(calls.logins, 1);
        assert_eq!(calls.logouts, 1);
    }

    #[test]
    fn test_login_failure_is_connection_error() {
        let imc = fake().fail_login("authentication failed");
        let connector = FakeConnector::new(imc.clone());
        let mut conn = ImcConnection::new(credentials(), Some(Box::new(connector))).unwrap();
        match conn.login() {
            Err(ImcError::Connection(msg)) => assert_eq!(msg, "authentication failed"),
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("login should fail"),
        }
        assert!(!conn.logout().unwrap());
        assert_eq!(imc.calls().logouts, 0);
    }

    #[test]
    fn test_missing_ip() {
        let connector = FakeConnector::new(fake());
        let mut conn =
            ImcConnection::new(ConnectionParams::default(), Some(Box::new(connector.clone())))
                .unwrap();
        assert!(matches!(conn.login(), Err(ImcError::Connection(_))));
        assert!(connector.endpoints().is_empty());
    }

    #[test]
    fn test_missing_client_library() {
        let err = ImcConnection::new(credentials(), None).err().unwrap();
        assert!(matches!(err, ImcError::ClientUnavailable));
        assert_eq!(err.to_string(), "IMC client library is not installed");
    }

    #[test]
    fn test_params_deserialize() {
        let params: ConnectionParams = serde_json::from_value(serde_json::json!({
            "imc_ip": "10.0.0.5",
            "imc_password": "pw",
            "imc_port": "8443",
            "imc_secure": "no",
            "starship_options": {"url": "https://s", "cookies": {"a": "b"}}
        }))
        .unwrap();
        assert_eq!(params.imc_username, "admin");
        assert_eq!(params.imc_port, Some(8443));
        assert_eq!(params.imc_secure, Some(false));
        assert_eq!(params.imc_password.as_ref().unwrap().expose_secret(), "pw");
        assert!(!format!("{params:?}").contains("\"pw\""));
        assert!(!format!("{params:?}").contains("\"b\""));

        let session: SessionInfo = serde_json::from_value(serde_json::json!({
            "ip": "10.0.0.9", "port": 443, "token": "abc"
        }))
        .unwrap();
        assert_eq!(session.port, Some(443));
        assert_eq!(session.token.expose_secret(), "abc");
    }
}
