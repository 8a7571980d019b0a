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
use std::{collections::HashMap, fmt, time::Duration};

use reqwest::{
    blocking::Client as HttpClient, blocking::ClientBuilder as HttpClientBuilder,
    header::HeaderMap, header::HeaderValue, header::ACCEPT, header::CONTENT_TYPE,
    header::COOKIE, Method, Proxy, StatusCode,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::cimc::Cimc;
use crate::connection::SessionInfo;
use crate::{Connector, Imc, ImcError};

pub const REDFISH_ENDPOINT: &str = "redfish/v1";
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug)]
pub struct ImcClientPoolBuilder {
    timeout: Duration,
    accept_invalid_certs: bool,
}

impl ImcClientPoolBuilder {
    /// Prevents the client from accepting self signed certificates
    /// and other invalid certificates.
    ///
    /// By default self signed certificates will be accepted, since IMCs ship
    /// with those.
    pub fn reject_invalid_certs(mut self) -> ImcClientPoolBuilder {
        self.accept_invalid_certs = false;
        self
    }

    /// Overwrites the timeout that will be applied to every request
    pub fn timeout(mut self, timeout: Duration) -> ImcClientPoolBuilder {
        self.timeout = timeout;
        self
    }

    /// Builds the HTTP client shared by every handle created from the pool.
    /// Fails if the TLS backend cannot be initialised.
    pub fn build(&self) -> Result<ImcClientPool, ImcError> {
        let http_client = self.http_client(None)?;
        Ok(ImcClientPool {
            http_client,
            timeout: self.timeout,
            accept_invalid_certs: self.accept_invalid_certs,
        })
    }

    fn http_client(&self, proxy: Option<&str>) -> Result<HttpClient, ImcError> {
        let mut builder = HttpClientBuilder::new()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .timeout(self.timeout);
        if let Some(p) = proxy {
            builder = builder.proxy(Proxy::all(p).map_err(ImcError::HttpClientBuild)?);
        }
        builder.build().map_err(ImcError::HttpClientBuild)
    }
}

/// The endpoint that the IMC client connects to
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Hostname or IP address of the IMC
    pub host: String,
    /// IMC port. If absent the scheme's default port is used
    pub port: Option<u16>,
    /// Use HTTPS. Absent means HTTPS, only `Some(false)` selects plain HTTP
    pub secure: Option<bool>,
    /// HTTP(S) proxy all requests go through
    pub proxy: Option<String>,
    /// IMC username
    pub user: Option<String>,
    /// IMC password
    pub password: Option<SecretString>,
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint {
            host: "".to_string(),
            port: None,
            secure: None,
            proxy: None,
            user: None,
            password: None,
        }
    }
}

impl Endpoint {
    pub fn scheme(&self) -> &'static str {
        match self.secure {
            Some(false) => "http",
            _ => "https",
        }
    }

    pub fn base_url(&self) -> String {
        match self.port {
            Some(p) => format!("{}://{}:{}", self.scheme(), self.host, p),
            None => format!("{}://{}", self.scheme(), self.host),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImcClientPool {
    http_client: HttpClient,
    timeout: Duration,
    accept_invalid_certs: bool,
}

impl ImcClientPool {
    /// Returns Builder for configuring an IMC HTTP connection pool
    pub fn builder() -> ImcClientPoolBuilder {
        ImcClientPoolBuilder {
            timeout: DEFAULT_TIMEOUT,
            // IMCs come with a self-signed cert, so usually this has to be true
            accept_invalid_certs: true,
        }
    }

    /// Creates an HTTP client for a single endpoint. No request is made.
    pub fn create_client(&self, endpoint: Endpoint) -> Result<ImcHttpClient, ImcError> {
        let http_client = match endpoint.proxy.as_deref() {
            Some(proxy) => ImcClientPoolBuilder {
                timeout: self.timeout,
                accept_invalid_certs: self.accept_invalid_certs,
            }
            .http_client(Some(proxy))?,
            None => self.http_client.clone(),
        };
        Ok(ImcHttpClient::new(http_client, endpoint))
    }
}

impl Connector for ImcClientPool {
    fn create_handle(&self, endpoint: Endpoint) -> Result<Box<dyn Imc>, ImcError> {
        Ok(Box::new(Cimc::new(self.create_client(endpoint)?)))
    }

    fn attach(&self, session: SessionInfo) -> Result<Box<dyn Imc>, ImcError> {
        let endpoint = Endpoint {
            host: session.ip,
            port: session.port,
            secure: session.secure,
            proxy: session.proxy,
            ..Default::default()
        };
        let mut client = self.create_client(endpoint)?;
        client.set_auth_token(session.token);
        Ok(Box::new(Cimc::with_session(client, session.session_uri)))
    }
}

/// Extra knobs for a single request.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestOptions {
    /// Keep the request body out of the debug log (credentials).
    pub redact_body: bool,
}

/// Status, parsed body and headers of a successful response.
#[derive(Debug)]
pub struct ImcResponse<T> {
    pub status_code: StatusCode,
    pub body: Option<T>,
    pub headers: HeaderMap,
}

/// Reroutes every request through a starship proxy, authenticated by cookies.
#[derive(Clone, Default)]
struct Starship {
    url: Option<String>,
    cookies: HashMap<String, String>,
}

impl fmt::Debug for Starship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Starship")
            .field("url", &self.url)
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A HTTP client which targets a single IMC endpoint
pub struct ImcHttpClient {
    endpoint: Endpoint,
    http_client: HttpClient,
    auth_token: Option<SecretString>,
    starship: Starship,
}

impl ImcHttpClient {
    pub fn new(http_client: HttpClient, endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            http_client,
            auth_token: None,
            starship: Starship::default(),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn set_auth_token(&mut self, token: SecretString) {
        self.auth_token = Some(token);
    }

    pub fn clear_auth_token(&mut self) {
        self.auth_token = None;
    }

    pub fn has_auth_token(&self) -> bool {
        self.auth_token.is_some()
    }

    pub fn set_starship_url(&mut self, url: &str) {
        self.starship.url = Some(url.trim_end_matches('/').to_string());
    }

    pub fn set_starship_cookies(&mut self, cookies: HashMap<String, String>) {
        self.starship.cookies = cookies;
    }

    pub fn url(&self, api: &str) -> String {
        let api = api_path(api);
        match &self.starship.url {
            Some(url) => format!("{url}/{REDFISH_ENDPOINT}/{api}"),
            None => format!("{}/{}/{}", self.endpoint.base_url(), REDFISH_ENDPOINT, api),
        }
    }

    pub fn get<T>(&self, api: &str) -> Result<(StatusCode, T), ImcError>
    where
        T: DeserializeOwned + ::std::fmt::Debug,
    {
        let (status_code, resp_opt) = self.req::<T, String>(Method::GET, api, None)?;
        match resp_opt {
            Some(response_body) => Ok((status_code, response_body)),
            None => Err(ImcError::NoContent),
        }
    }

    pub fn post<T, B>(
        &self,
        api: &str,
        data: B,
        opts: RequestOptions,
    ) -> Result<ImcResponse<T>, ImcError>
    where
        T: DeserializeOwned + ::std::fmt::Debug,
        B: Serialize + ::std::fmt::Debug,
    {
        self.send(Method::POST, api, Some(data), opts)
    }

    pub fn patch<T>(&self, api: &str, data: T) -> Result<StatusCode, ImcError>
    where
        T: Serialize + ::std::fmt::Debug,
    {
        let (status_code, _resp_body): (_, Option<HashMap<String, serde_json::Value>>) =
            self.req(Method::PATCH, api, Some(data))?;
        Ok(status_code)
    }

    pub fn delete(&self, api: &str) -> Result<StatusCode, ImcError> {
        let (status_code, _resp_body): (_, Option<HashMap<String, serde_json::Value>>) =
            self.req::<_, String>(Method::DELETE, api, None)?;
        Ok(status_code)
    }

    pub fn req<T, B>(
        &self,
        method: Method,
        api: &str,
        body: Option<B>,
    ) -> Result<(StatusCode, Option<T>), ImcError>
    where
        T: DeserializeOwned + ::std::fmt::Debug,
        B: Serialize + ::std::fmt::Debug,
    {
        let resp = self.send(method, api, body, RequestOptions::default())?;
        Ok((resp.status_code, resp.body))
    }

    // All the HTTP requests happen from here.
    pub fn send<T, B>(
        &self,
        method: Method,
        api: &str,
        body: Option<B>,
        opts: RequestOptions,
    ) -> Result<ImcResponse<T>, ImcError>
    where
        T: DeserializeOwned + ::std::fmt::Debug,
        B: Serialize + ::std::fmt::Debug,
    {
        let url = self.url(api);
        let body_enc = match body {
            Some(b) => {
                let body_enc =
                    serde_json::to_string(&b).map_err(|e| ImcError::JsonSerializeError {
                        url: url.clone(),
                        object_debug: format!("{b:?}"),
                        source: e,
                    })?;
                Some(body_enc)
            }
            None => None,
        };
        if opts.redact_body {
            debug!("TX {} {} [body redacted]", method, url);
        } else {
            debug!(
                "TX {} {} {}",
                method,
                url,
                body_enc.as_deref().unwrap_or_default()
            );
        }

        let mut req_b = match method {
            Method::GET => self.http_client.get(&url),
            Method::POST => self.http_client.post(&url),
            Method::PATCH => self.http_client.patch(&url),
            Method::DELETE => self.http_client.delete(&url),
            _ => unreachable!("Only GET, POST, PATCH and DELETE http methods are used."),
        };
        req_b = req_b
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !self.starship.cookies.is_empty() {
            req_b = req_b.header(COOKIE, cookie_header(&self.starship.cookies));
        }
        if let Some(token) = &self.auth_token {
            req_b = req_b.header(AUTH_TOKEN_HEADER, token.expose_secret());
        } else if self.starship.url.is_none() {
            if let Some(user) = &self.endpoint.user {
                req_b = req_b.basic_auth(
                    user,
                    self.endpoint.password.as_ref().map(|p| p.expose_secret()),
                );
            }
        }
        if let Some(b) = body_enc {
            req_b = req_b.body(b);
        }
        let response = req_b.send().map_err(|e| ImcError::NetworkError {
            url: url.clone(),
            source: e,
        })?;
        let status_code = response.status();
        let headers = response.headers().clone();
        // read the body even if not status 2XX, because IMCs give useful error messages as JSON
        let response_body = response.text().map_err(|e| ImcError::NetworkError {
            url: url.clone(),
            source: e,
        })?;
        if !status_code.is_success() {
            debug!("RX {status_code} {response_body}");
            return Err(ImcError::HTTPErrorCode { url, status_code });
        }
        let mut res = None;
        if !response_body.is_empty() {
            debug!("RX {status_code} {response_body}");
            match serde_json::from_str(&response_body) {
                Ok(v) => res = Some(v),
                Err(e) => {
                    return Err(ImcError::JsonDeserializeError {
                        url,
                        body: response_body,
                        source: e,
                    });
                }
            };
        } else {
            debug!("RX {status_code}");
        }
        Ok(ImcResponse {
            status_code,
            body: res,
            headers,
        })
    }
}

/// Strips scheme, host and the Redfish prefix from a URI the IMC handed out
/// (Location headers, @odata.id), leaving a path relative to `redfish/v1`.
pub fn api_path(uri: &str) -> &str {
    let prefix = format!("/{REDFISH_ENDPOINT}/");
    match uri.find(&prefix) {
        Some(idx) => &uri[idx + prefix.len()..],
        None => uri.trim_start_matches('/'),
    }
}

// Sorted so the header is stable across runs.
fn cookie_header(cookies: &HashMap<String, String>) -> String {
    let mut pairs: Vec<String> = cookies.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    pairs.join("; ")
}
