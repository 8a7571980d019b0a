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
use std::collections::HashMap;

use reqwest::header::LOCATION;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::model::serial_interface::{
    CiscoSerialInterfaceUpdate, SerialInterface, SerialInterfaceOemUpdate, SerialInterfaceUpdate,
    SerialInterfaces,
};
use crate::model::session::{Session, SessionRequest};
use crate::model::{InvalidValueError, Managers};
use crate::network::{api_path, ImcHttpClient, RequestOptions, AUTH_TOKEN_HEADER};
use crate::sol::{SolInterface, SolSettings};
use crate::{Imc, ImcError};

// Standalone C-series servers name their only manager CIMC
const DEFAULT_MANAGER_ID: &str = "CIMC";

/// The Cisco IMC, driven through its Redfish service.
pub struct Cimc {
    pub client: ImcHttpClient,
    session_uri: Option<String>,
}

impl Cimc {
    /// Wraps a client. No request is made until `login` or a query.
    pub fn new(client: ImcHttpClient) -> Self {
        Self {
            client,
            session_uri: None,
        }
    }

    /// Wraps a client that already carries the token of an existing session.
    pub fn with_session(client: ImcHttpClient, session_uri: Option<String>) -> Self {
        Self {
            client,
            session_uri,
        }
    }

    /// Fetch the Manager id. Needed for all `Managers/{manager_id}/...` calls
    pub fn manager_id(&self) -> Result<String, ImcError> {
        let (_, bmcs): (_, Managers) = self.client.get("Managers/")?;
        match bmcs.members.first() {
            Some(m) => Ok(m.odata_id_get()?.to_string()),
            None => Ok(DEFAULT_MANAGER_ID.to_string()),
        }
    }

    /// The SOL interface of server `server_id` (1-based) is the matching entry of
    /// the manager's SerialInterfaces collection, ordered by id.
    pub fn serial_interface_url(&self, server_id: u32) -> Result<String, ImcError> {
        let not_found = ImcError::SolInterfaceNotFound { server_id };
        if server_id == 0 {
            return Err(not_found);
        }
        let url = format!("Managers/{}/SerialInterfaces", self.manager_id()?);
        let (_, interfaces): (_, SerialInterfaces) = self.client.get(&url)?;
        let mut members: Vec<String> = interfaces
            .members
            .iter()
            .map(|m| api_path(&m.odata_id).to_string())
            .collect();
        members.sort_by(|a, b| interface_order(a).cmp(&interface_order(b)));
        members
            .into_iter()
            .nth(server_id as usize - 1)
            .ok_or(not_found)
    }

    pub fn get_serial_interface(
        &self,
        server_id: u32,
    ) -> Result<(String, SerialInterface), ImcError> {
        let url = self.serial_interface_url(server_id)?;
        let (_, iface): (_, SerialInterface) = self.client.get(&url)?;
        Ok((url, iface))
    }
}

impl Imc for Cimc {
    fn login(&mut self) -> Result<(), ImcError> {
        let endpoint = self.client.endpoint();
        let user = endpoint.user.clone().unwrap_or_default();
        let password = endpoint
            .password
            .clone()
            .unwrap_or_else(|| SecretString::from(""));
        let body = SessionRequest {
            user_name: &user,
            password: password.expose_secret(),
        };
        let resp = self.client.post::<Session, _>(
            "SessionService/Sessions",
            body,
            RequestOptions {
                redact_body: true,
                ..Default::default()
            },
        )?;
        let url = self.client.url("SessionService/Sessions");
        let token = resp
            .headers
            .get(AUTH_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ImcError::MissingHeader {
                header: AUTH_TOKEN_HEADER.to_string(),
                url: url.clone(),
            })?;
        let session_uri = resp
            .headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|l| api_path(l).to_string())
            .or_else(|| resp.body.map(|s| api_path(&s.odata.odata_id).to_string()));
        debug!("Logged in as {user}, session {:?}", session_uri);
        self.client.set_auth_token(SecretString::from(token));
        self.session_uri = session_uri;
        Ok(())
    }

    fn logout(&mut self) -> Result<(), ImcError> {
        if !self.client.has_auth_token() {
            debug!("Logout requested without an active session");
            return Ok(());
        }
        let result = match self.session_uri.take() {
            Some(uri) => self.client.delete(&uri).map(|_status_code| ()),
            None => Ok(()),
        };
        self.client.clear_auth_token();
        result
    }

    fn set_starship_proxy(&mut self, url: &str) {
        self.client.set_starship_url(url);
    }

    fn set_starship_headers(&mut self, cookies: HashMap<String, String>) {
        self.client.set_starship_cookies(cookies);
    }

    fn get_sol_interface(&self, server_id: u32) -> Result<SolInterface, ImcError> {
        let (_url, iface) = self.get_serial_interface(server_id)?;
        Ok(SolInterface::from(&iface))
    }

    fn set_sol_interface(
        &self,
        server_id: u32,
        settings: &SolSettings,
    ) -> Result<SolInterface, ImcError> {
        let url = self.serial_interface_url(server_id)?;
        let ssh_port = match settings.ssh_port.as_deref() {
            Some(p) => Some(p.trim().parse::<u16>().map_err(|_| ImcError::InvalidValue {
                url: url.clone(),
                field: "ssh_port".to_string(),
                err: InvalidValueError(format!("Invalid ssh_port value: {p}")),
            })?),
            None => None,
        };
        let oem = if settings.comport.is_some() || ssh_port.is_some() {
            Some(SerialInterfaceOemUpdate {
                cisco: CiscoSerialInterfaceUpdate {
                    com_port: settings.comport,
                    ssh_port,
                },
            })
        } else {
            None
        };
        let update = SerialInterfaceUpdate {
            interface_enabled: settings.admin_state.is_enabled(),
            bit_rate: settings.speed,
            oem,
        };
        self.client.patch(&url, update)?;
        let (_, iface): (_, SerialInterface) = self.client.get(&url)?;
        Ok(SolInterface::from(&iface))
    }
}

// Natural order on the last path segment: TTY2 before TTY10.
fn interface_order(path: &str) -> (&str, Option<u64>, &str) {
    let id = path.trim_end_matches('/').rsplit('/').next().unwrap_or(path);
    let prefix = id.trim_end_matches(|c: char| c.is_ascii_digit());
    (prefix, id[prefix.len()..].parse().ok(), id)
}

impl From<&SerialInterface> for SolInterface {
    fn from(iface: &SerialInterface) -> Self {
        let cisco = iface.oem.as_ref().and_then(|o| o.cisco.as_ref());
        SolInterface {
            admin_state: iface.interface_enabled.unwrap_or(false).into(),
            speed: iface.bit_rate.clone(),
            comport: cisco.and_then(|c| c.com_port.clone()),
            ssh_port: cisco.and_then(|c| c.ssh_port).map(|p| p.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::EnabledDisabled;

    #[test]
    fn test_sol_interface_from_serial_interface() {
        let test_data = include_str!("model/testdata/serial_interface_cimc.json");
        let iface: SerialInterface = serde_json::from_str(test_data).unwrap();
        let sol = SolInterface::from(&iface);
        assert_eq!(sol.admin_state, EnabledDisabled::Enabled);
        assert_eq!(sol.speed.as_deref(), Some("115200"));
        assert_eq!(sol.comport.as_deref(), Some("com0"));
        assert_eq!(sol.ssh_port.as_deref(), Some("2400"));
    }

    #[test]
    fn test_interface_order_is_numeric() {
        let mut members = vec![
            "Managers/CIMC/SerialInterfaces/TTY10",
            "Managers/CIMC/SerialInterfaces/TTY2",
            "Managers/CIMC/SerialInterfaces/TTY0",
            "Managers/CIMC/SerialInterfaces/TTY1",
        ];
        members.sort_by(|a, b| interface_order(a).cmp(&interface_order(b)));
        assert_eq!(
            members,
            vec![
                "Managers/CIMC/SerialInterfaces/TTY0",
                "Managers/CIMC/SerialInterfaces/TTY1",
                "Managers/CIMC/SerialInterfaces/TTY2",
                "Managers/CIMC/SerialInterfaces/TTY10",
            ]
        );
    }

    #[test]
    fn test_sol_interface_without_oem_is_disabled() {
        let iface: SerialInterface = serde_json::from_str(
            r##"{"@odata.id": "/redfish/v1/Managers/CIMC/SerialInterfaces/TTY0",
                "@odata.type": "#SerialInterface.v1_1_1.SerialInterface",
                "Id": "TTY0"}"##,
        )
        .unwrap();
        let sol = SolInterface::from(&iface);
        assert_eq!(sol.admin_state, EnabledDisabled::Disabled);
        assert_eq!(sol.comport, None);
        assert_eq!(sol.ssh_port, None);
    }
}
