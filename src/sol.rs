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
//! Serial-over-LAN operations on a server managed by an IMC.

use serde::Serialize;
use tracing::{debug, info};

use crate::model::{ComPort, EnabledDisabled, SolSpeed};
use crate::{Imc, ImcError};

/// Current SOL settings of a server, as reported by the IMC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolInterface {
    pub admin_state: EnabledDisabled,
    pub speed: Option<String>,
    pub comport: Option<String>,
    pub ssh_port: Option<String>,
}

/// Values written to the IMC. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolSettings {
    pub admin_state: EnabledDisabled,
    pub speed: Option<SolSpeed>,
    pub comport: Option<ComPort>,
    pub ssh_port: Option<String>,
}

/// The SOL tuning parameters a caller asked for, plus the server they apply to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<SolSpeed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comport: Option<ComPort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_port: Option<String>,
    pub server_id: u32,
}

impl Default for SolParams {
    fn default() -> Self {
        SolParams {
            speed: None,
            comport: None,
            ssh_port: None,
            server_id: 1,
        }
    }
}

impl SolParams {
    /// Is SOL enabled, and does every parameter that was given match?
    /// `server_id` only selects the interface.
    pub fn matches(&self, current: &SolInterface) -> bool {
        if !current.admin_state.is_enabled() {
            return false;
        }
        if let Some(speed) = self.speed {
            if current.speed.as_deref() != Some(speed.as_str()) {
                return false;
            }
        }
        if let Some(comport) = self.comport {
            if current.comport.as_deref() != Some(comport.to_string().as_str()) {
                return false;
            }
        }
        if let Some(ssh_port) = &self.ssh_port {
            if !same_port(current.ssh_port.as_deref(), ssh_port) {
                return false;
            }
        }
        true
    }

    fn settings(&self, admin_state: EnabledDisabled) -> SolSettings {
        SolSettings {
            admin_state,
            speed: self.speed,
            comport: self.comport,
            ssh_port: self.ssh_port.clone(),
        }
    }
}

// Ports compare as numbers when both sides parse, so "022" matches 22.
fn same_port(current: Option<&str>, wanted: &str) -> bool {
    let Some(current) = current.map(str::trim) else {
        return false;
    };
    match (current.parse::<u16>(), wanted.trim().parse::<u16>()) {
        (Ok(c), Ok(w)) => c == w,
        _ => current == wanted.trim(),
    }
}

/// Returns whether SOL is enabled with the given parameters, and the current settings.
pub fn sol_exists(
    handle: &dyn Imc,
    params: &SolParams,
) -> Result<(bool, SolInterface), ImcError> {
    let current = handle.get_sol_interface(params.server_id)?;
    let exists = params.matches(&current);
    debug!(
        "SOL on server {}: {:?}, requested {:?}, match {}",
        params.server_id, current, params, exists
    );
    Ok((exists, current))
}

/// Enables SOL and applies the given parameters. Unset parameters keep their current value.
pub fn sol_enable(handle: &dyn Imc, params: &SolParams) -> Result<SolInterface, ImcError> {
    info!("Enabling SOL on server {}", params.server_id);
    handle.set_sol_interface(params.server_id, &params.settings(EnabledDisabled::Enabled))
}

/// Disables SOL on `server_id`. Callers that do not pick a server pass the
/// default, server 1.
pub fn sol_disable(handle: &dyn Imc, server_id: u32) -> Result<SolInterface, ImcError> {
    info!("Disabling SOL on server {server_id}");
    let settings = SolParams {
        server_id,
        ..Default::default()
    }
    .settings(EnabledDisabled::Disabled);
    handle.set_sol_interface(server_id, &settings)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fake::FakeImc;

    fn enabled(speed: &str, comport: &str, ssh_port: &str) -> SolInterface {
        SolInterface {
            admin_state: EnabledDisabled::Enabled,
            speed: Some(speed.to_string()),
            comport: Some(comport.to_string()),
            ssh_port: Some(ssh_port.to_string()),
        }
    }

    #[test]
    fn test_matches_requires_enabled() {
        let mut current = enabled("115200", "com0", "22");
        assert!(SolParams::default().matches(&current));
        current.admin_state = EnabledDisabled::Disabled;
        assert!(!SolParams::default().matches(&current));
    }

    #[test]
    fn test_matches_only_given_params() {
        let current = enabled("9600", "com1", "2400");
        let params = SolParams {
            speed: Some(SolSpeed::B9600),
            ..Default::default()
        };
        assert!(params.matches(&current));

        let params = SolParams {
            speed: Some(SolSpeed::B9600),
            comport: Some(ComPort::Com0),
            ..Default::default()
        };
        assert!(!params.matches(&current));

        let params = SolParams {
            ssh_port: Some("2400".to_string()),
            ..Default::default()
        };
        assert!(params.matches(&current));

        let params = SolParams {
            ssh_port: Some("22".to_string()),
            ..Default::default()
        };
        assert!(!params.matches(&current));

        let params = SolParams {
            ssh_port: Some("02400".to_string()),
            ..Default::default()
        };
        assert!(params.matches(&current));
    }

    #[test]
    fn test_sol_enable_sends_only_given_params() {
        let imc = FakeImc::new(SolInterface {
            admin_state: EnabledDisabled::Disabled,
            speed: Some("9600".to_string()),
            comport: Some("com1".to_string()),
            ssh_port: None,
        });
        let params = SolParams {
            speed: Some(SolSpeed::B115200),
            ..Default::default()
        };
        let after = sol_enable(&imc, &params).unwrap();
        assert_eq!(after.admin_state, EnabledDisabled::Enabled);
        assert_eq!(after.speed.as_deref(), Some("115200"));
        assert_eq!(after.comport.as_deref(), Some("com1"));

        let calls = imc.calls();
        assert_eq!(calls.sets.len(), 1);
        let (server_id, settings) = &calls.sets[0];
        assert_eq!(*server_id, 1);
        assert_eq!(settings.comport, None);
        assert_eq!(settings.ssh_port, None);
    }

    #[test]
    fn test_sol_disable_targets_server() {
        let imc = FakeImc::new(enabled("115200", "com0", "22"));
        let after = sol_disable(&imc, 2).unwrap();
        assert_eq!(after.admin_state, EnabledDisabled::Disabled);
        let calls = imc.calls();
        assert_eq!(calls.sets.len(), 1);
        assert_eq!(calls.sets[0].0, 2);
        assert_eq!(
            calls.sets[0].1,
            SolSettings {
                admin_state: EnabledDisabled::Disabled,
                speed: None,
                comport: None,
                ssh_port: None,
            }
        );
    }

    #[test]
    fn test_sol_exists_propagates_errors() {
        let imc = FakeImc::new(enabled("115200", "com0", "22")).fail_queries("boom");
        let err = sol_exists(&imc, &SolParams::default()).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
