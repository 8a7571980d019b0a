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
//! The `cisco_imc_sol` module: bring SOL on one server to the requested state.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::connection::{ConnectionParams, ImcConnection};
use crate::model::{ComPort, SolSpeed, StringOrInt};
use crate::sol::{sol_disable, sol_enable, sol_exists, SolParams};
use crate::{Connector, Imc, ImcError};

pub const MODULE_NAME: &str = "cisco_imc_sol";

const DEFAULT_SERVER_ID: u32 = 1;
const CHECK_MODE_KEY: &str = "_ansible_check_mode";
const FRAMEWORK_KEY_PREFIX: &str = "_ansible_";
const WRAPPED_ARGS_KEY: &str = "ANSIBLE_MODULE_ARGS";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolState {
    /// Enable and configure SOL
    #[default]
    Present,
    /// Disable SOL
    Absent,
}

/// Desired SOL configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SolArgs {
    #[serde(default)]
    pub state: SolState,
    pub speed: Option<SolSpeed>,
    pub comport: Option<ComPort>,
    /// Canonical decimal form, e.g. "022" is stored as "22".
    #[serde(default, deserialize_with = "deserialize_ssh_port")]
    pub ssh_port: Option<String>,
    #[serde(
        default = "default_server_id",
        deserialize_with = "deserialize_server_id"
    )]
    pub server_id: u32,
}

impl Default for SolArgs {
    fn default() -> Self {
        SolArgs {
            state: SolState::Present,
            speed: None,
            comport: None,
            ssh_port: None,
            server_id: DEFAULT_SERVER_ID,
        }
    }
}

impl SolArgs {
    pub const KEYS: &'static [&'static str] =
        &["state", "speed", "comport", "ssh_port", "server_id"];

    pub fn params(&self) -> SolParams {
        SolParams {
            speed: self.speed,
            comport: self.comport,
            ssh_port: self.ssh_port.clone(),
            server_id: self.server_id,
        }
    }
}

/// Everything one invocation is given.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleArgs {
    #[serde(flatten)]
    pub sol: SolArgs,
    #[serde(flatten)]
    pub connection: ConnectionParams,
    #[serde(rename = "_ansible_check_mode", default)]
    pub check_mode: bool,
}

impl ModuleArgs {
    /// Validates and parses module arguments. Accepts the bare argument object or
    /// one wrapped in `ANSIBLE_MODULE_ARGS`. Framework keys (`_ansible_*`) are
    /// dropped except check mode; any other unknown key is an error.
    pub fn from_value(value: Value) -> Result<Self, ImcError> {
        let mut map = match value {
            Value::Object(m) => m,
            other => {
                return Err(ImcError::InvalidArguments(format!(
                    "module arguments must be a JSON object, got {other}"
                )))
            }
        };
        if let Some(Value::Object(inner)) = map.remove(WRAPPED_ARGS_KEY) {
            map = inner;
        }
        map.retain(|k, _| !k.starts_with(FRAMEWORK_KEY_PREFIX) || k == CHECK_MODE_KEY);

        let mut unsupported: Vec<&str> = map
            .keys()
            .map(String::as_str)
            .filter(|k| {
                *k != CHECK_MODE_KEY
                    && !SolArgs::KEYS.contains(k)
                    && !ConnectionParams::KEYS.contains(k)
            })
            .collect();
        if !unsupported.is_empty() {
            unsupported.sort_unstable();
            return Err(ImcError::InvalidArguments(format!(
                "Unsupported parameters for ({MODULE_NAME}) module: {}",
                unsupported.join(", ")
            )));
        }
        serde_json::from_value(Value::Object(map))
            .map_err(|e| ImcError::InvalidArguments(format!("argument error: {e}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Ok,
    Error,
}

/// What the module reports back. Built fresh for every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleResult {
    pub changed: bool,
    pub msg: String,
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
}

impl ModuleResult {
    pub fn ok(changed: bool) -> Self {
        ModuleResult {
            changed,
            msg: String::new(),
            status: ResultStatus::Ok,
            failed: false,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        ModuleResult {
            changed: false,
            msg: msg.into(),
            status: ResultStatus::Error,
            failed: true,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }
}

/// Brings SOL to the desired state. Returns whether anything changed, or in
/// check mode whether anything would change. Check mode never writes.
pub fn configure(
    handle: &dyn Imc,
    desired: &SolArgs,
    check_mode: bool,
) -> Result<bool, ImcError> {
    let params = desired.params();
    let (exists, _current) = sol_exists(handle, &params)?;

    match desired.state {
        SolState::Present => {
            if check_mode || exists {
                if exists {
                    info!("SOL already configured on server {}", params.server_id);
                }
                return Ok(!exists);
            }
            sol_enable(handle, &params)?;
        }
        SolState::Absent => {
            if check_mode || !exists {
                if !exists {
                    info!("SOL already absent on server {}", params.server_id);
                }
                return Ok(exists);
            }
            sol_disable(handle, params.server_id)?;
        }
    }
    Ok(true)
}

/// Runs `configure` and turns any failure into an error result.
pub fn setup(handle: &dyn Imc, desired: &SolArgs, check_mode: bool) -> ModuleResult {
    match configure(handle, desired, check_mode) {
        Ok(changed) => ModuleResult::ok(changed),
        Err(e) => ModuleResult::error(format!("setup error: {e}")),
    }
}

/// One whole invocation: connect, configure, disconnect.
pub fn run(args: ModuleArgs, connector: Option<Box<dyn Connector>>) -> ModuleResult {
    let ModuleArgs {
        sol,
        connection,
        check_mode,
    } = args;

    let mut conn = match ImcConnection::new(connection, connector) {
        Ok(c) => c,
        Err(e) => return ModuleResult::error(e.to_string()),
    };
    let result = match conn.login() {
        Ok(handle) => setup(handle, &sol, check_mode),
        Err(e) => return ModuleResult::error(e.to_string()),
    };
    if let Err(e) = conn.logout() {
        warn!("Logout failed: {e}");
    }
    result
}

fn default_server_id() -> u32 {
    DEFAULT_SERVER_ID
}

fn deserialize_ssh_port<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<StringOrInt>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.into_string();
    match raw.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(Some(port.to_string())),
        _ => Err(serde::de::Error::custom(format!(
            "invalid ssh_port: {raw}, must be an integer between 1 and 65535"
        ))),
    }
}

fn deserialize_server_id<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<StringOrInt>::deserialize(deserializer)? else {
        return Ok(DEFAULT_SERVER_ID);
    };
    let raw = raw.into_string();
    match raw.trim().parse::<u32>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(serde::de::Error::custom(format!(
            "invalid server_id: {raw}, must be an integer >= 1"
        ))),
    }
}
