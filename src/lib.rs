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

pub mod cimc;
pub mod connection;
mod error;
pub mod model;
pub mod module;
pub mod network;
pub mod sol;

#[cfg(test)]
mod fake;

pub use cimc::Cimc;
pub use connection::{ConnectionParams, ImcConnection, LoginMode, SessionInfo, StarshipOptions};
pub use error::ImcError;
pub use model::{ComPort, EnabledDisabled, SolSpeed};
pub use module::{configure, run, setup, ModuleArgs, ModuleResult, ResultStatus, SolArgs, SolState};
pub use network::{Endpoint, ImcClientPool, ImcClientPoolBuilder, REDFISH_ENDPOINT};
pub use sol::{sol_disable, sol_enable, sol_exists, SolInterface, SolParams, SolSettings};

/// Interface to a Cisco IMC session. Everything except the starship setters
/// makes one or more network calls.
pub trait Imc: Send {
    /// Authenticate and open a session.
    fn login(&mut self) -> Result<(), ImcError>;

    /// Close the session opened by `login`. Does nothing if there is none.
    fn logout(&mut self) -> Result<(), ImcError>;

    /// Send every request to this starship proxy URL instead of the IMC.
    fn set_starship_proxy(&mut self, url: &str);

    /// Cookies attached to every request sent through the starship proxy.
    fn set_starship_headers(&mut self, cookies: HashMap<String, String>);

    /// Current SOL settings of a server (1-based index).
    fn get_sol_interface(&self, server_id: u32) -> Result<SolInterface, ImcError>;

    /// Apply SOL settings to a server, returning the settings now in effect.
    fn set_sol_interface(
        &self,
        server_id: u32,
        settings: &SolSettings,
    ) -> Result<SolInterface, ImcError>;
}

/// Builds handles. Implemented by `ImcClientPool`.
pub trait Connector {
    /// A handle for the endpoint. Not logged in, nothing is sent yet.
    fn create_handle(&self, endpoint: Endpoint) -> Result<Box<dyn Imc>, ImcError>;

    /// A handle riding on a session somebody else opened.
    fn attach(&self, session: SessionInfo) -> Result<Box<dyn Imc>, ImcError>;
}
