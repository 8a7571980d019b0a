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
//! In-memory IMC used by the unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::connection::SessionInfo;
use crate::network::Endpoint;
use crate::sol::{SolInterface, SolSettings};
use crate::{Connector, Imc, ImcError};

#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub logins: usize,
    pub logouts: usize,
    pub gets: usize,
    pub sets: Vec<(u32, SolSettings)>,
    pub starship_url: Option<String>,
    pub starship_cookies: HashMap<String, String>,
}

struct FakeState {
    sol: SolInterface,
    calls: Calls,
    query_error: Option<String>,
    login_error: Option<String>,
    logout_error: Option<String>,
}

/// Clones share state, so a test can keep one and hand another out boxed.
#[derive(Clone)]
pub struct FakeImc {
    state: Arc<Mutex<FakeState>>,
}

impl FakeImc {
    pub fn new(sol: SolInterface) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                sol,
                calls: Calls::default(),
                query_error: None,
                login_error: None,
                logout_error: None,
            })),
        }
    }

    pub fn fail_queries(self, msg: &str) -> Self {
        self.lock().query_error = Some(msg.to_string());
        self
    }

    pub fn fail_login(self, msg: &str) -> Self {
        self.lock().login_error = Some(msg.to_string());
        self
    }

    pub fn fail_logout(self, msg: &str) -> Self {
        self.lock().logout_error = Some(msg.to_string());
        self
    }

    pub fn calls(&self) -> Calls {
        self.lock().calls.clone()
    }

    pub fn sol(&self) -> SolInterface {
        self.lock().sol.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

impl Imc for FakeImc {
    fn login(&mut self) -> Result<(), ImcError> {
        let mut state = self.lock();
        state.calls.logins += 1;
        match &state.login_error {
            Some(error) => Err(ImcError::GenericError {
                error: error.clone(),
            }),
            None => Ok(()),
        }
    }

    fn logout(&mut self) -> Result<(), ImcError> {
        let mut state = self.lock();
        state.calls.logouts += 1;
        match &state.logout_error {
            Some(error) => Err(ImcError::GenericError {
                error: error.clone(),
            }),
            None => Ok(()),
        }
    }

    fn set_starship_proxy(&mut self, url: &str) {
        self.lock().calls.starship_url = Some(url.to_string());
    }

    fn set_starship_headers(&mut self, cookies: HashMap<String, String>) {
        self.lock().calls.starship_cookies = cookies;
    }

    fn get_sol_interface(&self, _server_id: u32) -> Result<SolInterface, ImcError> {
        let mut state = self.lock();
        state.calls.gets += 1;
        match &state.query_error {
            Some(error) => Err(ImcError::GenericError {
                error: error.clone(),
            }),
            None => Ok(state.sol.clone()),
        }
    }

    fn set_sol_interface(
        &self,
        server_id: u32,
        settings: &SolSettings,
    ) -> Result<SolInterface, ImcError> {
        let mut state = self.lock();
        state.calls.sets.push((server_id, settings.clone()));
        state.sol.admin_state = settings.admin_state;
        if let Some(speed) = settings.speed {
            state.sol.speed = Some(speed.to_string());
        }
        if let Some(comport) = settings.comport {
            state.sol.comport = Some(comport.to_string());
        }
        if let Some(ssh_port) = &settings.ssh_port {
            state.sol.ssh_port = Some(ssh_port.clone());
        }
        Ok(state.sol.clone())
    }
}

/// Hands out clones of one FakeImc and remembers how it was asked for them.
#[derive(Clone)]
pub struct FakeConnector {
    pub imc: FakeImc,
    pub endpoints: Arc<Mutex<Vec<Endpoint>>>,
    pub attached: Arc<Mutex<Vec<String>>>,
}

impl FakeConnector {
    pub fn new(imc: FakeImc) -> Self {
        Self {
            imc,
            endpoints: Arc::default(),
            attached: Arc::default(),
        }
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.lock().unwrap().clone()
    }

    pub fn attached(&self) -> Vec<String> {
        self.attached.lock().unwrap().clone()
    }
}

impl Connector for FakeConnector {
    fn create_handle(&self, endpoint: Endpoint) -> Result<Box<dyn Imc>, ImcError> {
        self.endpoints.lock().unwrap().push(endpoint);
        Ok(Box::new(self.imc.clone()))
    }

    fn attach(&self, session: SessionInfo) -> Result<Box<dyn Imc>, ImcError> {
        self.attached.lock().unwrap().push(session.ip);
        Ok(Box::new(self.imc.clone()))
    }
}
