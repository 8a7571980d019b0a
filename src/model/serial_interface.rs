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
use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::{InvalidValueError, ODataId, ODataLinks};

/// Serial-over-LAN baud rate. Serialized as the decimal string the IMC uses,
/// but integers are accepted on input as well.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SolSpeed {
    B9600,
    B19200,
    B38400,
    B57600,
    B115200,
}

impl SolSpeed {
    pub fn as_str(self) -> &'static str {
        match self {
            SolSpeed::B9600 => "9600",
            SolSpeed::B19200 => "19200",
            SolSpeed::B38400 => "38400",
            SolSpeed::B57600 => "57600",
            SolSpeed::B115200 => "115200",
        }
    }
}

impl fmt::Display for SolSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SolSpeed {
    type Err = InvalidValueError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "9600" => Ok(Self::B9600),
            "19200" => Ok(Self::B19200),
            "38400" => Ok(Self::B38400),
            "57600" => Ok(Self::B57600),
            "115200" => Ok(Self::B115200),
            x => Err(InvalidValueError(format!(
                "Invalid speed value: {x}. Expected one of 9600, 19200, 38400, 57600, 115200"
            ))),
        }
    }
}

impl Serialize for SolSpeed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SolSpeed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = crate::model::StringOrInt::deserialize(deserializer)?;
        raw.into_string()
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// COM port on the server side that SOL redirects.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ComPort {
    Com0,
    Com1,
}

impl fmt::Display for ComPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComPort::Com0 => f.write_str("com0"),
            ComPort::Com1 => f.write_str("com1"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct SerialInterfaces {
    #[serde(flatten)]
    pub odata: ODataLinks,
    pub members: Vec<ODataId>,
    pub name: Option<String>,
}

/// Redfish SerialInterface resource as exposed by the CIMC.
/// BitRate and the OEM fields are kept raw so that values outside of what
/// we can set still parse.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct SerialInterface {
    #[serde(flatten)]
    pub odata: ODataLinks,
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub interface_enabled: Option<bool>,
    pub bit_rate: Option<String>,
    pub oem: Option<SerialInterfaceOem>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct SerialInterfaceOem {
    pub cisco: Option<CiscoSerialInterface>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct CiscoSerialInterface {
    pub com_port: Option<String>,
    #[serde(rename = "SSHPort")]
    pub ssh_port: Option<u16>,
}

/// PATCH body for a SerialInterface. Fields left as None are not sent.
#[derive(Debug, Default, Serialize, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SerialInterfaceUpdate {
    pub interface_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<SolSpeed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oem: Option<SerialInterfaceOemUpdate>,
}

#[derive(Debug, Default, Serialize, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SerialInterfaceOemUpdate {
    pub cisco: CiscoSerialInterfaceUpdate,
}

#[derive(Debug, Default, Serialize, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CiscoSerialInterfaceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub com_port: Option<ComPort>,
    #[serde(rename = "SSHPort", skip_serializing_if = "Option::is_none")]
    pub ssh_port: Option<u16>,
}
