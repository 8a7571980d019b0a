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

/* cisco_imc_sol: enable or disable Serial over LAN on a Cisco IMC server.
 *
 * As an automation binary module: ./cisco_imc_sol /path/to/args.json
 *   The file holds the module arguments, optionally wrapped in ANSIBLE_MODULE_ARGS.
 * By hand: ./cisco_imc_sol -H 10.153.145.103 -U admin -P password -s present --speed 115200
 *   The password can come from IMC_PASSWORD instead of -P.
 * Prints one JSON result on stdout, exits 1 on failure.
 * Run with `-v` for more output on stderr.
 */

use std::{fs, path::Path, process::ExitCode, time::Duration};

use anyhow::{anyhow, Context};
use imcsol::{Connector, ImcClientPool, ImcClientPoolBuilder, ModuleArgs, ModuleResult};
use serde_json::{json, Map, Value};
use tracing::error;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::prelude::*;

const USAGE: &str = "cisco_imc_sol ARGS_FILE | cisco_imc_sol -H imc_ip -U user -P pass [options]";
const PASSWORD_ENV: &str = "IMC_PASSWORD";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let opts = options();
    let args_given = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => return finish(ModuleResult::error(e.to_string())),
    };
    if args_given.opt_present("h") {
        eprintln!("{}", opts.usage(USAGE));
        return ExitCode::SUCCESS;
    }
    init_logging(args_given.opt_present("v"));

    let module_args = match module_args(&args_given) {
        Ok(a) => a,
        Err(e) => return finish(ModuleResult::error(format!("{e:#}"))),
    };
    let pool_builder = match client_pool(&args_given) {
        Ok(b) => b,
        Err(e) => return finish(ModuleResult::error(format!("{e:#}"))),
    };
    let connector: Option<Box<dyn Connector>> = match pool_builder.build() {
        Ok(pool) => Some(Box::new(pool)),
        Err(e) => {
            error!("{e}");
            None
        }
    };
    finish(imcsol::run(module_args, connector))
}

fn options() -> getopts::Options {
    let mut opts = getopts::Options::new();
    opts.optflag("h", "help", "Print this help");
    opts.optflag("v", "verbose", "Log at DEBUG level. Default is INFO");
    opts.optopt("H", "hostname", "Hostname or IP address of the IMC", "HOST");
    opts.optopt("U", "username", "IMC username. Default admin", "USER");
    opts.optopt("P", "password", "IMC password", "PASS");
    opts.optopt("", "port", "IMC port", "PORT");
    opts.optflag("", "insecure-http", "Talk plain HTTP instead of HTTPS");
    opts.optopt("", "proxy", "HTTP(S) proxy to reach the IMC through", "URL");
    opts.optopt("", "starship-url", "Route requests through this starship proxy", "URL");
    opts.optmulti("", "cookie", "Starship cookie, may be repeated", "NAME=VALUE");
    opts.optopt("s", "state", "present or absent. Default present", "STATE");
    opts.optopt("", "speed", "9600, 19200, 38400, 57600 or 115200", "BAUD");
    opts.optopt("", "comport", "com0 or com1", "PORT");
    opts.optopt("", "ssh-port", "SSH port for the SOL console", "PORT");
    opts.optopt("", "server-id", "Server index on multi-server chassis. Default 1", "ID");
    opts.optflag("C", "check", "Report what would change without changing it");
    opts.optflag("", "verify-certs", "Reject IMC certificates that do not verify");
    opts.optopt("", "timeout", "Per request timeout in seconds. Default 20", "SECS");
    opts
}

fn init_logging(verbose: bool) {
    let log_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let mut env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();
    for noisy in ["hyper=warn", "reqwest=warn", "rustls=warn"] {
        if let Ok(directive) = noisy.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }
    // stdout carries the result
    tracing_subscriber::registry()
        .with(Layer::default().compact().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn finish(result: ModuleResult) -> ExitCode {
    match serde_json::to_string(&result) {
        Ok(s) => println!("{s}"),
        Err(e) => println!("{}", json!({"failed": true, "msg": e.to_string()})),
    }
    if result.is_failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn client_pool(args_given: &getopts::Matches) -> Result<ImcClientPoolBuilder, anyhow::Error> {
    let mut builder = ImcClientPool::builder();
    if args_given.opt_present("verify-certs") {
        builder = builder.reject_invalid_certs();
    }
    if let Some(secs) = args_given.opt_str("timeout") {
        let secs: u64 = secs
            .parse()
            .with_context(|| format!("invalid --timeout {secs}"))?;
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder)
}

fn module_args(args_given: &getopts::Matches) -> Result<ModuleArgs, anyhow::Error> {
    let value = match args_given.free.first() {
        Some(path) => read_args_file(Path::new(path))?,
        None => args_from_flags(args_given, std::env::var(PASSWORD_ENV).ok())?,
    };
    Ok(ModuleArgs::from_value(value)?)
}

fn read_args_file(path: &Path) -> Result<Value, anyhow::Error> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading module arguments from {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("parsing module arguments in {}", path.display()))
}

fn args_from_flags(
    args_given: &getopts::Matches,
    env_password: Option<String>,
) -> Result<Value, anyhow::Error> {
    let starship_url = args_given.opt_str("starship-url");
    if !args_given.opt_present("H") && starship_url.is_none() {
        return Err(anyhow!("an arguments file, -H or --starship-url is required"));
    }

    let mut map = Map::new();
    for (opt, key) in [
        ("H", "imc_ip"),
        ("U", "imc_username"),
        ("port", "imc_port"),
        ("proxy", "imc_proxy"),
        ("s", "state"),
        ("speed", "speed"),
        ("comport", "comport"),
        ("ssh-port", "ssh_port"),
        ("server-id", "server_id"),
    ] {
        if let Some(v) = args_given.opt_str(opt) {
            map.insert(key.to_string(), Value::String(v));
        }
    }
    if let Some(password) = args_given.opt_str("P").or(env_password) {
        map.insert("imc_password".to_string(), Value::String(password));
    }
    if args_given.opt_present("insecure-http") {
        map.insert("imc_secure".to_string(), Value::Bool(false));
    }
    if args_given.opt_present("C") {
        map.insert("_ansible_check_mode".to_string(), Value::Bool(true));
    }
    if let Some(url) = starship_url {
        let mut cookies = Map::new();
        for c in args_given.opt_strs("cookie") {
            let (name, value) = c
                .split_once('=')
                .ok_or_else(|| anyhow!("invalid cookie {c}, expected NAME=VALUE"))?;
            cookies.insert(name.to_string(), Value::String(value.to_string()));
        }
        map.insert(
            "starship_options".to_string(),
            json!({"url": url, "cookies": cookies}),
        );
    }
    Ok(Value::Object(map))
}
