// SPDX-License-Identifier: MIT OR Apache-2.0

//! tpm2_testparms
//!
//! Asks the TPM whether it supports an algorithm specification, without
//! creating an object. Exits 0 when supported, 2 when the TPM rejects the
//! parameters, and 1 for anything else.

use anyhow::{bail, Context, Result};
use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing::{debug, error};

use tpm2_proto::{ParameterTestRequest, TestParmsOps};

mod config;
mod diagnose;

use config::{Tcti, TCTI_ENV};
use diagnose::{diagnose, Diagnosis, EXIT_FAILURE};

#[derive(Parser, Debug)]
#[command(name = "tpm2_testparms")]
#[command(about = "Check if the TPM supports an algorithm specification", version)]
struct Cli {
    #[command(flatten)]
    verbosity: Verbosity<WarnLevel>,

    /// TPM connection: device[:PATH], mssim[:host=HOST,port=PORT] or swtpm[:...]
    #[arg(short = 'T', long, env = TCTI_ENV, default_value_t = Tcti::default())]
    tcti: Tcti,

    /// Algorithm specification, e.g. rsa2048:rsassa:aes128cfb, ecc256, hmac-sha256
    #[arg(value_name = "ALG_SPEC")]
    specs: Vec<String>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_FAILURE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_max_level(cli.verbosity.tracing_level_filter())
        .init();

    match run(&cli) {
        Ok(diagnosis) => {
            diagnosis.report();
            ExitCode::from(diagnosis.exit_code())
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Parse, build, query, decode. Each stage stops the run on failure, and the
/// TPM is not contacted until the specification has parsed.
fn run(cli: &Cli) -> Result<Diagnosis> {
    let spec = match cli.specs.as_slice() {
        [spec] => spec,
        specs => bail!("Expected one algorithm specification, got: {}", specs.len()),
    };

    let parms = tpm2_algspec::parse(spec)
        .with_context(|| format!("Invalid or unsupported by the tool : {}", spec))?;
    debug!(?parms, "parsed algorithm specification");

    let request = ParameterTestRequest::build(&parms);

    let mut tpm = cli.tcti.open()?;
    let outcome = tpm.test_parms(&request)?;
    debug!(?outcome, "TPM2_TestParms returned");

    Ok(diagnose(&outcome))
}
