// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turning a TPM2_TestParms outcome into something a user can act on

use std::fmt;
use tpm2_proto::{Fmt1Error, QueryOutcome, ResponseCode};
use tracing::{error, info};

pub const EXIT_SUPPORTED: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_UNSUPPORTED: u8 = 2;

/// TPM2_TestParms has a single parameter, the TPMT_PUBLIC_PARMS
const PARMS_PARAMETER: u8 = 1;

const SUPPORTED_MESSAGE: &str = "Algorithm specification is supported";
const GENERIC_MESSAGE: &str = "Unsupported algorithm specification";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnosis {
    Supported,
    /// The TPM rejected the parameter set
    Unsupported(&'static str),
    /// The command failed for a reason unrelated to the parameter set
    Failed(ResponseCode),
}

/// Message for a format-one error reported against the parameter set
pub fn reason_message(error: Fmt1Error) -> &'static str {
    match error {
        Fmt1Error::Curve => "Specified elliptic curve is unsupported",
        Fmt1Error::Hash => "Specified hash is unsupported",
        Fmt1Error::Scheme => "Specified signing scheme is unsupported or incompatible",
        Fmt1Error::Kdf => "Specified key derivation function is unsupported",
        Fmt1Error::Mgf => "Specified mask generation function is unsupported",
        Fmt1Error::KeySize => "Specified key size is unsupported",
        Fmt1Error::Symmetric => "Specified symmetric algorithm or key length is unsupported",
        Fmt1Error::Asymmetric => "Specified asymmetric algorithm is unsupported",
        Fmt1Error::Mode => "Specified symmetric mode unsupported",
        _ => GENERIC_MESSAGE,
    }
}

pub fn diagnose(outcome: &QueryOutcome) -> Diagnosis {
    match outcome {
        QueryOutcome::Success => Diagnosis::Supported,
        QueryOutcome::Failure(code) => match code.parameter_error(PARMS_PARAMETER) {
            Some(error) => Diagnosis::Unsupported(reason_message(error)),
            None => Diagnosis::Failed(*code),
        },
    }
}

impl Diagnosis {
    pub fn exit_code(&self) -> u8 {
        match self {
            Diagnosis::Supported => EXIT_SUPPORTED,
            Diagnosis::Unsupported(_) => EXIT_UNSUPPORTED,
            Diagnosis::Failed(_) => EXIT_FAILURE,
        }
    }

    /// Log the diagnosis at the level its outcome deserves
    pub fn report(&self) {
        match self {
            Diagnosis::Supported => info!("{}", self),
            Diagnosis::Unsupported(_) | Diagnosis::Failed(_) => error!("{}", self),
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnosis::Supported => f.write_str(SUPPORTED_MESSAGE),
            Diagnosis::Unsupported(message) => f.write_str(message),
            Diagnosis::Failed(code) => write!(f, "TPM2_TestParms failed: {}", code),
        }
    }
}
