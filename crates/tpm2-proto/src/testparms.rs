// SPDX-License-Identifier: MIT OR Apache-2.0

//! TPM2_TestParms
//!
//! Asks the TPM whether it would accept a parameter set, without creating
//! anything. The command takes no handles and no authorization.

use anyhow::{bail, Result};
use tracing::debug;

use crate::parms::ParameterTestRequest;
use crate::rc::ResponseCode;
use crate::Tpm;

/// What the TPM said about a parameter set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Success,
    Failure(ResponseCode),
}

/// Extension trait for the parameter capability probe
pub trait TestParmsOps {
    /// Send one TPM2_TestParms command
    ///
    /// A rejection by the TPM is an `Ok(QueryOutcome::Failure)`. Only a broken
    /// transport or malformed response is an `Err`.
    fn test_parms(&mut self, request: &ParameterTestRequest) -> Result<QueryOutcome>;
}

impl TestParmsOps for Tpm {
    fn test_parms(&mut self, request: &ParameterTestRequest) -> Result<QueryOutcome> {
        debug!(object_type = request.object_type().name(), "TPM2_TestParms");

        let resp = self.transmit(&request.to_command())?;
        let code = ResponseCode::new(resp.code);
        if !code.is_success() {
            return Ok(QueryOutcome::Failure(code));
        }

        if resp.body.remaining() != 0 {
            bail!(
                "Unexpected {} trailing bytes in TPM2_TestParms response",
                resp.body.remaining()
            );
        }

        Ok(QueryOutcome::Success)
    }
}
