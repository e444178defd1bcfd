// SPDX-License-Identifier: MIT OR Apache-2.0

//! TPM connection configuration
//!
//! Uses the tpm2-tools TCTI string convention: `<name>[:<conf>]`, for example
//! `device:/dev/tpm0` or `mssim:host=127.0.0.1,port=2321`.

use anyhow::{anyhow, bail, Context, Result};
use std::fmt;
use std::str::FromStr;
use tpm2_proto::transport::{DEFAULT_DEVICE, DEFAULT_MSSIM_HOST, DEFAULT_MSSIM_PORT};
use tpm2_proto::Tpm;
use tracing::debug;

/// Environment variable consulted when no `--tcti` is given
pub const TCTI_ENV: &str = "TPM2TOOLS_TCTI";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tcti {
    Device { path: String },
    Mssim { host: String, port: u16 },
}

impl Default for Tcti {
    fn default() -> Self {
        Tcti::Device {
            path: DEFAULT_DEVICE.to_string(),
        }
    }
}

impl Tcti {
    /// Open the connection this configuration describes
    pub fn open(&self) -> Result<Tpm> {
        debug!(tcti = %self, "opening TPM connection");
        match self {
            Tcti::Device { path } => Tpm::open_path(path),
            Tcti::Mssim { host, port } => Tpm::connect_mssim(host, *port),
        }
    }

    fn parse_mssim(conf: &str) -> Result<Self> {
        let mut host = DEFAULT_MSSIM_HOST.to_string();
        let mut port = DEFAULT_MSSIM_PORT;

        for option in conf.split(',').filter(|option| !option.is_empty()) {
            let (key, value) = option
                .split_once('=')
                .ok_or_else(|| anyhow!("Expected key=value in TCTI options, got \"{}\"", option))?;
            match key {
                "host" => host = value.to_string(),
                "port" => {
                    port = value
                        .parse()
                        .with_context(|| format!("Invalid TCTI port \"{}\"", value))?
                }
                _ => bail!("Unknown TCTI option \"{}\"", key),
            }
        }

        Ok(Tcti::Mssim { host, port })
    }
}

impl FromStr for Tcti {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, conf) = s.split_once(':').unwrap_or((s, ""));
        match name {
            "device" => Ok(Tcti::Device {
                path: if conf.is_empty() {
                    DEFAULT_DEVICE.to_string()
                } else {
                    conf.to_string()
                },
            }),
            "mssim" | "swtpm" => Self::parse_mssim(conf),
            _ => bail!("Unsupported TCTI \"{}\" (expected device, mssim or swtpm)", name),
        }
    }
}

impl fmt::Display for Tcti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tcti::Device { path } => write!(f, "device:{}", path),
            Tcti::Mssim { host, port } => write!(f, "mssim:host={},port={}", host, port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_tcti() {
        assert_eq!("device".parse::<Tcti>().unwrap(), Tcti::default());
        assert_eq!(
            "device:/dev/tpm0".parse::<Tcti>().unwrap(),
            Tcti::Device {
                path: "/dev/tpm0".into()
            }
        );
    }

    #[test]
    fn test_mssim_tcti() {
        assert_eq!(
            "mssim".parse::<Tcti>().unwrap(),
            Tcti::Mssim {
                host: "localhost".into(),
                port: 2321
            }
        );
        assert_eq!(
            "swtpm:host=10.0.0.1,port=2421".parse::<Tcti>().unwrap(),
            Tcti::Mssim {
                host: "10.0.0.1".into(),
                port: 2421
            }
        );
        assert_eq!(
            "mssim:port=4000".parse::<Tcti>().unwrap(),
            Tcti::Mssim {
                host: "localhost".into(),
                port: 4000
            }
        );
    }

    #[test]
    fn test_display_round_trips() {
        for tcti in [
            Tcti::default(),
            Tcti::Mssim {
                host: "127.0.0.1".into(),
                port: 2321,
            },
        ] {
            assert_eq!(tcti.to_string().parse::<Tcti>().unwrap(), tcti);
        }
    }

    #[test]
    fn test_bad_tcti() {
        assert!("tabrmd".parse::<Tcti>().is_err());
        assert!("mssim:port=notaport".parse::<Tcti>().is_err());
        assert!("mssim:port".parse::<Tcti>().is_err());
        assert!("mssim:path=/tmp".parse::<Tcti>().is_err());
    }
}
