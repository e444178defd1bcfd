// SPDX-License-Identifier: MIT OR Apache-2.0

//! Minimal TPM 2.0 protocol implementation
//!
//! Talks to a TPM through a [`Transport`] (character device or TCP simulator)
//! without any C dependencies. Based on the TPM 2.0 specification for the
//! command/response protocol.

use anyhow::{bail, Result};
use tracing::debug;

pub mod parms;
pub mod rc;
pub mod testparms;
pub mod transport;

// Re-export extension traits for convenience
pub use testparms::{QueryOutcome, TestParmsOps};

pub use parms::{
    AsymScheme, EccParms, KdfScheme, KeyedHashParms, KeyedHashScheme, ParameterTestRequest,
    PublicParms, RsaParms, SymCipherParms, SymDef,
};
pub use rc::{Fmt1Error, RcKind, ResponseCode, Subject};
pub use transport::{DeviceTransport, MssimTransport, Transport};

/// TPM 2.0 command codes
#[repr(u32)]
#[derive(Debug, Clone, Copy)]
pub enum TpmCc {
    TestParms = 0x0000018A,
}

/// TPM 2.0 structure tags
#[repr(u16)]
#[derive(Debug, Clone, Copy)]
pub enum TpmSt {
    NoSessions = 0x8001,
}

/// Response code of a successful command
pub const TPM_RC_SUCCESS: u32 = 0x000;

/// Size of the command and response headers (tag, size, code)
pub const HEADER_SIZE: usize = 10;

/// TPM 2.0 algorithm identifiers (TPM_ALG_ID)
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TpmAlg {
    Rsa = 0x0001,
    Sha1 = 0x0004,
    Hmac = 0x0005,
    Aes = 0x0006,
    Mgf1 = 0x0007,
    KeyedHash = 0x0008,
    Xor = 0x000A,
    Sha256 = 0x000B,
    Sha384 = 0x000C,
    Sha512 = 0x000D,
    Null = 0x0010,
    Sm3_256 = 0x0012,
    Sm4 = 0x0013,
    RsaSsa = 0x0014,
    RsaEs = 0x0015,
    RsaPss = 0x0016,
    Oaep = 0x0017,
    EcDsa = 0x0018,
    EcDh = 0x0019,
    EcDaa = 0x001A,
    Sm2 = 0x001B,
    EcSchnorr = 0x001C,
    Kdf1Sp800_56a = 0x0020,
    Kdf2 = 0x0021,
    Kdf1Sp800_108 = 0x0022,
    Ecc = 0x0023,
    SymCipher = 0x0025,
    Camellia = 0x0026,
    Sha3_256 = 0x0027,
    Sha3_384 = 0x0028,
    Sha3_512 = 0x0029,
    Ctr = 0x0040,
    Ofb = 0x0041,
    Cbc = 0x0042,
    Cfb = 0x0043,
    Ecb = 0x0044,
}

const ALGORITHMS: &[TpmAlg] = &[
    TpmAlg::Rsa,
    TpmAlg::Sha1,
    TpmAlg::Hmac,
    TpmAlg::Aes,
    TpmAlg::Mgf1,
    TpmAlg::KeyedHash,
    TpmAlg::Xor,
    TpmAlg::Sha256,
    TpmAlg::Sha384,
    TpmAlg::Sha512,
    TpmAlg::Null,
    TpmAlg::Sm3_256,
    TpmAlg::Sm4,
    TpmAlg::RsaSsa,
    TpmAlg::RsaEs,
    TpmAlg::RsaPss,
    TpmAlg::Oaep,
    TpmAlg::EcDsa,
    TpmAlg::EcDh,
    TpmAlg::EcDaa,
    TpmAlg::Sm2,
    TpmAlg::EcSchnorr,
    TpmAlg::Kdf1Sp800_56a,
    TpmAlg::Kdf2,
    TpmAlg::Kdf1Sp800_108,
    TpmAlg::Ecc,
    TpmAlg::SymCipher,
    TpmAlg::Camellia,
    TpmAlg::Sha3_256,
    TpmAlg::Sha3_384,
    TpmAlg::Sha3_512,
    TpmAlg::Ctr,
    TpmAlg::Ofb,
    TpmAlg::Cbc,
    TpmAlg::Cfb,
    TpmAlg::Ecb,
];

impl TpmAlg {
    /// Get the digest size in bytes for hash algorithms
    pub fn digest_size(&self) -> Option<usize> {
        match self {
            TpmAlg::Sha1 => Some(20),
            TpmAlg::Sha256 | TpmAlg::Sm3_256 | TpmAlg::Sha3_256 => Some(32),
            TpmAlg::Sha384 | TpmAlg::Sha3_384 => Some(48),
            TpmAlg::Sha512 | TpmAlg::Sha3_512 => Some(64),
            _ => None,
        }
    }

    pub fn is_hash(&self) -> bool {
        self.digest_size().is_some()
    }

    /// Block cipher usable in a TPMT_SYM_DEF_OBJECT
    pub fn is_sym_cipher(&self) -> bool {
        matches!(self, TpmAlg::Aes | TpmAlg::Camellia | TpmAlg::Sm4)
    }

    /// Block cipher mode (TPMI_ALG_SYM_MODE, NULL included)
    pub fn is_sym_mode(&self) -> bool {
        matches!(
            self,
            TpmAlg::Ctr | TpmAlg::Ofb | TpmAlg::Cbc | TpmAlg::Cfb | TpmAlg::Ecb | TpmAlg::Null
        )
    }

    /// Key derivation / mask generation scheme (TPMI_ALG_KDF, NULL excluded)
    pub fn is_kdf(&self) -> bool {
        matches!(
            self,
            TpmAlg::Mgf1 | TpmAlg::Kdf1Sp800_56a | TpmAlg::Kdf2 | TpmAlg::Kdf1Sp800_108
        )
    }

    /// Get the algorithm name as a string
    pub fn name(&self) -> &'static str {
        match self {
            TpmAlg::Rsa => "rsa",
            TpmAlg::Sha1 => "sha1",
            TpmAlg::Hmac => "hmac",
            TpmAlg::Aes => "aes",
            TpmAlg::Mgf1 => "mgf1",
            TpmAlg::KeyedHash => "keyedhash",
            TpmAlg::Xor => "xor",
            TpmAlg::Sha256 => "sha256",
            TpmAlg::Sha384 => "sha384",
            TpmAlg::Sha512 => "sha512",
            TpmAlg::Null => "null",
            TpmAlg::Sm3_256 => "sm3_256",
            TpmAlg::Sm4 => "sm4",
            TpmAlg::RsaSsa => "rsassa",
            TpmAlg::RsaEs => "rsaes",
            TpmAlg::RsaPss => "rsapss",
            TpmAlg::Oaep => "oaep",
            TpmAlg::EcDsa => "ecdsa",
            TpmAlg::EcDh => "ecdh",
            TpmAlg::EcDaa => "ecdaa",
            TpmAlg::Sm2 => "sm2",
            TpmAlg::EcSchnorr => "ecschnorr",
            TpmAlg::Kdf1Sp800_56a => "kdf1_sp800_56a",
            TpmAlg::Kdf2 => "kdf2",
            TpmAlg::Kdf1Sp800_108 => "kdf1_sp800_108",
            TpmAlg::Ecc => "ecc",
            TpmAlg::SymCipher => "symcipher",
            TpmAlg::Camellia => "camellia",
            TpmAlg::Sha3_256 => "sha3_256",
            TpmAlg::Sha3_384 => "sha3_384",
            TpmAlg::Sha3_512 => "sha3_512",
            TpmAlg::Ctr => "ctr",
            TpmAlg::Ofb => "ofb",
            TpmAlg::Cbc => "cbc",
            TpmAlg::Cfb => "cfb",
            TpmAlg::Ecb => "ecb",
        }
    }

    /// Look up an algorithm by its lowercase name
    pub fn from_name(name: &str) -> Option<Self> {
        ALGORITHMS.iter().copied().find(|alg| alg.name() == name)
    }

    /// Try to convert a u16 to a TpmAlg
    pub fn from_u16(val: u16) -> Option<Self> {
        ALGORITHMS.iter().copied().find(|alg| *alg as u16 == val)
    }
}

impl TryFrom<u16> for TpmAlg {
    type Error = ();

    fn try_from(val: u16) -> Result<Self, Self::Error> {
        Self::from_u16(val).ok_or(())
    }
}

/// ECC curve identifiers (TPM_ECC_CURVE)
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpmEccCurve {
    NistP192 = 0x0001,
    NistP224 = 0x0002,
    NistP256 = 0x0003,
    NistP384 = 0x0004,
    NistP521 = 0x0005,
    BnP256 = 0x0010,
    BnP638 = 0x0011,
    Sm2P256 = 0x0020,
}

impl TpmEccCurve {
    pub const ALL: [TpmEccCurve; 8] = [
        TpmEccCurve::NistP192,
        TpmEccCurve::NistP224,
        TpmEccCurve::NistP256,
        TpmEccCurve::NistP384,
        TpmEccCurve::NistP521,
        TpmEccCurve::BnP256,
        TpmEccCurve::BnP638,
        TpmEccCurve::Sm2P256,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TpmEccCurve::NistP192 => "nist_p192",
            TpmEccCurve::NistP224 => "nist_p224",
            TpmEccCurve::NistP256 => "nist_p256",
            TpmEccCurve::NistP384 => "nist_p384",
            TpmEccCurve::NistP521 => "nist_p521",
            TpmEccCurve::BnP256 => "bn_p256",
            TpmEccCurve::BnP638 => "bn_p638",
            TpmEccCurve::Sm2P256 => "sm2_p256",
        }
    }
}

/// TPM 2.0 command header
#[derive(Debug)]
struct TpmCommandHeader {
    tag: TpmSt,
    size: u32,
    code: TpmCc,
}

impl TpmCommandHeader {
    /// Create a new command header
    fn new(tag: TpmSt, size: u32, code: TpmCc) -> Self {
        Self { tag, size, code }
    }

    /// Serialize to bytes
    fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..2].copy_from_slice(&(self.tag as u16).to_be_bytes());
        bytes[2..6].copy_from_slice(&self.size.to_be_bytes());
        bytes[6..10].copy_from_slice(&(self.code as u32).to_be_bytes());
        bytes
    }
}

/// TPM 2.0 response header
#[derive(Debug)]
pub struct TpmResponseHeader {
    pub tag: u16,
    pub size: u32,
    pub code: u32,
}

impl TpmResponseHeader {
    /// Parse a response header from the front of a response buffer
    fn read(resp: &mut ResponseBuffer) -> Result<Self> {
        let tag = resp.read_u16()?;
        let size = resp.read_u32()?;
        let code = resp.read_u32()?;
        Ok(Self { tag, size, code })
    }
}

/// Helper for building TPM commands with big-endian serialization
pub(crate) struct CommandBuffer {
    data: Vec<u8>,
}

impl CommandBuffer {
    pub(crate) fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub(crate) fn write_u16(mut self, val: u16) -> Self {
        self.data.extend_from_slice(&val.to_be_bytes());
        self
    }

    pub(crate) fn write_u32(mut self, val: u32) -> Self {
        self.data.extend_from_slice(&val.to_be_bytes());
        self
    }

    pub(crate) fn write_bytes(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Take the marshaled bytes without a command header
    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub(crate) fn finalize(mut self, tag: TpmSt, code: TpmCc) -> Vec<u8> {
        let total_size = HEADER_SIZE + self.data.len();
        let header = TpmCommandHeader::new(tag, total_size as u32, code);
        let mut result = Vec::with_capacity(total_size);
        result.extend_from_slice(&header.to_bytes());
        result.append(&mut self.data);
        result
    }
}

/// Helper for parsing TPM responses
pub struct ResponseBuffer {
    data: Vec<u8>,
    offset: usize,
}

impl ResponseBuffer {
    fn new(data: Vec<u8>) -> Self {
        Self { data, offset: 0 }
    }

    fn read_u16(&mut self) -> Result<u16> {
        if self.offset + 2 > self.data.len() {
            bail!("Response buffer underflow");
        }
        let val = u16::from_be_bytes([self.data[self.offset], self.data[self.offset + 1]]);
        self.offset += 2;
        Ok(val)
    }

    fn read_u32(&mut self) -> Result<u32> {
        if self.offset + 4 > self.data.len() {
            bail!("Response buffer underflow");
        }
        let val = u32::from_be_bytes([
            self.data[self.offset],
            self.data[self.offset + 1],
            self.data[self.offset + 2],
            self.data[self.offset + 3],
        ]);
        self.offset += 4;
        Ok(val)
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }
}

/// A parsed response: the header's response code and the body after it
pub struct TpmResponse {
    pub code: u32,
    pub body: ResponseBuffer,
}

/// TPM 2.0 connection
pub struct Tpm {
    transport: Box<dyn Transport>,
}

impl Tpm {
    /// Open the TPM device (defaults to /dev/tpmrm0)
    pub fn open() -> Result<Self> {
        Self::open_path(transport::DEFAULT_DEVICE)
    }

    /// Open a specific TPM device path
    pub fn open_path(path: &str) -> Result<Self> {
        Ok(Self::with_transport(DeviceTransport::open(path)?))
    }

    /// Connect to a TPM simulator speaking the mssim TCP protocol
    pub fn connect_mssim(host: &str, port: u16) -> Result<Self> {
        Ok(Self::with_transport(MssimTransport::connect(host, port)?))
    }

    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
        }
    }

    /// Send a command and receive response
    ///
    /// Unlike a transport failure, a non-success response code is not an error
    /// here; callers decide what a given code means for their command.
    pub(crate) fn transmit(&mut self, command: &[u8]) -> Result<TpmResponse> {
        debug!(command = %hex::encode(command), "sending TPM command");

        let raw = self.transport.transceive(command)?;
        debug!(response = %hex::encode(&raw), "received TPM response");

        let mut resp = ResponseBuffer::new(raw);
        let header = TpmResponseHeader::read(&mut resp)?;

        if (header.size as usize) < HEADER_SIZE {
            bail!("Invalid TPM response size: {}", header.size);
        }
        if header.size as usize != resp.data.len() {
            bail!(
                "TPM response size mismatch: header says {} bytes, received {} bytes",
                header.size,
                resp.data.len()
            );
        }

        Ok(TpmResponse {
            code: header.code,
            body: resp,
        })
    }
}
