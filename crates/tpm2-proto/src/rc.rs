// SPDX-License-Identifier: MIT OR Apache-2.0

//! TPM 2.0 response code decoding
//!
//! Bit layout of a TPM_RC (TPM 2.0 Part 2, section 6.6):
//!
//! ```text
//!  31..24   23..16   15..12  11..8   7     6     5..0
//! reserved  layer      -       N    FMT1   P     E      (format one)
//! reserved  layer      -    W S T V  FMT1=0  number     (format zero, bits 6..0)
//! ```
//!
//! The layer is 0 for codes produced by the TPM itself. Software stacks put
//! their own identifier there.

use std::fmt;

/// Format-one marker (bit 7)
pub const RC_FMT1: u32 = 0x080;
/// Format one: the index in N names a parameter (bit 6)
pub const RC_P: u32 = 0x040;
/// Format zero: TPM 2.0 code rather than a TPM 1.2 code (bit 8)
pub const RC_VER1: u32 = 0x100;
/// Format zero: warning rather than error (bit 11)
pub const RC_WARN: u32 = 0x800;

const RC_FMT1_ERROR_MASK: u32 = 0x03F;
const RC_FMT0_NUMBER_MASK: u32 = 0x07F;
const RC_N_MASK: u32 = 0xF00;
const RC_N_SHIFT: u32 = 8;
const RC_LAYER_MASK: u32 = 0x00FF_0000;
const RC_LAYER_SHIFT: u32 = 16;

/// First N value that designates a session instead of a handle
const RC_N_SESSION_BASE: u8 = 8;

/// What a format-one error is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// Not tied to a particular handle, session or parameter (N = 0)
    Unspecified,
    Parameter(u8),
    Handle(u8),
    Session(u8),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Unspecified => write!(f, "unspecified"),
            Subject::Parameter(n) => write!(f, "parameter {}", n),
            Subject::Handle(n) => write!(f, "handle {}", n),
            Subject::Session(n) => write!(f, "session {}", n),
        }
    }
}

/// Format-one error numbers (the E field)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fmt1Error {
    Asymmetric,
    Attributes,
    Hash,
    Value,
    Hierarchy,
    KeySize,
    Mgf,
    Mode,
    Type,
    Handle,
    Kdf,
    Range,
    AuthFail,
    Nonce,
    Pp,
    Scheme,
    Size,
    Symmetric,
    Tag,
    Selector,
    Insufficient,
    Signature,
    Key,
    PolicyFail,
    Integrity,
    Ticket,
    ReservedBits,
    BadAuth,
    Expired,
    PolicyCc,
    Binding,
    Curve,
    EccPoint,
    Other(u8),
}

const FMT1_ERRORS: &[(u8, Fmt1Error, &str, &str)] = &[
    (0x01, Fmt1Error::Asymmetric, "TPM_RC_ASYMMETRIC", "asymmetric algorithm not supported or not correct"),
    (0x02, Fmt1Error::Attributes, "TPM_RC_ATTRIBUTES", "inconsistent attributes"),
    (0x03, Fmt1Error::Hash, "TPM_RC_HASH", "hash algorithm not supported or not appropriate"),
    (0x04, Fmt1Error::Value, "TPM_RC_VALUE", "value is out of range or is not correct for the context"),
    (0x05, Fmt1Error::Hierarchy, "TPM_RC_HIERARCHY", "hierarchy is not enabled or is not correct for the use"),
    (0x07, Fmt1Error::KeySize, "TPM_RC_KEY_SIZE", "key size is not supported"),
    (0x08, Fmt1Error::Mgf, "TPM_RC_MGF", "mask generation function not supported"),
    (0x09, Fmt1Error::Mode, "TPM_RC_MODE", "mode of operation not supported"),
    (0x0A, Fmt1Error::Type, "TPM_RC_TYPE", "the type of the value is not appropriate for the use"),
    (0x0B, Fmt1Error::Handle, "TPM_RC_HANDLE", "the handle is not correct for the use"),
    (0x0C, Fmt1Error::Kdf, "TPM_RC_KDF", "unsupported key derivation function or function not appropriate for use"),
    (0x0D, Fmt1Error::Range, "TPM_RC_RANGE", "value was out of allowed range"),
    (0x0E, Fmt1Error::AuthFail, "TPM_RC_AUTH_FAIL", "the authorization HMAC check failed and DA counter incremented"),
    (0x0F, Fmt1Error::Nonce, "TPM_RC_NONCE", "invalid nonce size or nonce value mismatch"),
    (0x10, Fmt1Error::Pp, "TPM_RC_PP", "authorization requires assertion of PP"),
    (0x12, Fmt1Error::Scheme, "TPM_RC_SCHEME", "unsupported or incompatible scheme"),
    (0x15, Fmt1Error::Size, "TPM_RC_SIZE", "structure is the wrong size"),
    (0x16, Fmt1Error::Symmetric, "TPM_RC_SYMMETRIC", "unsupported symmetric algorithm or key size, or not appropriate for instance"),
    (0x17, Fmt1Error::Tag, "TPM_RC_TAG", "incorrect structure tag"),
    (0x18, Fmt1Error::Selector, "TPM_RC_SELECTOR", "union selector is incorrect"),
    (0x1A, Fmt1Error::Insufficient, "TPM_RC_INSUFFICIENT", "the TPM was unable to unmarshal a value because there were not enough octets in the input buffer"),
    (0x1B, Fmt1Error::Signature, "TPM_RC_SIGNATURE", "the signature is not valid"),
    (0x1C, Fmt1Error::Key, "TPM_RC_KEY", "key fields are not compatible with the selected use"),
    (0x1D, Fmt1Error::PolicyFail, "TPM_RC_POLICY_FAIL", "a policy check failed"),
    (0x1F, Fmt1Error::Integrity, "TPM_RC_INTEGRITY", "integrity check failed"),
    (0x20, Fmt1Error::Ticket, "TPM_RC_TICKET", "invalid ticket"),
    (0x21, Fmt1Error::ReservedBits, "TPM_RC_RESERVED_BITS", "reserved bits not set to zero as required"),
    (0x22, Fmt1Error::BadAuth, "TPM_RC_BAD_AUTH", "authorization failure without DA implications"),
    (0x23, Fmt1Error::Expired, "TPM_RC_EXPIRED", "the policy has expired"),
    (0x24, Fmt1Error::PolicyCc, "TPM_RC_POLICY_CC", "the commandCode in the policy is not the commandCode of the command"),
    (0x25, Fmt1Error::Binding, "TPM_RC_BINDING", "public and sensitive portions of an object are not cryptographically bound"),
    (0x26, Fmt1Error::Curve, "TPM_RC_CURVE", "curve not supported"),
    (0x27, Fmt1Error::EccPoint, "TPM_RC_ECC_POINT", "point is not on the required curve"),
];

impl Fmt1Error {
    pub fn from_number(number: u8) -> Self {
        FMT1_ERRORS
            .iter()
            .find(|(n, ..)| *n == number)
            .map(|(_, error, ..)| *error)
            .unwrap_or(Fmt1Error::Other(number))
    }

    fn entry(&self) -> Option<&'static (u8, Fmt1Error, &'static str, &'static str)> {
        FMT1_ERRORS.iter().find(|(_, error, ..)| error == self)
    }

    pub fn name(&self) -> Option<&'static str> {
        self.entry().map(|(_, _, name, _)| *name)
    }

    pub fn description(&self) -> Option<&'static str> {
        self.entry().map(|(.., description)| *description)
    }
}

// Format-zero errors (RC_VER1 set, RC_WARN clear)
const FMT0_ERRORS: &[(u8, &str)] = &[
    (0x00, "TPM_RC_INITIALIZE"),
    (0x01, "TPM_RC_FAILURE"),
    (0x03, "TPM_RC_SEQUENCE"),
    (0x0B, "TPM_RC_PRIVATE"),
    (0x19, "TPM_RC_HMAC"),
    (0x20, "TPM_RC_DISABLED"),
    (0x21, "TPM_RC_EXCLUSIVE"),
    (0x24, "TPM_RC_AUTH_TYPE"),
    (0x25, "TPM_RC_AUTH_MISSING"),
    (0x26, "TPM_RC_POLICY"),
    (0x27, "TPM_RC_PCR"),
    (0x28, "TPM_RC_PCR_CHANGED"),
    (0x2D, "TPM_RC_UPGRADE"),
    (0x2E, "TPM_RC_TOO_MANY_CONTEXTS"),
    (0x2F, "TPM_RC_AUTH_UNAVAILABLE"),
    (0x30, "TPM_RC_REBOOT"),
    (0x31, "TPM_RC_UNBALANCED"),
    (0x42, "TPM_RC_COMMAND_SIZE"),
    (0x43, "TPM_RC_COMMAND_CODE"),
    (0x44, "TPM_RC_AUTHSIZE"),
    (0x45, "TPM_RC_AUTH_CONTEXT"),
    (0x46, "TPM_RC_NV_RANGE"),
    (0x47, "TPM_RC_NV_SIZE"),
    (0x48, "TPM_RC_NV_LOCKED"),
    (0x49, "TPM_RC_NV_AUTHORIZATION"),
    (0x4A, "TPM_RC_NV_UNINITIALIZED"),
    (0x4B, "TPM_RC_NV_SPACE"),
    (0x4C, "TPM_RC_NV_DEFINED"),
    (0x50, "TPM_RC_BAD_CONTEXT"),
    (0x51, "TPM_RC_CPHASH"),
    (0x52, "TPM_RC_PARENT"),
    (0x53, "TPM_RC_NEEDS_TEST"),
    (0x54, "TPM_RC_NO_RESULT"),
    (0x55, "TPM_RC_SENSITIVE"),
];

// Format-zero warnings (RC_VER1 and RC_WARN set)
const FMT0_WARNINGS: &[(u8, &str)] = &[
    (0x01, "TPM_RC_CONTEXT_GAP"),
    (0x02, "TPM_RC_OBJECT_MEMORY"),
    (0x03, "TPM_RC_SESSION_MEMORY"),
    (0x04, "TPM_RC_MEMORY"),
    (0x05, "TPM_RC_SESSION_HANDLES"),
    (0x06, "TPM_RC_OBJECT_HANDLES"),
    (0x07, "TPM_RC_LOCALITY"),
    (0x08, "TPM_RC_YIELDED"),
    (0x09, "TPM_RC_CANCELED"),
    (0x0A, "TPM_RC_TESTING"),
    (0x20, "TPM_RC_NV_RATE"),
    (0x21, "TPM_RC_LOCKOUT"),
    (0x22, "TPM_RC_RETRY"),
    (0x23, "TPM_RC_NV_UNAVAILABLE"),
];

fn lookup(table: &[(u8, &'static str)], number: u8) -> Option<&'static str> {
    table.iter().find(|(n, _)| *n == number).map(|(_, name)| *name)
}

/// Decoded form of a response code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RcKind {
    Success,
    /// Format one: an error tied to a handle, session or parameter
    Format1 { error: Fmt1Error, subject: Subject },
    /// Format zero TPM 2.0 error
    Error(u8),
    /// Format zero TPM 2.0 warning
    Warning(u8),
    /// Format zero without RC_VER1 (TPM 1.2 compatible code)
    Tpm12(u8),
    /// Produced by a software layer rather than the TPM
    Layer { layer: u8, code: u16 },
}

/// A TPM_RC together with its decoded fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseCode {
    raw: u32,
}

impl ResponseCode {
    pub fn new(raw: u32) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> u32 {
        self.raw
    }

    pub fn is_success(&self) -> bool {
        self.raw == crate::TPM_RC_SUCCESS
    }

    /// Software layer that produced the code (0 for the TPM)
    pub fn layer(&self) -> u8 {
        ((self.raw & RC_LAYER_MASK) >> RC_LAYER_SHIFT) as u8
    }

    pub fn kind(&self) -> RcKind {
        if self.is_success() {
            return RcKind::Success;
        }
        if self.layer() != 0 {
            return RcKind::Layer {
                layer: self.layer(),
                code: (self.raw & 0xFFFF) as u16,
            };
        }

        if self.raw & RC_FMT1 != 0 {
            let error = Fmt1Error::from_number((self.raw & RC_FMT1_ERROR_MASK) as u8);
            let n = ((self.raw & RC_N_MASK) >> RC_N_SHIFT) as u8;
            let subject = if self.raw & RC_P != 0 {
                Subject::Parameter(n)
            } else if n == 0 {
                Subject::Unspecified
            } else if n < RC_N_SESSION_BASE {
                Subject::Handle(n)
            } else {
                Subject::Session(n - RC_N_SESSION_BASE)
            };
            return RcKind::Format1 { error, subject };
        }

        let number = (self.raw & RC_FMT0_NUMBER_MASK) as u8;
        if self.raw & RC_VER1 == 0 {
            RcKind::Tpm12(number)
        } else if self.raw & RC_WARN != 0 {
            RcKind::Warning(number)
        } else {
            RcKind::Error(number)
        }
    }

    /// The format-one error if it is attached to the given parameter number
    pub fn parameter_error(&self, parameter: u8) -> Option<Fmt1Error> {
        match self.kind() {
            RcKind::Format1 {
                error,
                subject: Subject::Parameter(n),
            } if n == parameter => Some(error),
            _ => None,
        }
    }

    /// The `TPM_RC_*` mnemonic, when the code is one we know
    pub fn name(&self) -> Option<&'static str> {
        match self.kind() {
            RcKind::Success => Some("TPM_RC_SUCCESS"),
            RcKind::Format1 { error, .. } => error.name(),
            RcKind::Error(n) => lookup(FMT0_ERRORS, n),
            RcKind::Warning(n) => lookup(FMT0_WARNINGS, n),
            RcKind::Tpm12(0x1E) => Some("TPM_RC_BAD_TAG"),
            RcKind::Tpm12(_) | RcKind::Layer { .. } => None,
        }
    }
}

impl From<u32> for ResponseCode {
    fn from(raw: u32) -> Self {
        Self::new(raw)
    }
}

/// Name of a TSS software layer
fn layer_name(layer: u8) -> &'static str {
    match layer {
        6 => "feature",
        7 => "esapi",
        8 => "sys",
        9 => "mu",
        10 => "tcti",
        11 => "resmgr",
        12 => "resmgr-tpm",
        _ => "unknown layer",
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.raw)?;
        match self.kind() {
            RcKind::Format1 { error, subject } => match (error.name(), error.description()) {
                (Some(name), Some(description)) => {
                    write!(f, " ({}: {}, {})", name, description, subject)
                }
                _ => write!(f, " (format one error 0x{:02x}, {})", self.raw & RC_FMT1_ERROR_MASK, subject),
            },
            RcKind::Layer { layer, code } => {
                write!(f, " ({} layer 0x{:02x}, code 0x{:04x})", layer_name(layer), layer, code)
            }
            _ => match self.name() {
                Some(name) => write!(f, " ({})", name),
                None => write!(f, " (unknown response code)"),
            },
        }
    }
}
