// SPDX-License-Identifier: MIT OR Apache-2.0

//! Public-area parameter sets (TPMT_PUBLIC_PARMS) and their marshaling

use crate::{CommandBuffer, TpmAlg, TpmCc, TpmEccCurve, TpmSt};

/// TPMT_SYM_DEF_OBJECT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymDef {
    Null,
    Cipher {
        algorithm: TpmAlg,
        key_bits: u16,
        mode: TpmAlg,
    },
}

/// TPMT_RSA_SCHEME / TPMT_ECC_SCHEME
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsymScheme {
    Null,
    /// Schemes whose details are just a hash (RSASSA, RSAPSS, OAEP, ECDSA,
    /// ECDH, ECSCHNORR, SM2)
    Hashed { scheme: TpmAlg, hash: TpmAlg },
    RsaEs,
    EcDaa { hash: TpmAlg, count: u16 },
}

impl AsymScheme {
    pub fn algorithm(&self) -> TpmAlg {
        match self {
            AsymScheme::Null => TpmAlg::Null,
            AsymScheme::Hashed { scheme, .. } => *scheme,
            AsymScheme::RsaEs => TpmAlg::RsaEs,
            AsymScheme::EcDaa { .. } => TpmAlg::EcDaa,
        }
    }
}

/// TPMT_KDF_SCHEME
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfScheme {
    Null,
    Scheme { scheme: TpmAlg, hash: TpmAlg },
}

/// TPMT_KEYEDHASH_SCHEME
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyedHashScheme {
    Null,
    Hmac { hash: TpmAlg },
    Xor { hash: TpmAlg, kdf: TpmAlg },
}

/// TPMS_RSA_PARMS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RsaParms {
    pub symmetric: SymDef,
    pub scheme: AsymScheme,
    pub key_bits: u16,
    /// 0 selects the default exponent 2^16 + 1
    pub exponent: u32,
}

/// TPMS_ECC_PARMS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EccParms {
    pub symmetric: SymDef,
    pub scheme: AsymScheme,
    pub curve: TpmEccCurve,
    pub kdf: KdfScheme,
}

/// TPMS_KEYEDHASH_PARMS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyedHashParms {
    pub scheme: KeyedHashScheme,
}

/// TPMS_SYMCIPHER_PARMS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymCipherParms {
    pub sym: SymDef,
}

/// Candidate parameter set for one object type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicParms {
    Rsa(RsaParms),
    Ecc(EccParms),
    KeyedHash(KeyedHashParms),
    SymCipher(SymCipherParms),
}

impl PublicParms {
    /// The TPMI_ALG_PUBLIC selector for this parameter set
    pub fn object_type(&self) -> TpmAlg {
        match self {
            PublicParms::Rsa(_) => TpmAlg::Rsa,
            PublicParms::Ecc(_) => TpmAlg::Ecc,
            PublicParms::KeyedHash(_) => TpmAlg::KeyedHash,
            PublicParms::SymCipher(_) => TpmAlg::SymCipher,
        }
    }
}

impl CommandBuffer {
    fn write_sym_def(self, sym: &SymDef) -> Self {
        match sym {
            SymDef::Null => self.write_u16(TpmAlg::Null as u16),
            SymDef::Cipher {
                algorithm,
                key_bits,
                mode,
            } => self
                .write_u16(*algorithm as u16)
                .write_u16(*key_bits)
                .write_u16(*mode as u16),
        }
    }

    fn write_asym_scheme(self, scheme: &AsymScheme) -> Self {
        let buf = self.write_u16(scheme.algorithm() as u16);
        match scheme {
            AsymScheme::Null | AsymScheme::RsaEs => buf,
            AsymScheme::Hashed { hash, .. } => buf.write_u16(*hash as u16),
            AsymScheme::EcDaa { hash, count } => buf.write_u16(*hash as u16).write_u16(*count),
        }
    }

    fn write_kdf_scheme(self, kdf: &KdfScheme) -> Self {
        match kdf {
            KdfScheme::Null => self.write_u16(TpmAlg::Null as u16),
            KdfScheme::Scheme { scheme, hash } => {
                self.write_u16(*scheme as u16).write_u16(*hash as u16)
            }
        }
    }

    fn write_keyed_hash_scheme(self, scheme: &KeyedHashScheme) -> Self {
        match scheme {
            KeyedHashScheme::Null => self.write_u16(TpmAlg::Null as u16),
            KeyedHashScheme::Hmac { hash } => self
                .write_u16(TpmAlg::Hmac as u16)
                .write_u16(*hash as u16),
            KeyedHashScheme::Xor { hash, kdf } => self
                .write_u16(TpmAlg::Xor as u16)
                .write_u16(*hash as u16)
                .write_u16(*kdf as u16),
        }
    }

    /// Write the TPMU_PUBLIC_PARMS arm selected by the object type
    fn write_public_parms(self, parms: &PublicParms) -> Self {
        match parms {
            PublicParms::Rsa(rsa) => self
                .write_sym_def(&rsa.symmetric)
                .write_asym_scheme(&rsa.scheme)
                .write_u16(rsa.key_bits)
                .write_u32(rsa.exponent),
            PublicParms::Ecc(ecc) => self
                .write_sym_def(&ecc.symmetric)
                .write_asym_scheme(&ecc.scheme)
                .write_u16(ecc.curve as u16)
                .write_kdf_scheme(&ecc.kdf),
            PublicParms::KeyedHash(keyed) => self.write_keyed_hash_scheme(&keyed.scheme),
            PublicParms::SymCipher(cipher) => self.write_sym_def(&cipher.sym),
        }
    }
}

/// A TPM2_TestParms request: the object type and its marshaled parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterTestRequest {
    object_type: TpmAlg,
    parameters: Vec<u8>,
}

impl ParameterTestRequest {
    /// Copy the type tag and the fields of that type into wire form
    pub fn build(parms: &PublicParms) -> Self {
        Self {
            object_type: parms.object_type(),
            parameters: CommandBuffer::new().write_public_parms(parms).into_inner(),
        }
    }

    pub fn object_type(&self) -> TpmAlg {
        self.object_type
    }

    /// Marshaled TPMU_PUBLIC_PARMS
    pub fn parameters(&self) -> &[u8] {
        &self.parameters
    }

    /// Full TPM2_TestParms command: no handles, no sessions, one TPMT_PUBLIC_PARMS
    pub fn to_command(&self) -> Vec<u8> {
        CommandBuffer::new()
            .write_u16(self.object_type as u16)
            .write_bytes(&self.parameters)
            .finalize(TpmSt::NoSessions, TpmCc::TestParms)
    }
}

impl From<&PublicParms> for ParameterTestRequest {
    fn from(parms: &PublicParms) -> Self {
        Self::build(parms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aes128cfb() -> SymDef {
        SymDef::Cipher {
            algorithm: TpmAlg::Aes,
            key_bits: 128,
            mode: TpmAlg::Cfb,
        }
    }

    #[test]
    fn test_rsa_layout() {
        let parms = PublicParms::Rsa(RsaParms {
            symmetric: aes128cfb(),
            scheme: AsymScheme::Hashed {
                scheme: TpmAlg::RsaSsa,
                hash: TpmAlg::Sha256,
            },
            key_bits: 2048,
            exponent: 0,
        });
        let request = ParameterTestRequest::build(&parms);
        assert_eq!(request.object_type(), TpmAlg::Rsa);
        assert_eq!(
            request.parameters(),
            &[
                0x00, 0x06, 0x00, 0x80, 0x00, 0x43, // aes 128 cfb
                0x00, 0x14, 0x00, 0x0B, // rsassa sha256
                0x08, 0x00, // 2048
                0x00, 0x00, 0x00, 0x00, // exponent
            ]
        );
    }

    #[test]
    fn test_rsaes_and_null_schemes_carry_no_details() {
        let rsaes = PublicParms::Rsa(RsaParms {
            symmetric: SymDef::Null,
            scheme: AsymScheme::RsaEs,
            key_bits: 3072,
            exponent: 0,
        });
        assert_eq!(
            ParameterTestRequest::build(&rsaes).parameters(),
            &[0x00, 0x10, 0x00, 0x15, 0x0C, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_ecc_layout() {
        let parms = PublicParms::Ecc(EccParms {
            symmetric: SymDef::Null,
            scheme: AsymScheme::EcDaa {
                hash: TpmAlg::Sha256,
                count: 4,
            },
            curve: TpmEccCurve::BnP256,
            kdf: KdfScheme::Scheme {
                scheme: TpmAlg::Kdf2,
                hash: TpmAlg::Sha384,
            },
        });
        assert_eq!(
            ParameterTestRequest::build(&parms).parameters(),
            &[
                0x00, 0x10, // symmetric null
                0x00, 0x1A, 0x00, 0x0B, 0x00, 0x04, // ecdaa sha256 count 4
                0x00, 0x10, // bn p256
                0x00, 0x21, 0x00, 0x0C, // kdf2 sha384
            ]
        );
    }

    #[test]
    fn test_keyed_hash_layouts() {
        let hmac = PublicParms::KeyedHash(KeyedHashParms {
            scheme: KeyedHashScheme::Hmac {
                hash: TpmAlg::Sha256,
            },
        });
        assert_eq!(
            ParameterTestRequest::build(&hmac).parameters(),
            &[0x00, 0x05, 0x00, 0x0B]
        );

        let xor = PublicParms::KeyedHash(KeyedHashParms {
            scheme: KeyedHashScheme::Xor {
                hash: TpmAlg::Sha1,
                kdf: TpmAlg::Kdf1Sp800_108,
            },
        });
        assert_eq!(
            ParameterTestRequest::build(&xor).parameters(),
            &[0x00, 0x0A, 0x00, 0x04, 0x00, 0x22]
        );

        let sealed = PublicParms::KeyedHash(KeyedHashParms {
            scheme: KeyedHashScheme::Null,
        });
        assert_eq!(ParameterTestRequest::build(&sealed).parameters(), &[0x00, 0x10]);
    }

    #[test]
    fn test_test_parms_command() {
        let parms = PublicParms::SymCipher(SymCipherParms { sym: aes128cfb() });
        let command = ParameterTestRequest::from(&parms).to_command();
        assert_eq!(
            command,
            vec![
                0x80, 0x01, // TPM_ST_NO_SESSIONS
                0x00, 0x00, 0x00, 0x12, // size 18
                0x00, 0x00, 0x01, 0x8A, // TPM_CC_TestParms
                0x00, 0x25, // TPM_ALG_SYMCIPHER
                0x00, 0x06, 0x00, 0x80, 0x00, 0x43,
            ]
        );
    }
}
