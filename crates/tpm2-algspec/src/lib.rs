// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compact algorithm specifications
//!
//! Turns strings such as `rsa2048:rsassa-sha256:aes128cfb`, `ecc384:ecdsa`,
//! `aes256ctr` or `hmac-sha384` into the [`PublicParms`] a TPM would be asked
//! about.
//!
//! # Grammar
//!
//! ```text
//! spec      = object *( ":" field )
//! object    = "rsa" [bits] | "ecc" [curve] | sym | "hmac" ["-" hash]
//!           | "xor" ["-" hash] | "keyedhash"
//! sym       = ("aes" | "camellia" | "sm4") ["128" | "192" | "256"] [mode]
//! field     = scheme | sym | "null" | kdf            ; rsa: scheme, sym
//!                                                   ; ecc: scheme, sym, kdf
//! ```
//!
//! Matching is case-insensitive. Each field may appear once, in any order;
//! a token goes to the first field that accepts it and is still empty, so
//! `rsa:null:null` sets the scheme and then the symmetric definition.
//!
//! RSA key sizes are not restricted here. Everything else (curves, cipher key
//! lengths, modes, hashes, schemes, KDFs) must be in the registry.

use tpm2_proto::{
    AsymScheme, EccParms, KdfScheme, KeyedHashParms, KeyedHashScheme, PublicParms, RsaParms,
    SymCipherParms, SymDef, TpmAlg, TpmEccCurve,
};

pub mod error;

pub use error::AlgSpecError;
use error::unknown;

const DEFAULT_RSA_BITS: u16 = 2048;
const DEFAULT_SYM_BITS: u16 = 128;
const DEFAULT_HASH: TpmAlg = TpmAlg::Sha256;
const DEFAULT_MODE: TpmAlg = TpmAlg::Cfb;

const SYM_CIPHERS: [TpmAlg; 3] = [TpmAlg::Aes, TpmAlg::Camellia, TpmAlg::Sm4];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFamily {
    Rsa,
    Ecc,
}

impl KeyFamily {
    fn name(&self) -> &'static str {
        match self {
            KeyFamily::Rsa => "rsa",
            KeyFamily::Ecc => "ecc",
        }
    }
}

/// Optional fields after the object token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Scheme,
    Symmetric,
    Kdf,
}

const RSA_FIELDS: &[Field] = &[Field::Scheme, Field::Symmetric];
const ECC_FIELDS: &[Field] = &[Field::Scheme, Field::Symmetric, Field::Kdf];

/// The object token, before optional fields are applied
#[derive(Debug, Clone, Copy)]
enum Object {
    Rsa { key_bits: u16 },
    Ecc { curve: TpmEccCurve },
    KeyedHash(KeyedHashScheme),
    SymCipher(SymDef),
}

impl Object {
    fn name(&self) -> &'static str {
        match self {
            Object::Rsa { .. } => "rsa",
            Object::Ecc { .. } => "ecc",
            Object::KeyedHash(_) => "keyedhash",
            Object::SymCipher(_) => "symcipher",
        }
    }

    fn fields(&self) -> &'static [Field] {
        match self {
            Object::Rsa { .. } => RSA_FIELDS,
            Object::Ecc { .. } => ECC_FIELDS,
            Object::KeyedHash(_) | Object::SymCipher(_) => &[],
        }
    }

    fn family(&self) -> Option<KeyFamily> {
        match self {
            Object::Rsa { .. } => Some(KeyFamily::Rsa),
            Object::Ecc { .. } => Some(KeyFamily::Ecc),
            _ => None,
        }
    }
}

enum Placement {
    Stored,
    Taken,
    NotThisKind,
}

#[derive(Debug, Default)]
struct Fields {
    scheme: Option<AsymScheme>,
    symmetric: Option<SymDef>,
    kdf: Option<KdfScheme>,
}

impl Fields {
    fn place(
        &mut self,
        field: Field,
        token: &str,
        family: Option<KeyFamily>,
    ) -> Result<Placement, AlgSpecError> {
        match field {
            Field::Scheme => {
                let Some((scheme, scheme_family)) = parse_scheme(token)? else {
                    return Ok(Placement::NotThisKind);
                };
                if self.scheme.is_some() {
                    return Ok(Placement::Taken);
                }
                if let (Some(wanted), Some(actual)) = (family, scheme_family) {
                    if wanted != actual {
                        return Err(AlgSpecError::IncompatibleScheme {
                            object: wanted.name(),
                            scheme: token.to_string(),
                        });
                    }
                }
                self.scheme = Some(scheme);
            }
            Field::Symmetric => {
                let Some(sym) = parse_sym_def(token)? else {
                    return Ok(Placement::NotThisKind);
                };
                if self.symmetric.is_some() {
                    return Ok(Placement::Taken);
                }
                self.symmetric = Some(sym);
            }
            Field::Kdf => {
                let Some(kdf) = parse_kdf(token)? else {
                    return Ok(Placement::NotThisKind);
                };
                if self.kdf.is_some() {
                    return Ok(Placement::Taken);
                }
                self.kdf = Some(kdf);
            }
        }
        Ok(Placement::Stored)
    }
}

/// Parse an algorithm specification into a candidate parameter set
pub fn parse(descriptor: &str) -> Result<PublicParms, AlgSpecError> {
    let descriptor = descriptor.trim().to_ascii_lowercase();
    if descriptor.is_empty() {
        return Err(AlgSpecError::Empty);
    }

    let mut tokens = descriptor.split(':');
    let object = match tokens.next() {
        Some(token) if !token.is_empty() => parse_object(token)?,
        _ => return Err(unknown("")),
    };

    let mut fields = Fields::default();
    for token in tokens {
        if token.is_empty() {
            return Err(unknown(token));
        }

        let mut recognized = false;
        let mut stored = false;
        for field in object.fields() {
            match fields.place(*field, token, object.family())? {
                Placement::Stored => {
                    stored = true;
                    break;
                }
                Placement::Taken => recognized = true,
                Placement::NotThisKind => {}
            }
        }

        if !stored {
            if recognized || object.fields().is_empty() {
                return Err(AlgSpecError::TooManyFields {
                    object: object.name(),
                    field: token.to_string(),
                });
            }
            return Err(unknown(token));
        }
    }

    Ok(finish(object, fields))
}

fn finish(object: Object, fields: Fields) -> PublicParms {
    let symmetric = fields.symmetric.unwrap_or(SymDef::Null);
    let scheme = fields.scheme.unwrap_or(AsymScheme::Null);

    match object {
        Object::Rsa { key_bits } => PublicParms::Rsa(RsaParms {
            symmetric,
            scheme,
            key_bits,
            exponent: 0,
        }),
        Object::Ecc { curve } => PublicParms::Ecc(EccParms {
            symmetric,
            scheme,
            curve,
            kdf: fields.kdf.unwrap_or(KdfScheme::Null),
        }),
        Object::KeyedHash(scheme) => PublicParms::KeyedHash(KeyedHashParms { scheme }),
        Object::SymCipher(sym) => PublicParms::SymCipher(SymCipherParms { sym }),
    }
}

fn parse_object(token: &str) -> Result<Object, AlgSpecError> {
    if let Some(bits) = token.strip_prefix("rsa") {
        let key_bits = if bits.is_empty() {
            DEFAULT_RSA_BITS
        } else if bits.bytes().all(|b| b.is_ascii_digit()) {
            bits.parse().map_err(|_| unknown(bits))?
        } else {
            return Err(unknown(bits));
        };
        return Ok(Object::Rsa { key_bits });
    }

    if let Some(curve) = token.strip_prefix("ecc") {
        return Ok(Object::Ecc {
            curve: parse_curve(curve)?,
        });
    }

    if token == "keyedhash" {
        return Ok(Object::KeyedHash(KeyedHashScheme::Null));
    }

    let (base, hash) = split_hash(token);
    match base {
        "hmac" => {
            return Ok(Object::KeyedHash(KeyedHashScheme::Hmac {
                hash: parse_hash(hash)?,
            }))
        }
        "xor" => {
            return Ok(Object::KeyedHash(KeyedHashScheme::Xor {
                hash: parse_hash(hash)?,
                kdf: TpmAlg::Kdf1Sp800_108,
            }))
        }
        _ => {}
    }

    match parse_sym_def(token)? {
        Some(sym @ SymDef::Cipher { .. }) => Ok(Object::SymCipher(sym)),
        _ => Err(unknown(token)),
    }
}

fn parse_curve(suffix: &str) -> Result<TpmEccCurve, AlgSpecError> {
    let curve = match suffix {
        "" | "256" => TpmEccCurve::NistP256,
        "192" => TpmEccCurve::NistP192,
        "224" => TpmEccCurve::NistP224,
        "384" => TpmEccCurve::NistP384,
        "521" => TpmEccCurve::NistP521,
        "bn256" | "_bn256" => TpmEccCurve::BnP256,
        "bn638" | "_bn638" => TpmEccCurve::BnP638,
        "sm2" | "_sm2" | "sm2_256" | "_sm2_256" => TpmEccCurve::Sm2P256,
        other => {
            let name = other.trim_start_matches('_');
            return TpmEccCurve::ALL
                .iter()
                .copied()
                .find(|curve| curve.name() == name)
                .ok_or_else(|| unknown(suffix));
        }
    };
    Ok(curve)
}

/// Split `name-hash` into its parts
fn split_hash(token: &str) -> (&str, Option<&str>) {
    match token.split_once('-') {
        Some((base, hash)) => (base, Some(hash)),
        None => (token, None),
    }
}

fn parse_hash(hash: Option<&str>) -> Result<TpmAlg, AlgSpecError> {
    match hash {
        None => Ok(DEFAULT_HASH),
        Some(name) => TpmAlg::from_name(name)
            .filter(TpmAlg::is_hash)
            .ok_or_else(|| unknown(name)),
    }
}

/// `null` or `<cipher>[bits][mode]`
fn parse_sym_def(token: &str) -> Result<Option<SymDef>, AlgSpecError> {
    if token == "null" {
        return Ok(Some(SymDef::Null));
    }

    let Some((algorithm, rest)) = SYM_CIPHERS
        .iter()
        .find_map(|alg| token.strip_prefix(alg.name()).map(|rest| (*alg, rest)))
    else {
        return Ok(None);
    };

    let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let (bits, mode) = rest.split_at(digits);

    let key_bits = match bits {
        "" => DEFAULT_SYM_BITS,
        "128" => 128,
        "192" => 192,
        "256" => 256,
        _ => return Err(unknown(token)),
    };
    if algorithm == TpmAlg::Sm4 && key_bits != 128 {
        return Err(unknown(token));
    }

    let mode = if mode.is_empty() {
        DEFAULT_MODE
    } else {
        TpmAlg::from_name(mode)
            .filter(TpmAlg::is_sym_mode)
            .ok_or_else(|| unknown(token))?
    };

    Ok(Some(SymDef::Cipher {
        algorithm,
        key_bits,
        mode,
    }))
}

/// Signing or encryption scheme, with the key family it belongs to
/// (`None` for `null`, which fits both)
fn parse_scheme(token: &str) -> Result<Option<(AsymScheme, Option<KeyFamily>)>, AlgSpecError> {
    if token == "null" {
        return Ok(Some((AsymScheme::Null, None)));
    }

    let (base, hash) = split_hash(token);
    let family = match base {
        "rsassa" | "rsapss" | "oaep" => KeyFamily::Rsa,
        "ecdsa" | "ecdh" | "ecschnorr" | "sm2" => KeyFamily::Ecc,
        "rsaes" => {
            if hash.is_some() {
                return Err(unknown(token));
            }
            return Ok(Some((AsymScheme::RsaEs, Some(KeyFamily::Rsa))));
        }
        _ => {
            let Some(count) = base.strip_prefix("ecdaa") else {
                return Ok(None);
            };
            let count = if count.is_empty() {
                0
            } else if count.bytes().all(|b| b.is_ascii_digit()) {
                count.parse().map_err(|_| unknown(token))?
            } else {
                return Err(unknown(token));
            };
            let scheme = AsymScheme::EcDaa {
                hash: parse_hash(hash)?,
                count,
            };
            return Ok(Some((scheme, Some(KeyFamily::Ecc))));
        }
    };

    let scheme = TpmAlg::from_name(base).ok_or_else(|| unknown(base))?;
    Ok(Some((
        AsymScheme::Hashed {
            scheme,
            hash: parse_hash(hash)?,
        },
        Some(family),
    )))
}

/// `null` or `<kdf>[-hash]`
fn parse_kdf(token: &str) -> Result<Option<KdfScheme>, AlgSpecError> {
    if token == "null" {
        return Ok(Some(KdfScheme::Null));
    }

    let (base, hash) = split_hash(token);
    let Some(scheme) = TpmAlg::from_name(base).filter(TpmAlg::is_kdf) else {
        return Ok(None);
    };
    Ok(Some(KdfScheme::Scheme {
        scheme,
        hash: parse_hash(hash)?,
    }))
}
