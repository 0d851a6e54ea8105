use minicbor::{data::Type, Decoder};
use semver::Version;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use thiserror::Error;

const IPFS_HASH_SIZE: usize = 34;
const SWARM_HASH_SIZE: usize = 32;
/// Largest metadata map accepted by [`Metadata::from_cbor`].
pub const MAX_METADATA_ENTRIES: u64 = 8;

/// Compiler version stored under the "solc" key.
///
/// Release builds encode it as three bytes, prereleases as the full string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SolcVersion {
    Release(Version),
    Prerelease(String),
}

impl Display for SolcVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SolcVersion::Release(version) => write!(f, "{version}"),
            SolcVersion::Prerelease(version) => write!(f, "{version}"),
        }
    }
}

impl Serialize for SolcVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A decoded metadata record appended by solc to the deployed bytecode.
///
/// Every hash is normalized into its canonical textual form:
/// `/ipfs/<base58>` for IPFS and `/swarm/bzzr{0,1}/<hex>` for Swarm.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipfs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bzzr0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bzzr1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solc: Option<SolcVersion>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub experimental: bool,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("cbor decoding failed: {0}")]
    Cbor(String),
    #[error("invalid metadata type; expected \"map\", found \"{0}\"")]
    InvalidMetadataType(Type),
    #[error("invalid metadata map size: {0}")]
    InvalidMapSize(u64),
    #[error("invalid {key} type; expected \"{expected}\", found=\"{actual}\"")]
    InvalidValueType {
        key: &'static str,
        expected: Type,
        actual: Type,
    },
    #[error("invalid {key} size; expected={expected}, found={actual}")]
    InvalidHashSize {
        key: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid solc version bytes: {0}")]
    InvalidSolcVersion(String),
    #[error("duplicated key: {0}")]
    DuplicatedKey(String),
    #[error("no known metadata keys found")]
    NoKnownKeys,
}

impl From<minicbor::decode::Error> for ParseError {
    fn from(error: minicbor::decode::Error) -> Self {
        ParseError::Cbor(error.to_string())
    }
}

impl Metadata {
    /// Decodes a metadata map located at the beginning of `encoded`.
    ///
    /// Returns the record together with the number of bytes the map occupies;
    /// trailing bytes (e.g. the two-byte length suffix) are left untouched.
    pub fn from_cbor(encoded: &[u8]) -> Result<(Self, usize), ParseError> {
        let mut d = Decoder::new(encoded);

        match d.datatype()? {
            Type::Map => {}
            ty => return Err(ParseError::InvalidMetadataType(ty)),
        }
        let size = match d.map()? {
            Some(size) if size > 0 && size <= MAX_METADATA_ENTRIES => size,
            Some(size) => return Err(ParseError::InvalidMapSize(size)),
            None => return Err(ParseError::InvalidMapSize(u64::MAX)),
        };

        let mut metadata = Metadata::default();
        let mut known_keys = 0;
        for _ in 0..size {
            validate_value_datatype(&mut d, "key", Type::String)?;
            let key = d.str()?;
            match key {
                "ipfs" => {
                    let hash = decode_hash(&mut d, "ipfs", IPFS_HASH_SIZE)?;
                    set_once(
                        &mut metadata.ipfs,
                        key,
                        format!("/ipfs/{}", bs58::encode(hash).into_string()),
                    )?;
                }
                "bzzr0" => {
                    let hash = decode_hash(&mut d, "bzzr0", SWARM_HASH_SIZE)?;
                    set_once(
                        &mut metadata.bzzr0,
                        key,
                        format!("/swarm/bzzr0/{}", hex::encode(hash)),
                    )?;
                }
                "bzzr1" => {
                    let hash = decode_hash(&mut d, "bzzr1", SWARM_HASH_SIZE)?;
                    set_once(
                        &mut metadata.bzzr1,
                        key,
                        format!("/swarm/bzzr1/{}", hex::encode(hash)),
                    )?;
                }
                "solc" => {
                    let version = decode_solc_version(&mut d)?;
                    set_once(&mut metadata.solc, key, version)?;
                }
                "experimental" => {
                    validate_value_datatype(&mut d, "experimental", Type::Bool)?;
                    metadata.experimental = d.bool()?;
                    continue;
                }
                _ => {
                    d.skip()?;
                    continue;
                }
            }
            known_keys += 1;
        }

        if known_keys == 0 {
            return Err(ParseError::NoKnownKeys);
        }

        Ok((metadata, d.position()))
    }
}

fn set_once<T>(slot: &mut Option<T>, key: &str, value: T) -> Result<(), ParseError> {
    if slot.is_some() {
        return Err(ParseError::DuplicatedKey(key.to_string()));
    }
    *slot = Some(value);
    Ok(())
}

fn validate_value_datatype(
    d: &mut Decoder,
    key: &'static str,
    expected: Type,
) -> Result<(), ParseError> {
    let ty = d.datatype()?;
    if ty != expected {
        return Err(ParseError::InvalidValueType {
            key,
            expected,
            actual: ty,
        });
    }
    Ok(())
}

fn decode_hash<'b>(
    d: &mut Decoder<'b>,
    key: &'static str,
    expected: usize,
) -> Result<&'b [u8], ParseError> {
    validate_value_datatype(d, key, Type::Bytes)?;
    let hash = d.bytes()?;
    if hash.len() != expected {
        return Err(ParseError::InvalidHashSize {
            key,
            expected,
            actual: hash.len(),
        });
    }
    Ok(hash)
}

fn decode_solc_version(d: &mut Decoder) -> Result<SolcVersion, ParseError> {
    match d.datatype()? {
        Type::Bytes => {
            let bytes = d.bytes()?;
            match bytes {
                [major, minor, patch] => Ok(SolcVersion::Release(Version::new(
                    *major as u64,
                    *minor as u64,
                    *patch as u64,
                ))),
                other => Err(ParseError::InvalidSolcVersion(hex::encode(other))),
            }
        }
        Type::String => Ok(SolcVersion::Prerelease(d.str()?.to_string())),
        ty => Err(ParseError::InvalidValueType {
            key: "solc",
            expected: Type::Bytes,
            actual: ty,
        }),
    }
}
