//! Checksum traits over byte values, plus a small integer trait

use forb_plugin::prelude::*;
use sha2::{Digest, Sha256, Sha512};

pub struct Sha256Trait;
pub struct Sha512Trait;
pub struct Blake3Trait;
pub struct LuckyNumber;

const ONE_MB: usize = 1_000_000;
const TEN_MB: usize = 10_000_000;

fn bytes_of<'a>(id: &str, value: &'a CoreValue) -> Result<&'a [u8], PluginFailure> {
    value
        .as_bytes()
        .ok_or_else(|| PluginFailure::new(format!("{} called with a {} value", id, value.tag())))
}

impl TraitPlugin for Sha256Trait {
    fn meta(&self) -> TraitMeta {
        TraitMeta::new("sha256", "SHA-256", &[TypeTag::Bytes])
            .with_description("SHA-256 digest of the bytes")
            .with_max_input_size(ONE_MB)
    }

    fn observe(&self, value: &CoreValue) -> Result<Option<String>, PluginFailure> {
        let bytes = bytes_of("sha256", value)?;
        Ok(Some(format!("sha256: {}", hex::encode(Sha256::digest(bytes)))))
    }
}

impl TraitPlugin for Sha512Trait {
    fn meta(&self) -> TraitMeta {
        TraitMeta::new("sha512", "SHA-512", &[TypeTag::Bytes])
            .with_description("SHA-512 digest of the bytes")
            .with_max_input_size(ONE_MB)
    }

    fn observe(&self, value: &CoreValue) -> Result<Option<String>, PluginFailure> {
        let bytes = bytes_of("sha512", value)?;
        Ok(Some(format!("sha512: {}", hex::encode(Sha512::digest(bytes)))))
    }
}

impl TraitPlugin for Blake3Trait {
    fn meta(&self) -> TraitMeta {
        TraitMeta::new("blake3", "BLAKE3", &[TypeTag::Bytes])
            .with_description("BLAKE3 digest of the bytes")
            .with_max_input_size(TEN_MB)
    }

    fn observe(&self, value: &CoreValue) -> Result<Option<String>, PluginFailure> {
        let bytes = bytes_of("blake3", value)?;
        Ok(Some(format!("blake3: {}", blake3::hash(bytes).to_hex())))
    }
}

impl TraitPlugin for LuckyNumber {
    fn meta(&self) -> TraitMeta {
        TraitMeta::new("lucky", "Lucky Number", &[TypeTag::Integer])
            .with_description("Flags a handful of well-known lucky numbers")
    }

    fn observe(&self, value: &CoreValue) -> Result<Option<String>, PluginFailure> {
        Ok(match value.as_integer() {
            Some(n @ (7 | 42 | 777 | 1337)) => Some(format!("Lucky number ({})", n)),
            _ => None,
        })
    }
}
