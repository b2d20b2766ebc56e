//! Opaque codec for encrypted PII fields.
//!
//! Home coordinates are stored encrypted at rest; the worker only ever needs
//! decrypt-and-parse. The codec is a capability trait so environments can
//! plug in their own key handling — `Base64Codec` matches the dev/staging
//! wrapping, tests inject failing fakes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed ciphertext: {0}")]
    Malformed(String),
}

pub trait CoordinateCodec: Send + Sync {
    /// Decrypt a stored ciphertext back to its plaintext payload.
    fn decrypt(&self, ciphertext: &str) -> Result<String, CodecError>;

    /// Encrypt a plaintext payload for storage.
    fn encrypt(&self, plaintext: &str) -> String;
}

/// Base64 wrapping used by dev and staging environments.
pub struct Base64Codec;

impl CoordinateCodec for Base64Codec {
    fn decrypt(&self, ciphertext: &str) -> Result<String, CodecError> {
        let bytes = BASE64
            .decode(ciphertext.trim())
            .map_err(|e| CodecError::Malformed(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| CodecError::Malformed(e.to_string()))
    }

    fn encrypt(&self, plaintext: &str) -> String {
        BASE64.encode(plaintext.as_bytes())
    }
}

/// Parse a decrypted "lat,lon" payload into finite coordinates.
/// Returns `None` for anything that does not parse to two finite numbers.
pub fn parse_lat_lon(plaintext: &str) -> Option<(f64, f64)> {
    let mut parts = plaintext.split(',');
    let lat = parts.next()?.trim().parse::<f64>().ok()?;
    let lon = parts.next()?.trim().parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    (lat.is_finite() && lon.is_finite()).then_some((lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_codec_round_trip() {
        let codec = Base64Codec;
        let ciphertext = codec.encrypt("42.3601,-71.0589");
        assert_eq!(codec.decrypt(&ciphertext).unwrap(), "42.3601,-71.0589");
    }

    #[test]
    fn test_base64_codec_rejects_garbage() {
        let codec = Base64Codec;
        assert!(codec.decrypt("not!!valid//base64==").is_err());
    }

    #[test]
    fn test_parse_lat_lon() {
        assert_eq!(parse_lat_lon("42.3601,-71.0589"), Some((42.3601, -71.0589)));
        assert_eq!(parse_lat_lon(" 42.3601 , -71.0589 "), Some((42.3601, -71.0589)));
        assert_eq!(parse_lat_lon("42.3601"), None);
        assert_eq!(parse_lat_lon("42.3601,-71.0589,extra"), None);
        assert_eq!(parse_lat_lon("abc,def"), None);
        assert_eq!(parse_lat_lon("NaN,-71.0589"), None);
        assert_eq!(parse_lat_lon("inf,-71.0589"), None);
    }
}
