use base64::Engine;
use http::HeaderMap;
use std::sync::LazyLock;
use tonic::metadata::{
    AsciiMetadataKey, AsciiMetadataValue, BinaryMetadataKey, BinaryMetadataValue, MetadataMap,
};
use tracing::warn;

/// Base64 engines for lenient binary header decoding: standard, URL-safe,
/// and their unpadded variants, tried in order.
static BASE64_ENGINES: LazyLock<Vec<base64::engine::GeneralPurpose>> = LazyLock::new(|| {
    use base64::engine::general_purpose;
    vec![
        general_purpose::STANDARD,
        general_purpose::URL_SAFE,
        general_purpose::STANDARD_NO_PAD,
        general_purpose::URL_SAFE_NO_PAD,
    ]
});

/// Convert incoming HTTP headers into gRPC request metadata.
///
/// A one-to-one key/value copy: every header becomes one metadata entry
/// under the same (already lowercased) name. Keys ending in `-bin` are
/// decoded from base64 into binary metadata, falling back to the raw bytes
/// when no codec matches. Entries tonic rejects are dropped with a warning;
/// an empty header set produces empty metadata, never a failure.
pub fn metadata_from_header_map(headers: &HeaderMap) -> MetadataMap {
    let mut map = MetadataMap::new();

    for (name, value) in headers {
        let key = name.as_str();

        if key.ends_with("-bin") {
            match BinaryMetadataKey::from_bytes(key.as_bytes()) {
                Ok(bin_key) => {
                    let bytes = try_base64_decode(value.as_bytes())
                        .unwrap_or_else(|| value.as_bytes().to_vec());
                    map.append_bin(bin_key, BinaryMetadataValue::from_bytes(&bytes));
                }
                Err(_) => {
                    warn!(header = key, "dropping header: invalid binary metadata key");
                }
            }
            continue;
        }

        let Ok(ascii_key) = AsciiMetadataKey::from_bytes(key.as_bytes()) else {
            warn!(header = key, "dropping header: invalid metadata key");
            continue;
        };
        match value.to_str().ok().and_then(|v| v.parse::<AsciiMetadataValue>().ok()) {
            Some(ascii_value) => {
                map.append(ascii_key, ascii_value);
            }
            None => {
                warn!(header = key, "dropping header: invalid metadata value");
            }
        }
    }

    map
}

/// Try to decode a base64 value using multiple codecs.
///
/// Returns the first successful decode, or None if all fail.
fn try_base64_decode(value: &[u8]) -> Option<Vec<u8>> {
    let trimmed = std::str::from_utf8(value).ok()?.trim();
    for engine in BASE64_ENGINES.iter() {
        if let Ok(decoded) = engine.decode(trimmed) {
            return Some(decoded);
        }
    }
    None
}
