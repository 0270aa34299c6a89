// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! Image attachment validation
//!
//! Inbound attachments arrive as `data:<mime>;base64,<payload>` URIs.
//! Validation is itemized: every rejected attachment produces its own error
//! entry, except the count limit which short-circuits the per-item checks.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Maximum number of attachments per request.
pub const MAX_IMAGE_COUNT: usize = 5;

/// Maximum decoded size per attachment.
pub const MAX_IMAGE_SIZE_BYTES: usize = 5 * 1024 * 1024;

/// MIME types accepted for image attachments.
pub const ALLOWED_MIME_TYPES: [&str; 5] = [
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/gif",
    "image/webp",
];

/// A validated image attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    /// Media type from the data URI, lowercased
    pub mime: String,
    /// Decoded payload
    pub data: Vec<u8>,
    /// Original data URI, passed through to the provider verbatim
    pub data_uri: String,
}

/// Structural parse of a data URI into `(mime, base64 payload)`.
///
/// Accepts `data:<mime>;base64,<payload>`; the payload is not decoded here.
pub fn parse_data_uri(data_uri: &str) -> Option<(String, &str)> {
    let rest = data_uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let (mime, encoding) = header.split_once(';')?;
    if mime.is_empty() || payload.is_empty() || !encoding.eq_ignore_ascii_case("base64") {
        return None;
    }
    Some((mime.to_ascii_lowercase(), payload))
}

/// Validate a list of image data URIs.
///
/// Returns the full list of per-item error messages; an empty list means
/// every attachment is valid. A count above [`MAX_IMAGE_COUNT`] yields a
/// single aggregated error and skips the per-item checks entirely.
pub fn validate_image_data_uris(image_data_uris: &[String]) -> Vec<String> {
    let mut errors = Vec::new();

    if image_data_uris.len() > MAX_IMAGE_COUNT {
        errors.push(format!(
            "Too many images: {} provided, maximum {} allowed",
            image_data_uris.len(),
            MAX_IMAGE_COUNT
        ));
        return errors;
    }

    for (i, data_uri) in image_data_uris.iter().enumerate() {
        let index = i + 1;

        if !data_uri.starts_with("data:") {
            errors.push(format!(
                "Image {index}: Invalid data URI format (must start with 'data:')"
            ));
            continue;
        }

        let Some((mime, payload)) = parse_data_uri(data_uri) else {
            errors.push(format!("Image {index}: Malformed data URI structure"));
            continue;
        };

        if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
            errors.push(format!(
                "Image {index}: Unsupported MIME type '{mime}' (allowed: PNG, JPEG, GIF, WebP)"
            ));
            continue;
        }

        match BASE64.decode(payload) {
            Ok(bytes) => {
                if bytes.len() > MAX_IMAGE_SIZE_BYTES {
                    let size_mb = bytes.len() as f64 / (1024.0 * 1024.0);
                    errors.push(format!(
                        "Image {index}: Size {size_mb:.1}MB exceeds maximum 5MB"
                    ));
                }
            }
            Err(_) => errors.push(format!("Image {index}: Invalid base64 encoding")),
        }
    }

    errors
}

/// Decode already-validated data URIs into attachments.
///
/// Items that fail to parse or decode are skipped; callers are expected to
/// run [`validate_image_data_uris`] first and reject invalid requests.
pub fn decode_attachments(image_data_uris: &[String]) -> Vec<ImageAttachment> {
    image_data_uris
        .iter()
        .filter_map(|data_uri| {
            let (mime, payload) = parse_data_uri(data_uri)?;
            let data = BASE64.decode(payload).ok()?;
            Some(ImageAttachment {
                mime,
                data,
                data_uri: data_uri.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_uri(byte_count: usize) -> String {
        format!(
            "data:image/png;base64,{}",
            BASE64.encode(vec![0u8; byte_count])
        )
    }

    #[test]
    fn test_parse_data_uri_structure() {
        let (mime, payload) = parse_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(payload, "aGVsbG8=");

        assert!(parse_data_uri("image/png;base64,aGVsbG8=").is_none());
        assert!(parse_data_uri("data:image/png,aGVsbG8=").is_none());
        assert!(parse_data_uri("data:image/png;base64,").is_none());
        assert!(parse_data_uri("data:;base64,aGVsbG8=").is_none());
    }

    #[test]
    fn test_parse_data_uri_lowercases_mime() {
        let (mime, _) = parse_data_uri("data:IMAGE/PNG;base64,aGk=").unwrap();
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn test_valid_attachments_produce_no_errors() {
        let uris = vec![png_uri(16), "data:image/webp;base64,aGk=".to_string()];
        assert!(validate_image_data_uris(&uris).is_empty());
    }

    #[test]
    fn test_count_limit_short_circuits() {
        // Six attachments, one of them also malformed: only the count error
        // may be reported.
        let mut uris = vec![png_uri(4); 5];
        uris.push("data:not-a-uri".to_string());

        let errors = validate_image_data_uris(&uris);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Too many images: 6"));
    }

    #[test]
    fn test_oversized_attachment_flags_only_itself() {
        let uris = vec![
            png_uri(8),
            png_uri(6 * 1024 * 1024),
            png_uri(8),
        ];

        let errors = validate_image_data_uris(&uris);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Image 2:"));
        assert!(errors[0].contains("exceeds maximum 5MB"));
    }

    #[test]
    fn test_exactly_5mb_is_allowed() {
        let uris = vec![png_uri(MAX_IMAGE_SIZE_BYTES)];
        assert!(validate_image_data_uris(&uris).is_empty());
    }

    #[test]
    fn test_unknown_mime_rejected() {
        let uris = vec!["data:application/pdf;base64,aGk=".to_string()];
        let errors = validate_image_data_uris(&uris);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Unsupported MIME type 'application/pdf'"));
    }

    #[test]
    fn test_malformed_base64_rejected() {
        let uris = vec!["data:image/png;base64,@@@not-base64@@@".to_string()];
        let errors = validate_image_data_uris(&uris);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Invalid base64 encoding"));
    }

    #[test]
    fn test_errors_are_itemized_per_attachment() {
        let uris = vec![
            "nonsense".to_string(),
            "data:application/pdf;base64,aGk=".to_string(),
            png_uri(4),
        ];

        let errors = validate_image_data_uris(&uris);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("Image 1:"));
        assert!(errors[1].starts_with("Image 2:"));
    }

    #[test]
    fn test_decode_attachments_roundtrip() {
        let uris = vec![png_uri(16)];
        let attachments = decode_attachments(&uris);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].mime, "image/png");
        assert_eq!(attachments[0].data.len(), 16);
        assert_eq!(attachments[0].data_uri, uris[0]);
    }
}
