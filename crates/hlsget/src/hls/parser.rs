// M3U8 parser: a line-oriented state machine producing a `Document`.
//
// Only the tags needed to download a VOD stream are interpreted; any other
// `#` line is treated as a comment.

use std::collections::HashMap;
use std::str::FromStr;

use crate::hls::error::ManifestError;
use crate::hls::playlist::{
    ByteRange, Document, EncryptionKey, KeyMethod, PlaylistType, Segment, VariantReference,
};

const EXT_M3U: &str = "#EXTM3U";
const EXT_INF: &str = "#EXTINF:";
const EXT_BYTE_RANGE: &str = "#EXT-X-BYTERANGE:";
const EXT_KEY: &str = "#EXT-X-KEY:";
const EXT_STREAM_INF: &str = "#EXT-X-STREAM-INF:";
const EXT_END_LIST: &str = "#EXT-X-ENDLIST";
const EXT_PLAYLIST_TYPE: &str = "#EXT-X-PLAYLIST-TYPE:";
const EXT_TARGET_DURATION: &str = "#EXT-X-TARGETDURATION:";
const EXT_MEDIA_SEQUENCE: &str = "#EXT-X-MEDIA-SEQUENCE:";
const EXT_VERSION: &str = "#EXT-X-VERSION:";

/// Tags seen for the segment whose URI line has not been reached yet.
#[derive(Debug, Default)]
struct PendingSegment {
    inf: Option<(f64, Option<String>, usize)>,
    byte_range: Option<ByteRange>,
}

impl PendingSegment {
    fn close(&mut self, uri: &str) -> Option<Segment> {
        let (duration, title, key_index) = self.inf.take()?;
        let byte_range = self.byte_range.take();
        Some(Segment {
            uri: uri.to_string(),
            title,
            duration,
            key_index,
            byte_range,
        })
    }
}

/// Parse playlist text into a [`Document`].
pub fn parse_playlist(text: &str) -> Result<Document, ManifestError> {
    let lines: Vec<&str> = text.lines().collect();

    let header = lines
        .first()
        .map(|line| line.trim_start_matches('\u{feff}').trim_end());
    if header != Some(EXT_M3U) {
        return Err(ManifestError::MissingHeader);
    }

    let mut document = Document::default();
    let mut pending = PendingSegment::default();
    let mut key_index = 0;

    let mut i = 1;
    while i < lines.len() {
        let line_no = i + 1;
        let line = lines[i].trim();
        i += 1;

        if line.is_empty() {
            continue;
        }

        if let Some(value) = line.strip_prefix(EXT_PLAYLIST_TYPE) {
            document.playlist_type = parse_playlist_type(value.trim(), line_no)?;
        } else if let Some(value) = line.strip_prefix(EXT_TARGET_DURATION) {
            document.target_duration = parse_number("EXT-X-TARGETDURATION", value, line_no)?;
        } else if let Some(value) = line.strip_prefix(EXT_MEDIA_SEQUENCE) {
            document.media_sequence = parse_number("EXT-X-MEDIA-SEQUENCE", value, line_no)?;
        } else if let Some(value) = line.strip_prefix(EXT_VERSION) {
            document.version = parse_number("EXT-X-VERSION", value, line_no)?;
        } else if let Some(value) = line.strip_prefix(EXT_STREAM_INF) {
            let mut variant = parse_variant(value, line_no)?;

            // The variant URI is the next non-blank line and must not be a tag
            while lines.get(i).is_some_and(|l| l.trim().is_empty()) {
                i += 1;
            }
            let uri = match lines.get(i).map(|l| l.trim()) {
                Some(uri) if !uri.starts_with('#') => uri,
                _ => return Err(ManifestError::MissingVariantUri { line: i + 1 }),
            };
            i += 1;

            variant.uri = uri.to_string();
            document.variants.push(variant);
        } else if let Some(value) = line.strip_prefix(EXT_INF) {
            if pending.inf.is_some() {
                return Err(ManifestError::DuplicateTag {
                    tag: "EXTINF",
                    text: line.to_string(),
                    line: line_no,
                });
            }
            let (duration, title) = parse_ext_inf(value, line_no)?;
            pending.inf = Some((duration, title, key_index));
        } else if let Some(value) = line.strip_prefix(EXT_BYTE_RANGE) {
            if pending.byte_range.is_some() {
                return Err(ManifestError::DuplicateTag {
                    tag: "EXT-X-BYTERANGE",
                    text: line.to_string(),
                    line: line_no,
                });
            }
            pending.byte_range = Some(parse_byte_range(value.trim(), line_no)?);
        } else if let Some(value) = line.strip_prefix(EXT_KEY) {
            key_index += 1;
            let key = parse_key(value, line_no)?;
            document.keys.insert(key_index, key);
        } else if line == EXT_END_LIST {
            document.end_list = true;
        } else if !line.starts_with('#') {
            match pending.close(line) {
                Some(segment) => document.segments.push(segment),
                None => {
                    return Err(ManifestError::InvalidLine {
                        text: line.to_string(),
                        line: line_no,
                    });
                }
            }
        }
    }

    Ok(document)
}

fn parse_playlist_type(value: &str, line: usize) -> Result<PlaylistType, ManifestError> {
    match value {
        "" => Ok(PlaylistType::Unset),
        "VOD" => Ok(PlaylistType::Vod),
        "EVENT" => Ok(PlaylistType::Event),
        other => Err(ManifestError::InvalidValue {
            tag: "EXT-X-PLAYLIST-TYPE",
            value: other.to_string(),
            line,
        }),
    }
}

fn parse_number<T: FromStr>(tag: &'static str, value: &str, line: usize) -> Result<T, ManifestError> {
    let value = value.trim();
    value.parse().map_err(|_| ManifestError::InvalidNumber {
        tag,
        value: value.to_string(),
        line,
    })
}

/// `duration[,title]`
fn parse_ext_inf(value: &str, line: usize) -> Result<(f64, Option<String>), ManifestError> {
    let (duration, title) = match value.split_once(',') {
        Some((duration, title)) => (duration, Some(title.trim())),
        None => (value, None),
    };
    let duration = parse_number("EXTINF", duration, line)?;
    let title = title.filter(|t| !t.is_empty()).map(str::to_string);
    Ok((duration, title))
}

/// `length[@offset]`
fn parse_byte_range(value: &str, line: usize) -> Result<ByteRange, ManifestError> {
    if value.is_empty() {
        return Err(ManifestError::InvalidValue {
            tag: "EXT-X-BYTERANGE",
            value: String::new(),
            line,
        });
    }
    let (length, offset) = match value.split_once('@') {
        Some((length, offset)) => (length, Some(offset)),
        None => (value, None),
    };
    Ok(ByteRange {
        length: parse_number("EXT-X-BYTERANGE", length, line)?,
        offset: offset
            .map(|offset| parse_number("EXT-X-BYTERANGE", offset, line))
            .transpose()?,
    })
}

fn parse_variant(value: &str, line: usize) -> Result<VariantReference, ManifestError> {
    let attributes = parse_attributes(value);
    if attributes.is_empty() {
        return Err(ManifestError::EmptyAttributes {
            tag: "EXT-X-STREAM-INF",
            line,
        });
    }

    let mut variant = VariantReference::default();
    for (name, value) in attributes {
        match name.as_str() {
            "BANDWIDTH" => variant.bandwidth = parse_number("EXT-X-STREAM-INF", &value, line)?,
            "PROGRAM-ID" => {
                variant.program_id = Some(parse_number("EXT-X-STREAM-INF", &value, line)?)
            }
            "RESOLUTION" => variant.resolution = Some(value),
            "CODECS" => variant.codecs = Some(value),
            _ => {}
        }
    }
    Ok(variant)
}

fn parse_key(value: &str, line: usize) -> Result<EncryptionKey, ManifestError> {
    let mut attributes = parse_attributes(value);
    if attributes.is_empty() {
        return Err(ManifestError::EmptyAttributes {
            tag: "EXT-X-KEY",
            line,
        });
    }

    let method = attributes.remove("METHOD").unwrap_or_default();
    let method = match method.as_str() {
        "NONE" => KeyMethod::None,
        "AES-128" => KeyMethod::Aes128,
        _ => return Err(ManifestError::UnsupportedKeyMethod { method, line }),
    };

    let uri = attributes.remove("URI").filter(|uri| !uri.is_empty());
    if method == KeyMethod::Aes128 && uri.is_none() {
        return Err(ManifestError::MissingKeyUri {
            method: method.as_str().to_string(),
            line,
        });
    }

    Ok(EncryptionKey {
        method,
        uri,
        iv: attributes.remove("IV").filter(|iv| !iv.is_empty()),
    })
}

/// Split an attribute list such as `BANDWIDTH=1280000,CODECS="avc1.4d401f,mp4a.40.2"`.
///
/// Quoted values keep embedded commas and lose their quotes.
pub(crate) fn parse_attributes(input: &str) -> HashMap<String, String> {
    let mut attributes = HashMap::new();
    let mut rest = input.trim();

    while let Some(eq) = rest.find('=') {
        // A stray token without '=' before this key is dropped
        let key = rest[..eq].rsplit(',').next().unwrap_or_default().trim();
        let after = rest[eq + 1..].trim_start();

        let (value, remainder) = match after.strip_prefix('"') {
            Some(quoted) => match quoted.find('"') {
                Some(end) => {
                    let tail = &quoted[end + 1..];
                    let tail = tail.find(',').map_or("", |comma| &tail[comma + 1..]);
                    (&quoted[..end], tail)
                }
                None => (quoted, ""),
            },
            None => match after.find(',') {
                Some(comma) => (after[..comma].trim(), &after[comma + 1..]),
                None => (after.trim(), ""),
            },
        };

        if !key.is_empty() {
            attributes.insert(key.to_string(), value.to_string());
        }
        rest = remainder.trim_start();
    }

    attributes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_media_playlist() {
        let text = "#EXTM3U\n#EXT-X-VERSION:3\n#EXTINF:9.009,\nseg0.ts\n#EXTINF:9.009,\nseg1.ts\n#EXT-X-ENDLIST\n";
        let document = parse_playlist(text).unwrap();

        assert_eq!(document.version, 3);
        assert!(document.end_list);
        assert_eq!(document.segments.len(), 2);
        assert_eq!(document.segments[0].uri, "seg0.ts");
        assert_eq!(document.segments[0].duration, 9.009);
        assert_eq!(document.segments[1].uri, "seg1.ts");
        assert_eq!(document.segments[1].duration, 9.009);
        assert!(document.segments.iter().all(|s| s.key_index == 0));
        assert!(document.variants.is_empty());
    }

    #[test]
    fn test_parse_header_fields_and_titles() {
        let text = "#EXTM3U\r\n\
                    #EXT-X-PLAYLIST-TYPE:VOD\r\n\
                    #EXT-X-TARGETDURATION:10\r\n\
                    #EXT-X-MEDIA-SEQUENCE:42\r\n\
                    \r\n\
                    #EXTINF:4.5,Opening scene\r\n\
                    #EXT-X-PROGRAM-DATE-TIME:2024-01-01T00:00:00Z\r\n\
                    intro.ts\r\n";
        let document = parse_playlist(text).unwrap();

        assert_eq!(document.playlist_type, PlaylistType::Vod);
        assert_eq!(document.target_duration, 10.0);
        assert_eq!(document.media_sequence, 42);
        assert!(!document.end_list);
        assert_eq!(document.segments[0].title.as_deref(), Some("Opening scene"));
        assert_eq!(document.segments[0].duration, 4.5);
    }

    #[test]
    fn test_missing_header() {
        let err = parse_playlist("#EXT-X-VERSION:3\n#EXTM3U\n").unwrap_err();
        assert_eq!(err, ManifestError::MissingHeader);
        assert_eq!(parse_playlist("").unwrap_err(), ManifestError::MissingHeader);
    }

    #[test]
    fn test_bare_uri_without_extinf_is_invalid() {
        let err = parse_playlist("#EXTM3U\nseg0.ts\n").unwrap_err();
        assert_eq!(
            err,
            ManifestError::InvalidLine {
                text: "seg0.ts".to_string(),
                line: 2
            }
        );
    }

    #[test]
    fn test_duplicate_extinf_reports_second_line() {
        let err = parse_playlist("#EXTM3U\n#EXTINF:1.0,\n#EXTINF:2.0,\nseg.ts\n").unwrap_err();
        match err {
            ManifestError::DuplicateTag { tag, line, .. } => {
                assert_eq!(tag, "EXTINF");
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_byte_range() {
        let text = "#EXTM3U\n#EXTINF:4,\n#EXT-X-BYTERANGE:1000@200\nmain.ts\n#EXT-X-BYTERANGE:500\n#EXTINF:4,\nmain.ts\n";
        let document = parse_playlist(text).unwrap();

        assert_eq!(
            document.segments[0].byte_range,
            Some(ByteRange {
                length: 1000,
                offset: Some(200)
            })
        );
        assert_eq!(
            document.segments[1].byte_range,
            Some(ByteRange {
                length: 500,
                offset: None
            })
        );
    }

    #[test]
    fn test_byte_range_errors() {
        let duplicate = "#EXTM3U\n#EXT-X-BYTERANGE:10\n#EXT-X-BYTERANGE:10\n#EXTINF:1,\na.ts\n";
        assert!(matches!(
            parse_playlist(duplicate).unwrap_err(),
            ManifestError::DuplicateTag { tag: "EXT-X-BYTERANGE", line: 3, .. }
        ));

        let empty = "#EXTM3U\n#EXTINF:1,\n#EXT-X-BYTERANGE:\na.ts\n";
        assert!(matches!(
            parse_playlist(empty).unwrap_err(),
            ManifestError::InvalidValue { tag: "EXT-X-BYTERANGE", line: 3, .. }
        ));

        let malformed = "#EXTM3U\n#EXTINF:1,\n#EXT-X-BYTERANGE:ten@0\na.ts\n";
        assert!(matches!(
            parse_playlist(malformed).unwrap_err(),
            ManifestError::InvalidNumber { .. }
        ));
    }

    #[test]
    fn test_invalid_playlist_type() {
        let err = parse_playlist("#EXTM3U\n#EXT-X-PLAYLIST-TYPE:LIVE\n").unwrap_err();
        assert_eq!(
            err,
            ManifestError::InvalidValue {
                tag: "EXT-X-PLAYLIST-TYPE",
                value: "LIVE".to_string(),
                line: 2
            }
        );

        let document = parse_playlist("#EXTM3U\n#EXT-X-PLAYLIST-TYPE:\n").unwrap();
        assert_eq!(document.playlist_type, PlaylistType::Unset);
    }

    #[test]
    fn test_malformed_numbers() {
        for text in [
            "#EXTM3U\n#EXT-X-VERSION:three\n",
            "#EXTM3U\n#EXT-X-TARGETDURATION:abc\n",
            "#EXTM3U\n#EXT-X-MEDIA-SEQUENCE:-1\n",
            "#EXTM3U\n#EXTINF:fast,\nseg.ts\n",
        ] {
            assert!(
                matches!(parse_playlist(text), Err(ManifestError::InvalidNumber { .. })),
                "expected number error for {text:?}"
            );
        }
    }

    #[test]
    fn test_master_playlist_variants() {
        let text = "#EXTM3U\n\
                    #EXT-X-STREAM-INF:PROGRAM-ID=1,BANDWIDTH=240000,RESOLUTION=416x234,CODECS=\"avc1.42e00a,mp4a.40.2\"\n\
                    low/index.m3u8\n\
                    #EXT-X-STREAM-INF:BANDWIDTH=1280000\n\
                    \n\
                    high/index.m3u8\n";
        let document = parse_playlist(text).unwrap();

        assert!(document.is_master());
        assert_eq!(document.variants.len(), 2);
        let first = &document.variants[0];
        assert_eq!(first.uri, "low/index.m3u8");
        assert_eq!(first.bandwidth, 240000);
        assert_eq!(first.program_id, Some(1));
        assert_eq!(first.resolution.as_deref(), Some("416x234"));
        assert_eq!(first.codecs.as_deref(), Some("avc1.42e00a,mp4a.40.2"));
        assert_eq!(document.variants[1].uri, "high/index.m3u8");
        assert!(document.segments.is_empty());
    }

    #[test]
    fn test_missing_variant_uri() {
        let err = parse_playlist("#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\n#EXT-X-ENDLIST\n")
            .unwrap_err();
        assert_eq!(err, ManifestError::MissingVariantUri { line: 3 });

        let err = parse_playlist("#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\n").unwrap_err();
        assert_eq!(err, ManifestError::MissingVariantUri { line: 3 });
    }

    #[test]
    fn test_keys_are_indexed_in_declaration_order() {
        let text = "#EXTM3U\n\
                    #EXTINF:2,\nclear.ts\n\
                    #EXT-X-KEY:METHOD=AES-128,URI=\"key1.bin\",IV=0x00000000000000000000000000000001\n\
                    #EXTINF:2,\nenc1.ts\n\
                    #EXT-X-KEY:METHOD=NONE\n\
                    #EXTINF:2,\nclear2.ts\n\
                    #EXT-X-KEY:METHOD=AES-128,URI=\"https://keys.test/k2\"\n\
                    #EXTINF:2,\nenc2.ts\n";
        let document = parse_playlist(text).unwrap();

        let indices: Vec<usize> = document.segments.iter().map(|s| s.key_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(document.keys.len(), 3);
        assert_eq!(document.keys[&1].method, KeyMethod::Aes128);
        assert_eq!(document.keys[&1].uri.as_deref(), Some("key1.bin"));
        assert_eq!(
            document.keys[&1].iv.as_deref(),
            Some("0x00000000000000000000000000000001")
        );
        assert_eq!(document.keys[&2].method, KeyMethod::None);
        assert_eq!(document.keys[&3].iv, None);
    }

    #[test]
    fn test_unsupported_key_methods_are_rejected() {
        let err = parse_playlist("#EXTM3U\n#EXT-X-KEY:METHOD=SAMPLE-AES,URI=\"k\"\n").unwrap_err();
        assert_eq!(
            err,
            ManifestError::UnsupportedKeyMethod {
                method: "SAMPLE-AES".to_string(),
                line: 2
            }
        );

        let err = parse_playlist("#EXTM3U\n#EXT-X-KEY:URI=\"k\"\n").unwrap_err();
        assert!(matches!(err, ManifestError::UnsupportedKeyMethod { .. }));

        let err = parse_playlist("#EXTM3U\n#EXT-X-KEY:METHOD=AES-128\n").unwrap_err();
        assert!(matches!(err, ManifestError::MissingKeyUri { line: 2, .. }));
    }

    #[test]
    fn test_parse_attributes_quoting() {
        let attributes =
            parse_attributes("METHOD=AES-128,URI=\"https://k.test/a,b?x=1\", IV=0x1F,FLAG");
        assert_eq!(attributes["METHOD"], "AES-128");
        assert_eq!(attributes["URI"], "https://k.test/a,b?x=1");
        assert_eq!(attributes["IV"], "0x1F");
        assert_eq!(attributes.len(), 3);

        assert!(parse_attributes("").is_empty());
    }
}
