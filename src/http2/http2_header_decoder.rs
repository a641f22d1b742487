use bytes::Bytes;
use fluke_hpack::{Decoder, Encoder};
use crate::http2::http2_errors::{ErrorCode, Http2Error};

#[derive(Copy, Clone, Debug)]
enum Http2HeaderState {
    Initial,
    Pseudo,
    General,
}

struct Http2HeaderStateMachine {
    state: Http2HeaderState,
}

impl Http2HeaderStateMachine {

    fn new() -> Self {
        Http2HeaderStateMachine { state: Http2HeaderState::Initial }
    }

    //    All pseudo-header fields MUST appear in the header block before
    //    regular header fields.  Any request or response that contains a
    //    pseudo-header field that appears in a header block after a regular
    //    header field MUST be treated as malformed (Section 8.1.2.6).
    fn maybe_next_state(&mut self, next_state: Http2HeaderState, stream_id: u32) -> Result<(), Http2Error> {
        match (self.state, next_state) {
            (Http2HeaderState::General, Http2HeaderState::Pseudo) => {
                Err(Http2Error::stream_error(stream_id, ErrorCode::ProtocolError)
                    .with_reason("pseudo-header after regular header"))
            },
            (_, next) => {
                self.state = next;
                Ok(())
            },
        }
    }
}


const REQUEST_PSEUDO_HEADERS: [&str; 4] = [":method", ":scheme", ":authority", ":path"];

/// One decompression context for the entire connection.
pub struct Http2HeaderDecoder<'a> {
    decoder: Decoder<'a>,
}

impl<'a> Http2HeaderDecoder<'a> {

    pub fn new(max_table_size: usize) -> Self {
        let mut decoder = Decoder::new();
        decoder.set_max_table_size(max_table_size);
        decoder.set_max_allowed_table_size(max_table_size);
        Http2HeaderDecoder { decoder }
    }

    /// Decodes a complete header block. Pseudo-headers come first in the result.
    pub fn decode_headers(&mut self, stream_id: u32, payload: Bytes, trailers: bool)
        -> Result<Vec<(String, String)>, Http2Error>
    {
        //   Header compression is stateful.  One compression context and one
        //   decompression context are used for the entire connection.  A decoding
        //   error in a header block MUST be treated as a connection error
        //   (Section 5.4.1) of type COMPRESSION_ERROR.
        let pairs = self.decoder.decode(&payload)
            .map_err(|e| Http2Error::connection_error(ErrorCode::CompressionError)
                .with_reason(format!("hpack decoding failed: {:?}", e)))?;

        let malformed = |reason: String| Http2Error::stream_error(stream_id, ErrorCode::ProtocolError).with_reason(reason);

        let mut state = Http2HeaderStateMachine::new();
        let mut headers = Vec::with_capacity(pairs.len());
        let mut seen_pseudo: Vec<String> = Vec::new();

        for (name, value) in pairs.into_iter() {
            let name = String::from_utf8(name).map_err(|_| malformed("header name is not utf-8".to_string()))?;
            let value = String::from_utf8(value).map_err(|_| malformed("header value is not utf-8".to_string()))?;

            //   Just as in HTTP/1.x, header field names are strings of ASCII
            //   characters that are compared in a case-insensitive fashion.  However,
            //   header field names MUST be converted to lowercase prior to their
            //   encoding in HTTP/2.  A request or response containing uppercase
            //   header field names MUST be treated as malformed (Section 8.1.2.6).
            if name.bytes().any(|b| b.is_ascii_uppercase()) {
                return Err(malformed(format!("uppercase header name {}", name)));
            }

            if name.starts_with(':') {
                state.maybe_next_state(Http2HeaderState::Pseudo, stream_id)?;

                //   Pseudo-header fields MUST NOT appear in trailers.
                if trailers {
                    return Err(malformed(format!("pseudo-header {} in trailers", name)));
                }
                if !REQUEST_PSEUDO_HEADERS.contains(&name.as_str()) {
                    return Err(malformed(format!("unknown pseudo-header {}", name)));
                }
                if seen_pseudo.contains(&name) {
                    return Err(malformed(format!("duplicated pseudo-header {}", name)));
                }
                seen_pseudo.push(name.clone());
            } else {
                state.maybe_next_state(Http2HeaderState::General, stream_id)?;

                // 8.1.2.2. Connection-Specific Header Fields
                if name == "connection" {
                    return Err(malformed("connection-specific header field".to_string()));
                }
                //    The only exception to this is the TE header field, which MAY be
                //    present in an HTTP/2 request; when it is, it MUST NOT contain any
                //    value other than "trailers".
                if name == "te" && !value.eq_ignore_ascii_case("trailers") {
                    return Err(malformed(format!("te header with value {}", value)));
                }
            }

            headers.push((name, value));
        }

        // 8.1.2.3: Request pseudo-header fields
        //    All HTTP/2 requests MUST include exactly one valid value for the
        //    ":method", ":scheme", and ":path" pseudo-header fields, unless it is
        //    a CONNECT request (Section 8.3).
        if !trailers {
            for required in [":method", ":scheme", ":path"] {
                if !seen_pseudo.iter().any(|p| p == required) {
                    return Err(malformed(format!("missing {}", required)));
                }
            }

            let empty_path = headers.iter().any(|(k, v)| k == ":path" && v.is_empty());
            if empty_path {
                return Err(malformed("empty :path".to_string()));
            }
        }

        Ok(headers)
    }
}


pub struct Http2HeaderEncoder<'a> {
    encoder: Encoder<'a>,
}

impl<'a> Default for Http2HeaderEncoder<'a> {
    fn default() -> Self {
        Http2HeaderEncoder { encoder: Encoder::default() }
    }
}

impl<'a> Http2HeaderEncoder<'a> {

    pub fn new() -> Self {
        Self::default()
    }

    /// Field names are lowercased. `:status` must come first.
    pub fn encode_response(&mut self, status: u16, headers: &[(String, String)]) -> Bytes {
        let status = status.to_string();
        let lowered: Vec<(Vec<u8>, Vec<u8>)> = headers.iter()
            .filter(|(k, _)| !is_connection_specific(k))
            .map(|(k, v)| (k.to_ascii_lowercase().into_bytes(), v.clone().into_bytes()))
            .collect();

        let fields = std::iter::once((&b":status"[..], status.as_bytes()))
            .chain(lowered.iter().map(|(k, v)| (k.as_slice(), v.as_slice())));

        Bytes::from(self.encoder.encode(fields))
    }
}

fn is_connection_specific(name: &str) -> bool {
    ["connection", "keep-alive", "proxy-connection", "transfer-encoding", "upgrade"]
        .iter()
        .any(|h| name.eq_ignore_ascii_case(h))
}


#[cfg(test)]
mod tests {
    use super::*;

    fn encode(fields: &[(&str, &str)]) -> Bytes {
        let mut encoder = Encoder::default();
        Bytes::from(encoder.encode(fields.iter().map(|(k, v)| (k.as_bytes(), v.as_bytes()))))
    }

    #[test]
    fn decodes_request_block() {
        let mut decoder = Http2HeaderDecoder::new(4096);
        let block = encode(&[(":method", "GET"), (":scheme", "http"), (":path", "/hello"), ("accept", "*/*")]);
        let headers = decoder.decode_headers(1, block, false).unwrap();
        assert_eq!(headers[2], (":path".to_string(), "/hello".to_string()));
        assert_eq!(headers[3], ("accept".to_string(), "*/*".to_string()));
    }

    #[test]
    fn pseudo_header_after_regular_header_is_malformed() {
        let mut decoder = Http2HeaderDecoder::new(4096);
        let block = encode(&[(":method", "GET"), ("accept", "*/*"), (":path", "/")]);
        let err = decoder.decode_headers(1, block, false).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProtocolError);
        assert_eq!(err.stream_id(), Some(1));
    }

    #[test]
    fn missing_path_and_connection_header_are_malformed() {
        let mut decoder = Http2HeaderDecoder::new(4096);
        let block = encode(&[(":method", "GET"), (":scheme", "http")]);
        assert!(decoder.decode_headers(3, block, false).is_err());

        let block = encode(&[(":method", "GET"), (":scheme", "http"), (":path", "/"), ("connection", "close")]);
        assert!(decoder.decode_headers(5, block, false).is_err());
    }

    #[test]
    fn response_is_decodable() {
        let mut encoder = Http2HeaderEncoder::default();
        let block = encoder.encode_response(200, &[("Content-Type".to_string(), "text/plain".to_string()),
                                                    ("Connection".to_string(), "close".to_string())]);

        let mut decoder = Decoder::new();
        let fields = decoder.decode(&block).unwrap();
        assert_eq!(fields[0], (b":status".to_vec(), b"200".to_vec()));
        assert_eq!(fields[1], (b"content-type".to_vec(), b"text/plain".to_vec()));
        assert_eq!(fields.len(), 2);
    }
}
