//! Request grammar and response envelope.
//!
//! Requests are single lines of text:
//! - `LIST`
//! - `GET <name>`
//! - `UPLOAD <name> <base64>`
//!
//! Verbs match case-insensitively. Responses are JSON objects with a fixed
//! key layout; see [`Response`].

use serde::{Deserialize, Serialize};

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// List the names of stored files.
    List,

    /// Fetch one file. The name is everything after the verb, trimmed, and
    /// may contain interior spaces.
    Get { name: String },

    /// Store one file. The name cannot contain whitespace; the content is an
    /// opaque base64 blob.
    Upload { name: String, content: String },
}

impl Request {
    /// Parse a request line.
    pub fn parse(line: &str) -> Result<Request, ProtocolError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let (verb, rest) = split_once_whitespace(line);
        match verb.to_ascii_lowercase().as_str() {
            "list" => {
                if rest.is_empty() {
                    Ok(Request::List)
                } else {
                    Err(ProtocolError::TrailingArguments("LIST"))
                }
            }
            "get" => {
                if rest.is_empty() {
                    Err(ProtocolError::MissingArgument("GET", "file name"))
                } else {
                    Ok(Request::Get {
                        name: rest.to_string(),
                    })
                }
            }
            "upload" => {
                let (name, content) = split_once_whitespace(rest);
                if name.is_empty() {
                    Err(ProtocolError::MissingArgument("UPLOAD", "file name"))
                } else if content.is_empty() {
                    Err(ProtocolError::MissingArgument("UPLOAD", "file content"))
                } else {
                    Ok(Request::Upload {
                        name: name.to_string(),
                        content: content.to_string(),
                    })
                }
            }
            _ => Err(ProtocolError::UnknownCommand(verb.to_string())),
        }
    }

    /// Command verb for logging and reporting.
    pub fn verb(&self) -> &'static str {
        match self {
            Request::List => "LIST",
            Request::Get { .. } => "GET",
            Request::Upload { .. } => "UPLOAD",
        }
    }
}

/// Split on the first whitespace run; the second half is left-trimmed and
/// may be empty.
fn split_once_whitespace(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim_start()),
        None => (s, ""),
    }
}

/// Request parsing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Blank request line
    Empty,
    /// Unrecognized verb
    UnknownCommand(String),
    /// Verb is missing a required argument
    MissingArgument(&'static str, &'static str),
    /// Verb takes no arguments but some were given
    TrailingArguments(&'static str),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::Empty => write!(f, "empty request"),
            ProtocolError::UnknownCommand(verb) => write!(f, "unknown command: {}", verb),
            ProtocolError::MissingArgument(verb, what) => {
                write!(f, "{} requires a {}", verb, what)
            }
            ProtocolError::TrailingArguments(verb) => {
                write!(f, "{} takes no arguments", verb)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Reply status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Error,
}

/// The `data` field of a reply: a name listing for `LIST`, a human-readable
/// message everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Names(Vec<String>),
}

/// Reply envelope, serialized as a JSON object.
///
/// `GET` successes carry the file in the `data_namafile` and `data_file`
/// keys instead of `data`. Exactly one envelope is produced per request and
/// it is fully built before framing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,

    #[serde(
        rename = "data_namafile",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub file_name: Option<String>,

    #[serde(
        rename = "data_file",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub file_content: Option<String>,
}

impl Response {
    /// Success with a plain message, used for `UPLOAD` acknowledgements.
    pub fn ok(message: impl Into<String>) -> Response {
        Response {
            status: Status::Ok,
            data: Some(Payload::Text(message.into())),
            file_name: None,
            file_content: None,
        }
    }

    /// Success carrying a name listing.
    pub fn listing(names: Vec<String>) -> Response {
        Response {
            status: Status::Ok,
            data: Some(Payload::Names(names)),
            file_name: None,
            file_content: None,
        }
    }

    /// Success carrying one base64-encoded file.
    pub fn file(name: impl Into<String>, content: impl Into<String>) -> Response {
        Response {
            status: Status::Ok,
            data: None,
            file_name: Some(name.into()),
            file_content: Some(content.into()),
        }
    }

    /// Failure with a human-readable message.
    pub fn error(message: impl Into<String>) -> Response {
        Response {
            status: Status::Error,
            data: Some(Payload::Text(message.into())),
            file_name: None,
            file_content: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Serialize to the JSON wire form, without the frame terminator.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Deserialize from the JSON wire form.
    pub fn decode(bytes: &[u8]) -> serde_json::Result<Response> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        match Request::parse("LIST") {
            Ok(Request::List) => {}
            other => panic!("Expected List, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_verb_is_case_insensitive() {
        match Request::parse("list") {
            Ok(Request::List) => {}
            other => panic!("Expected List, got {:?}", other),
        }
        match Request::parse("GeT a.dat") {
            Ok(Request::Get { name }) => assert_eq!(name, "a.dat"),
            other => panic!("Expected Get, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_get() {
        match Request::parse("GET report.pdf") {
            Ok(Request::Get { name }) => assert_eq!(name, "report.pdf"),
            other => panic!("Expected Get, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_get_name_keeps_interior_spaces() {
        match Request::parse("GET  annual report.pdf ") {
            Ok(Request::Get { name }) => assert_eq!(name, "annual report.pdf"),
            other => panic!("Expected Get, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_get_without_name() {
        match Request::parse("GET") {
            Err(ProtocolError::MissingArgument("GET", _)) => {}
            other => panic!("Expected MissingArgument, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_upload() {
        match Request::parse("UPLOAD a.dat aGVsbG8=") {
            Ok(Request::Upload { name, content }) => {
                assert_eq!(name, "a.dat");
                assert_eq!(content, "aGVsbG8=");
            }
            other => panic!("Expected Upload, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_upload_splits_name_once() {
        // Content is opaque; only the first whitespace run separates it
        // from the name.
        match Request::parse("UPLOAD a.dat YWJj ZGVm") {
            Ok(Request::Upload { name, content }) => {
                assert_eq!(name, "a.dat");
                assert_eq!(content, "YWJj ZGVm");
            }
            other => panic!("Expected Upload, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_upload_without_content() {
        match Request::parse("UPLOAD a.dat") {
            Err(ProtocolError::MissingArgument("UPLOAD", _)) => {}
            other => panic!("Expected MissingArgument, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_list_with_arguments() {
        match Request::parse("LIST please") {
            Err(ProtocolError::TrailingArguments("LIST")) => {}
            other => panic!("Expected TrailingArguments, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_command() {
        match Request::parse("FROB a.dat") {
            Err(ProtocolError::UnknownCommand(verb)) => assert_eq!(verb, "FROB"),
            other => panic!("Expected UnknownCommand, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_line() {
        match Request::parse("   ") {
            Err(ProtocolError::Empty) => {}
            other => panic!("Expected Empty, got {:?}", other),
        }
    }

    #[test]
    fn test_listing_wire_shape() {
        let json = Response::listing(vec!["a.dat".to_string(), "b.dat".to_string()])
            .encode()
            .unwrap();
        assert_eq!(
            String::from_utf8(json).unwrap(),
            r#"{"status":"OK","data":["a.dat","b.dat"]}"#
        );
    }

    #[test]
    fn test_error_wire_shape() {
        let json = Response::error("no such file").encode().unwrap();
        assert_eq!(
            String::from_utf8(json).unwrap(),
            r#"{"status":"ERROR","data":"no such file"}"#
        );
    }

    #[test]
    fn test_file_wire_shape() {
        let json = Response::file("a.dat", "aGk=").encode().unwrap();
        assert_eq!(
            String::from_utf8(json).unwrap(),
            r#"{"status":"OK","data_namafile":"a.dat","data_file":"aGk="}"#
        );
    }

    #[test]
    fn test_round_trip_every_shape() {
        let shapes = vec![
            Response::ok("a.dat uploaded (3 bytes)"),
            Response::listing(vec![]),
            Response::listing(vec!["a.dat".to_string()]),
            Response::file("a.dat", "aGk="),
            Response::error("boom"),
        ];
        for original in shapes {
            let decoded = Response::decode(&original.encode().unwrap()).unwrap();
            assert_eq!(decoded, original);
        }
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        assert!(Response::decode(b"not json at all").is_err());
        assert!(Response::decode(b"{\"data\":\"missing status\"}").is_err());
    }

    #[test]
    fn test_verb_names() {
        assert_eq!(Request::List.verb(), "LIST");
        assert_eq!(
            Request::Get {
                name: "x".to_string()
            }
            .verb(),
            "GET"
        );
    }
}
