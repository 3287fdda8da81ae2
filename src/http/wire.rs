//! HTTP/1.1 framing for rendered requests.
//!
//! Requests go out exactly as rendered: header names keep their case and
//! the request target is copied from the URI without normalization.
//! Responses are parsed only far enough to find the status and drain the
//! body.
use http::Method;
use http::header::{HeaderName, HeaderValue};
use httparse::Status;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use url::{Host, Url};

use crate::error::DispatchError;

use super::request::RenderedRequest;

/// Largest response head accepted.
const MAX_HEAD_BYTES: usize = 64 * 1024;
const MAX_RESPONSE_HEADERS: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Scheme {
    Http,
    Https,
}

impl Scheme {
    const fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// Scheme, host and port a request is sent to. Connections are pooled per
/// origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Origin {
    pub(crate) scheme: Scheme,
    /// Bare host, without IPv6 brackets.
    pub(crate) host: String,
    pub(crate) port: u16,
}

impl Origin {
    pub(crate) fn from_url(url: &Url) -> Result<Self, DispatchError> {
        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(DispatchError::UnsupportedScheme {
                    scheme: other.to_owned(),
                });
            }
        };
        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_owned(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => {
                return Err(DispatchError::MissingHost {
                    url: url.as_str().to_owned(),
                });
            }
        };
        Ok(Self {
            scheme,
            host,
            port: url.port().unwrap_or_else(|| scheme.default_port()),
        })
    }

    /// `host:port` as used in a CONNECT request.
    pub(crate) fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// A request encoded for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WireRequest {
    pub(crate) origin: Origin,
    pub(crate) bytes: Vec<u8>,
    /// Responses to HEAD carry no body whatever their headers say.
    pub(crate) head_only: bool,
}

/// Encodes `request` as an HTTP/1.1 message.
///
/// Headers are written in order: `Host`, `User-Agent`, the configured
/// headers, then `Content-Length`. A configured header replaces any earlier
/// one whose name matches case-insensitively; the configured spelling is
/// the one sent.
pub(crate) fn encode_request(request: &RenderedRequest) -> Result<WireRequest, DispatchError> {
    let method = request.method_label();
    Method::from_bytes(method.as_bytes()).map_err(|err| DispatchError::InvalidMethod {
        method: method.to_owned(),
        source: err,
    })?;
    let url = Url::parse(&request.uri).map_err(|err| DispatchError::InvalidUrl {
        url: request.uri.clone(),
        source: err,
    })?;
    let origin = Origin::from_url(&url)?;
    let (authority, target) = split_raw_uri(&request.uri);
    if target.bytes().any(|byte| byte.is_ascii_control() || byte == b' ') {
        return Err(DispatchError::InvalidTarget { target });
    }

    check_header_value("User-Agent", &request.user_agent)?;
    let content_length = request.body.len().to_string();
    let mut headers: Vec<(&str, &str)> = vec![
        ("Host", authority),
        ("User-Agent", request.user_agent.as_str()),
    ];
    for (name, value) in &request.headers {
        HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
            DispatchError::InvalidHeaderName {
                name: name.clone(),
                source: err,
            }
        })?;
        check_header_value(name, value)?;
        set_header(&mut headers, name, value);
    }
    if (!request.body.is_empty() || expects_body(method))
        && !headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-length"))
    {
        headers.push(("Content-Length", &content_length));
    }

    let mut bytes = Vec::new();
    bytes.extend_from_slice(method.as_bytes());
    bytes.push(b' ');
    bytes.extend_from_slice(target.as_bytes());
    bytes.extend_from_slice(b" HTTP/1.1\r\n");
    for (name, value) in &headers {
        bytes.extend_from_slice(name.as_bytes());
        bytes.extend_from_slice(b": ");
        bytes.extend_from_slice(value.as_bytes());
        bytes.extend_from_slice(b"\r\n");
    }
    bytes.extend_from_slice(b"\r\n");
    bytes.extend_from_slice(request.body.as_bytes());

    Ok(WireRequest {
        origin,
        bytes,
        head_only: method == "HEAD",
    })
}

fn check_header_value(name: &str, value: &str) -> Result<(), DispatchError> {
    HeaderValue::from_bytes(value.as_bytes())
        .map(drop)
        .map_err(|err| DispatchError::InvalidHeaderValue {
            name: name.to_owned(),
            source: err,
        })
}

fn set_header<'req>(
    headers: &mut Vec<(&'req str, &'req str)>,
    name: &'req str,
    value: &'req str,
) {
    headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    headers.push((name, value));
}

fn expects_body(method: &str) -> bool {
    ["POST", "PUT", "PATCH"].contains(&method)
}

/// Splits a rendered URI into its raw authority (without user info) and
/// the request target, both exactly as written. The fragment is dropped.
fn split_raw_uri(uri: &str) -> (&str, String) {
    let rest = uri.split_once("://").map_or(uri, |(_, rest)| rest);
    let rest = rest.split_once('#').map_or(rest, |(before, _)| before);
    let (authority, target) = rest.split_at(rest.find(['/', '?']).unwrap_or(rest.len()));
    let authority = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);
    let target = if target.is_empty() {
        "/".to_owned()
    } else if target.starts_with('?') {
        format!("/{}", target)
    } else {
        target.to_owned()
    };
    (authority, target)
}

/// Status line and framing of a response head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResponseHead {
    status: u16,
    framing: Framing,
    keep_alive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Length(u64),
    Chunked,
    UntilClose,
}

/// What was learned from a fully drained response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResponseSummary {
    pub(crate) status: u16,
    /// The connection may carry another request.
    pub(crate) reusable: bool,
}

/// Reads one response and discards its body. Informational (1xx)
/// responses other than 101 are skipped.
pub(crate) async fn read_response<R>(
    reader: &mut R,
    head_only: bool,
) -> Result<ResponseSummary, DispatchError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let head = parse_head(&read_head(reader).await?)?;
        if (100..200).contains(&head.status) && head.status != 101 {
            continue;
        }
        let bodiless =
            head_only || head.status < 200 || head.status == 204 || head.status == 304;
        let framed = if bodiless {
            true
        } else {
            match head.framing {
                Framing::Length(len) => {
                    drain_exact(reader, len).await?;
                    true
                }
                Framing::Chunked => {
                    drain_chunked(reader).await?;
                    true
                }
                Framing::UntilClose => {
                    tokio::io::copy(reader, &mut tokio::io::sink())
                        .await
                        .map_err(|source| DispatchError::Io { source })?;
                    false
                }
            }
        };
        return Ok(ResponseSummary {
            status: head.status,
            reusable: framed && head.keep_alive && head.status != 101,
        });
    }
}

/// Reads a proxy's reply to CONNECT and returns its status. The reply has
/// no body.
pub(crate) async fn read_tunnel_reply<R>(reader: &mut R) -> Result<u16, DispatchError>
where
    R: AsyncBufRead + Unpin,
{
    Ok(parse_head(&read_head(reader).await?)?.status)
}

async fn read_head<R>(reader: &mut R) -> Result<Vec<u8>, DispatchError>
where
    R: AsyncBufRead + Unpin,
{
    let mut head = Vec::new();
    loop {
        let line_start = head.len();
        let read = reader
            .read_until(b'\n', &mut head)
            .await
            .map_err(|source| DispatchError::Io { source })?;
        if read == 0 {
            return Err(DispatchError::ConnectionClosed);
        }
        if head.len() > MAX_HEAD_BYTES {
            return Err(DispatchError::malformed("response head too large"));
        }
        let line = head.get(line_start..).unwrap_or_default();
        if line == b"\r\n" || line == b"\n" {
            if line_start == 0 {
                head.clear();
                continue;
            }
            return Ok(head);
        }
    }
}

fn parse_head(raw: &[u8]) -> Result<ResponseHead, DispatchError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_RESPONSE_HEADERS];
    let mut response = httparse::Response::new(&mut headers);
    match response.parse(raw) {
        Ok(Status::Complete(_)) => {}
        Ok(Status::Partial) => return Err(DispatchError::malformed("incomplete response head")),
        Err(err) => return Err(DispatchError::malformed(err.to_string())),
    }
    let status = response
        .code
        .ok_or_else(|| DispatchError::malformed("missing status code"))?;

    let mut keep_alive = response.version != Some(0);
    let mut content_length = None;
    let mut chunked = false;
    for header in response.headers.iter() {
        let value = String::from_utf8_lossy(header.value);
        if header.name.eq_ignore_ascii_case("content-length") {
            let len = value
                .trim()
                .parse::<u64>()
                .map_err(|err| DispatchError::malformed(format!("bad Content-Length: {}", err)))?;
            content_length = Some(len);
        } else if header.name.eq_ignore_ascii_case("transfer-encoding") {
            chunked = value
                .rsplit(',')
                .next()
                .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"));
        } else if header.name.eq_ignore_ascii_case("connection") {
            for token in value.split(',').map(str::trim) {
                if token.eq_ignore_ascii_case("close") {
                    keep_alive = false;
                } else if token.eq_ignore_ascii_case("keep-alive") {
                    keep_alive = true;
                }
            }
        }
    }

    let framing = if chunked {
        Framing::Chunked
    } else {
        content_length.map_or(Framing::UntilClose, Framing::Length)
    };
    Ok(ResponseHead {
        status,
        framing,
        keep_alive,
    })
}

async fn drain_exact<R>(reader: &mut R, len: u64) -> Result<(), DispatchError>
where
    R: AsyncBufRead + Unpin,
{
    let copied = tokio::io::copy(&mut (&mut *reader).take(len), &mut tokio::io::sink())
        .await
        .map_err(|source| DispatchError::Io { source })?;
    if copied < len {
        return Err(DispatchError::ConnectionClosed);
    }
    Ok(())
}

async fn drain_chunked<R>(reader: &mut R) -> Result<(), DispatchError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        read_line(reader, &mut line).await?;
        let size = match httparse::parse_chunk_size(&line) {
            Ok(Status::Complete((_, size))) => size,
            Ok(Status::Partial) | Err(_) => {
                return Err(DispatchError::malformed("bad chunk size line"));
            }
        };
        if size == 0 {
            // Trailers run until an empty line.
            loop {
                line.clear();
                read_line(reader, &mut line).await?;
                if line == b"\r\n" || line == b"\n" {
                    return Ok(());
                }
            }
        }
        drain_exact(reader, size).await?;
        line.clear();
        read_line(reader, &mut line).await?;
    }
}

async fn read_line<R>(reader: &mut R, line: &mut Vec<u8>) -> Result<(), DispatchError>
where
    R: AsyncBufRead + Unpin,
{
    let read = reader
        .read_until(b'\n', line)
        .await
        .map_err(|source| DispatchError::Io { source })?;
    if read == 0 {
        return Err(DispatchError::ConnectionClosed);
    }
    Ok(())
}
