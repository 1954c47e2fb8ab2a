//! CAS `serviceResponse` parser.
//!
//! A namespace-aware pull parser over `quick_xml` that maps the validation
//! document onto [`ServiceResponse`]. Root element and namespace are checked
//! explicitly; anything that is not exactly one success or one failure is
//! reported as [`CasError::MalformedResponse`].

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

use crate::error::{CasError, CasResult};
use crate::types::{elements, Failure, ServiceResponse, Success, CAS_NS};

/// Default upper bound for a validation response body.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// Stateless parser for CAS validation responses.
///
/// Construct one and hand it to the [`TicketValidator`](crate::validator::TicketValidator);
/// it holds no state between calls and may be shared freely.
#[derive(Debug, Clone, Copy)]
pub struct ServiceResponseParser {
    max_response_bytes: usize,
}

impl Default for ServiceResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceResponseParser {
    /// Creates a parser with the default size limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    /// Sets the largest body the parser accepts.
    #[must_use]
    pub const fn with_max_response_bytes(mut self, max: usize) -> Self {
        self.max_response_bytes = max;
        self
    }

    /// Parses a CAS `serviceResponse` document.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::MalformedResponse`] if the body is too large, is
    /// not well-formed XML, has the wrong root element or namespace, or does
    /// not contain exactly one `authenticationSuccess` or
    /// `authenticationFailure`.
    pub fn parse(&self, xml: &str) -> CasResult<ServiceResponse> {
        if xml.len() > self.max_response_bytes {
            return Err(CasError::malformed(format!(
                "response body exceeds {} bytes",
                self.max_response_bytes
            )));
        }

        let mut stream = NodeStream::new(xml);
        expect_root(&mut stream)?;

        let mut success = None;
        let mut failure = None;

        loop {
            match stream.next()? {
                XmlNode::Open(open) if open.is_cas(elements::AUTHENTICATION_SUCCESS) => {
                    if success.is_some() {
                        return Err(duplicate(elements::AUTHENTICATION_SUCCESS));
                    }
                    success = Some(parse_success(&mut stream, &open)?);
                }
                XmlNode::Open(open) if open.is_cas(elements::AUTHENTICATION_FAILURE) => {
                    if failure.is_some() {
                        return Err(duplicate(elements::AUTHENTICATION_FAILURE));
                    }
                    failure = Some(parse_failure(&mut stream, &open)?);
                }
                XmlNode::Open(open) => stream.skip(&open)?,
                XmlNode::Text(_) => {}
                XmlNode::Close => break,
                XmlNode::Eof => return Err(truncated()),
            }
        }

        expect_end_of_document(&mut stream)?;

        match (success, failure) {
            (Some(success), None) => Ok(ServiceResponse::Success(success)),
            (None, Some(failure)) => Ok(ServiceResponse::Failure(failure)),
            (Some(_), Some(_)) => Err(CasError::malformed(
                "serviceResponse contains both authenticationSuccess and authenticationFailure",
            )),
            (None, None) => Err(CasError::malformed(
                "serviceResponse contains neither authenticationSuccess nor authenticationFailure",
            )),
        }
    }
}

fn expect_root(stream: &mut NodeStream<'_>) -> CasResult<()> {
    loop {
        match stream.next()? {
            XmlNode::Text(text) if text.trim().is_empty() => {}
            XmlNode::Open(open) if open.is_cas(elements::SERVICE_RESPONSE) && !open.empty => {
                return Ok(());
            }
            XmlNode::Open(open) if open.is_cas(elements::SERVICE_RESPONSE) => {
                return Err(CasError::malformed("serviceResponse is empty"));
            }
            XmlNode::Open(open) => {
                return Err(CasError::malformed(format!(
                    "unexpected root element '{}' (expected {{{CAS_NS}}}{})",
                    open.local_name,
                    elements::SERVICE_RESPONSE
                )));
            }
            XmlNode::Text(_) => return Err(CasError::malformed("text before root element")),
            XmlNode::Close => return Err(CasError::malformed("unbalanced end tag")),
            XmlNode::Eof => return Err(CasError::malformed("empty document")),
        }
    }
}

fn expect_end_of_document(stream: &mut NodeStream<'_>) -> CasResult<()> {
    loop {
        match stream.next()? {
            XmlNode::Eof => return Ok(()),
            XmlNode::Text(text) if text.trim().is_empty() => {}
            _ => return Err(CasError::malformed("content after root element")),
        }
    }
}

fn parse_success(stream: &mut NodeStream<'_>, open: &OpenTag) -> CasResult<Success> {
    if open.empty {
        return Err(CasError::malformed("authenticationSuccess has no user"));
    }

    let mut user: Option<String> = None;
    let mut attributes_seen = false;
    let mut success = Success::new(String::new());

    loop {
        match stream.next()? {
            XmlNode::Open(child) if child.is_cas(elements::USER) => {
                if user.is_some() {
                    return Err(duplicate(elements::USER));
                }
                user = Some(stream.text_content(&child)?.trim().to_string());
            }
            XmlNode::Open(child) if child.is_cas(elements::ATTRIBUTES) => {
                if attributes_seen {
                    return Err(duplicate(elements::ATTRIBUTES));
                }
                attributes_seen = true;
                parse_attributes(stream, &child, &mut success)?;
            }
            // proxyGrantingTicket, proxies and vendor extensions
            XmlNode::Open(child) => stream.skip(&child)?,
            XmlNode::Text(_) => {}
            XmlNode::Close => break,
            XmlNode::Eof => return Err(truncated()),
        }
    }

    match user {
        Some(user) if !user.is_empty() => {
            success.user = user;
            Ok(success)
        }
        Some(_) => Err(CasError::malformed("authenticationSuccess has an empty user")),
        None => Err(CasError::malformed("authenticationSuccess has no user")),
    }
}

fn parse_attributes(
    stream: &mut NodeStream<'_>,
    open: &OpenTag,
    success: &mut Success,
) -> CasResult<()> {
    if open.empty {
        return Ok(());
    }

    loop {
        match stream.next()? {
            XmlNode::Open(attribute) => {
                let value = stream.text_content(&attribute)?;
                success.push_attribute(attribute.local_name, value);
            }
            XmlNode::Text(_) => {}
            XmlNode::Close => return Ok(()),
            XmlNode::Eof => return Err(truncated()),
        }
    }
}

fn parse_failure(stream: &mut NodeStream<'_>, open: &OpenTag) -> CasResult<Failure> {
    let code = open
        .code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .ok_or_else(|| CasError::malformed("authenticationFailure has no code"))?;

    let description = stream.text_content(open)?.trim().to_string();
    Ok(Failure::new(code, description))
}

fn duplicate(element: &str) -> CasError {
    CasError::malformed(format!("duplicate {element} element"))
}

fn truncated() -> CasError {
    CasError::malformed("unexpected end of document")
}

fn xml_error(err: impl std::fmt::Display) -> CasError {
    CasError::malformed(format!("XML parsing error: {err}"))
}

/// An opening tag, with the only attribute the protocol cares about.
#[derive(Debug)]
struct OpenTag {
    local_name: String,
    in_cas_ns: bool,
    code: Option<String>,
    empty: bool,
}

impl OpenTag {
    fn is_cas(&self, name: &str) -> bool {
        self.in_cas_ns && self.local_name == name
    }
}

/// Owned, simplified view of the events the parser acts on.
#[derive(Debug)]
enum XmlNode {
    Open(OpenTag),
    Close,
    Text(String),
    Eof,
}

struct NodeStream<'a> {
    reader: NsReader<&'a [u8]>,
}

impl<'a> NodeStream<'a> {
    fn new(xml: &'a str) -> Self {
        Self {
            reader: NsReader::from_str(xml),
        }
    }

    fn next(&mut self) -> CasResult<XmlNode> {
        loop {
            let (namespace, event) = self.reader.read_resolved_event().map_err(xml_error)?;
            let in_cas_ns = match namespace {
                ResolveResult::Bound(Namespace(uri)) => uri == CAS_NS.as_bytes(),
                ResolveResult::Unbound => false,
                ResolveResult::Unknown(prefix) => {
                    return Err(CasError::malformed(format!(
                        "undeclared namespace prefix '{}'",
                        String::from_utf8_lossy(&prefix)
                    )));
                }
            };

            match event {
                Event::Start(start) => return open_tag(&start, in_cas_ns, false).map(XmlNode::Open),
                Event::Empty(start) => return open_tag(&start, in_cas_ns, true).map(XmlNode::Open),
                Event::End(_) => return Ok(XmlNode::Close),
                Event::Text(text) => {
                    let text = text.unescape().map_err(xml_error)?;
                    return Ok(XmlNode::Text(text.into_owned()));
                }
                Event::CData(cdata) => {
                    let text = std::str::from_utf8(&cdata).map_err(xml_error)?;
                    return Ok(XmlNode::Text(text.to_string()));
                }
                Event::DocType(_) => {
                    return Err(CasError::malformed("DOCTYPE declarations are not allowed"));
                }
                Event::Eof => return Ok(XmlNode::Eof),
                _ => {}
            }
        }
    }

    /// Collects all descendant text of `open` as written.
    fn text_content(&mut self, open: &OpenTag) -> CasResult<String> {
        let mut content = String::new();
        if open.empty {
            return Ok(content);
        }

        let mut depth = 0usize;
        loop {
            match self.next()? {
                XmlNode::Open(child) if !child.empty => depth += 1,
                XmlNode::Open(_) => {}
                XmlNode::Text(text) => content.push_str(&text),
                XmlNode::Close if depth == 0 => break,
                XmlNode::Close => depth -= 1,
                XmlNode::Eof => return Err(truncated()),
            }
        }

        Ok(content)
    }

    /// Consumes `open` and everything inside it.
    fn skip(&mut self, open: &OpenTag) -> CasResult<()> {
        self.text_content(open).map(|_| ())
    }
}

fn open_tag(start: &BytesStart<'_>, in_cas_ns: bool, empty: bool) -> CasResult<OpenTag> {
    let local_name = std::str::from_utf8(start.local_name().as_ref())
        .map_err(xml_error)?
        .to_string();

    let code = start
        .try_get_attribute(elements::CODE)
        .map_err(xml_error)?
        .map(|attr| attr.unescape_value().map(|v| v.into_owned()))
        .transpose()
        .map_err(xml_error)?;

    Ok(OpenTag {
        local_name,
        in_cas_ns,
        code,
        empty,
    })
}
