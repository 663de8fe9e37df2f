use crate::ctx::Ctx;
use crate::error::{Error, ErrorCode};
use ahash::AHashMap;
use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

/// Where the request body comes from.
pub(crate) enum BodySource {
    Empty,
    Bytes(Bytes),
    Hyper(hyper::body::Incoming),
}

pub(crate) struct BodyState {
    source: BodySource,
    cached: Option<Bytes>,
    read: bool,
    over_limit: bool,
}

impl BodyState {
    pub(crate) fn new(source: BodySource) -> Self {
        BodyState {
            source,
            cached: None,
            read: false,
            over_limit: false,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.source = BodySource::Empty;
        self.cached = None;
        self.read = false;
        self.over_limit = false;
    }
}

impl<V: Send + 'static> Ctx<V> {
    /// Reads the request body, at most once.
    ///
    /// The read is capped at the larger of the per-request override and
    /// the configured maximum; exceeding the cap fails with
    /// `invalid_request` and the body stays unread. On success the bytes
    /// are cached — every later call returns the same bytes without
    /// touching the stream — and mirrored onto the response writer for
    /// post-hoc inspection.
    pub async fn need_body(&self) -> Result<Bytes, Error> {
        let cap = self.effective_body_cap();
        let mut state = self.shared.body.lock().await;
        if state.read {
            if state.over_limit {
                return Err(Error::new(ErrorCode::InvalidRequest)
                    .with_message("request body exceeds limit"));
            }
            return Ok(state.cached.clone().unwrap_or_else(Bytes::new));
        }

        let source = std::mem::replace(&mut state.source, BodySource::Empty);
        let collected = match source {
            BodySource::Empty => Ok(Bytes::new()),
            BodySource::Bytes(bytes) => {
                if bytes.len() > cap {
                    Err(None)
                } else {
                    Ok(bytes)
                }
            }
            BodySource::Hyper(incoming) => read_capped(incoming, cap).await,
        };

        state.read = true;
        match collected {
            Ok(bytes) => {
                state.cached = Some(bytes.clone());
                drop(state);
                self.writer().capture_request_body(bytes.clone());
                Ok(bytes)
            }
            Err(cause) => {
                state.over_limit = true;
                drop(state);
                match cause {
                    Some(io_err) => Err(Error::with_cause(ErrorCode::Internal, io_err)
                        .with_message("failed to read request body")),
                    None => Err(Error::new(ErrorCode::InvalidRequest)
                        .with_message("request body exceeds limit")),
                }
            }
        }
    }

    /// Decodes the body as JSON.
    pub async fn bind_json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let body = self.need_body().await?;
        serde_json::from_slice(&body)
            .map_err(|err| Error::with_cause(ErrorCode::InvalidJson, err))
    }

    /// Decodes the body as XML.
    pub async fn bind_xml<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let body = self.need_body().await?;
        let text = std::str::from_utf8(&body)
            .map_err(|err| Error::with_cause(ErrorCode::InvalidRequest, err))?;
        quick_xml::de::from_str(text)
            .map_err(|err| Error::with_cause(ErrorCode::InvalidRequest, err))
    }

    /// Decodes the body as a URL-encoded form.
    pub async fn bind_form<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let body = self.need_body().await?;
        serde_urlencoded::from_bytes(&body)
            .map_err(|err| Error::with_cause(ErrorCode::InvalidForm, err))
    }

    /// Reads the text fields of a `multipart/form-data` body. File parts
    /// are skipped.
    pub async fn bind_multipart_form(&self) -> Result<AHashMap<String, String>, Error> {
        let boundary = self.multipart_boundary()?;
        let body = self.need_body().await?;
        parse_multipart_fields(&body, &boundary)
    }

    /// Decodes the body by its `Content-Type`: JSON, XML, URL-encoded
    /// form or multipart form. Anything else fails with
    /// `invalid_request`.
    pub async fn bind<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let media = self.media_type();
        match media {
            Some(m) if m.type_() == mime::APPLICATION && m.subtype() == mime::JSON => {
                self.bind_json().await
            }
            Some(m)
                if m.subtype() == mime::XML
                    && (m.type_() == mime::APPLICATION || m.type_() == mime::TEXT) =>
            {
                self.bind_xml().await
            }
            Some(m)
                if m.type_() == mime::APPLICATION
                    && m.subtype() == mime::WWW_FORM_URLENCODED =>
            {
                self.bind_form().await
            }
            Some(m) if m.type_() == mime::MULTIPART && m.subtype() == mime::FORM_DATA => {
                let fields = self.bind_multipart_form().await?;
                let mut encoder = url::form_urlencoded::Serializer::new(String::new());
                for (key, value) in &fields {
                    encoder.append_pair(key, value);
                }
                let encoded = encoder.finish();
                serde_urlencoded::from_str(&encoded)
                    .map_err(|err| Error::with_cause(ErrorCode::InvalidForm, err))
            }
            _ => Err(Error::new(ErrorCode::InvalidRequest)
                .with_message("unsupported media type")),
        }
    }

    fn media_type(&self) -> Option<mime::Mime> {
        self.get_header("content-type")?.parse().ok()
    }

    fn multipart_boundary(&self) -> Result<String, Error> {
        let media = self
            .media_type()
            .ok_or_else(|| Error::new(ErrorCode::InvalidRequest).with_message("missing content type"))?;
        if media.type_() != mime::MULTIPART || media.subtype() != mime::FORM_DATA {
            return Err(Error::new(ErrorCode::InvalidRequest)
                .with_message("expected multipart/form-data"));
        }
        media
            .get_param(mime::BOUNDARY)
            .map(|b| b.as_str().to_string())
            .ok_or_else(|| {
                Error::new(ErrorCode::InvalidForm).with_message("multipart boundary missing")
            })
    }
}

async fn read_capped(
    incoming: hyper::body::Incoming,
    cap: usize,
) -> Result<Bytes, Option<hyper::Error>> {
    let mut incoming = incoming;
    let mut buf = BytesMut::new();
    while let Some(frame) = incoming.frame().await {
        let frame = frame.map_err(Some)?;
        if let Ok(data) = frame.into_data() {
            if buf.len() + data.len() > cap {
                return Err(None);
            }
            buf.extend_from_slice(&data);
        }
    }
    Ok(buf.freeze())
}

fn parse_multipart_fields(body: &[u8], boundary: &str) -> Result<AHashMap<String, String>, Error> {
    let text = std::str::from_utf8(body)
        .map_err(|err| Error::with_cause(ErrorCode::InvalidForm, err))?;
    let marker = format!("--{}", boundary);
    let mut fields = AHashMap::new();

    for part in text.split(marker.as_str()) {
        let part = part.trim_start_matches("\r\n");
        if part.is_empty() || part == "--" || part == "--\r\n" {
            continue;
        }
        let Some((head, value)) = part.split_once("\r\n\r\n") else {
            continue;
        };
        let disposition = head
            .lines()
            .find(|line| line.to_ascii_lowercase().starts_with("content-disposition"))
            .unwrap_or("");
        if disposition.contains("filename=") {
            continue;
        }
        let Some(name) = extract_quoted(disposition, "name=") else {
            continue;
        };
        let value = value.strip_suffix("\r\n").unwrap_or(value);
        fields.insert(name, value.to_string());
    }

    Ok(fields)
}

fn extract_quoted(line: &str, key: &str) -> Option<String> {
    let at = line.find(key)? + key.len();
    let rest = &line[at..];
    let rest = rest.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}
