use super::{Error, Result};

pub(super) fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
}

pub(super) fn host_header_value(parsed: &url::Url) -> Option<String> {
    let host = parsed.host_str()?;
    match parsed.port() {
        Some(port) if port != 80 => Some(format!("{host}:{port}")),
        _ => Some(host.to_string()),
    }
}

/// `host:port` to dial for an `http://` URL.
pub(super) fn dial_addr(parsed: &url::Url) -> Option<String> {
    let host = parsed.host_str()?;
    let port = parsed.port_or_known_default()?;
    Some(format!("{host}:{port}"))
}

pub(super) fn parse_http_url(raw: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(raw).map_err(|_| Error::InvalidUrl(raw.to_string()))?;
    if parsed.scheme() != "http" {
        return Err(Error::OnlyHttpSupported(raw.to_string()));
    }
    if parsed.host_str().is_none() {
        return Err(Error::InvalidUrl(raw.to_string()));
    }
    Ok(parsed)
}

/// Accepts `host:port` or `http://host:port`.
pub(super) fn parse_proxy(raw: &str) -> Result<url::Url> {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let parsed =
        url::Url::parse(&with_scheme).map_err(|_| Error::InvalidProxy(raw.to_string()))?;
    if parsed.scheme() != "http" {
        return Err(Error::OnlyHttpSupported(raw.to_string()));
    }
    if parsed.host_str().is_none() {
        return Err(Error::InvalidProxy(raw.to_string()));
    }
    Ok(parsed)
}
