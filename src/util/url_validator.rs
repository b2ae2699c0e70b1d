use std::net::IpAddr;
use thiserror::Error;
use url::{Host, Url};

/// Reasons a candidate feed URL is refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlValidationError {
    /// Nothing but whitespace was submitted.
    #[error("URL is empty")]
    Empty,
    /// The string is not an absolute URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Only http and https feeds can be fetched.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The host is a private, link-local or unspecified address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The host is localhost or a loopback address.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Checks that `url_str` is a well-formed absolute http(s) URL.
///
/// This is the whole of the well-formedness rule for registration. It does
/// not look at where the host points; see [`validate_url`] for that.
pub fn validate_url_format(url_str: &str) -> Result<Url, UrlValidationError> {
    let trimmed = url_str.trim();
    if trimmed.is_empty() {
        return Err(UrlValidationError::Empty);
    }

    let url = Url::parse(trimmed)?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    Ok(url)
}

/// Validates a feed URL and rejects hosts on the local machine or a private
/// network.
///
/// Used for registration unless `allow_private_hosts` is set. Rejected hosts:
/// - `localhost` and loopback addresses
/// - private, link-local and unspecified IPv4/IPv6 addresses
///
/// # Arguments
///
/// * `url_str` - The URL string to validate
///
/// # Returns
///
/// The parsed and validated [`Url`] on success.
///
/// # Errors
///
/// Returns [`UrlValidationError`] if:
/// - `Empty`: the string is empty or whitespace
/// - `InvalidUrl`: it does not parse as an absolute URL
/// - `UnsupportedScheme`: the scheme is not http or https
/// - `Localhost`: the host is localhost or a loopback address
/// - `PrivateIp`: the host is a private, link-local or unspecified address
///
/// # Examples
///
/// ```
/// use feedsync::util::validate_url;
///
/// assert!(validate_url("https://example.com/feed.xml").is_ok());
/// assert!(validate_url("http://localhost/feed").is_err());
/// assert!(validate_url("http://10.0.0.7/rss").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = validate_url_format(url_str)?;

    match url.host() {
        Some(Host::Domain(domain)) if domain.eq_ignore_ascii_case("localhost") => {
            return Err(UrlValidationError::Localhost);
        }
        Some(Host::Ipv4(ip)) => check_ip(IpAddr::V4(ip))?,
        Some(Host::Ipv6(ip)) => check_ip(IpAddr::V6(ip))?,
        _ => {}
    }

    Ok(url)
}

fn check_ip(ip: IpAddr) -> Result<(), UrlValidationError> {
    if ip.is_loopback() {
        return Err(UrlValidationError::Localhost);
    }
    if is_private_ip(&ip) {
        return Err(UrlValidationError::PrivateIp(ip.to_string()));
    }
    Ok(())
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link local
            v6.is_unspecified() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}
