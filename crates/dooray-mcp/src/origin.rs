//! Origin validation (anti DNS-rebinding).
//!
//! Browsers attach an `Origin` header; a page on an attacker's domain that
//! resolves to 127.0.0.1 would otherwise be able to drive this server. Only
//! local origins are accepted. Requests without an Origin header (CLI and
//! desktop MCP clients) are allowed.
//!
//! The upstream implementation matched hostnames by prefix, which also
//! admitted hosts like `localhost.evil.com`. This implementation requires
//! exact hostname equality; the tests pin down the difference.

const ALLOWED_HOSTS: &[&str] = &["localhost", "127.0.0.1"];

/// Check whether a request with this Origin header may proceed.
pub fn is_allowed(origin: Option<&str>) -> bool {
    let Some(origin) = origin else {
        return true;
    };
    match hostname(origin) {
        Some(host) => ALLOWED_HOSTS
            .iter()
            .any(|allowed| host.eq_ignore_ascii_case(allowed)),
        None => false,
    }
}

/// Extract the hostname from an origin string (`scheme://host[:port]`).
///
/// Returns `None` for anything that does not look like an origin.
fn hostname(origin: &str) -> Option<&str> {
    let (scheme, rest) = origin.split_once("://")?;
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') {
        return None;
    }

    // An origin has no path/query/fragment, but be lenient and cut them off.
    let authority = rest
        .split(['/', '?', '#'])
        .next()
        .filter(|a| !a.is_empty())?;

    // Bracketed IPv6 literal.
    if let Some(stripped) = authority.strip_prefix('[') {
        return stripped.split(']').next().filter(|h| !h.is_empty());
    }

    let host = match authority.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        Some(_) => return None,
        None => authority,
    };
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_origin_is_allowed() {
        assert!(is_allowed(None));
    }

    #[test]
    fn localhost_origins_are_allowed() {
        assert!(is_allowed(Some("http://localhost:3000")));
        assert!(is_allowed(Some("http://localhost")));
        assert!(is_allowed(Some("https://localhost:8443")));
        assert!(is_allowed(Some("http://127.0.0.1:8080")));
        assert!(is_allowed(Some("http://LOCALHOST:3000")));
    }

    #[test]
    fn foreign_origins_are_rejected() {
        assert!(!is_allowed(Some("http://evil.com")));
        assert!(!is_allowed(Some("https://example.org:443")));
        assert!(!is_allowed(Some("http://192.168.1.10:8080")));
    }

    // Upstream's prefix matching admitted these lookalike hosts; exact
    // hostname comparison must not.
    #[test]
    fn lookalike_hosts_are_rejected() {
        assert!(!is_allowed(Some("http://localhost.evil.com")));
        assert!(!is_allowed(Some("http://127.0.0.1.evil.com:8080")));
    }

    #[test]
    fn malformed_origins_are_rejected() {
        assert!(!is_allowed(Some("")));
        assert!(!is_allowed(Some("localhost")));
        assert!(!is_allowed(Some("not a url")));
        assert!(!is_allowed(Some("http://")));
        assert!(!is_allowed(Some("://localhost")));
        assert!(!is_allowed(Some("http://host:notaport")));
    }

    #[test]
    fn ipv6_loopback_is_not_in_the_allow_list() {
        // Exact-match policy: only the two configured hosts pass.
        assert!(!is_allowed(Some("http://[::1]:8080")));
    }
}
