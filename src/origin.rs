use url::Url;

/// Prefixes `default_scheme://` when `url` carries no scheme of its own.
/// The string is otherwise left untouched.
pub fn ensure_scheme(url: &str, default_scheme: &str) -> String {
    if url.contains("://") {
        url.to_string()
    } else {
        format!("{default_scheme}://{url}")
    }
}

/// Resolves `href` against `base` per RFC 3986. An href that does not parse
/// is not an error, it is a candidate that gets dropped.
pub fn resolve(base: &Url, href: &str) -> Option<Url> {
    base.join(href).ok()
}

/// Two URLs share an origin when both scheme and host match. URLs without a
/// host (`mailto:`, `data:`) never match anything.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host_str().is_some() && a.host_str() == b.host_str()
}
