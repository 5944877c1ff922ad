//! SSRF guards for outbound calls the gateway makes on a tenant's behalf:
//! control-plane pulls, webhook callbacks, and proxied target endpoints.

/// True if `url`'s host is localhost, a loopback address, a private RFC
/// 1918 range, or the cloud metadata address. Used to keep tenant-supplied
/// endpoints from reaching internal infrastructure.
pub fn is_private_url(url: &str) -> bool {
    let lower = url.to_lowercase();

    let host = lower.strip_prefix("http://").or_else(|| lower.strip_prefix("https://")).unwrap_or(&lower);
    let host = host.split('/').next().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);

    host == "localhost"
        || host == "127.0.0.1"
        || host.starts_with("10.")
        || host.starts_with("192.168.")
        || host.starts_with("172.16.")
        || host.starts_with("172.17.")
        || host.starts_with("172.18.")
        || host.starts_with("172.19.")
        || host.starts_with("172.2")
        || host.starts_with("172.30.")
        || host.starts_with("172.31.")
        || host == "169.254.169.254"
        || host == "[::1]"
        || host == "0.0.0.0"
}

/// Rewrite a localhost/loopback target to `host.docker.internal` so a
/// containerized gateway can still reach a target endpoint the client
/// thinks of as local. Any other URL is returned unchanged.
pub fn rewrite_localhost(url: &str) -> String {
    for host in ["localhost", "127.0.0.1"] {
        let needle = format!("://{host}");
        if let Some(pos) = url.find(&needle) {
            let mut rewritten = String::with_capacity(url.len());
            rewritten.push_str(&url[..pos]);
            rewritten.push_str("://host.docker.internal");
            rewritten.push_str(&url[pos + needle.len()..]);
            return rewritten;
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_loopback_and_private_ranges() {
        assert!(is_private_url("http://localhost:4500/api"));
        assert!(is_private_url("http://127.0.0.1/api"));
        assert!(is_private_url("https://192.168.1.5/api"));
        assert!(is_private_url("http://169.254.169.254/latest/meta-data"));
    }

    #[test]
    fn public_url_is_not_private() {
        assert!(!is_private_url("https://echo.example/v1"));
    }

    #[test]
    fn rewrites_localhost_target_transparently() {
        assert_eq!(rewrite_localhost("http://localhost:4500/api"), "http://host.docker.internal:4500/api");
    }

    #[test]
    fn leaves_non_loopback_targets_untouched() {
        assert_eq!(rewrite_localhost("https://echo.example/v1"), "https://echo.example/v1");
    }
}
