use std::net::IpAddr;

/// Returns true only if `candidate` parses as an IP address and that address
/// is IPv4. An IPv6 literal is a valid IP but yields false here.
pub fn is_ipv4(candidate: &str) -> bool {
    matches!(candidate.parse::<IpAddr>(), Ok(IpAddr::V4(_)))
}
