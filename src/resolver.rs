use std::net::{IpAddr, Ipv4Addr};

/// Forward DNS resolution failed for a domain.
///
/// Wraps whatever the platform resolver reported (NXDOMAIN, SERVFAIL,
/// timeout). Not retried here; callers decide what a failed resolution means.
#[derive(Debug, thiserror::Error)]
#[error("resolution failed: {0}")]
pub struct ResolveError(#[from] std::io::Error);

/// Maps a domain name to its IPv4 addresses.
///
/// Implementations are expected to block; the service layer runs them on the
/// blocking pool.
pub trait Resolver: Send + Sync {
    fn resolve(&self, domain: &str) -> Result<Vec<Ipv4Addr>, ResolveError>;
}

/// Resolver backed by the platform's getaddrinfo, restricted to IPv4.
///
/// Returns distinct addresses in the order the resolver produced them. The
/// order is resolver-defined and not stable across calls. No caching and no
/// timeout beyond what the platform applies.
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, domain: &str) -> Result<Vec<Ipv4Addr>, ResolveError> {
        let mut addrs: Vec<Ipv4Addr> = Vec::new();
        for ip in dns_lookup::lookup_host(domain)? {
            if let IpAddr::V4(v4) = ip {
                if !addrs.contains(&v4) {
                    addrs.push(v4);
                }
            }
        }

        // A host with only AAAA records has no IPv4 answer; treat that the
        // same as an unresolvable domain so no record is ever created for it.
        if addrs.is_empty() {
            return Err(ResolveError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no IPv4 addresses for {}", domain),
            )));
        }

        Ok(addrs)
    }
}
