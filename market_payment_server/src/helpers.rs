use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use log::{debug, trace};
use regex::Regex;

use crate::{data_objects::BuyerIdentity, errors::ServerError};

/// Extracts the buyer identity the identity-provider proxy attached to the request. The pipeline
/// never authenticates anyone itself; absent headers mean the proxy rejected the call already,
/// so the correct answer is 401, not a guess.
pub fn buyer_identity(req: &HttpRequest) -> Result<BuyerIdentity, ServerError> {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| ServerError::MissingIdentity(format!("{name} header missing")))
    };
    Ok(BuyerIdentity { buyer_id: header("x-buyer-id")?, full_name: header("x-buyer-name")?, email: header("x-buyer-email")? })
}

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in
/// decreasing order of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        result =
            req.headers().get("X-Forwarded-For").and_then(|v| v.to_str().ok()).and_then(|s| IpAddr::from_str(s).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        let re = Regex::new(r#"for=(?P<ip>[^;]+)"#).unwrap();
        result = req
            .headers()
            .get("Forwarded")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| re.captures(v))
            .and_then(|caps| caps.name("ip"))
            .map(|m| m.as_str())
            .and_then(|s| IpAddr::from_str(s).ok());
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.connection_info().peer_addr().map(|a| a.to_string());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr.and_then(|s| IpAddr::from_str(&s).ok())
    })
}

#[cfg(test)]
mod test {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn identity_headers_resolve_to_a_buyer() {
        let req = TestRequest::default()
            .insert_header(("x-buyer-id", "buyer-1"))
            .insert_header(("x-buyer-name", "Ada Obi"))
            .insert_header(("x-buyer-email", "ada@example.com"))
            .to_http_request();
        let id = buyer_identity(&req).unwrap();
        assert_eq!(id.buyer_id, "buyer-1");
        assert_eq!(id.full_name, "Ada Obi");
        assert_eq!(id.email, "ada@example.com");
    }

    #[test]
    fn missing_identity_headers_are_unauthorized() {
        let req = TestRequest::default().insert_header(("x-buyer-id", "buyer-1")).to_http_request();
        assert!(buyer_identity(&req).is_err());
    }
}
