//! Rate-limit key extraction
//!
//! The limiter itself runs upstream; this module only decides which key a
//! request is accounted against. Behind a proxy the first hop of
//! `X-Forwarded-For` is the original client.

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Derive the rate-limit key for a request
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}
