use std::net::Ipv4Addr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("No WS-Discovery responders on the local network")]
    NoResponders,
    #[error("No metadata endpoint answered")]
    MetadataUnreachable,
    #[error("Responder metadata did not yield a usable NetBIOS name")]
    NameUnresolvable,
    #[error("Discovery needs user input{}", partial_suffix(.ip))]
    NeedsUserInput { ip: Option<Ipv4Addr> },
    #[error("Malformed SOAP envelope: {0}")]
    BadEnvelope(String),
}

fn partial_suffix(ip: &Option<Ipv4Addr>) -> String {
    match ip {
        Some(ip) => format!(" (found a responder at {ip} but no name)"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
