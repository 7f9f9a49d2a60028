use std::fmt;

use serde::{Deserialize, Serialize};

/// One concrete stream URL under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub stream_id: String,
    pub suffix: String,
    pub url: String,
}

impl Endpoint {
    pub fn new(host: &str, stream_id: &str, suffix: &str) -> Self {
        Self {
            host: host.to_string(),
            stream_id: stream_id.to_string(),
            suffix: suffix.to_string(),
            url: format!("{}/{}{}", host, stream_id, suffix),
        }
    }

    /// Mount name as it appears on the server (`stream_id` + `suffix`).
    pub fn mount(&self) -> String {
        format!("{}{}", self.stream_id, self.suffix)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Expand hosts × streams × formats into endpoints, host-major, then stream, then format.
pub fn enumerate_endpoints<H, S, F>(hosts: &[H], streams: &[S], formats: &[F]) -> Vec<Endpoint>
where
    H: AsRef<str>,
    S: AsRef<str>,
    F: AsRef<str>,
{
    let mut endpoints = Vec::with_capacity(hosts.len() * streams.len() * formats.len());
    for host in hosts {
        for stream in streams {
            for format in formats {
                endpoints.push(Endpoint::new(host.as_ref(), stream.as_ref(), format.as_ref()));
            }
        }
    }
    endpoints
}
