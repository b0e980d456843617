// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Captured navigation records and the network events that build them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Header map as reported by the browser
pub type Headers = Map<String, Value>;

/// One completed browser navigation and everything captured during it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    /// URL the navigation was started with
    pub requested_url: String,
    /// Final location after redirects
    pub location: String,
    /// HTTP redirects of the primary request, in order
    pub redirect_locations: Vec<Redirect>,
    /// TLS summary of the primary request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_info: Option<CertificateInfo>,
    /// Serialized outer HTML after the page settled
    pub body: String,
    /// Response body of the primary request, before any script ran
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub initial_body: String,
    /// Sub-resources loaded during the navigation
    pub assets: Vec<Asset>,
}

impl Visit {
    /// Create an empty visit for a requested URL
    pub fn new(requested_url: impl Into<String>) -> Self {
        Self {
            requested_url: requested_url.into(),
            ..Default::default()
        }
    }

    /// Count assets by resource type
    pub fn asset_types(&self) -> std::collections::BTreeMap<&str, usize> {
        let mut counts = std::collections::BTreeMap::new();
        for asset in &self.assets {
            *counts.entry(asset.resource_type.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Find an asset whose URL ends with the given suffix
    pub fn find_asset(&self, suffix: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.url.ends_with(suffix))
    }
}

/// One HTTP redirect hop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub status_code: i64,
    pub location: String,
}

/// One sub-resource network exchange
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_info: Option<CertificateInfo>,
    /// Protocol resource type (`Script`, `Stylesheet`, `Image`, ...)
    pub resource_type: String,
    pub request_headers: Headers,
    pub response_headers: Headers,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub response_status: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub initiator_url: String,
    /// Filled after loading finished; empty if the fetch lost the race with teardown
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

/// TLS certificate summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    pub protocol: String,
    #[serde(rename = "issuers")]
    pub issuer: String,
    pub subject_name: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sans: Vec<String>,
}

impl CertificateInfo {
    /// Build from raw security details. Validity bounds are seconds since the
    /// epoch. Returns `None` unless both protocol and issuer are present.
    pub fn from_parts(
        protocol: &str,
        issuer: &str,
        subject_name: &str,
        valid_from: f64,
        valid_to: f64,
        sans: Vec<String>,
    ) -> Option<Self> {
        if protocol.is_empty() || issuer.is_empty() {
            return None;
        }

        Some(Self {
            protocol: protocol.to_string(),
            issuer: issuer.to_string(),
            subject_name: subject_name.to_string(),
            valid_from: epoch_to_datetime(valid_from),
            valid_to: epoch_to_datetime(valid_to),
            sans,
        })
    }
}

fn epoch_to_datetime(secs: f64) -> DateTime<Utc> {
    let whole = secs.trunc() as i64;
    let nanos = (secs.fract() * 1e9) as u32;
    DateTime::from_timestamp(whole, nanos).unwrap_or_default()
}

/// Redirect response carried by a request event
#[derive(Debug, Clone, Default)]
pub struct RedirectResponse {
    pub status: i64,
    pub headers: Headers,
}

impl RedirectResponse {
    /// `Location` header, matched case-insensitively
    pub fn location(&self) -> Option<&str> {
        header_str(&self.headers, "location")
    }
}

/// A request is about to be sent
#[derive(Debug, Clone, Default)]
pub struct RequestSent {
    pub request_id: String,
    pub url: String,
    pub resource_type: Option<String>,
    /// Initiator kind (`parser`, `script`, `other`, ...)
    pub initiator_type: String,
    pub initiator_url: Option<String>,
    pub headers: Headers,
    pub redirect_response: Option<RedirectResponse>,
}

impl RequestSent {
    /// Top-level document request without a script or parser initiator
    pub fn is_primary_candidate(&self) -> bool {
        self.resource_type.as_deref() == Some("Document") && self.initiator_type == "other"
    }
}

/// A response was received
#[derive(Debug, Clone, Default)]
pub struct ResponseReceived {
    pub request_id: String,
    pub status: i64,
    pub headers: Headers,
    pub certificate: Option<CertificateInfo>,
}

/// A request finished loading
#[derive(Debug, Clone, Default)]
pub struct LoadingFinished {
    pub request_id: String,
}

/// Network events the crawler reacts to
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    Request(RequestSent),
    Response(ResponseReceived),
    Finished(LoadingFinished),
}

impl NetworkEvent {
    /// Request id the event refers to
    pub fn request_id(&self) -> &str {
        match self {
            NetworkEvent::Request(e) => &e.request_id,
            NetworkEvent::Response(e) => &e.request_id,
            NetworkEvent::Finished(e) => &e.request_id,
        }
    }
}

/// Look up a header by name, ignoring case
pub fn header_str<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .and_then(|(_, v)| v.as_str())
}
