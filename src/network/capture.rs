// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Per-navigation capture state
//!
//! A [`Capture`] collects the events of one navigation into a [`Visit`].
//! Body fetches triggered by `loadingFinished` are spawned into the capture's
//! own [`JoinSet`] and write into that capture only, so a late body can never
//! land in a later visit. [`Capture::finish`] joins outstanding fetches
//! before the visit is assembled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::event::{
    Asset, CertificateInfo, LoadingFinished, NetworkEvent, Redirect, RequestSent,
    ResponseReceived, Visit,
};
use crate::error::Result;

/// Source of response bodies for finished requests
#[async_trait]
pub trait BodySource: Send + Sync {
    /// Fetch the body of a finished request
    async fn response_body(&self, request_id: &str) -> Result<String>;
}

#[derive(Debug, Default)]
struct Primary {
    request_id: Option<String>,
    redirects: Vec<Redirect>,
    certificate_info: Option<CertificateInfo>,
    initial_body: String,
}

/// State of one in-flight navigation capture
pub struct Capture {
    requested_url: String,
    primary: Mutex<Primary>,
    assets: DashMap<String, (u64, Asset)>,
    seq: AtomicU64,
    fetches: Mutex<JoinSet<()>>,
}

impl std::fmt::Debug for Capture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capture")
            .field("requested_url", &self.requested_url)
            .field("assets", &self.assets.len())
            .finish()
    }
}

impl Capture {
    /// Start a capture for the given URL
    pub fn new(requested_url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            requested_url: requested_url.into(),
            primary: Mutex::new(Primary::default()),
            assets: DashMap::new(),
            seq: AtomicU64::new(0),
            fetches: Mutex::new(JoinSet::new()),
        })
    }

    /// URL this capture was started with
    pub fn requested_url(&self) -> &str {
        &self.requested_url
    }

    /// Id of the primary request, once seen
    pub fn primary_request_id(&self) -> Option<String> {
        self.primary.lock().request_id.clone()
    }

    /// Number of assets tracked so far
    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    /// Feed one network event into the capture
    pub fn handle(self: &Arc<Self>, event: NetworkEvent, bodies: &Arc<dyn BodySource>) {
        match event {
            NetworkEvent::Request(e) => self.on_request(e),
            NetworkEvent::Response(e) => self.on_response(e),
            NetworkEvent::Finished(e) => self.on_loading_finished(e, bodies),
        }
    }

    fn on_request(&self, event: RequestSent) {
        // Top-level document requests are never assets. Only the first one
        // supplies the primary body, but every hop records its redirect.
        if event.is_primary_candidate() {
            let mut primary = self.primary.lock();
            primary
                .request_id
                .get_or_insert_with(|| event.request_id.clone());

            if let Some(redirect) = &event.redirect_response {
                if let Some(location) = redirect.location() {
                    primary.redirects.push(Redirect {
                        status_code: redirect.status,
                        location: location.to_string(),
                    });
                }
            }
            return;
        }

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let asset = Asset {
            url: event.url,
            resource_type: event.resource_type.unwrap_or_default(),
            request_headers: event.headers,
            initiator_url: event.initiator_url.unwrap_or_default(),
            ..Default::default()
        };
        self.assets.insert(event.request_id, (seq, asset));
    }

    fn on_response(&self, event: ResponseReceived) {
        if let Some(mut entry) = self.assets.get_mut(&event.request_id) {
            let asset = &mut entry.1;
            asset.certificate_info = event.certificate;
            asset.response_headers = event.headers;
            asset.response_status = event.status;
            return;
        }

        let mut primary = self.primary.lock();
        if primary.request_id.as_deref() == Some(event.request_id.as_str()) {
            primary.certificate_info = event.certificate;
        }
    }

    fn on_loading_finished(self: &Arc<Self>, event: LoadingFinished, bodies: &Arc<dyn BodySource>) {
        let is_primary =
            self.primary.lock().request_id.as_deref() == Some(event.request_id.as_str());
        if !is_primary && !self.assets.contains_key(&event.request_id) {
            return;
        }

        let capture = Arc::clone(self);
        let bodies = Arc::clone(bodies);
        self.fetches.lock().spawn(async move {
            match bodies.response_body(&event.request_id).await {
                Ok(body) => capture.store_body(&event.request_id, body),
                Err(e) => warn!(
                    request_id = %event.request_id,
                    primary = is_primary,
                    "failed to fetch response body: {}", e
                ),
            }
        });
    }

    fn store_body(&self, request_id: &str, body: String) {
        if let Some(mut entry) = self.assets.get_mut(request_id) {
            entry.1.body = body;
            return;
        }

        let mut primary = self.primary.lock();
        if primary.request_id.as_deref() == Some(request_id) {
            primary.initial_body = body;
        }
    }

    /// Join outstanding body fetches, giving up after `settle`
    pub async fn drain(&self, settle: Duration) {
        let mut set = std::mem::take(&mut *self.fetches.lock());
        if set.is_empty() {
            return;
        }

        let joined = tokio::time::timeout(settle, async {
            while let Some(res) = set.join_next().await {
                if let Err(e) = res {
                    debug!("body fetch task ended abnormally: {}", e);
                }
            }
        })
        .await;

        if joined.is_err() {
            debug!(
                pending = set.len(),
                "body fetches still pending after {:?}, aborting", settle
            );
            set.abort_all();
        }
    }

    /// Drain pending fetches and assemble the finished visit
    pub async fn finish(&self, settle: Duration, location: String, body: String) -> Visit {
        self.drain(settle).await;

        let primary = std::mem::take(&mut *self.primary.lock());

        let mut assets: Vec<(u64, Asset)> = self
            .assets
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.assets.clear();
        assets.sort_by_key(|(seq, _)| *seq);

        Visit {
            requested_url: self.requested_url.clone(),
            location,
            redirect_locations: primary.redirects,
            certificate_info: primary.certificate_info,
            body,
            initial_body: primary.initial_body,
            assets: assets.into_iter().map(|(_, a)| a).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::network::event::{Headers, RedirectResponse};
    use serde_json::json;

    struct StaticBodies;

    #[async_trait]
    impl BodySource for StaticBodies {
        async fn response_body(&self, request_id: &str) -> Result<String> {
            match request_id {
                "missing" => Err(Error::other("No resource with given identifier found")),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok("late".to_string())
                }
                id => Ok(format!("body-of-{}", id)),
            }
        }
    }

    fn bodies() -> Arc<dyn BodySource> {
        Arc::new(StaticBodies)
    }

    fn document(id: &str, url: &str) -> RequestSent {
        RequestSent {
            request_id: id.to_string(),
            url: url.to_string(),
            resource_type: Some("Document".to_string()),
            initiator_type: "other".to_string(),
            ..Default::default()
        }
    }

    fn asset(id: &str, url: &str, kind: &str) -> RequestSent {
        RequestSent {
            request_id: id.to_string(),
            url: url.to_string(),
            resource_type: Some(kind.to_string()),
            initiator_type: "parser".to_string(),
            initiator_url: Some("http://example.com/".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_primary_and_assets() {
        let capture = Capture::new("http://example.com/");
        let bodies = bodies();

        capture.handle(NetworkEvent::Request(document("1", "http://example.com/")), &bodies);
        capture.handle(
            NetworkEvent::Request(asset("2", "http://example.com/app.js", "Script")),
            &bodies,
        );
        capture.handle(
            NetworkEvent::Request(asset("3", "http://example.com/style.css", "Stylesheet")),
            &bodies,
        );

        let mut headers = Headers::new();
        headers.insert("content-type".into(), json!("text/javascript"));
        capture.handle(
            NetworkEvent::Response(ResponseReceived {
                request_id: "2".into(),
                status: 200,
                headers,
                certificate: None,
            }),
            &bodies,
        );

        for id in ["1", "2", "3"] {
            capture.handle(
                NetworkEvent::Finished(LoadingFinished {
                    request_id: id.into(),
                }),
                &bodies,
            );
        }

        let visit = capture
            .finish(
                Duration::from_secs(1),
                "http://example.com/".into(),
                "<html></html>".into(),
            )
            .await;

        assert_eq!(visit.initial_body, "body-of-1");
        assert_eq!(visit.assets.len(), 2);
        assert_eq!(visit.assets[0].url, "http://example.com/app.js");
        assert_eq!(visit.assets[0].response_status, 200);
        assert_eq!(visit.assets[0].body, "body-of-2");
        assert_eq!(visit.assets[0].initiator_url, "http://example.com/");
        assert_eq!(visit.assets[1].resource_type, "Stylesheet");
        assert_eq!(capture.asset_count(), 0);
    }

    #[tokio::test]
    async fn test_first_primary_wins() {
        let capture = Capture::new("http://example.com/");
        let bodies = bodies();

        capture.handle(NetworkEvent::Request(document("1", "http://example.com/")), &bodies);
        capture.handle(NetworkEvent::Request(document("9", "http://other.test/")), &bodies);

        assert_eq!(capture.primary_request_id().as_deref(), Some("1"));
        assert_eq!(capture.asset_count(), 0);
    }

    #[tokio::test]
    async fn test_second_document_redirect_is_recorded() {
        let capture = Capture::new("http://example.com/");
        let bodies = bodies();

        capture.handle(NetworkEvent::Request(document("1", "http://example.com/")), &bodies);

        let mut headers = Headers::new();
        headers.insert("Location".into(), json!("http://landing.test/"));
        let mut hop = document("7", "http://landing.test/");
        hop.redirect_response = Some(RedirectResponse {
            status: 302,
            headers,
        });
        capture.handle(NetworkEvent::Request(hop), &bodies);

        let visit = capture
            .finish(Duration::from_millis(10), "http://landing.test/".into(), String::new())
            .await;

        assert!(visit.assets.is_empty());
        assert_eq!(visit.redirect_locations.len(), 1);
        assert_eq!(visit.redirect_locations[0].status_code, 302);
        assert_eq!(visit.redirect_locations[0].location, "http://landing.test/");
    }

    #[tokio::test]
    async fn test_redirect_chain() {
        let capture = Capture::new("http://example.com/old");
        let bodies = bodies();

        capture.handle(NetworkEvent::Request(document("1", "http://example.com/old")), &bodies);

        let mut headers = Headers::new();
        headers.insert("Location".into(), json!("http://example.com/new"));
        let mut hop = document("1", "http://example.com/new");
        hop.redirect_response = Some(RedirectResponse {
            status: 301,
            headers,
        });
        capture.handle(NetworkEvent::Request(hop), &bodies);

        let visit = capture
            .finish(Duration::from_millis(10), "http://example.com/new".into(), String::new())
            .await;

        assert_eq!(
            visit.redirect_locations,
            vec![Redirect {
                status_code: 301,
                location: "http://example.com/new".into()
            }]
        );
        assert!(visit.assets.is_empty());
    }

    #[tokio::test]
    async fn test_primary_certificate() {
        let capture = Capture::new("https://example.com/");
        let bodies = bodies();
        capture.handle(NetworkEvent::Request(document("1", "https://example.com/")), &bodies);

        let cert = CertificateInfo::from_parts("TLS 1.3", "R3", "example.com", 0.0, 1.0, vec![]);
        capture.handle(
            NetworkEvent::Response(ResponseReceived {
                request_id: "1".into(),
                status: 200,
                headers: Headers::new(),
                certificate: cert.clone(),
            }),
            &bodies,
        );

        let visit = capture
            .finish(Duration::from_millis(10), String::new(), String::new())
            .await;
        assert_eq!(visit.certificate_info, cert);
    }

    #[tokio::test]
    async fn test_failed_body_fetch_leaves_body_empty() {
        let capture = Capture::new("http://example.com/");
        let bodies = bodies();
        capture.handle(
            NetworkEvent::Request(asset("missing", "http://example.com/gone.js", "Script")),
            &bodies,
        );
        capture.handle(
            NetworkEvent::Finished(LoadingFinished {
                request_id: "missing".into(),
            }),
            &bodies,
        );

        let visit = capture
            .finish(Duration::from_secs(1), String::new(), String::new())
            .await;
        assert_eq!(visit.assets.len(), 1);
        assert!(visit.assets[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_slow_fetch_is_abandoned_at_settle() {
        let capture = Capture::new("http://example.com/");
        let bodies = bodies();
        capture.handle(
            NetworkEvent::Request(asset("slow", "http://example.com/slow.js", "Script")),
            &bodies,
        );
        capture.handle(
            NetworkEvent::Finished(LoadingFinished {
                request_id: "slow".into(),
            }),
            &bodies,
        );

        let visit = capture
            .finish(Duration::from_millis(20), String::new(), String::new())
            .await;
        assert!(visit.assets[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_finished_is_ignored() {
        let capture = Capture::new("http://example.com/");
        let bodies = bodies();
        capture.handle(
            NetworkEvent::Finished(LoadingFinished {
                request_id: "77".into(),
            }),
            &bodies,
        );

        let visit = capture
            .finish(Duration::from_millis(10), String::new(), String::new())
            .await;
        assert!(visit.initial_body.is_empty());
        assert!(visit.assets.is_empty());
    }
}
