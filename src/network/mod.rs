// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Network capture
//!
//! Turns the browser's network events for one navigation into a [`Visit`].

mod capture;
mod event;

pub use capture::{BodySource, Capture};
pub use event::{
    header_str, Asset, CertificateInfo, Headers, LoadingFinished, NetworkEvent, Redirect,
    RedirectResponse, RequestSent, ResponseReceived, Visit,
};
