//! Webhook verification and canonicalization.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA256)
//! - An event-kind routing table that turns payloads into plugin events

pub mod parser;
pub mod signature;

pub use parser::{Canonicalizer, EventRouter, ParseError};
pub use signature::{
    SIGNATURE_HEADER, compute_signature, format_signature_header, parse_signature_header,
    verify_signature,
};
