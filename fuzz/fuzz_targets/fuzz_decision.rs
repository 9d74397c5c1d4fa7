//! Fuzz target for interceptor decision validation.
//!
//! Whatever the decision-maker sends, validation never panics, and a
//! response decision never carries request changes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use replication_bridge::exchange::ExchangeKind;
use replication_bridge::interceptor::InterceptorDecision;

fuzz_target!(|data: &[u8]| {
    let Ok(decision) = serde_json::from_slice::<InterceptorDecision>(data) else {
        return;
    };

    let _ = decision.clone().validate(ExchangeKind::Request);
    if let Ok(validated) = decision.clone().validate(ExchangeKind::Response) {
        assert!(validated.headers.is_none());
        assert!(validated.url.is_none());
    }
    assert!(decision.validate(ExchangeKind::Conflict).is_err());
});
