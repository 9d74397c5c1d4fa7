//! Fuzz target for the JSON command boundary.
//!
//! Arbitrary input must parse or be rejected as `InvalidCommand`, never
//! panic, and anything accepted must survive re-serialization.

#![no_main]

use libfuzzer_sys::fuzz_target;
use replication_bridge::coordinator::BridgeCommand;
use replication_bridge::error::BridgeError;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    match BridgeCommand::from_json(input) {
        Ok(command) => {
            let json = serde_json::to_string(&command).expect("accepted command must serialize");
            let reparsed = BridgeCommand::from_json(&json).expect("serialized command must parse");
            assert_eq!(reparsed.action(), command.action());
        }
        Err(e) => assert!(matches!(e, BridgeError::InvalidCommand(_))),
    }
});
