#![no_main]
use libfuzzer_sys::fuzz_target;

use std::time::Duration;

use tofcam_core::framer::Framer;
use tofcam_core::mocks::ScriptedTransport;
use tofcam_traits::clock::TestClock;

fuzz_target!(|data: &[u8]| {
    // Arbitrary wire bytes must never panic the framer: every outcome is
    // either a framed packet or a reported stream loss.
    let mut link = ScriptedTransport::chunked(data.to_vec(), 97);
    let mut framer = Framer::new();
    let timeout = Duration::from_millis(1);
    let clock = TestClock::new();
    for _ in 0..4 {
        match framer.sync(&mut link, timeout) {
            Ok(_) => {
                if framer.fill(&mut link, timeout, &clock).is_err() {
                    break;
                }
                let _ = framer.payload();
            }
            Err(_) => break,
        }
    }
});
