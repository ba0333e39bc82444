#![no_main]
use ecm::{Decoder, State};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let input = Cursor::new(data);
    let mut decoded = Vec::new();
    if let Ok(mut decoder) = Decoder::new(input, &mut decoded, 64 * 1024, None) {
        while decoder.step().state == State::InProgress {}
    }
});
