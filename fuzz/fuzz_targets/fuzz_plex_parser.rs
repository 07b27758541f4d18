// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use plexd::protocol::{parse_announce, parse_header, parse_query, parse_reply, parse_revoke};

fuzz_target!(|data: &[u8]| {
    // Fuzz the common header parser
    let _ = parse_header(data);

    // Fuzz every message-kind parser
    let _ = parse_announce(data);
    let _ = parse_revoke(data);
    let _ = parse_query(data);
    let _ = parse_reply(data);
});
