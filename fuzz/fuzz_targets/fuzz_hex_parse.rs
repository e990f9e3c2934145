#![no_main]

use libfuzzer_sys::fuzz_target;

use keyward_crypto::{parse_public_key_hex, parse_signature_hex};
use keyward_sharing::shard_from_hex;
use keyward_types::{ProtectionId, RequestId};

// Every hex entry point sees client-supplied strings.
fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let _ = parse_signature_hex(s);
    let _ = parse_public_key_hex(s);
    let _ = shard_from_hex(s);

    if let Ok(id) = RequestId::from_hex(s) {
        assert_eq!(id.to_string(), s.to_ascii_lowercase());
    }
    let _ = ProtectionId::from_hex(s);
});
