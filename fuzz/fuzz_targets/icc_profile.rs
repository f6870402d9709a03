#![no_main]

//! ICC extraction from JPEG APP2, PNG iCCP and WebP ICCP containers.

use lazy_thumbnail::engine::{detect_format, extract_icc_profile};
use libfuzzer_sys::fuzz_target;

const PREFIXES: [&[u8]; 3] = [
    &[0xFF, 0xD8],
    &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
    b"RIFF\x00\x00\x00\x00WEBP",
];

fuzz_target!(|data: &[u8]| {
    let _ = detect_format(data);
    if let Some(icc) = extract_icc_profile(data) {
        assert!(icc.len() >= 128);
    }

    for prefix in PREFIXES {
        let mut wrapped = prefix.to_vec();
        wrapped.extend_from_slice(data);
        if let Some(icc) = extract_icc_profile(&wrapped) {
            assert!(icc.len() >= 128);
        }
    }
});
