#![no_main]

use flexquorum::quorum;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|params: (u64, u64, u64)| {
    let (n, f, quorum) = params;
    if quorum::validate(n, f, quorum).is_ok() {
        // accepted parameters must actually carry the safety argument
        assert!(quorum >= 1 && quorum <= n);
        assert!(quorum.saturating_add(f) <= n);
        assert!(quorum::guaranteed_overlap(n, quorum) > f);
    }
});
