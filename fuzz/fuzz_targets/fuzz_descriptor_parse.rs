#![no_main]

use libfuzzer_sys::fuzz_target;
use tether_runtime::{BindingPath, Count, Descriptor};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    // Parsed descriptors print back to something that parses the same.
    if let Some(descriptor) = Descriptor::parse(raw) {
        let printed = descriptor.to_string();
        assert_eq!(Descriptor::parse(&printed), Some(descriptor));
    }

    let path = BindingPath::parse(raw);
    assert_eq!(BindingPath::parse(&path.to_string()), path);

    let _ = raw.parse::<Count>();
    let _ = tether_runtime::item_renderer::parse_start(raw);
    let _ = tether_runtime::item_renderer::parse_index(raw);
});
