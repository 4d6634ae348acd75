#![no_main]
//! Fuzz target for configuration documents
//!
//! Arbitrary TOML must either be rejected or yield a config whose
//! conversions stay within protocol limits.

use libfuzzer_sys::fuzz_target;

use nestway::config::{Config, XDG_SHELL_UNSTABLE_VERSION};

fuzz_target!(|data: &[u8]| {
    let Some((&keycode, rest)) = data.split_first() else {
        return;
    };
    let Ok(text) = std::str::from_utf8(rest) else {
        return;
    };
    let Ok(config) = Config::from_toml_str(text) else {
        return;
    };

    // Offsets larger than the keycode clamp to zero instead of wrapping
    let keycode = u32::from(keycode);
    let evdev = config.keyboard.to_evdev(keycode);
    assert!(evdev <= keycode);

    // Clients are never offered a version the core does not speak
    assert!(config.xdg_shell.effective_max_version() <= XDG_SHELL_UNSTABLE_VERSION);

    let _ = config.scroll.discrete_to_fixed(-1.0);
    let _ = config.scroll.smooth_to_fixed(1.0);
});
