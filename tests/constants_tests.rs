// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use ircam::constants::{ColorMode, FilterMode};

#[test]
fn test_filter_modes_cycle_through_all() {
    let mut mode = FilterMode::Off;
    let mut seen = Vec::new();
    for _ in 0..FilterMode::ALL.len() {
        seen.push(mode);
        mode = mode.next();
    }
    assert_eq!(mode, FilterMode::Off);
    assert_eq!(seen, FilterMode::ALL.to_vec());
}

#[test]
fn test_color_modes_cycle_through_all() {
    let mut mode = ColorMode::Off;
    for expected in ColorMode::ALL {
        assert_eq!(mode, expected);
        mode = mode.next();
    }
    assert_eq!(mode, ColorMode::Off);
}

#[test]
fn test_mode_names_parse_back() {
    for mode in FilterMode::ALL {
        assert_eq!(mode.display_name().parse::<FilterMode>(), Ok(mode));
        // Case-insensitive on the command line
        assert_eq!(
            mode.display_name().to_lowercase().parse::<FilterMode>(),
            Ok(mode)
        );
    }
    for mode in ColorMode::ALL {
        assert_eq!(mode.to_string().parse::<ColorMode>(), Ok(mode));
    }
    assert!("strobe".parse::<FilterMode>().is_err());
}
