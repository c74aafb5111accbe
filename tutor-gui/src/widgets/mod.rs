//! # Widgets Module
//!
//! Custom canvas widgets.

pub mod keyboard_overlay;
