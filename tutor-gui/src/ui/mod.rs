//! # UI Module
//!
//! Layout and panels for the piano tutor window.

pub mod main_display;
