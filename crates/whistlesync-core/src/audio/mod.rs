//! Audio analysis module
//!
//! This module contains the signal-processing half of the sync engine:
//! - Waveform and value types ([`waveform`], [`types`])
//! - 3rd-order Butterworth band-pass isolation of the whistle ([`filter`])
//! - First threshold crossing detection ([`detector`])
//! - FFT-based cross-correlation offset estimation ([`correlation`])

pub mod correlation;
pub mod detector;
pub mod filter;
pub mod types;
pub mod waveform;
