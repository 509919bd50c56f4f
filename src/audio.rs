// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Backend-agnostic audio plumbing.
//!
//! The mixer here never touches a device: the platform output (the mix
//! bus) is an external collaborator that pulls frames from it. Keeping
//! the core device-free is what lets the test suite drive the sample
//! clock deterministically.

use std::sync::atomic::{AtomicU64, Ordering};

pub mod mixer;
pub mod sample_source;
pub mod wav;

pub use mixer::{ActiveSource, AudioMixer, SourceSender};
pub use sample_source::{MemorySampleSource, SampleSource};
pub use wav::{decode_wav, encode_wav, ExportError};

/// Global source ID counter.
static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a unique id for a mixer source.
pub fn next_source_id() -> u64 {
    NEXT_SOURCE_ID.fetch_add(1, Ordering::SeqCst)
}
