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

//! The non-destructive sample editor.
//!
//! An edit session keeps trim/pitch/fade/stretch parameters over a
//! mutable working copy of the sample; cut/copy/paste splice the working
//! copy directly. A debounced offline render pass periodically turns the
//! parameters plus working copy into a new canonical buffer, which the
//! deck persists in the sample store.

mod debounce;
mod engine;
mod render;
mod session;

pub use engine::{CommitSink, EditError, SampleEditorEngine};
pub use render::{OfflineRenderer, RenderError};
pub use session::{EditSession, Selection, SessionSnapshot};
