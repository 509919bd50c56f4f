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

//! MIDI note-event consumption.
//!
//! Device enumeration and transport live outside this crate; what
//! arrives here is raw event bytes. Only note on/off is consumed.
//! Velocity is always treated as maximum regardless of what the event
//! reports: pads hit at full level.

use midly::live::LiveEvent;
use midly::MidiMessage;
use tracing::debug;

/// A note event the deck acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEvent {
    /// Note on. Velocity is intentionally not carried.
    On { note: u8 },
    /// Note off, including note-on-with-zero-velocity.
    Off { note: u8 },
}

/// Parses raw MIDI bytes into a note event. Anything that is not a note
/// on/off (or fails to parse) is dropped with a debug log.
pub fn parse_note_event(raw: &[u8]) -> Option<NoteEvent> {
    let event = match LiveEvent::parse(raw) {
        Ok(event) => event,
        Err(err) => {
            debug!(error = ?err, "Failed to parse MIDI event");
            return None;
        }
    };

    match event {
        LiveEvent::Midi { message, .. } => match message {
            MidiMessage::NoteOn { key, vel } if u8::from(vel) == 0 => Some(NoteEvent::Off {
                note: u8::from(key),
            }),
            MidiMessage::NoteOn { key, .. } => Some(NoteEvent::On {
                note: u8::from(key),
            }),
            MidiMessage::NoteOff { key, .. } => Some(NoteEvent::Off {
                note: u8::from(key),
            }),
            _ => None,
        },
        _ => None,
    }
}
