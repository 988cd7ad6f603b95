/// A MIDI message, as consumed by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MidiMessage {
    /// Spawn a new particle for the given note.
    ///
    /// * `velocity` - Normalized velocity in range \[0, 1\].
    /// * `pitch_ratio` - Optional explicit playback speed. When `None`, the note's pitch
    ///   relative to middle C is used.
    NoteOn {
        note: u8,
        velocity: f32,
        pitch_ratio: Option<f32>,
    },
    /// Release all particles of the given note.
    NoteOff { note: u8 },
    /// Release all particles.
    AllNotesOff,
}

impl MidiMessage {
    const NOTE_OFF: u8 = 0x80;
    const NOTE_ON: u8 = 0x90;
    const CONTROL_CHANGE: u8 = 0xB0;
    const ALL_SOUND_OFF: u8 = 120;
    const ALL_NOTES_OFF: u8 = 123;

    /// Parse a raw, channel voice MIDI message. The MIDI channel is ignored. Note-ons with
    /// velocity 0 are note-offs. Returns `None` for incomplete or unsupported messages.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        match (status & 0xF0, data) {
            (Self::NOTE_ON, [note, velocity, ..]) if *velocity > 0 => Some(Self::NoteOn {
                note: note & 0x7F,
                velocity: (velocity & 0x7F) as f32 / 127.0,
                pitch_ratio: None,
            }),
            (Self::NOTE_ON | Self::NOTE_OFF, [note, _, ..]) => Some(Self::NoteOff {
                note: note & 0x7F,
            }),
            (Self::CONTROL_CHANGE, [Self::ALL_SOUND_OFF | Self::ALL_NOTES_OFF, _, ..]) => {
                Some(Self::AllNotesOff)
            }
            _ => None,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// A MIDI message with a frame offset into the processed block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidiEvent {
    pub frame_offset: usize,
    pub message: MidiMessage,
}

impl MidiEvent {
    pub fn new(frame_offset: usize, message: MidiMessage) -> Self {
        Self {
            frame_offset,
            message,
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_raw_messages() {
        assert_eq!(
            MidiMessage::from_bytes(&[0x91, 60, 127]),
            Some(MidiMessage::NoteOn {
                note: 60,
                velocity: 1.0,
                pitch_ratio: None
            })
        );
        assert_eq!(
            MidiMessage::from_bytes(&[0x90, 64, 0]),
            Some(MidiMessage::NoteOff { note: 64 })
        );
        assert_eq!(
            MidiMessage::from_bytes(&[0x8F, 64, 100]),
            Some(MidiMessage::NoteOff { note: 64 })
        );
        assert_eq!(
            MidiMessage::from_bytes(&[0xB0, 123, 0]),
            Some(MidiMessage::AllNotesOff)
        );
        assert_eq!(MidiMessage::from_bytes(&[0xB0, 7, 100]), None);
        assert_eq!(MidiMessage::from_bytes(&[0x90, 60]), None);
        assert_eq!(MidiMessage::from_bytes(&[]), None);
    }
}
