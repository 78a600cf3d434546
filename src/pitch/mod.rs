const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

// Circle of fifths from 7 flats to 7 sharps
const MAJOR_KEYS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];
const MINOR_KEYS: [&str; 15] = [
    "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#", "G#", "D#", "A#",
];

const A4_KEY: f32 = 69.0;
const A4_FREQUENCY: f32 = 440.0;

/// Get the note name for a MIDI key number (C4 = 60)
pub fn note_name(key: u8, use_flats: bool) -> String {
    let names = if use_flats { &FLAT_NAMES } else { &SHARP_NAMES };
    let octave = (key / 12) as i32 - 1;
    format!("{}{}", names[(key % 12) as usize], octave)
}

/// Convert MIDI key number to frequency
pub fn key_to_frequency(key: u8) -> f32 {
    // frequency = 440 * 2^((key - 69) / 12)
    A4_FREQUENCY * 2.0_f32.powf((key as f32 - A4_KEY) / 12.0)
}

/// Convert frequency to the nearest MIDI key number
pub fn frequency_to_key(frequency: f32) -> u8 {
    // key = 69 + 12 * log2(frequency / 440)
    let key = A4_KEY + 12.0 * (frequency / A4_FREQUENCY).log2();
    key.round().clamp(0.0, 127.0) as u8
}

/// Name of the key described by a Key Signature meta event.
///
/// Returns `None` when `sharps_flats` is outside -7..=7.
pub fn key_signature_name(sharps_flats: i8, minor: bool) -> Option<String> {
    if !(-7..=7).contains(&sharps_flats) {
        return None;
    }
    let index = (sharps_flats + 7) as usize;
    Some(if minor {
        format!("{} minor", MINOR_KEYS[index])
    } else {
        format!("{} major", MAJOR_KEYS[index])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_note_name() {
        assert_eq!(note_name(69, false), "A4");
        assert_eq!(note_name(40, false), "E2");
        assert_eq!(note_name(60, false), "C4");
        assert_eq!(note_name(61, false), "C#4");
        assert_eq!(note_name(61, true), "Db4");
        assert_eq!(note_name(0, false), "C-1");
        assert_eq!(note_name(127, false), "G9");
    }

    #[test]
    fn test_key_to_frequency() {
        assert_relative_eq!(key_to_frequency(69), 440.0, epsilon = 0.1);
        assert_relative_eq!(key_to_frequency(40), 82.41, epsilon = 0.1);
        assert_relative_eq!(key_to_frequency(60), 261.63, epsilon = 0.1);
    }

    #[test]
    fn test_frequency_to_key() {
        assert_eq!(frequency_to_key(440.0), 69);
        assert_eq!(frequency_to_key(82.41), 40);
        assert_eq!(frequency_to_key(329.63), 64);
        assert_eq!(frequency_to_key(1.0), 0);
        assert_eq!(frequency_to_key(50_000.0), 127);
    }

    #[test]
    fn test_key_signature_name() {
        assert_eq!(key_signature_name(0, false).as_deref(), Some("C major"));
        assert_eq!(key_signature_name(0, true).as_deref(), Some("A minor"));
        assert_eq!(key_signature_name(-3, false).as_deref(), Some("Eb major"));
        assert_eq!(key_signature_name(2, true).as_deref(), Some("B minor"));
        assert_eq!(key_signature_name(7, false).as_deref(), Some("C# major"));
        assert_eq!(key_signature_name(8, false), None);
    }
}
