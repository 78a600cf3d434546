//! Hand-assembled Standard MIDI Files shared by the integration tests
#![allow(dead_code)]

/// Frame `data` as a chunk with the given four-character type
pub fn chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut bytes = kind.to_vec();
    bytes.extend_from_slice(&(data.len() as u32).to_be_bytes());
    bytes.extend_from_slice(data);
    bytes
}

pub fn header(format: u16, tracks: u16, division: [u8; 2]) -> Vec<u8> {
    let mut data = format.to_be_bytes().to_vec();
    data.extend_from_slice(&tracks.to_be_bytes());
    data.extend_from_slice(&division);
    chunk(b"MThd", &data)
}

pub fn smf(format: u16, division: [u8; 2], tracks: &[&[u8]]) -> Vec<u8> {
    let mut bytes = header(format, tracks.len() as u16, division);
    for track in tracks {
        bytes.extend(chunk(b"MTrk", track));
    }
    bytes
}

/// Format 1 at 480 ticks per quarter: a conductor track that doubles the tempo
/// at tick 480 and a track holding middle C from tick 0 to 960
pub fn tempo_change_file() -> Vec<u8> {
    let conductor: &[u8] = &[
        0x00, 0xFF, 0x03, 0x09, b'C', b'o', b'n', b'd', b'u', b'c', b't', b'o', b'r', //
        0x00, 0xFF, 0x58, 0x04, 0x03, 0x02, 0x18, 0x08, // 3/4
        0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, // 500000 µs
        0x83, 0x60, 0xFF, 0x51, 0x03, 0x03, 0xD0, 0x90, // 250000 µs at tick 480
        0x00, 0xFF, 0x2F, 0x00,
    ];
    let piano: &[u8] = &[
        0x00, 0xFF, 0x03, 0x05, b'P', b'i', b'a', b'n', b'o', //
        0x00, 0xC0, 0x00, //
        0x00, 0x90, 0x3C, 0x64, //
        0x87, 0x40, 0x80, 0x3C, 0x40, // 960 ticks later
        0x00, 0xFF, 0x2F, 0x00,
    ];
    smf(1, [0x01, 0xE0], &[conductor, piano])
}

/// Format 0 with 25 fps SMPTE timing and 40 ticks per frame (1000 ticks per second)
pub fn smpte_file() -> Vec<u8> {
    let track: &[u8] = &[
        0x00, 0x99, 0x24, 0x7F, // kick drum on channel 10
        0x87, 0x68, 0x89, 0x24, 0x00, // 1000 ticks later
        0x00, 0xFF, 0x2F, 0x00,
    ];
    smf(0, [0xE7, 0x28], &[track])
}

/// Format 2 at 480 ticks per quarter: two one-note songs, the first at 120 BPM
/// and the second at 60 BPM
pub fn multi_song_file() -> Vec<u8> {
    let first: &[u8] = &[
        0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, // 500000 µs
        0x00, 0x90, 0x3C, 0x64, //
        0x83, 0x60, 0x80, 0x3C, 0x40, //
        0x00, 0xFF, 0x2F, 0x00,
    ];
    let second: &[u8] = &[
        0x00, 0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40, // 1000000 µs
        0x00, 0x91, 0x40, 0x64, //
        0x83, 0x60, 0x81, 0x40, 0x40, //
        0x00, 0xFF, 0x2F, 0x00,
    ];
    smf(2, [0x01, 0xE0], &[first, second])
}

/// Format 1 where only the first track has a stray release and a hanging note
pub fn untidy_first_track_file() -> Vec<u8> {
    let untidy: &[u8] = &[
        0x00, 0x80, 0x3E, 0x40, // release with nothing sounding
        0x00, 0x90, 0x43, 0x50, // never released
        0x83, 0x60, 0xFF, 0x2F, 0x00,
    ];
    let clean: &[u8] = &[
        0x00, 0x91, 0x3C, 0x64, //
        0x83, 0x60, 0x81, 0x3C, 0x40, //
        0x00, 0xFF, 0x2F, 0x00,
    ];
    smf(1, [0x01, 0xE0], &[untidy, clean])
}

/// Wrap an SMF in an RMID container
pub fn rmid(smf: &[u8]) -> Vec<u8> {
    let mut data = b"data".to_vec();
    data.extend_from_slice(&(smf.len() as u32).to_le_bytes());
    data.extend_from_slice(smf);
    if smf.len() % 2 == 1 {
        data.push(0);
    }

    let mut bytes = b"RIFF".to_vec();
    bytes.extend_from_slice(&((data.len() + 4) as u32).to_le_bytes());
    bytes.extend_from_slice(b"RMID");
    bytes.extend(data);
    bytes
}
