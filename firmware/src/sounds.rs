/// One period of a sine, 32 samples. Looped it plays 250 Hz at 8 kHz, 244 Hz at 7812.5 Hz.
pub static TONE: [u8; 32] = [
    128, 148, 166, 184, 199, 211, 220, 226, 228, 226, 220, 211, 199, 184, 166, 148, 128, 108, 90,
    72, 57, 45, 36, 30, 28, 30, 36, 45, 57, 72, 90, 108,
];

/// A decaying 880 Hz chime, 0.6 s of unsigned 8-bit mono PCM at 8 kHz.
pub static CHIME: &[u8] = include_bytes!("../sounds/chime.raw");
