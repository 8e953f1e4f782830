//! WinAnsiEncoding for simple-font strings.
//!
//! Matches Latin-1 outside 0x80..=0x9F; that block holds typographic punctuation.

/// Code points of bytes 0x80..=0x9F; 0 marks an undefined byte.
const WIN_ANSI_HIGH: [u16; 32] = [
    0x20ac, 0x0000, 0x201a, 0x0192, 0x201e, 0x2026, 0x2020, 0x2021, 0x02c6, 0x2030, 0x0160, 0x2039,
    0x0152, 0x0000, 0x017d, 0x0000, 0x0000, 0x2018, 0x2019, 0x201c, 0x201d, 0x2022, 0x2013, 0x2014,
    0x02dc, 0x2122, 0x0161, 0x203a, 0x0153, 0x0000, 0x017e, 0x0178,
];

pub(crate) fn decode_win_ansi(bytes: &[u8]) -> String {
    bytes.iter().map(|&byte| decode_byte(byte)).collect()
}

fn decode_byte(byte: u8) -> char {
    match byte {
        0x80..=0x9f => {
            let code = WIN_ANSI_HIGH[usize::from(byte - 0x80)];
            char::from_u32(u32::from(code)).filter(|_| code != 0).unwrap_or(char::REPLACEMENT_CHARACTER)
        }
        _ => char::from(byte),
    }
}

/// Unmappable characters become `?`.
pub(crate) fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(encode_char).collect()
}

fn encode_char(ch: char) -> u8 {
    let code = u32::from(ch);
    match code {
        0x00..=0x7f | 0xa0..=0xff => code as u8,
        _ => WIN_ANSI_HIGH
            .iter()
            .position(|&mapped| mapped != 0 && u32::from(mapped) == code)
            .map(|offset| 0x80 + offset as u8)
            .unwrap_or(b'?'),
    }
}
