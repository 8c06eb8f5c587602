//! Character filter and the fixed Latin/digit Morse table.

/// Bytes a line may contain: ASCII letters, digits and space.
pub fn is_accepted(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b' '
}

/// Morse pattern for one character, dots and dashes followed by a letter gap.
pub type MorsePattern = &'static str;

/// Pattern rendered for a space between words.
pub const WORD_GAP: MorsePattern = "  ";

/// Look up the pattern for `byte`, case-insensitively.
///
/// Returns `None` for bytes outside the table; callers decide how to skip them.
pub fn encode(byte: u8) -> Option<MorsePattern> {
    let pattern = match byte.to_ascii_uppercase() {
        b'A' => ".- ",
        b'B' => "-... ",
        b'C' => "-.-. ",
        b'D' => "-.. ",
        b'E' => ". ",
        b'F' => "..-. ",
        b'G' => "--. ",
        b'H' => ".... ",
        b'I' => ".. ",
        b'J' => ".--- ",
        b'K' => "-.- ",
        b'L' => ".-.. ",
        b'M' => "-- ",
        b'N' => "-. ",
        b'O' => "--- ",
        b'P' => ".--. ",
        b'Q' => "--.- ",
        b'R' => ".-. ",
        b'S' => "... ",
        b'T' => "- ",
        b'U' => "..- ",
        b'V' => "...- ",
        b'W' => ".-- ",
        b'X' => "-..- ",
        b'Y' => "-.-- ",
        b'Z' => "--.. ",
        b'0' => "----- ",
        b'1' => ".---- ",
        b'2' => "..--- ",
        b'3' => "...-- ",
        b'4' => "....- ",
        b'5' => "..... ",
        b'6' => "-.... ",
        b'7' => "--... ",
        b'8' => "---.. ",
        b'9' => "----. ",
        b' ' => WORD_GAP,
        _ => return None,
    };
    Some(pattern)
}

/// One element of a pattern as the renderer sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Dot,
    Dash,
    Gap,
}

impl Token {
    pub fn from_char(ch: char) -> Self {
        match ch {
            '.' => Token::Dot,
            '-' => Token::Dash,
            _ => Token::Gap,
        }
    }

    pub fn glyph(self) -> char {
        match self {
            Token::Dot => '.',
            Token::Dash => '-',
            Token::Gap => ' ',
        }
    }
}

pub fn tokens(pattern: MorsePattern) -> impl Iterator<Item = Token> {
    pattern.chars().map(Token::from_char)
}
