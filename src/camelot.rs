use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Whether a Camelot key is minor (inner ring) or major (outer ring).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Minor keys — the "A" ring.
    A,
    /// Major keys — the "B" ring.
    B,
}

impl Mode {
    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Mode::A),
            'B' => Some(Mode::B),
            _ => None,
        }
    }
}

/// A harmonic-mixing key in Camelot notation: a wheel position 1-12 plus a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CamelotKey {
    pub number: u8,
    pub mode: Mode,
}

/// Clockwise display order of the wheel, starting at 12 o'clock.
pub const WHEEL_ORDER: [u8; 12] = [12, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// Segment colors in `WHEEL_ORDER` order.
pub const WHEEL_COLORS: [&str; 12] = [
    "#f8d84b", "#f6b447", "#f38d4a", "#ef6b5f", "#e85f7c", "#d364a5", "#a76bd6", "#7c7be8",
    "#5a8fe9", "#52a9e6", "#57c7e8", "#6fe2e0",
];

// Key token: 1-12 followed by A or B, word-bounded so "13A" and "128BPM" don't match.
static KEY_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(1[0-2]|[1-9])([AB])\b").unwrap());

/// Find the first Camelot key token in free-form text (typically a comment
/// field written by DJ tagging tools). Returns `None` when no token matches.
pub fn parse_key(text: &str) -> Option<CamelotKey> {
    let caps = KEY_TOKEN_RE.captures(text)?;
    let number: u8 = caps.get(1)?.as_str().parse().ok()?;
    let mode = Mode::from_char(caps.get(2)?.as_str().chars().next()?)?;
    Some(CamelotKey { number, mode })
}

impl CamelotKey {
    /// Index of this key's segment in `WHEEL_ORDER` (12 sits at the top).
    pub fn wheel_position(&self) -> usize {
        WHEEL_ORDER
            .iter()
            .position(|&n| n == self.number)
            .unwrap_or(0)
    }

    /// Display color for this key's wheel segment.
    pub fn color(&self) -> &'static str {
        WHEEL_COLORS[self.wheel_position()]
    }

    /// Harmonic-mixing compatibility: same segment on the other ring, or an
    /// adjacent segment on the same ring (wrapping 12 <-> 1).
    pub fn is_compatible(&self, other: &CamelotKey) -> bool {
        if self.number == other.number {
            return true;
        }
        if self.mode != other.mode {
            return false;
        }
        let diff = (self.number as i8 - other.number as i8).rem_euclid(12);
        diff == 1 || diff == 11
    }
}

impl fmt::Display for CamelotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ring = match self.mode {
            Mode::A => 'A',
            Mode::B => 'B',
        };
        write!(f, "{}{}", self.number, ring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_tokens() {
        assert_eq!(
            parse_key("11B"),
            Some(CamelotKey {
                number: 11,
                mode: Mode::B
            })
        );
        assert_eq!(
            parse_key("7a"),
            Some(CamelotKey {
                number: 7,
                mode: Mode::A
            })
        );
    }

    #[test]
    fn rejects_out_of_range_and_noise() {
        assert_eq!(parse_key("13A"), None);
        assert_eq!(parse_key("0B"), None);
        assert_eq!(parse_key("house music"), None);
        assert_eq!(parse_key(""), None);
    }

    #[test]
    fn requires_word_boundaries() {
        // Digits glued to the token must not produce a partial match.
        assert_eq!(parse_key("128BPM"), None);
        assert_eq!(parse_key("track07Amix"), None);
        assert_eq!(
            parse_key("energy 6 - 8A - 124bpm"),
            Some(CamelotKey {
                number: 8,
                mode: Mode::A
            })
        );
    }

    #[test]
    fn finds_token_inside_comments() {
        let key = parse_key("Purchased at Beatport / 4A / warm opener").unwrap();
        assert_eq!(key.number, 4);
        assert_eq!(key.mode, Mode::A);
    }

    #[test]
    fn wheel_position_follows_display_order() {
        assert_eq!(parse_key("12B").unwrap().wheel_position(), 0);
        assert_eq!(parse_key("1A").unwrap().wheel_position(), 1);
        assert_eq!(parse_key("11A").unwrap().wheel_position(), 11);
    }

    #[test]
    fn compatibility_wraps_around_the_wheel() {
        let k12a = parse_key("12A").unwrap();
        let k1a = parse_key("1A").unwrap();
        let k12b = parse_key("12B").unwrap();
        let k3a = parse_key("3A").unwrap();

        assert!(k12a.is_compatible(&k1a));
        assert!(k1a.is_compatible(&k12a));
        assert!(k12a.is_compatible(&k12b));
        assert!(!k12a.is_compatible(&k3a));
        assert!(!k1a.is_compatible(&parse_key("2B").unwrap()));
    }

    #[test]
    fn display_round_trips() {
        let key = parse_key("10b").unwrap();
        assert_eq!(key.to_string(), "10B");
        assert_eq!(parse_key(&key.to_string()), Some(key));
    }
}
