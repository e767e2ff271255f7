//! Pixel-space WKT polygons, as stored in the `PolygonWKT_Pix` column of the
//! SpaceNet building tables.
//!
//! Accepted grammar:
//!
//! ```text
//! polygon := "POLYGON" [dim] ( "EMPTY" | "(" ring { "," ring } ")" )
//! ring    := "(" coord { "," coord } ")"
//! coord   := number number [ number [ number ] ]
//! dim     := "Z" | "M" | "ZM"
//! ```
//!
//! All rings of a polygon are flattened into one vertex list in source order,
//! so interior rings are appended to the outer ring instead of being kept as
//! holes. Vertices are rounded to the nearest pixel, halves away from zero.

use log::debug;

use crate::error::WktError;
use crate::record::PolygonRegion;

/// Substring that marks a building-free row.
pub const EMPTY_SENTINEL: &str = "EMPTY";

/// Parsed polygon, before rounding to pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum Polygon {
    Empty,
    Rings(Vec<Vec<(f64, f64)>>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Word(&'a str),
    Number(f64),
    Open,
    Close,
    Comma,
}

impl Token<'_> {
    fn describe(&self) -> String {
        match self {
            Token::Word(w) => format!("word {w:?}"),
            Token::Number(v) => format!("number {v}"),
            Token::Open => "'('".to_string(),
            Token::Close => "')'".to_string(),
            Token::Comma => "','".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Keyword,
    Tagged,
    RingStart,
    CoordStart,
    InCoord,
    RingEnd,
    Empty,
    Done,
}

impl State {
    fn expecting(&self) -> &'static str {
        match self {
            State::Keyword => "POLYGON",
            State::Tagged => "'(' or EMPTY",
            State::RingStart => "'(' opening a ring",
            State::CoordStart => "a coordinate",
            State::InCoord => "a number, ',' or ')'",
            State::RingEnd => "',' or ')'",
            State::Empty | State::Done => "end of input",
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<(usize, Token<'_>)>, WktError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        let token = match bytes[pos] {
            c if c.is_ascii_whitespace() => {
                pos += 1;
                continue;
            }
            b'(' => {
                pos += 1;
                Token::Open
            }
            b')' => {
                pos += 1;
                Token::Close
            }
            b',' => {
                pos += 1;
                Token::Comma
            }
            c if c.is_ascii_alphabetic() => {
                while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
                    pos += 1;
                }
                Token::Word(&src[start..pos])
            }
            c if c.is_ascii_digit() || matches!(c, b'-' | b'+' | b'.') => {
                while pos < bytes.len()
                    && matches!(bytes[pos], b'0'..=b'9' | b'.' | b'-' | b'+' | b'e' | b'E')
                {
                    pos += 1;
                }
                let text = &src[start..pos];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| WktError::new(start, format!("invalid number {text:?}")))?;
                Token::Number(value)
            }
            _ => {
                let ch = src[start..].chars().next().unwrap_or('?');
                return Err(WktError::new(start, format!("unexpected character {ch:?}")));
            }
        };
        tokens.push((start, token));
    }

    Ok(tokens)
}

fn is_dimension(word: &str) -> bool {
    ["Z", "M", "ZM"].iter().any(|d| word.eq_ignore_ascii_case(d))
}

fn finish_coord(
    coord: &mut Vec<f64>,
    ring: &mut Vec<(f64, f64)>,
    offset: usize,
) -> Result<(), WktError> {
    if coord.len() < 2 {
        return Err(WktError::new(offset, "coordinate needs both x and y"));
    }
    ring.push((coord[0], coord[1]));
    coord.clear();
    Ok(())
}

/// Parse one WKT polygon.
pub fn parse(text: &str) -> Result<Polygon, WktError> {
    let tokens = tokenize(text)?;
    let mut state = State::Keyword;
    let mut rings = Vec::new();
    let mut ring = Vec::new();
    let mut coord: Vec<f64> = Vec::with_capacity(4);

    for &(offset, token) in &tokens {
        state = match (state, token) {
            (State::Keyword, Token::Word(w)) if w.eq_ignore_ascii_case("POLYGON") => State::Tagged,
            (State::Tagged, Token::Word(w)) if is_dimension(w) => State::Tagged,
            (State::Tagged, Token::Word(w)) if w.eq_ignore_ascii_case(EMPTY_SENTINEL) => {
                State::Empty
            }
            (State::Tagged, Token::Open) => State::RingStart,
            (State::RingStart, Token::Open) => State::CoordStart,
            (State::CoordStart | State::InCoord, Token::Number(v)) => {
                if coord.len() == 4 {
                    return Err(WktError::new(offset, "coordinate has more than four ordinates"));
                }
                coord.push(v);
                State::InCoord
            }
            (State::InCoord, Token::Comma) => {
                finish_coord(&mut coord, &mut ring, offset)?;
                State::CoordStart
            }
            (State::InCoord, Token::Close) => {
                finish_coord(&mut coord, &mut ring, offset)?;
                rings.push(std::mem::take(&mut ring));
                State::RingEnd
            }
            (State::RingEnd, Token::Comma) => State::RingStart,
            (State::RingEnd, Token::Close) => State::Done,
            (state, token) => {
                return Err(WktError::new(
                    offset,
                    format!("unexpected {} while expecting {}", token.describe(), state.expecting()),
                ))
            }
        };
    }

    match state {
        State::Done => Ok(Polygon::Rings(rings)),
        State::Empty => Ok(Polygon::Empty),
        other => Err(WktError::new(
            text.len(),
            format!("unexpected end of input while expecting {}", other.expecting()),
        )),
    }
}

/// True when the raw value carries the empty-geometry sentinel anywhere.
pub fn is_empty_geometry(text: &str) -> bool {
    text.contains(EMPTY_SENTINEL)
}

/// Parse a `PolygonWKT_Pix` value into a pixel region.
///
/// `Ok(None)` means the row marks an image without buildings.
pub fn parse_pixel_polygon(text: &str) -> Result<Option<PolygonRegion>, WktError> {
    if is_empty_geometry(text) {
        return Ok(None);
    }

    let rings = match parse(text)? {
        Polygon::Empty => return Ok(None),
        Polygon::Rings(rings) => rings,
    };
    if rings.len() > 1 {
        debug!("flattening {} rings into one vertex list", rings.len());
    }

    let mut region = PolygonRegion::default();
    for (x, y) in rings.into_iter().flatten() {
        region.push(x.round() as i64, y.round() as i64);
    }
    Ok(Some(region))
}
