//! Command model
//!
//! The closed set of supported instructions. Every value is validated when
//! it is built from tokens, so a `LinearMove` always has at least one field
//! and an `ArcMove` always has its full geometry.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CommandError, LineError, TokenError};
use crate::parser::lexer::{Token, TokenKind};

/// A parsed instruction tagged with the line it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub line_number: usize,
    pub kind: CommandKind,
}

impl Command {
    pub fn new(line_number: usize, kind: CommandKind) -> Self {
        Self { line_number, kind }
    }

    pub fn is_move(&self) -> bool {
        matches!(
            self.kind,
            CommandKind::LinearMove(_) | CommandKind::ArcMove(_)
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    /// G0, G1
    LinearMove(LinearMove),
    /// G2, G3
    ArcMove(ArcMove),
    /// G28
    Home(Home),
    /// G92
    SetPosition(SetPosition),
    /// G20
    SetUnitsInches,
    /// G21
    SetUnitsMillimeters,
    /// G90
    SetPositioningAbsolute,
    /// G91
    SetPositioningRelative,
    /// M82
    SetExtruderAbsolute,
    /// M83
    SetExtruderRelative,
    /// M104
    SetExtruderTemperature(SetTemperature),
    /// M109
    SetExtruderTemperatureAndWait(SetTemperatureAndWait),
    /// A well-formed code outside the supported vocabulary, kept only when
    /// unknown commands are skipped rather than rejected
    Unsupported(CommandCode),
}

impl CommandKind {
    /// The code word this command is written with, e.g. `G1`.
    pub fn code(&self) -> String {
        let code = match self {
            CommandKind::LinearMove(m) if m.is_rapid() => "G0",
            CommandKind::LinearMove(_) => "G1",
            CommandKind::ArcMove(m) => match m.direction() {
                ArcDirection::Clockwise => "G2",
                ArcDirection::CounterClockwise => "G3",
            },
            CommandKind::Home(_) => "G28",
            CommandKind::SetPosition(_) => "G92",
            CommandKind::SetUnitsInches => "G20",
            CommandKind::SetUnitsMillimeters => "G21",
            CommandKind::SetPositioningAbsolute => "G90",
            CommandKind::SetPositioningRelative => "G91",
            CommandKind::SetExtruderAbsolute => "M82",
            CommandKind::SetExtruderRelative => "M83",
            CommandKind::SetExtruderTemperature(_) => "M104",
            CommandKind::SetExtruderTemperatureAndWait(_) => "M109",
            CommandKind::Unsupported(code) => return code.to_string(),
        };
        code.to_string()
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())?;
        let fields: Vec<(char, Option<f64>)> = match self {
            CommandKind::LinearMove(m) => vec![
                ('X', m.x),
                ('Y', m.y),
                ('Z', m.z),
                ('E', m.e),
                ('F', m.f),
                ('H', m.h),
                ('R', m.r),
                ('S', m.s),
            ],
            CommandKind::ArcMove(m) => vec![
                ('X', Some(m.x)),
                ('Y', Some(m.y)),
                ('I', Some(m.i)),
                ('J', Some(m.j)),
                ('E', Some(m.e)),
                ('F', m.f),
            ],
            CommandKind::Home(h) => {
                for (letter, set) in [('X', h.x), ('Y', h.y), ('Z', h.z)] {
                    if set {
                        write!(f, " {letter}")?;
                    }
                }
                Vec::new()
            }
            CommandKind::SetPosition(p) => vec![('X', p.x), ('Y', p.y), ('Z', p.z), ('E', p.e)],
            CommandKind::SetExtruderTemperature(t) => {
                vec![('S', Some(t.s)), ('R', t.r), ('D', t.d)]
            }
            CommandKind::SetExtruderTemperatureAndWait(t) => {
                vec![('S', Some(t.s)), ('R', t.r), ('T', t.t)]
            }
            _ => Vec::new(),
        };
        for (letter, value) in fields {
            if let Some(value) = value {
                write!(f, " {letter}{value}")?;
            }
        }
        Ok(())
    }
}

/// Leading field of an instruction unit, e.g. `g` + `1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCode {
    pub letter: char,
    pub literal: String,
}

impl CommandCode {
    pub fn from_token(token: &Token) -> Self {
        Self {
            letter: token.letter,
            literal: token.literal_str().to_string(),
        }
    }

    /// Code number, when the literal is a plain unsigned integer.
    ///
    /// `G01` and `G1` share number 1; `G29.1` has none.
    pub fn number(&self) -> Option<u32> {
        if self.literal.is_empty() || !self.literal.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.literal.parse().ok()
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.letter.to_ascii_uppercase(), self.literal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcDirection {
    Clockwise,
    CounterClockwise,
}

/// G0/G1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearMove {
    rapid: bool,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    e: Option<f64>,
    f: Option<f64>,
    h: Option<f64>,
    r: Option<f64>,
    s: Option<f64>,
}

impl LinearMove {
    pub const PARAMETERS: &'static [char] = &['x', 'y', 'z', 'e', 'f', 'h', 'r', 's'];

    pub fn from_params(rapid: bool, params: &Params) -> Result<Self, CommandError> {
        if params.is_empty() {
            return Err(CommandError::MissingParameter {
                command: if rapid { "G0" } else { "G1" }.to_string(),
                expected: "at least one of x, y, z, e, f, h, r, s",
            });
        }
        Ok(Self {
            rapid,
            x: params.get('x'),
            y: params.get('y'),
            z: params.get('z'),
            e: params.get('e'),
            f: params.get('f'),
            h: params.get('h'),
            r: params.get('r'),
            s: params.get('s'),
        })
    }

    pub fn is_rapid(&self) -> bool {
        self.rapid
    }
    pub fn x(&self) -> Option<f64> {
        self.x
    }
    pub fn y(&self) -> Option<f64> {
        self.y
    }
    pub fn z(&self) -> Option<f64> {
        self.z
    }
    pub fn e(&self) -> Option<f64> {
        self.e
    }
    pub fn f(&self) -> Option<f64> {
        self.f
    }
    pub fn h(&self) -> Option<f64> {
        self.h
    }
    pub fn r(&self) -> Option<f64> {
        self.r
    }
    pub fn s(&self) -> Option<f64> {
        self.s
    }
}

/// G2/G3 in the XY plane, with the pivot given relative to the start point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcMove {
    direction: ArcDirection,
    x: f64,
    y: f64,
    i: f64,
    j: f64,
    e: f64,
    f: Option<f64>,
}

impl ArcMove {
    pub const PARAMETERS: &'static [char] = &['x', 'y', 'i', 'j', 'e', 'f'];

    pub fn from_params(direction: ArcDirection, params: &Params) -> Result<Self, CommandError> {
        let missing = || CommandError::MissingParameter {
            command: match direction {
                ArcDirection::Clockwise => "G2",
                ArcDirection::CounterClockwise => "G3",
            }
            .to_string(),
            expected: "x, y, i, j, e",
        };
        Ok(Self {
            direction,
            x: params.get('x').ok_or_else(missing)?,
            y: params.get('y').ok_or_else(missing)?,
            i: params.get('i').ok_or_else(missing)?,
            j: params.get('j').ok_or_else(missing)?,
            e: params.get('e').ok_or_else(missing)?,
            f: params.get('f'),
        })
    }

    pub fn direction(&self) -> ArcDirection {
        self.direction
    }
    pub fn x(&self) -> f64 {
        self.x
    }
    pub fn y(&self) -> f64 {
        self.y
    }
    pub fn i(&self) -> f64 {
        self.i
    }
    pub fn j(&self) -> f64 {
        self.j
    }
    pub fn e(&self) -> f64 {
        self.e
    }
    pub fn f(&self) -> Option<f64> {
        self.f
    }
}

/// G28. No axis flag means "home everything".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Home {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl Home {
    pub const PARAMETERS: &'static [char] = &['x', 'y', 'z'];

    pub fn is_all_axes(&self) -> bool {
        !(self.x || self.y || self.z)
    }
}

/// G92
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetPosition {
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    e: Option<f64>,
}

impl SetPosition {
    pub const PARAMETERS: &'static [char] = &['x', 'y', 'z', 'e'];

    pub fn from_params(params: &Params) -> Result<Self, CommandError> {
        if params.is_empty() {
            return Err(CommandError::MissingParameter {
                command: "G92".to_string(),
                expected: "at least one of x, y, z, e",
            });
        }
        Ok(Self {
            x: params.get('x'),
            y: params.get('y'),
            z: params.get('z'),
            e: params.get('e'),
        })
    }

    pub fn x(&self) -> Option<f64> {
        self.x
    }
    pub fn y(&self) -> Option<f64> {
        self.y
    }
    pub fn z(&self) -> Option<f64> {
        self.z
    }
    pub fn e(&self) -> Option<f64> {
        self.e
    }
}

/// M104
///
/// `d` shares its letter with a command letter, so it is never filled from
/// G-code text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetTemperature {
    s: f64,
    r: Option<f64>,
    d: Option<f64>,
}

impl SetTemperature {
    pub const PARAMETERS: &'static [char] = &['s', 'r', 'd'];

    pub fn from_params(params: &Params) -> Result<Self, CommandError> {
        Ok(Self {
            s: require_temperature("M104", params)?,
            r: params.get('r'),
            d: params.get('d'),
        })
    }

    pub fn s(&self) -> f64 {
        self.s
    }
    pub fn r(&self) -> Option<f64> {
        self.r
    }
    pub fn d(&self) -> Option<f64> {
        self.d
    }
}

/// M109
///
/// Like `d` for M104, the `t` tool field is only reachable programmatically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetTemperatureAndWait {
    s: f64,
    r: Option<f64>,
    t: Option<f64>,
}

impl SetTemperatureAndWait {
    pub const PARAMETERS: &'static [char] = &['s', 'r', 't'];

    pub fn from_params(params: &Params) -> Result<Self, CommandError> {
        Ok(Self {
            s: require_temperature("M109", params)?,
            r: params.get('r'),
            t: params.get('t'),
        })
    }

    pub fn s(&self) -> f64 {
        self.s
    }
    pub fn r(&self) -> Option<f64> {
        self.r
    }
    pub fn t(&self) -> Option<f64> {
        self.t
    }
}

fn require_temperature(command: &str, params: &Params) -> Result<f64, CommandError> {
    params.get('s').ok_or_else(|| CommandError::MissingParameter {
        command: command.to_string(),
        expected: "s",
    })
}

/// Numeric parameter values of one instruction unit, keyed by letter.
/// A repeated letter keeps its last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: BTreeMap<char, f64>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, letter: char, value: f64) {
        self.values.insert(letter, value);
    }

    pub fn get(&self, letter: char) -> Option<f64> {
        self.values.get(&letter).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse the parameter tokens following a command token.
    ///
    /// Every letter must belong to `allowed`, and every literal must be a
    /// valid decimal number.
    pub fn parse(code: &CommandCode, tokens: &[Token], allowed: &[char]) -> Result<Self, LineError> {
        let mut params = Params::new();
        for token in tokens {
            check_allowed(code, token, allowed)?;
            params.insert(token.letter, parse_number(token)?);
        }
        Ok(params)
    }
}

fn check_allowed(code: &CommandCode, token: &Token, allowed: &[char]) -> Result<(), CommandError> {
    if allowed.contains(&token.letter) {
        Ok(())
    } else {
        Err(CommandError::InvalidParameter {
            command: code.to_string(),
            letter: token.letter,
        })
    }
}

fn parse_number(token: &Token) -> Result<f64, TokenError> {
    token
        .literal_str()
        .parse::<f64>()
        .map_err(|_| TokenError::MalformedNumber {
            letter: token.letter,
            literal: token.literal_str().to_string(),
        })
}

/// Groups tokens into instruction units and builds typed commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandParser {
    skip_unknown: bool,
}

impl CommandParser {
    /// With `skip_unknown`, codes outside the vocabulary come back as
    /// [`CommandKind::Unsupported`] instead of failing the line.
    pub fn new(skip_unknown: bool) -> Self {
        Self { skip_unknown }
    }

    pub fn skip_unknown(&self) -> bool {
        self.skip_unknown
    }

    /// Build every command of one line. An empty token list yields no commands.
    pub fn parse(&self, tokens: &[Token]) -> Result<Vec<CommandKind>, LineError> {
        group_tokens(tokens)?
            .into_iter()
            .filter_map(<[Token]>::split_first)
            .map(|(head, params)| self.build(head, params))
            .collect()
    }

    fn build(&self, head: &Token, params: &[Token]) -> Result<CommandKind, LineError> {
        let code = CommandCode::from_token(head);

        let kind = match (code.letter, code.number()) {
            ('g', Some(0)) => linear(&code, params, true)?,
            ('g', Some(1)) => linear(&code, params, false)?,
            ('g', Some(2)) => arc(&code, params, ArcDirection::Clockwise)?,
            ('g', Some(3)) => arc(&code, params, ArcDirection::CounterClockwise)?,
            ('g', Some(28)) => home(&code, params)?,
            ('g', Some(92)) => {
                let params = Params::parse(&code, params, SetPosition::PARAMETERS)?;
                CommandKind::SetPosition(SetPosition::from_params(&params)?)
            }
            ('g', Some(20)) => bare(&code, params, CommandKind::SetUnitsInches)?,
            ('g', Some(21)) => bare(&code, params, CommandKind::SetUnitsMillimeters)?,
            ('g', Some(90)) => bare(&code, params, CommandKind::SetPositioningAbsolute)?,
            ('g', Some(91)) => bare(&code, params, CommandKind::SetPositioningRelative)?,
            ('m', Some(82)) => bare(&code, params, CommandKind::SetExtruderAbsolute)?,
            ('m', Some(83)) => bare(&code, params, CommandKind::SetExtruderRelative)?,
            ('m', Some(104)) => {
                let params = Params::parse(&code, params, SetTemperature::PARAMETERS)?;
                CommandKind::SetExtruderTemperature(SetTemperature::from_params(&params)?)
            }
            ('m', Some(109)) => {
                let params = Params::parse(&code, params, SetTemperatureAndWait::PARAMETERS)?;
                CommandKind::SetExtruderTemperatureAndWait(SetTemperatureAndWait::from_params(
                    &params,
                )?)
            }
            _ if self.skip_unknown => CommandKind::Unsupported(code),
            _ => return Err(CommandError::UnsupportedCommand(code.to_string()).into()),
        };

        Ok(kind)
    }
}

fn linear(code: &CommandCode, tokens: &[Token], rapid: bool) -> Result<CommandKind, LineError> {
    let params = Params::parse(code, tokens, LinearMove::PARAMETERS)?;
    Ok(CommandKind::LinearMove(LinearMove::from_params(rapid, &params)?))
}

fn arc(code: &CommandCode, tokens: &[Token], direction: ArcDirection) -> Result<CommandKind, LineError> {
    let params = Params::parse(code, tokens, ArcMove::PARAMETERS)?;
    Ok(CommandKind::ArcMove(ArcMove::from_params(direction, &params)?))
}

// Presence of an axis letter sets its flag; the literal is ignored
fn home(code: &CommandCode, tokens: &[Token]) -> Result<CommandKind, LineError> {
    let mut home = Home::default();
    for token in tokens {
        check_allowed(code, token, Home::PARAMETERS)?;
        match token.letter {
            'x' => home.x = true,
            'y' => home.y = true,
            _ => home.z = true,
        }
    }
    Ok(CommandKind::Home(home))
}

fn bare(code: &CommandCode, tokens: &[Token], kind: CommandKind) -> Result<CommandKind, LineError> {
    if let Some(token) = tokens.first() {
        check_allowed(code, token, &[])?;
    }
    Ok(kind)
}

/// Split tokens into one group per command letter.
///
/// A parameter before any command and letters outside both vocabularies
/// are structural errors.
pub fn group_tokens(tokens: &[Token]) -> Result<Vec<&[Token]>, TokenError> {
    let mut groups = Vec::new();
    let mut start: Option<usize> = None;

    for (index, token) in tokens.iter().enumerate() {
        match token.kind() {
            TokenKind::Command => {
                if let Some(start) = start {
                    groups.push(&tokens[start..index]);
                }
                start = Some(index);
            }
            TokenKind::Parameter => {
                if start.is_none() {
                    return Err(TokenError::ParameterBeforeCommand(token.letter));
                }
            }
            TokenKind::Unrecognized => {
                return Err(TokenError::UnrecognizedLetter(token.letter));
            }
        }
    }

    if let Some(start) = start {
        groups.push(&tokens[start..]);
    }

    Ok(groups)
}
