//! G-code Parser
//!
//! Line-oriented parsing of G-code into typed [`Command`]s.
//! [`CommandStream`] reads lazily from any `BufRead`, so large files are
//! never held in memory as a whole.

pub mod command;
pub mod lexer;

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub use command::{
    ArcDirection, ArcMove, Command, CommandCode, CommandKind, CommandParser, Home, LinearMove,
    Params, SetPosition, SetTemperature, SetTemperatureAndWait,
};
pub use lexer::{tokenize_line, Token, TokenKind};

use crate::error::{Error, SyntaxError, TokenError};

/// Longest accepted line, in characters, excluding the line terminator.
pub const MAX_LINE_LENGTH: usize = 256;

/// Parse a single line of G-code.
///
/// `line_number` is 1-based and is stamped on every produced command.
pub fn parse_line(
    line: &str,
    line_number: usize,
    parser: &CommandParser,
) -> Result<Vec<Command>, SyntaxError> {
    let line = line.trim_end_matches(['\n', '\r']);

    let length = line.chars().count();
    if length > MAX_LINE_LENGTH {
        return Err(SyntaxError::new(
            line_number,
            line,
            TokenError::LineTooLong {
                length,
                max: MAX_LINE_LENGTH,
            },
        ));
    }

    let tokens = lexer::tokenize_line(line);
    let kinds = parser
        .parse(&tokens)
        .map_err(|cause| SyntaxError::new(line_number, line, cause))?;

    Ok(kinds
        .into_iter()
        .map(|kind| Command::new(line_number, kind))
        .collect())
}

/// Parse a complete G-code text.
pub fn parse_text(text: &str, skip_unknown: bool) -> Result<Vec<Command>, SyntaxError> {
    let parser = CommandParser::new(skip_unknown);
    let mut commands = Vec::new();

    for (index, line) in text.lines().enumerate() {
        commands.extend(parse_line(line, index + 1, &parser)?);
    }

    Ok(commands)
}

/// Parse a G-code file into memory.
///
/// For large files, prefer streaming with [`open_file`].
pub fn parse_file(path: impl AsRef<Path>, skip_unknown: bool) -> Result<Vec<Command>, Error> {
    open_file(path, skip_unknown)?.collect()
}

/// Open a G-code file as a lazy command stream.
pub fn open_file(
    path: impl AsRef<Path>,
    skip_unknown: bool,
) -> Result<CommandStream<BufReader<File>>, Error> {
    let file = File::open(path)?;
    Ok(CommandStream::new(BufReader::new(file), skip_unknown))
}

/// Forward-only stream of commands read from a `BufRead` source.
///
/// The first error ends the stream.
pub struct CommandStream<R: BufRead> {
    reader: R,
    parser: CommandParser,
    line_number: usize,
    line_buffer: String,
    pending: VecDeque<Command>,
    finished: bool,
}

impl<R: BufRead> CommandStream<R> {
    pub fn new(reader: R, skip_unknown: bool) -> Self {
        Self {
            reader,
            parser: CommandParser::new(skip_unknown),
            line_number: 0,
            line_buffer: String::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Number of lines consumed so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl<R: BufRead> Iterator for CommandStream<R> {
    type Item = Result<Command, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(command) = self.pending.pop_front() {
                return Some(Ok(command));
            }
            if self.finished {
                return None;
            }

            self.line_buffer.clear();
            match self.reader.read_line(&mut self.line_buffer) {
                Ok(0) => {
                    self.finished = true;
                    return None;
                }
                Ok(_) => {
                    self.line_number += 1;
                    match parse_line(&self.line_buffer, self.line_number, &self.parser) {
                        Ok(commands) => self.pending.extend(commands),
                        Err(e) => {
                            self.finished = true;
                            return Some(Err(e.into()));
                        }
                    }
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}
