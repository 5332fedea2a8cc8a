//! Parser for the textual p-code format.

use super::{Operand, Program, Record, Unit};
use crate::core::ParseError;
use hashbrown::HashSet;

/// Largest varnode size in bytes the parser accepts.
pub const MAX_VARNODE_SIZE: u32 = 0x10000;

pub fn parse_program(text: &str) -> Result<Program, ParseError> {
    let parser = Parser::new(text);
    parser.parse()
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
    program: Program,
    unit_names: HashSet<&'a str>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            line: 1,
            program: Program::default(),
            unit_names: HashSet::new(),
        }
    }

    fn parse(mut self) -> Result<Program, ParseError> {
        self.skip_whitespace(true);

        while !self.is_eof() {
            self.parse_unit()?;
            self.skip_whitespace(true);
        }

        log::trace!("Parsed {} units", self.program.units.len());
        Ok(self.program)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.line, message)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn current_char(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            if ch == '\n' {
                self.line += 1;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn skip_whitespace(&mut self, skip_newlines: bool) {
        while let Some(ch) = self.current_char() {
            if ch == ';' {
                // Comment runs to the end of the line; the newline itself is
                // left for the caller when it is significant.
                while let Some(ch) = self.current_char() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if ch.is_whitespace() {
                if ch == '\n' && !skip_newlines {
                    break;
                }
                self.advance();
            } else {
                break;
            }
        }
    }

    fn try_read(&mut self, ch: char) -> bool {
        self.skip_whitespace(false);
        if self.current_char() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, ch: char) -> Result<(), ParseError> {
        if !self.try_read(ch) {
            return Err(match self.current_char() {
                Some('\n') | None => self.error(format!("expected '{}' before end of line", ch)),
                Some(found) => self.error(format!("expected '{}' but found '{}'", ch, found)),
            });
        }
        Ok(())
    }

    fn read_identifier(&mut self) -> Result<&'a str, ParseError> {
        self.skip_whitespace(false);
        let start = self.pos;

        match self.current_char() {
            Some(ch) if ch.is_alphabetic() || ch == '_' => {}
            Some('\n') | None => return Err(self.error("expected identifier before end of line")),
            Some(ch) => return Err(self.error(format!("expected identifier but found '{}'", ch))),
        }

        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                self.advance();
            } else {
                break;
            }
        }

        Ok(&self.text[start..self.pos])
    }

    fn read_number(&mut self) -> Result<u64, ParseError> {
        self.skip_whitespace(false);
        let start = self.pos;
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_alphanumeric() {
                self.advance();
            } else {
                break;
            }
        }

        let token = &self.text[start..self.pos];
        if token.is_empty() {
            return Err(self.error("expected number"));
        }
        let parsed = match token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => token.parse(),
        };
        parsed.map_err(|e| self.error(format!("invalid number '{}': {}", token, e)))
    }

    fn is_at_line_end(&mut self) -> bool {
        self.skip_whitespace(false);
        matches!(self.current_char(), Some('\n') | None)
    }

    fn parse_unit(&mut self) -> Result<(), ParseError> {
        let line = self.line;
        let keyword = self.read_identifier()?;
        if keyword != "unit" {
            return Err(self.error(format!("expected 'unit' but found '{}'", keyword)));
        }
        let name = self.read_identifier()?;
        if !self.unit_names.insert(name) {
            return Err(self.error(format!("duplicate unit '{}'", name)));
        }
        self.expect('{')?;

        let mut records = Vec::new();
        loop {
            self.skip_whitespace(true);
            if self.is_eof() {
                return Err(self.error(format!("unit '{}' is missing its closing '}}'", name)));
            }
            if self.try_read('}') {
                break;
            }
            records.push(self.parse_record()?);
        }

        self.program.units.push(Unit {
            name: name.to_string(),
            line,
            records,
        });
        Ok(())
    }

    fn parse_record(&mut self) -> Result<Record, ParseError> {
        let line = self.line;
        let first = self.parse_operand()?;

        let (output, opcode) = if self.try_read('=') {
            (Some(first), self.read_identifier()?.to_string())
        } else {
            match first {
                Operand::Name(opcode) => (None, opcode),
                other => return Err(self.error(format!("expected opcode but found '{}'", other))),
            }
        };

        let mut operands = Vec::new();
        if !self.is_at_line_end() {
            loop {
                operands.push(self.parse_operand()?);
                if self.is_at_line_end() {
                    break;
                }
                self.expect(',')?;
            }
        }

        Ok(Record {
            line,
            output,
            opcode,
            operands,
        })
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace(false);
        match self.current_char() {
            Some('@') => {
                self.advance();
                Ok(Operand::Userop(self.read_identifier()?.to_string()))
            }
            Some(ch) if ch.is_ascii_digit() => Ok(Operand::Address(self.read_number()?)),
            _ => {
                let name = self.read_identifier()?;
                if self.current_char() != Some('[') {
                    return Ok(Operand::Name(name.to_string()));
                }
                self.advance();
                let offset = self.read_number()?;
                self.expect(':')?;
                let size = self.read_number()?;
                self.expect(']')?;

                let size = u32::try_from(size)
                    .ok()
                    .filter(|&s| s > 0 && s <= MAX_VARNODE_SIZE)
                    .ok_or_else(|| self.error(format!("invalid varnode size {}", size)))?;
                Ok(Operand::Varnode {
                    space: name.to_string(),
                    offset,
                    size,
                })
            }
        }
    }
}
