use std::collections::HashMap;

use once_cell::sync::Lazy;
use thiserror::Error;

// =========================================================
// TOKENS & LEXER
// =========================================================

/// A single lexed token. Numbers are parsed eagerly: a literal with a decimal
/// point becomes [`Token::Float`], anything else [`Token::Int`].
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Keyword(String),
    Punct(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unknown token at \"{0}\"")]
    UnknownToken(String),
    #[error("number literal \"{0}\" has more than one decimal point")]
    DoubleDecimalPoint(String),
    #[error("number literal \"{0}\" is not a valid number")]
    InvalidNumber(String),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unknown escape sequence \\{0}")]
    UnknownEscape(char),
}

/// Token tables for a [`Lexer`]. The defaults cover the expression language;
/// callers with a different dialect can supply their own sets.
///
/// Punctuation is matched first-entry-wins, so multi-character entries must
/// come before their single-character prefixes.
#[derive(Debug, Clone)]
pub struct LexerConfig {
    pub keywords: Vec<String>,
    pub punctuation: Vec<String>,
    pub escape_sequences: HashMap<char, char>,
}

impl Default for LexerConfig {
    fn default() -> Self {
        Self {
            keywords: ["true", "false", "and", "or"]
                .into_iter()
                .map(String::from)
                .collect(),
            punctuation: [
                "==", ">=", "<=", "&&", "||", "!", "+", "-", "/", "*", "(", ")", ">", "<", ",",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            escape_sequences: HashMap::from([
                ('t', '\t'),
                ('n', '\n'),
                ('"', '"'),
                ('\'', '\''),
                ('\\', '\\'),
                ('0', '\0'),
                ('b', '\u{0008}'),
                ('v', '\u{000B}'),
            ]),
        }
    }
}

static DEFAULT_CONFIG: Lazy<LexerConfig> = Lazy::new(LexerConfig::default);

/// Tokenizes `text` with the default expression-language tables.
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    tokenize_with(text, &DEFAULT_CONFIG)
}

/// Tokenizes `text` with caller-supplied tables.
pub fn tokenize_with(text: &str, config: &LexerConfig) -> Result<Vec<Token>, LexError> {
    Lexer::new(text, config).run()
}

struct Lexer<'a> {
    input: Vec<char>,
    pos: usize,
    config: &'a LexerConfig,
}

impl<'a> Lexer<'a> {
    fn new(text: &str, config: &'a LexerConfig) -> Self {
        Self {
            input: text.chars().collect(),
            pos: 0,
            config,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            if self.is_eof() {
                return Ok(tokens);
            }
            tokens.push(self.next_token()?);
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        self.pos += 1;
        ch
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    /// Consumes `expected` if the input continues with it.
    fn expect_str(&mut self, expected: &str) -> bool {
        let mut end = self.pos;
        for ch in expected.chars() {
            if self.input.get(end) != Some(&ch) {
                return false;
            }
            end += 1;
        }
        self.pos = end;
        true
    }

    /// The next few characters of input, for error reporting.
    fn preview(&self) -> String {
        self.input[self.pos..self.input.len().min(self.pos + 10)]
            .iter()
            .collect()
    }

    // Attempt order matters: keywords before identifiers (so `true` is never
    // an identifier), multi-character punctuation before its prefixes.
    fn next_token(&mut self) -> Result<Token, LexError> {
        let config = self.config;
        for keyword in &config.keywords {
            if self.expect_str(keyword) {
                return Ok(Token::Keyword(keyword.clone()));
            }
        }
        for punct in &config.punctuation {
            if self.expect_str(punct) {
                return Ok(Token::Punct(punct.clone()));
            }
        }
        let Some(ch) = self.peek() else {
            return Err(LexError::UnknownToken(String::new()));
        };
        if ch.is_ascii_alphabetic() || ch == '_' {
            return Ok(self.read_identifier());
        }
        if ch.is_ascii_digit() || ch == '.' {
            return self.read_number();
        }
        if ch == '"' {
            return self.read_string();
        }
        Err(LexError::UnknownToken(self.preview()))
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        Token::Ident(self.input[start..self.pos].iter().collect())
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        let mut found_decimal = false;
        while let Some(c) = self.peek() {
            if c == '.' {
                if found_decimal {
                    let text: String = self.input[start..self.pos].iter().collect();
                    return Err(LexError::DoubleDecimalPoint(text));
                }
                found_decimal = true;
            } else if !c.is_ascii_digit() {
                break;
            }
            self.pos += 1;
        }
        let text: String = self.input[start..self.pos].iter().collect();
        if found_decimal {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| LexError::InvalidNumber(text))
        } else {
            text.parse::<i64>()
                .map(Token::Int)
                .map_err(|_| LexError::InvalidNumber(text))
        }
    }

    fn read_string(&mut self) -> Result<Token, LexError> {
        // Opening quote.
        self.pos += 1;
        let mut result = String::new();
        loop {
            let Some(c) = self.advance() else {
                return Err(LexError::UnterminatedString);
            };
            match c {
                '"' => return Ok(Token::Str(result)),
                '\\' => {
                    let Some(escape) = self.advance() else {
                        return Err(LexError::UnterminatedString);
                    };
                    match self.config.escape_sequences.get(&escape) {
                        Some(replacement) => result.push(*replacement),
                        None => return Err(LexError::UnknownEscape(escape)),
                    }
                }
                _ => result.push(c),
            }
        }
    }
}
