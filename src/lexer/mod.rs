use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
  Identifier(String),
  Number(f64),
  String(String),
  Keyword(Keyword),
  Ellipsis,
  Arrow,
  Eq,
  PlusEq,
  EqEq,
  Neq,
  Lt,
  Lte,
  Gt,
  Gte,
  Plus,
  Minus,
  Star,
  Slash,
  Percent,
  LParen,
  RParen,
  LBracket,
  RBracket,
  Comma,
  Colon,
  Newline,
  Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
  Fn,
  Return,
  Raise,
  Pass,
  If,
  Else,
  While,
  For,
  In,
  Break,
  Continue,
  End,
  And,
  Or,
  Not,
  True,
  False,
  Null,
}

#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  pub line: usize,
  pub col: usize,
}

pub fn lex(input: &str) -> Result<Vec<Token>> {
  let mut tokens = Vec::new();
  let mut chars = input.chars().peekable();
  let mut line = 1usize;
  let mut col = 1usize;

  while let Some(ch) = chars.peek().cloned() {
    match ch {
      ' ' | '\t' | '\r' => {
        chars.next();
        col += 1;
      }
      '\n' => {
        chars.next();
        tokens.push(Token { kind: TokenKind::Newline, line, col });
        line += 1;
        col = 1;
      }
      '#' => {
        while let Some(c) = chars.next() {
          if c == '\n' {
            tokens.push(Token { kind: TokenKind::Newline, line, col });
            line += 1;
            col = 1;
            break;
          }
        }
      }
      '.' => {
        let start_col = col;
        chars.next();
        col += 1;
        for _ in 0..2 {
          if chars.peek() == Some(&'.') {
            chars.next();
            col += 1;
          } else {
            return Err(Error::parse(line, start_col, "Unexpected '.', expected '...'"));
          }
        }
        tokens.push(Token { kind: TokenKind::Ellipsis, line, col: start_col });
      }
      '+' => {
        chars.next();
        if chars.peek() == Some(&'=') {
          chars.next();
          tokens.push(Token { kind: TokenKind::PlusEq, line, col });
          col += 2;
        } else {
          tokens.push(Token { kind: TokenKind::Plus, line, col });
          col += 1;
        }
      }
      '-' => {
        chars.next();
        if chars.peek() == Some(&'>') {
          chars.next();
          tokens.push(Token { kind: TokenKind::Arrow, line, col });
          col += 2;
        } else {
          tokens.push(Token { kind: TokenKind::Minus, line, col });
          col += 1;
        }
      }
      '*' => {
        chars.next();
        tokens.push(Token { kind: TokenKind::Star, line, col });
        col += 1;
      }
      '/' => {
        chars.next();
        tokens.push(Token { kind: TokenKind::Slash, line, col });
        col += 1;
      }
      '%' => {
        chars.next();
        tokens.push(Token { kind: TokenKind::Percent, line, col });
        col += 1;
      }
      '=' => {
        chars.next();
        if chars.peek() == Some(&'=') {
          chars.next();
          tokens.push(Token { kind: TokenKind::EqEq, line, col });
          col += 2;
        } else {
          tokens.push(Token { kind: TokenKind::Eq, line, col });
          col += 1;
        }
      }
      '!' => {
        chars.next();
        if chars.peek() == Some(&'=') {
          chars.next();
          tokens.push(Token { kind: TokenKind::Neq, line, col });
          col += 2;
        } else {
          return Err(Error::parse(line, col, "Unexpected '!', expected '!='"));
        }
      }
      '<' => {
        chars.next();
        if chars.peek() == Some(&'=') {
          chars.next();
          tokens.push(Token { kind: TokenKind::Lte, line, col });
          col += 2;
        } else {
          tokens.push(Token { kind: TokenKind::Lt, line, col });
          col += 1;
        }
      }
      '>' => {
        chars.next();
        if chars.peek() == Some(&'=') {
          chars.next();
          tokens.push(Token { kind: TokenKind::Gte, line, col });
          col += 2;
        } else {
          tokens.push(Token { kind: TokenKind::Gt, line, col });
          col += 1;
        }
      }
      '(' => {
        chars.next();
        tokens.push(Token { kind: TokenKind::LParen, line, col });
        col += 1;
      }
      ')' => {
        chars.next();
        tokens.push(Token { kind: TokenKind::RParen, line, col });
        col += 1;
      }
      '[' => {
        chars.next();
        tokens.push(Token { kind: TokenKind::LBracket, line, col });
        col += 1;
      }
      ']' => {
        chars.next();
        tokens.push(Token { kind: TokenKind::RBracket, line, col });
        col += 1;
      }
      ',' => {
        chars.next();
        tokens.push(Token { kind: TokenKind::Comma, line, col });
        col += 1;
      }
      ':' => {
        chars.next();
        tokens.push(Token { kind: TokenKind::Colon, line, col });
        col += 1;
      }
      '"' => {
        let start_col = col;
        chars.next();
        col += 1;
        let mut s = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
          col += 1;
          match c {
            '"' => {
              closed = true;
              break;
            }
            '\n' => {
              return Err(Error::parse(line, start_col, "Unterminated string"));
            }
            '\\' => {
              if let Some(esc) = chars.next() {
                col += 1;
                match esc {
                  'n' => s.push('\n'),
                  't' => s.push('\t'),
                  '"' => s.push('"'),
                  '\\' => s.push('\\'),
                  _ => s.push(esc),
                }
              }
            }
            _ => s.push(c),
          }
        }
        if !closed {
          return Err(Error::parse(line, start_col, "Unterminated string"));
        }
        tokens.push(Token { kind: TokenKind::String(s), line, col: start_col });
      }
      c if c.is_ascii_digit() => {
        let start_col = col;
        let mut num = String::new();
        let mut seen_dot = false;
        while let Some(c2) = chars.peek().cloned() {
          if c2.is_ascii_digit() {
            num.push(c2);
            chars.next();
            col += 1;
          } else if c2 == '.' && !seen_dot {
            // One-char lookahead so `1...` stays number + placeholder.
            let mut ahead = chars.clone();
            ahead.next();
            if ahead.peek().map(|c| c.is_ascii_digit()) != Some(true) {
              break;
            }
            seen_dot = true;
            num.push(c2);
            chars.next();
            col += 1;
          } else {
            break;
          }
        }
        let value: f64 = num
          .parse()
          .map_err(|_| Error::parse(line, start_col, format!("Invalid number '{}'", num)))?;
        tokens.push(Token { kind: TokenKind::Number(value), line, col: start_col });
      }
      c if is_ident_start(c) => {
        let start_col = col;
        let mut ident = String::new();
        while let Some(c2) = chars.peek().cloned() {
          if is_ident_continue(c2) {
            ident.push(c2);
            chars.next();
            col += 1;
          } else {
            break;
          }
        }
        let kind = match ident.as_str() {
          "fn" => TokenKind::Keyword(Keyword::Fn),
          "return" => TokenKind::Keyword(Keyword::Return),
          "raise" => TokenKind::Keyword(Keyword::Raise),
          "pass" => TokenKind::Keyword(Keyword::Pass),
          "if" => TokenKind::Keyword(Keyword::If),
          "else" => TokenKind::Keyword(Keyword::Else),
          "while" => TokenKind::Keyword(Keyword::While),
          "for" => TokenKind::Keyword(Keyword::For),
          "in" => TokenKind::Keyword(Keyword::In),
          "break" => TokenKind::Keyword(Keyword::Break),
          "continue" => TokenKind::Keyword(Keyword::Continue),
          "end" => TokenKind::Keyword(Keyword::End),
          "and" => TokenKind::Keyword(Keyword::And),
          "or" => TokenKind::Keyword(Keyword::Or),
          "not" => TokenKind::Keyword(Keyword::Not),
          "true" => TokenKind::Keyword(Keyword::True),
          "false" => TokenKind::Keyword(Keyword::False),
          "null" => TokenKind::Keyword(Keyword::Null),
          _ => TokenKind::Identifier(ident),
        };
        tokens.push(Token { kind, line, col: start_col });
      }
      _ => {
        return Err(Error::parse(line, col, format!("Unexpected character '{}'", ch)));
      }
    }
  }

  tokens.push(Token { kind: TokenKind::Eof, line, col });
  Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
  c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '_'
}
