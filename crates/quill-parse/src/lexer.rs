use crate::token::{Tok, TokKind};
use quill_ast::span::Span;

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn bump(&mut self) -> Option<u8> {
        if self.pos >= self.src.len() {
            None
        } else {
            let b = self.src[self.pos];
            self.pos += 1;
            Some(b)
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }
    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn span(&self, start: usize) -> Span {
        Span {
            start: start as u32,
            end: self.pos as u32,
        }
    }

    fn tok(&self, kind: TokKind, start: usize) -> Tok {
        Tok {
            kind,
            span: self.span(start),
        }
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
                self.bump();
            }
            // line comment: //
            if self.peek() == Some(b'/') && self.peek2() == Some(b'/') {
                while let Some(b) = self.peek() {
                    if b == b'\n' {
                        break;
                    }
                    self.bump();
                }
                continue;
            }
            break;
        }
    }

    pub fn next_tok(&mut self) -> Tok {
        self.skip_ws_and_comments();
        let start = self.pos;
        let Some(b) = self.bump() else {
            return Tok {
                kind: TokKind::Eof,
                span: Span {
                    start: self.pos as u32,
                    end: self.pos as u32,
                },
            };
        };
        let c = b as char;

        // 2-char operators first
        if self.peek() == Some(b'=') {
            let two = match c {
                '=' => Some(TokKind::EqEq),
                '!' => Some(TokKind::BangEq),
                '<' => Some(TokKind::Le),
                '>' => Some(TokKind::Ge),
                _ => None,
            };
            if let Some(k) = two {
                self.bump();
                return self.tok(k, start);
            }
        }

        // 1-char punctuation/operators
        let single = match c {
            '(' => Some(TokKind::LParen),
            ')' => Some(TokKind::RParen),
            '{' => Some(TokKind::LBrace),
            '}' => Some(TokKind::RBrace),
            ',' => Some(TokKind::Comma),
            '.' => Some(TokKind::Dot),
            ';' => Some(TokKind::Semicolon),
            '+' => Some(TokKind::Plus),
            '-' => Some(TokKind::Minus),
            '*' => Some(TokKind::Star),
            '/' => Some(TokKind::Slash),
            '%' => Some(TokKind::Percent),
            '=' => Some(TokKind::Eq),
            '<' => Some(TokKind::Lt),
            '>' => Some(TokKind::Gt),
            '!' => Some(TokKind::Bang),
            _ => None,
        };
        if let Some(k) = single {
            return self.tok(k, start);
        }

        // string
        if c == '"' {
            return self.lex_string(start);
        }

        // number: digits with an optional fractional part
        if c.is_ascii_digit() {
            while matches!(self.peek(), Some(p) if p.is_ascii_digit()) {
                self.bump();
            }
            if self.peek() == Some(b'.') && matches!(self.peek2(), Some(p) if p.is_ascii_digit())
            {
                self.bump();
                while matches!(self.peek(), Some(p) if p.is_ascii_digit()) {
                    self.bump();
                }
            }
            let text = String::from_utf8_lossy(&self.src[start..self.pos]);
            let kind = match text.parse::<f64>() {
                Ok(v) => TokKind::Number(v),
                Err(_) => TokKind::Error(format!("invalid number literal '{}'", text)),
            };
            return self.tok(kind, start);
        }

        // ident / keywords
        if c.is_ascii_alphabetic() || c == '_' {
            while matches!(self.peek(), Some(p) if p.is_ascii_alphanumeric() || p == b'_') {
                self.bump();
            }
            let s = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
            let kind = match s.as_str() {
                "and" => TokKind::KwAnd,
                "or" => TokKind::KwOr,
                "var" => TokKind::KwVar,
                "fun" => TokKind::KwFun,
                "class" => TokKind::KwClass,
                "this" => TokKind::KwThis,
                "super" => TokKind::KwSuper,
                "true" => TokKind::KwTrue,
                "false" => TokKind::KwFalse,
                "nil" => TokKind::KwNil,
                "if" => TokKind::KwIf,
                "else" => TokKind::KwElse,
                "while" => TokKind::KwWhile,
                "for" => TokKind::KwFor,
                "break" => TokKind::KwBreak,
                "continue" => TokKind::KwContinue,
                "return" => TokKind::KwReturn,
                "print" => TokKind::KwPrint,
                _ => TokKind::Ident(s),
            };
            return self.tok(kind, start);
        }

        // skip the rest of a multi-byte character so the error span stays on a boundary
        while matches!(self.peek(), Some(p) if (p & 0xC0) == 0x80) {
            self.bump();
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.tok(
            TokKind::Error(format!("unexpected character '{}'", text)),
            start,
        )
    }

    fn lex_string(&mut self, start: usize) -> Tok {
        let mut bytes = Vec::new();
        loop {
            let Some(b) = self.bump() else {
                return self.tok(TokKind::Error("unterminated string".into()), start);
            };
            match b {
                b'"' => break,
                b'\\' => {
                    let Some(esc) = self.bump() else {
                        return self.tok(TokKind::Error("unterminated string".into()), start);
                    };
                    let real = match esc {
                        b'n' => b'\n',
                        b't' => b'\t',
                        b'"' => b'"',
                        b'\\' => b'\\',
                        other => other,
                    };
                    bytes.push(real);
                }
                other => bytes.push(other),
            }
        }
        let s = String::from_utf8_lossy(&bytes).into_owned();
        self.tok(TokKind::Str(s), start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokKind> {
        let mut lex = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let t = lex.next_tok();
            if t.kind == TokKind::Eof {
                break;
            }
            out.push(t.kind);
        }
        out
    }

    #[test]
    fn two_char_operators() {
        assert_eq!(
            kinds("== != <= >= < > = !"),
            vec![
                TokKind::EqEq,
                TokKind::BangEq,
                TokKind::Le,
                TokKind::Ge,
                TokKind::Lt,
                TokKind::Gt,
                TokKind::Eq,
                TokKind::Bang,
            ]
        );
    }

    #[test]
    fn numbers_are_floats() {
        assert_eq!(
            kinds("12 3.5 7."),
            vec![
                TokKind::Number(12.0),
                TokKind::Number(3.5),
                TokKind::Number(7.0),
                TokKind::Dot,
            ]
        );
    }

    #[test]
    fn keywords_and_idents() {
        assert_eq!(
            kinds("class Foo < Bar this super"),
            vec![
                TokKind::KwClass,
                TokKind::Ident("Foo".into()),
                TokKind::Lt,
                TokKind::Ident("Bar".into()),
                TokKind::KwThis,
                TokKind::KwSuper,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("1 // one\n2"),
            vec![TokKind::Number(1.0), TokKind::Number(2.0)]
        );
    }

    #[test]
    fn string_escapes_and_utf8() {
        assert_eq!(
            kinds(r#""a\n\"é""#),
            vec![TokKind::Str("a\n\"é".into())]
        );
    }

    #[test]
    fn unterminated_string_is_error_token() {
        assert!(matches!(&kinds("\"abc")[..], [TokKind::Error(msg)] if msg.contains("unterminated")));
    }

    #[test]
    fn unexpected_character_is_error_token() {
        assert!(matches!(&kinds("@")[..], [TokKind::Error(msg)] if msg.contains("'@'")));
    }
}
