use std::iter::Peekable;

use crate::token::{FileId, Span, Token, TokenKind, KEYWORDS};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 8_192;

/// Lexes the provided source, producing the tokens into the provided buffer.
///
/// The buffer never contains an EOF token; the parser synthesizes one when it
/// runs off the end. All lexical faults are represented as
/// [`TokenKind::Error`] tokens, so this function itself cannot fail.
pub fn lex(src: &str, file: FileId, tokens: &mut Vec<Token>) {
    Lexer::new(src, file, tokens).lex();
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(src: &str, file: FileId) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lex(src, file, &mut tokens);
    tokens
}

/// A lexical fault, carried as the payload of an error token.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UnexpectedChar,
    UnclosedString,
    MalformedNumber,
}

/// The Ronin lexer
struct Lexer<'src, 'tok> {
    src: &'src str,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    current_lo: usize,
    file: FileId,
    line: u32,
    col: u32,
    mark_line: u32,
    mark_col: u32,
    chars: u32,
    mark_chars: u32,
    /// Set by a scan routine to pinpoint a fault inside the current lexeme.
    forced_span: Option<Span>,
    /// Whether the previously produced token may end an operand. Decides if a
    /// `-` in front of digits starts a signed literal.
    prev_ends_operand: bool,
    tokens: &'tok mut Vec<Token>,
}

impl Lexer<'_, '_> {
    /// Scans the source string until the input is exhausted.
    ///
    /// Tokens are written into the provided tokens buffer.
    fn lex(mut self) {
        assert_eq!(self.tokens.len(), 0, "must pass clean tokens buffer");
        loop {
            self.skip_trivia();
            let first = self.mark_advance();
            if first == '\0' {
                break;
            }
            let next = self.scan_token_kind(first);
            self.produce(next);
        }
    }

    /// Skips whitespace and `//` line comments, still advancing the
    /// line/column counters.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                c if c.is_ascii_whitespace() => {
                    self.advance();
                }
                '/' if self.peek2() == '/' => {
                    while !matches!(self.peek(), '\n' | '\0') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Tries to scan the token starting with the already consumed `first`.
    fn scan_token_kind(&mut self, first: char) -> TokenKind {
        use TokenKind::*;
        match first {
            '+' => Plus,
            '-' => match self.peek() {
                c if c.is_ascii_digit() && !self.prev_ends_operand => self.number(true),
                _ => Minus,
            },
            '*' => Star,
            '/' => Slash,
            '&' => Ampersand,
            '=' => match self.peek() {
                '=' => self.advance_with(Eq),
                _ => Assign,
            },
            '<' => match self.peek() {
                '=' => self.advance_with(LessEq),
                _ => Less,
            },
            '>' => match self.peek() {
                '=' => self.advance_with(GreaterEq),
                _ => Greater,
            },
            '(' => LParen,
            ')' => RParen,
            '[' => LBracket,
            ']' => RBracket,
            '{' => LBrace,
            '}' => RBrace,
            ':' => Colon,
            ';' => Semicolon,
            '?' => Question,
            '!' => Bang,
            '.' => Dot,
            ',' => Comma,
            '\'' => self.string(),
            c if c.is_ascii_digit() => self.number(false),
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier_or_keyword(),
            // The glob above imports the `Error` variant, which would shadow
            // the error enum in this scope; both paths are written out.
            _ => TokenKind::Error(self::Error::UnexpectedChar),
        }
    }

    /// Tries to lex a string token. Escaping is deferred: the raw substring
    /// is only rewritten after the whole token has been scanned, and only if
    /// an escape sequence was actually seen.
    fn string(&mut self) -> TokenKind {
        let mut has_escaped = false;
        let mut is_escaping = false;
        loop {
            let current = self.advance();
            match (is_escaping, current) {
                // The input exhausted before the closing quote. The error
                // span starts at the opening quote.
                (_, '\0') => {
                    return TokenKind::Error(Error::UnclosedString);
                }
                (false, '\'') => {
                    let raw = &self.substr()[1..self.substr().len() - 1];
                    let decoded = if has_escaped {
                        perform_escape(raw).into_boxed_str()
                    } else {
                        raw.into()
                    };
                    return TokenKind::Str(decoded);
                }
                (false, '\\') => {
                    has_escaped = true;
                    is_escaping = true;
                }
                (_, _) => {
                    is_escaping = false;
                }
            }
        }
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        while matches!(self.peek(), c if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        let substr = self.substr();
        match KEYWORDS.get(substr).cloned() {
            Some(keyword) => keyword,
            // The uppercase-initial convention is reserved for type names.
            None if substr.starts_with(|c: char| c.is_ascii_uppercase()) => {
                TokenKind::TypeName(substr.into())
            }
            None => TokenKind::Ident(substr.into()),
        }
    }

    /// Scans a numeric literal. The leading digit (or fused `-`) was already
    /// consumed by the caller.
    fn number(&mut self, negative: bool) -> TokenKind {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        let mut is_float = false;
        if self.peek() == '.' && self.peek2().is_ascii_digit() {
            is_float = true;
            self.advance(); // '.'
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        // A second decimal point makes the whole lexeme malformed. The error
        // span pinpoints the offending character; the remaining digit/dot
        // run is consumed so that scanning resumes cleanly after it.
        if is_float && self.peek() == '.' && self.peek2().is_ascii_digit() {
            self.forced_span = Some(Span::new(self.file, self.line, self.col, 1));
            while matches!(self.peek(), c if c.is_ascii_digit() || c == '.') {
                self.advance();
            }
            return TokenKind::Error(Error::MalformedNumber);
        }

        let substr = self.substr();
        if is_float {
            match substr.parse::<f64>() {
                Ok(f) => TokenKind::Float(f),
                Err(_) => TokenKind::Error(Error::MalformedNumber),
            }
        } else if negative {
            match substr.parse::<i64>() {
                Ok(i) => TokenKind::Sint(i),
                Err(_) => TokenKind::Error(Error::MalformedNumber),
            }
        } else {
            match substr.parse::<u64>() {
                Ok(u) => TokenKind::Uint(u),
                Err(_) => TokenKind::Error(Error::MalformedNumber),
            }
        }
    }
}

impl Lexer<'_, '_> {
    /// Constructs a new lexer with the default state.
    fn new<'src, 'tok>(
        src: &'src str,
        file: FileId,
        tokens: &'tok mut Vec<Token>,
    ) -> Lexer<'src, 'tok> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
            file,
            line: 1,
            col: 1,
            mark_line: 1,
            mark_col: 1,
            chars: 0,
            mark_chars: 0,
            forced_span: None,
            prev_ends_operand: false,
            tokens,
        }
    }

    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> char {
        self.current_lo = self.cursor;
        self.mark_line = self.line;
        self.mark_col = self.col;
        self.mark_chars = self.chars;
        self.advance()
    }

    /// Returns the next character and advances the iterator, maintaining the
    /// line/column counters.
    fn advance(&mut self) -> char {
        let Some(c) = self.iter.next() else {
            return '\0';
        };
        self.cursor += c.len_utf8();
        self.chars += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        c
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next character without advancing the iterator.
    fn peek(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    /// Returns the character after the next one, without advancing.
    fn peek2(&self) -> char {
        let mut iter = self.iter.clone();
        iter.next();
        iter.next().unwrap_or('\0')
    }

    /// Returns the span of the current marked lexeme.
    fn span(&self) -> Span {
        Span::new(
            self.file,
            self.mark_line,
            self.mark_col,
            self.chars - self.mark_chars,
        )
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        &self.src[self.current_lo..self.cursor]
    }

    /// Produces a token using the marked bounds (or a span forced by the
    /// scan routine).
    fn produce(&mut self, kind: TokenKind) {
        let span = self.forced_span.take().unwrap_or_else(|| self.span());
        self.prev_ends_operand = kind.ends_operand();
        self.tokens.push(Token::new(kind, span));
    }
}

fn perform_escape(raw: &str) -> String {
    let mut buf = String::with_capacity(raw.len());
    let mut escaped = false;
    for char in raw.chars() {
        let char = match (escaped, char) {
            (true, 'n') => '\n',
            (true, 't') => '\t',
            (false, '\\') => {
                escaped = true;
                continue;
            }
            (_, char) => char,
        };
        escaped = false;
        buf.push(char);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex_in_new(src, FileId(0))
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_demo_program_no_errors() {
        let input = include_str!("../demos/stack.rn");
        let has_errors = kinds(input).iter().any(TokenKind::is_error);
        assert!(!has_errors);
    }

    #[test]
    fn operators_and_punctuation() {
        use TokenKind::*;
        assert_eq!(
            kinds("+ * / & ( ) [ ] { } : ; ? ! . ,"),
            [
                Plus, Star, Slash, Ampersand, LParen, RParen, LBracket, RBracket, LBrace, RBrace,
                Colon, Semicolon, Question, Bang, Dot, Comma,
            ]
        );
        // Multi-character operators take precedence over their prefixes.
        assert_eq!(
            kinds("== = <= < >= > =="),
            [Eq, Assign, LessEq, Less, GreaterEq, Greater, Eq]
        );
    }

    #[test]
    fn keywords_are_case_sensitive() {
        use TokenKind::*;
        assert_eq!(
            kinds("let if for while end do import const macro match fn struct type"),
            [Let, If, For, While, End, Do, Import, Const, Macro, Match, Fn, Struct, Type]
        );
        // Capitalized spellings are not keywords; they hit the type-name
        // convention instead.
        assert_eq!(
            kinds("Let WHILE"),
            [TypeName("Let".into()), TypeName("WHILE".into())]
        );
    }

    #[test]
    fn identifiers_and_type_names() {
        use TokenKind::*;
        assert_eq!(
            kinds("foo _bar baz9 Vec3 T"),
            [
                Ident("foo".into()),
                Ident("_bar".into()),
                Ident("baz9".into()),
                TypeName("Vec3".into()),
                TypeName("T".into()),
            ]
        );
    }

    #[test]
    fn literal_values() {
        use TokenKind::*;
        assert_eq!(
            kinds("0 42 3.25 'hi' true false null"),
            [
                Uint(0),
                Uint(42),
                Float(3.25),
                Str("hi".into()),
                True,
                False,
                Null,
            ]
        );
    }

    #[test]
    fn signed_versus_binary_minus() {
        use TokenKind::*;
        // After an operand, `-` is subtraction...
        assert_eq!(
            kinds("x - 1"),
            [Ident("x".into()), Minus, Uint(1)]
        );
        // ...but in operand position it fuses with the digits.
        assert_eq!(kinds("= -1"), [Assign, Sint(-1)]);
        assert_eq!(kinds("(-2)"), [LParen, Sint(-2), RParen]);
        assert_eq!(
            kinds("1 - -2"),
            [Uint(1), Minus, Sint(-2)]
        );
        assert_eq!(kinds("-1.5"), [Float(-1.5)]);
    }

    #[test]
    fn malformed_number_pinpoints_offender() {
        let tokens = lex_in_new("1.2.3 ok", FileId(0));
        assert_eq!(
            tokens[0].kind,
            TokenKind::Error(Error::MalformedNumber)
        );
        // The span points at the second decimal point.
        assert_eq!(tokens[0].span().col, 4);
        assert_eq!(tokens[0].span().len, 1);
        // Lexing continues after the malformed run.
        assert_eq!(tokens[1].kind, TokenKind::Ident("ok".into()));
    }

    #[test]
    fn trailing_dot_is_not_a_float() {
        use TokenKind::*;
        assert_eq!(kinds("1."), [Uint(1), Dot]);
    }

    #[test]
    fn string_escapes() {
        use TokenKind::*;
        assert_eq!(
            kinds(r"'a\nb' 'q\'q' 'back\\slash'"),
            [
                Str("a\nb".into()),
                Str("q'q".into()),
                Str("back\\slash".into()),
            ]
        );
    }

    #[test]
    fn unclosed_string_spans_opening_quote() {
        let tokens = lex_in_new("  'oops", FileId(0));
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Error(Error::UnclosedString));
        assert_eq!(tokens[0].span().col, 3);
    }

    #[test]
    fn unexpected_char_covers_one_character() {
        let tokens = lex_in_new("a $ b", FileId(0));
        assert_eq!(tokens[1].kind, TokenKind::Error(Error::UnexpectedChar));
        assert_eq!(tokens[1].span().len, 1);
        assert_eq!(tokens[2].kind, TokenKind::Ident("b".into()));
    }

    #[test]
    fn comments_and_whitespace_produce_nothing() {
        use TokenKind::*;
        assert_eq!(
            kinds("a // rest of line\n  // whole line\nb"),
            [Ident("a".into()), Ident("b".into())]
        );
        assert_eq!(kinds("// only a comment"), []);
    }

    #[test]
    fn line_and_column_counters() {
        let tokens = lex_in_new("let x\n  = 1\n", FileId(7));
        let spans: Vec<_> = tokens
            .iter()
            .map(|t| (t.span().line, t.span().col, t.span().len))
            .collect();
        assert_eq!(spans, [(1, 1, 3), (1, 5, 1), (2, 3, 1), (2, 5, 1)]);
        assert!(tokens.iter().all(|t| t.span().file == FileId(7)));
    }

    #[test]
    fn mixed_statement_token_sequence() {
        use TokenKind::*;
        assert_eq!(
            kinds("let x = 1 + 2 * 3 end"),
            [
                Let,
                Ident("x".into()),
                Assign,
                Uint(1),
                Plus,
                Uint(2),
                Star,
                Uint(3),
                End,
            ]
        );
    }

    #[test]
    fn reconstruction_reproduces_significant_characters() {
        // Concatenating each token's lexeme reproduces the input minus
        // whitespace and comments.
        let input = "let total = 0 // sum\nfor let i = 0; i < 10; i = i + 1\n  total = total + i\nend";
        let significant: String = input
            .lines()
            .map(|l| l.split("//").next().unwrap())
            .flat_map(|l| l.split_whitespace())
            .collect();
        let reconstructed: String = lex_in_new(input, FileId(0))
            .iter()
            .map(|t| reconstruct(&t.kind))
            .collect();
        assert_eq!(reconstructed, significant);
    }

    fn reconstruct(kind: &TokenKind) -> String {
        use TokenKind::*;
        match kind {
            Let => "let".into(),
            If => "if".into(),
            For => "for".into(),
            While => "while".into(),
            End => "end".into(),
            Do => "do".into(),
            Import => "import".into(),
            Const => "const".into(),
            Macro => "macro".into(),
            Match => "match".into(),
            Fn => "fn".into(),
            Struct => "struct".into(),
            Type => "type".into(),
            True => "true".into(),
            False => "false".into(),
            Null => "null".into(),
            Plus => "+".into(),
            Minus => "-".into(),
            Star => "*".into(),
            Slash => "/".into(),
            Ampersand => "&".into(),
            Less => "<".into(),
            LessEq => "<=".into(),
            Greater => ">".into(),
            GreaterEq => ">=".into(),
            Assign => "=".into(),
            Eq => "==".into(),
            LParen => "(".into(),
            RParen => ")".into(),
            LBracket => "[".into(),
            RBracket => "]".into(),
            LBrace => "{".into(),
            RBrace => "}".into(),
            Colon => ":".into(),
            Semicolon => ";".into(),
            Question => "?".into(),
            Bang => "!".into(),
            Dot => ".".into(),
            Comma => ",".into(),
            Ident(name) | TypeName(name) => name.to_string(),
            Uint(v) => v.to_string(),
            Sint(v) => v.to_string(),
            Float(v) => v.to_string(),
            Str(s) => format!("'{s}'"),
            Eof | Error(_) => String::new(),
        }
    }
}
