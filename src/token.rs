//! Lexer: source text -> flat token stream with line numbers.
//!
//! Grounded on the tokenizer shape in
//! `examples/navicore-cem3/crates/compiler/src/parser.rs` (`Token`,
//! `tokenize`), generalized to the richer reserved-word/operator table
//! `spec.md` §3/§4.1 requires.

use crate::diagnostics::{Diagnostics, Stage};

/// A single reserved word, per `spec.md` §3's closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Print,
    If,
    Elif,
    Else,
    Loop,
    Return,
    Import,
    Var,
    Bool,
    Char,
    StringType,
    Void,
    True,
    False,
    In,
    All,
    // String-operation keywords
    Len,
    Upper,
    Lower,
    Reverse,
    IsUpper,
    IsLower,
    Strip,
    LStrip,
    RStrip,
    Capitalize,
    Title,
    IsAlpha,
    IsDigit,
    IsSpace,
    IsAlnum,
    Find,
    Count,
    StartsWith,
    EndsWith,
    Replace,
}

impl Keyword {
    fn lookup(word: &str) -> Option<Keyword> {
        use Keyword::*;
        Some(match word {
            "print" => Print,
            "if" => If,
            "elif" => Elif,
            "else" => Else,
            "loop" => Loop,
            "return" => Return,
            "import" => Import,
            "var" => Var,
            "bool" => Bool,
            "char" => Char,
            "string" => StringType,
            "void" => Void,
            "true" => True,
            "false" => False,
            "in" => In,
            "all" => All,
            "len" => Len,
            "upper" => Upper,
            "lower" => Lower,
            "reverse" => Reverse,
            "isupper" => IsUpper,
            "islower" => IsLower,
            "strip" => Strip,
            "lstrip" => LStrip,
            "rstrip" => RStrip,
            "capitalize" => Capitalize,
            "title" => Title,
            "isalpha" => IsAlpha,
            "isdigit" => IsDigit,
            "isspace" => IsSpace,
            "isalnum" => IsAlnum,
            "find" => Find,
            "count" => Count,
            "startswith" => StartsWith,
            "endswith" => EndsWith,
            "replace" => Replace,
            _ => return None,
        })
    }
}

/// `int`/`intN`/`float`/`floatN` type-keyword tokens keep their original
/// lexeme (`spec.md` §4.1) so the parser can recover the declared width.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    IntLit(u64),
    FloatLit(f64),
    CharLit(char),
    StringLit(String),
    Ident(String),
    Keyword(Keyword),
    /// `int`, `int8`, `float`, `float32`, ... — lexeme preserved verbatim.
    TypeName(String),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Lt,
    Gt,
    EqEq,
    NotEq,
    Geq,
    Leq,
    PlusPlus,
    MinusMinus,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
}

impl Token {
    fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            line,
        }
    }
}

const MAX_U64_LEXEME: &str = "18446744073709551615";

/// Lex `source` into a token stream. Never fails: bad input is reported to
/// `diags` and the lexer resynchronizes at the next whitespace/newline
/// (`spec.md` §4.1).
pub fn tokenize(source: &str, diags: &mut Diagnostics) -> Vec<Token> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        tokens: Vec::new(),
        diags,
    };
    lexer.run();
    lexer.tokens
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
    diags: &'a mut Diagnostics,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn push(&mut self, kind: TokenKind, lexeme: impl Into<String>) {
        let line = self.line;
        self.tokens.push(Token::new(kind, lexeme, line));
    }

    fn error(&mut self, message: impl Into<String>) {
        let line = self.line;
        self.diags.error(Stage::Lexer, Some(line), message);
    }

    /// Skip to the next whitespace or newline so lexing can continue after
    /// a bad-input diagnostic.
    fn resync(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                break;
            }
            self.advance();
        }
    }

    fn run(&mut self) {
        loop {
            self.skip_whitespace_and_comments();
            let Some(c) = self.peek() else { break };
            let line = self.line;

            if c.is_ascii_digit() {
                self.lex_number();
            } else if c == '"' {
                self.lex_string();
            } else if c == '\'' {
                self.lex_char();
            } else if c.is_alphabetic() || c == '_' {
                self.lex_identifier();
            } else {
                self.lex_operator(c, line);
            }
        }
        self.push(TokenKind::Eof, "");
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('@') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some(q @ ('\'' | '"'))
                    if self.peek_at(1) == Some(q) && self.peek_at(2) == Some(q) =>
                {
                    self.advance();
                    self.advance();
                    self.advance();
                    loop {
                        if self.peek().is_none() {
                            self.error("unterminated block comment");
                            break;
                        }
                        if self.peek() == Some(q)
                            && self.peek_at(1) == Some(q)
                            && self.peek_at(2) == Some(q)
                        {
                            self.advance();
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self) {
        let line = self.line;
        let start = self.pos;
        let mut is_float = false;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        // A trailing alphabetic character glued to a digit run is an
        // "identifier starting with digit" diagnostic (spec.md §4.1):
        // consume the whole bad run and emit no token.
        if matches!(self.peek(), Some(c) if c.is_alphabetic() || c == '_') {
            while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
                self.advance();
            }
            let bad: String = self.chars[start..self.pos].iter().collect();
            self.error(format!("identifier starting with digit: '{bad}'"));
            return;
        }

        let lexeme: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            match lexeme.parse::<f64>() {
                Ok(v) if v.is_finite() => self.push(TokenKind::FloatLit(v), lexeme),
                _ => self.error(format!("float literal '{lexeme}' out of range")),
            }
        } else {
            // 20-digit maximum, enforced lexically.
            if lexeme.len() > MAX_U64_LEXEME.len()
                || (lexeme.len() == MAX_U64_LEXEME.len() && lexeme.as_str() > MAX_U64_LEXEME)
            {
                self.error(format!("integer literal '{lexeme}' overflows 64 bits"));
                return;
            }
            match lexeme.parse::<u64>() {
                Ok(v) => self.push(TokenKind::IntLit(v), lexeme),
                Err(_) => {
                    self.error(format!("integer literal '{lexeme}' overflows 64 bits"));
                    let _ = line;
                }
            }
        }
    }

    fn lex_string(&mut self) {
        let line = self.line;
        self.advance(); // opening quote
        let start = self.pos;
        loop {
            match self.peek() {
                None => {
                    self.error("unterminated string literal");
                    let lexeme: String = self.chars[start..self.pos].iter().collect();
                    self.push(TokenKind::StringLit(lexeme), "");
                    return;
                }
                Some('"') => break,
                Some(_) => {
                    self.advance();
                }
            }
        }
        let body: String = self.chars[start..self.pos].iter().collect();
        self.advance(); // closing quote
        self.push(TokenKind::StringLit(body.clone()), format!("\"{body}\""));
        let _ = line;
    }

    fn lex_char(&mut self) {
        self.advance(); // opening quote
        let Some(c) = self.peek() else {
            self.error("unterminated char literal");
            return;
        };
        self.advance();
        if self.peek() != Some('\'') {
            // Missing closing quote: diagnostic, do not consume the
            // following character (spec.md §4.1).
            self.error("unterminated char literal, expected closing '\''");
            return;
        }
        self.advance();
        self.push(TokenKind::CharLit(c), format!("'{c}'"));
    }

    fn lex_identifier(&mut self) {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        if is_type_name(&word) {
            self.push(TokenKind::TypeName(word.clone()), word);
            return;
        }
        if let Some(kw) = Keyword::lookup(&word) {
            self.push(TokenKind::Keyword(kw), word);
            return;
        }
        self.push(TokenKind::Ident(word.clone()), word);
    }

    fn lex_operator(&mut self, c: char, line: usize) {
        self.advance();
        let kind = match c {
            '+' if self.matches('+') => TokenKind::PlusPlus,
            '-' if self.matches('-') => TokenKind::MinusMinus,
            '=' if self.matches('=') => TokenKind::EqEq,
            '!' if self.matches('=') => TokenKind::NotEq,
            '>' if self.matches('=') => TokenKind::Geq,
            '<' if self.matches('=') => TokenKind::Leq,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => TokenKind::Assign,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            other => {
                self.line = line;
                self.error(format!("unknown character '{other}'"));
                self.resync();
                return;
            }
        };
        self.push(kind.clone(), lexeme_for(&kind));
    }
}

fn is_type_name(word: &str) -> bool {
    if word == "int" || word == "float" {
        return true;
    }
    if let Some(rest) = word.strip_prefix("int") {
        return !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit());
    }
    if let Some(rest) = word.strip_prefix("float") {
        return !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit());
    }
    false
}

fn lexeme_for(kind: &TokenKind) -> &'static str {
    use TokenKind::*;
    match kind {
        Plus => "+",
        Minus => "-",
        Star => "*",
        Slash => "/",
        Percent => "%",
        Assign => "=",
        LParen => "(",
        RParen => ")",
        LBrace => "{",
        RBrace => "}",
        LBracket => "[",
        RBracket => "]",
        Comma => ",",
        Semicolon => ";",
        Colon => ":",
        Dot => ".",
        Lt => "<",
        Gt => ">",
        EqEq => "==",
        NotEq => "!=",
        Geq => ">=",
        Leq => "<=",
        PlusPlus => "++",
        MinusMinus => "--",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> (Vec<Token>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let toks = tokenize(src, &mut diags);
        (toks, diags)
    }

    #[test]
    fn ends_with_single_eof() {
        let (toks, diags) = lex("1 + 2");
        assert!(!diags.had_error());
        assert_eq!(toks.last().unwrap().kind, TokenKind::Eof);
        assert_eq!(toks.iter().filter(|t| t.kind == TokenKind::Eof).count(), 1);
    }

    #[test]
    fn every_token_has_a_positive_line() {
        let (toks, _) = lex("int x = 1;\nint y = 2;\n");
        assert!(toks.iter().all(|t| t.line >= 1));
    }

    #[test]
    fn multi_char_operators_win_over_single_char() {
        let (toks, _) = lex("a == b != c >= d <= e ++ f --");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind.clone()).collect();
        assert!(kinds.contains(&TokenKind::EqEq));
        assert!(kinds.contains(&TokenKind::NotEq));
        assert!(kinds.contains(&TokenKind::Geq));
        assert!(kinds.contains(&TokenKind::Leq));
        assert!(kinds.contains(&TokenKind::PlusPlus));
        assert!(kinds.contains(&TokenKind::MinusMinus));
    }

    #[test]
    fn type_names_preserve_lexeme_and_width() {
        let (toks, _) = lex("int8 a = 1;");
        match &toks[0].kind {
            TokenKind::TypeName(name) => assert_eq!(name, "int8"),
            other => panic!("expected type name, got {other:?}"),
        }
    }

    #[test]
    fn integer_overflow_emits_diagnostic_and_no_token() {
        let (toks, diags) = lex("18446744073709551616");
        assert!(diags.had_error());
        assert_eq!(toks.len(), 1); // just Eof
    }

    #[test]
    fn max_u64_literal_is_accepted() {
        let (toks, diags) = lex(MAX_U64_LEXEME);
        assert!(!diags.had_error());
        assert_eq!(toks[0].kind, TokenKind::IntLit(u64::MAX));
    }

    #[test]
    fn digit_glued_identifier_is_a_diagnostic() {
        let (_, diags) = lex("123abc");
        assert!(diags.had_error());
    }

    #[test]
    fn unterminated_char_literal_does_not_consume_next_char() {
        let (toks, diags) = lex("'xy'");
        assert!(diags.had_error());
        // 'x' then the lexer should resume at 'y' as an identifier, not eat it.
        assert!(toks.iter().any(|t| matches!(&t.kind, TokenKind::Ident(n) if n == "y")));
    }

    #[test]
    fn line_comment_and_block_comment_are_skipped() {
        let (toks, diags) = lex("@ a line comment\nint x = 1; \"\"\" a block\ncomment \"\"\"");
        assert!(!diags.had_error());
        assert!(toks.iter().any(|t| t.kind == TokenKind::Assign));
    }

    #[test]
    fn unknown_character_is_a_diagnostic_and_resumes() {
        let (toks, diags) = lex("int x = 1 $ int y = 2;");
        assert!(diags.had_error());
        assert!(toks.iter().any(|t| matches!(&t.kind, TokenKind::Ident(n) if n == "y")));
    }

    #[test]
    fn reserved_string_method_words_are_keywords_not_idents() {
        let (toks, _) = lex("upper");
        assert_eq!(toks[0].kind, TokenKind::Keyword(Keyword::Upper));
    }
}
