//! Formula tokenizer
//!
//! Converts formula strings like "(NAV_unit - NAV_unit.shift(1)) * 100" into
//! a sequence of tokens that can be parsed into an AST.

/// A token in a formula expression
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A numeric literal (e.g., 123, 45.67, 1.5e10)
    Number(f64),
    /// A string literal (e.g., "hello" or 'world')
    Text(String),
    /// A column, function or method name, or one of the boolean keywords
    Identifier(String),
    /// A backtick-quoted column name; never a keyword or function
    QuotedIdentifier(String),
    /// Arithmetic/comparison operators: + - * / % ^ ** == != = <> < > <= >=
    Operator(String),
    OpenParen,
    CloseParen,
    Comma,
    /// Method-call separator: column.shift(1)
    Dot,
}

/// Error during tokenization
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizeError {
    pub message: String,
    pub position: usize,
}

impl TokenizeError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at position {}", self.message, self.position)
    }
}

impl std::error::Error for TokenizeError {}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Tokenizer for formula expressions
pub struct Tokenizer {
    chars: Vec<char>,
    position: usize,
}

impl Tokenizer {
    /// Create a new tokenizer; a leading '=' is ignored
    pub fn new(formula: &str) -> Self {
        let formula = formula.trim_start();
        let formula = formula.strip_prefix('=').unwrap_or(formula);
        Self {
            chars: formula.chars().collect(),
            position: 0,
        }
    }

    /// Tokenize the entire formula into a vector of tokens
    pub fn tokenize(mut self) -> Result<Vec<Token>, TokenizeError> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, TokenizeError> {
        self.skip_whitespace();

        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let token = match c {
            '"' | '\'' => self.read_string()?,
            '`' => self.read_quoted_identifier()?,

            '(' => {
                self.advance();
                Token::OpenParen
            }
            ')' => {
                self.advance();
                Token::CloseParen
            }
            ',' => {
                self.advance();
                Token::Comma
            }

            '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => self.read_number()?,
            '.' => {
                self.advance();
                Token::Dot
            }

            '*' => {
                self.advance();
                if self.peek() == Some('*') {
                    self.advance();
                    Token::Operator("**".to_string())
                } else {
                    Token::Operator("*".to_string())
                }
            }
            '+' | '-' | '/' | '%' | '^' => {
                self.advance();
                Token::Operator(c.to_string())
            }

            '=' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                }
                Token::Operator("==".to_string())
            }
            '!' => {
                let start = self.position;
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Token::Operator("!=".to_string())
                } else {
                    return Err(TokenizeError::new("Expected '=' after '!'", start));
                }
            }
            '<' => {
                self.advance();
                match self.peek() {
                    Some('=') => {
                        self.advance();
                        Token::Operator("<=".to_string())
                    }
                    Some('>') => {
                        self.advance();
                        Token::Operator("!=".to_string())
                    }
                    _ => Token::Operator("<".to_string()),
                }
            }
            '>' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Token::Operator(">=".to_string())
                } else {
                    Token::Operator(">".to_string())
                }
            }

            c if c.is_ascii_digit() => self.read_number()?,
            c if c.is_alphabetic() || c == '_' => self.read_identifier(),

            c => {
                return Err(TokenizeError::new(
                    format!("Unexpected character '{}'", c),
                    self.position,
                ));
            }
        };
        Ok(Some(token))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.position + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.position += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.position += 1;
        }
        out
    }

    /// Read a string literal; a doubled quote is an escaped quote
    fn read_string(&mut self) -> Result<Token, TokenizeError> {
        let start = self.position;
        let quote = self.advance().unwrap_or('"');
        let mut value = String::new();

        loop {
            match self.advance() {
                None => return Err(TokenizeError::new("Unterminated string literal", start)),
                Some(c) if c == quote => {
                    if self.peek() == Some(quote) {
                        value.push(quote);
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(c) => value.push(c),
            }
        }

        Ok(Token::Text(value))
    }

    fn read_quoted_identifier(&mut self) -> Result<Token, TokenizeError> {
        let start = self.position;
        self.advance();
        let name = self.take_while(|c| c != '`');
        if self.advance() != Some('`') {
            return Err(TokenizeError::new("Unterminated `quoted` column name", start));
        }
        if name.is_empty() {
            return Err(TokenizeError::new("Empty `quoted` column name", start));
        }
        Ok(Token::QuotedIdentifier(name))
    }

    /// Read a number (integer, decimal, or scientific notation). A digit run
    /// that continues with word characters is a column name like `2023_sales`.
    fn read_number(&mut self) -> Result<Token, TokenizeError> {
        let start = self.position;
        let mut text = self.take_while(|c| c.is_ascii_digit());

        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            text.push('.');
            text.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let signed = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    text.push(self.advance().unwrap_or('e'));
                }
                text.push_str(&self.take_while(|c| c.is_ascii_digit()));
            }
        }

        if !text.contains('.') && self.peek().is_some_and(is_word_char) {
            text.push_str(&self.take_while(is_word_char));
            return Ok(Token::Identifier(text));
        }

        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| TokenizeError::new(format!("Invalid number '{}'", text), start))
    }

    fn read_identifier(&mut self) -> Token {
        Token::Identifier(self.take_while(is_word_char))
    }
}

/// Tokenize a formula string
pub fn tokenize(formula: &str) -> Result<Vec<Token>, TokenizeError> {
    Tokenizer::new(formula).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(s: &str) -> Token {
        Token::Operator(s.to_string())
    }

    fn ident(s: &str) -> Token {
        Token::Identifier(s.to_string())
    }

    #[test]
    fn test_tokenize_method_call() {
        let tokens = tokenize("NAV_unit.shift(1)").unwrap();
        assert_eq!(
            tokens,
            vec![
                ident("NAV_unit"),
                Token::Dot,
                ident("shift"),
                Token::OpenParen,
                Token::Number(1.0),
                Token::CloseParen,
            ]
        );
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(tokenize("3.25").unwrap(), vec![Token::Number(3.25)]);
        assert_eq!(tokenize(".5").unwrap(), vec![Token::Number(0.5)]);
        assert_eq!(tokenize("1.5e3").unwrap(), vec![Token::Number(1500.0)]);
        assert_eq!(tokenize("2E-2").unwrap(), vec![Token::Number(0.02)]);
    }

    #[test]
    fn test_tokenize_digit_leading_names() {
        assert_eq!(tokenize("2023_sales").unwrap(), vec![ident("2023_sales")]);
        assert_eq!(
            tokenize("`2023`").unwrap(),
            vec![Token::QuotedIdentifier("2023".to_string())]
        );
        assert_eq!(
            tokenize("`true`").unwrap(),
            vec![Token::QuotedIdentifier("true".to_string())]
        );
    }

    #[test]
    fn test_tokenize_operators() {
        let tokens = tokenize("a ** 2 == b != c <> d <= e >= f = g % h").unwrap();
        let ops: Vec<Token> = tokens
            .into_iter()
            .filter(|t| matches!(t, Token::Operator(_)))
            .collect();
        assert_eq!(
            ops,
            vec![op("**"), op("=="), op("!="), op("!="), op("<="), op(">="), op("=="), op("%")]
        );
    }

    #[test]
    fn test_tokenize_strings() {
        assert_eq!(
            tokenize(r#"region + "it""s""#).unwrap(),
            vec![ident("region"), op("+"), Token::Text("it\"s".to_string())]
        );
        assert_eq!(tokenize("'x'").unwrap(), vec![Token::Text("x".to_string())]);
    }

    #[test]
    fn test_leading_equals_is_ignored() {
        assert_eq!(tokenize("=a").unwrap(), vec![ident("a")]);
    }

    #[test]
    fn test_tokenize_errors() {
        let err = tokenize("a $ b").unwrap_err();
        assert_eq!(err.position, 2);
        assert!(tokenize("\"open").is_err());
        assert!(tokenize("`open").is_err());
        assert!(tokenize("a ! b").is_err());
    }
}
