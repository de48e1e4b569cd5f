use std::{iter::Peekable, str::Chars};

const WHITESPACE: [char; 4] = [' ', '\t', '\r', '\n'];

/// Splits `{ "key" "value" }` entity text into tokens.
pub struct Tokeniser<'a> {
    pub chars: Peekable<Chars<'a>>,
}

impl<'a> Tokeniser<'a> {
    pub fn new(str: &'a str) -> Self {
        Tokeniser { chars: str.chars().peekable() }
    }
}

#[derive(Debug, PartialEq)]
pub enum Token {
    OpeningBrace,
    ClosingBrace,
    String(String),
    Eof,
}

impl Iterator for Tokeniser<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        match self.chars.by_ref().find(|char| !WHITESPACE.contains(char))? {
            '\0' => Some(Token::Eof),
            '{' => Some(Token::OpeningBrace),
            '}' => Some(Token::ClosingBrace),
            '"' => Some(Token::String(self.chars.by_ref().take_while(|char| *char != '"').collect::<String>())),
            char => {
                let mut string = String::from(char);
                while let Some(next) = self.chars.next_if(|next| !WHITESPACE.contains(next) && !matches!(*next, '{' | '}' | '"')) {
                    string.push(next);
                }
                Some(Token::String(string))
            }
        }
    }
}
