use crate::diagnostic::Span;
use chumsky::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Var,
    Print,
    If,
    Else,
    While,
    Fun,
    Return,
    Class,

    // Literals and identifiers. Numbers keep their literal digit text;
    // conversion to a runtime value happens at evaluation time.
    Ident(String),
    Number(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Bang,
    NotEq,
    Eq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Assign,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semicolon,
    Comma,
    Dot,

    Eof,
}

/// A token paired with the byte range it was lexed from.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

pub fn lexer<'a>()
-> impl Parser<'a, &'a str, Vec<(Token, SimpleSpan)>, extra::Err<Simple<'a, char>>> {
    let number = text::digits(10)
        .to_slice()
        .map(|s: &str| Token::Number(s.to_string()));

    // `self` is deliberately not a keyword: it reaches the evaluator as an
    // ordinary identifier and resolves through the receiver binding.
    let ident = text::ident().map(|s: &str| match s {
        "var" => Token::Var,
        "print" => Token::Print,
        "if" => Token::If,
        "else" => Token::Else,
        "while" => Token::While,
        "fun" => Token::Fun,
        "return" => Token::Return,
        "class" => Token::Class,
        _ => Token::Ident(s.to_string()),
    });

    let op_double = choice((
        just("==").to(Token::Eq),
        just("!=").to(Token::NotEq),
        just(">=").to(Token::GreaterEq),
        just("<=").to(Token::LessEq),
    ));

    let op_single = choice((
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
        just('!').to(Token::Bang),
        just('>').to(Token::Greater),
        just('<').to(Token::Less),
        just('=').to(Token::Assign),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('{').to(Token::LBrace),
        just('}').to(Token::RBrace),
        just(';').to(Token::Semicolon),
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
    ));

    let token = number
        .or(ident)
        .or(op_double)
        .or(op_single)
        .map_with(|tok, e| Some((tok, e.span())))
        .padded();

    // Any byte that starts no token is consumed and dropped, the same way
    // whitespace is. Lexing is total.
    let skipped = any().to(None).padded();

    token
        .or(skipped)
        .repeated()
        .collect::<Vec<_>>()
        .map(|tokens| tokens.into_iter().flatten().collect())
        .then_ignore(end())
}

/// Tokenizes `source` in full. Never fails: unrecognized bytes are skipped,
/// and the stream always ends with an explicit [`Token::Eof`].
pub fn tokenize(source: &str) -> Vec<SpannedToken> {
    let mut tokens: Vec<SpannedToken> = lexer()
        .parse(source)
        .into_output()
        .unwrap_or_default()
        .into_iter()
        .map(|(token, span)| SpannedToken {
            token,
            span: Span::new(span.start, span.end),
        })
        .collect();

    tokens.push(SpannedToken {
        token: Token::Eof,
        span: Span::new(source.len(), source.len()),
    });

    tokens
}
