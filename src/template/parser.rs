use std::sync::Arc;

use rand_regex::Regex as RandRegex;

use crate::error::TemplateError;

use super::funcs::Func;
use super::{Expr, Node};

const ACTION_OPEN: &str = "{{";
const ACTION_CLOSE: &str = "}}";
/// Upper bound for unbounded repetitions (`*`, `+`) in `random_regex`.
const REGEX_MAX_REPEAT: u32 = 16;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Str(String),
    Int(i64),
    Field(String),
    Ident(String),
}

pub(super) fn parse(source: &str) -> Result<Vec<Node>, TemplateError> {
    let mut nodes = Vec::new();
    let mut rest = source;
    let mut offset = 0usize;

    loop {
        let Some(start) = rest.find(ACTION_OPEN) else {
            if !rest.is_empty() {
                nodes.push(Node::Text(rest.to_owned()));
            }
            break;
        };
        let (text, after_text) = rest.split_at(start);
        if !text.is_empty() {
            nodes.push(Node::Text(text.to_owned()));
        }

        let action_offset = offset.saturating_add(start);
        let body = after_text.strip_prefix(ACTION_OPEN).unwrap_or_default();
        let mut lexer = Lexer::new(body, action_offset);
        let tokens = lexer.tokenize_action()?;
        nodes.push(Node::Action(parse_action(tokens, action_offset)?));

        let advance = start
            .saturating_add(ACTION_OPEN.len())
            .saturating_add(lexer.pos);
        rest = rest.get(advance..).unwrap_or_default();
        offset = offset.saturating_add(advance);
    }

    Ok(nodes)
}

struct Lexer<'src> {
    input: &'src str,
    pos: usize,
    action_offset: usize,
}

impl<'src> Lexer<'src> {
    const fn new(input: &'src str, action_offset: usize) -> Self {
        Self {
            input,
            pos: 0,
            action_offset,
        }
    }

    fn rest(&self) -> &'src str {
        self.input.get(self.pos..).unwrap_or_default()
    }

    fn offset(&self) -> usize {
        self.action_offset
            .saturating_add(ACTION_OPEN.len())
            .saturating_add(self.pos)
    }

    fn bump(&mut self, ch: char) {
        self.pos = self.pos.saturating_add(ch.len_utf8());
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> &'src str {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(_, ch)| !keep(*ch))
            .map_or(rest.len(), |(idx, _)| idx);
        self.pos = self.pos.saturating_add(len);
        rest.get(..len).unwrap_or_default()
    }

    /// Tokenizes up to and including the closing `}}`.
    fn tokenize_action(&mut self) -> Result<Vec<(Token, usize)>, TemplateError> {
        let mut tokens = Vec::new();
        loop {
            self.take_while(char::is_whitespace);
            let rest = self.rest();
            if rest.starts_with(ACTION_CLOSE) {
                self.pos = self.pos.saturating_add(ACTION_CLOSE.len());
                return Ok(tokens);
            }
            let Some(ch) = rest.chars().next() else {
                return Err(TemplateError::UnclosedAction {
                    offset: self.action_offset,
                });
            };
            let offset = self.offset();
            let token = match ch {
                '(' => {
                    self.bump(ch);
                    Token::LParen
                }
                ')' => {
                    self.bump(ch);
                    Token::RParen
                }
                '"' => Token::Str(self.string_literal()?),
                '.' => {
                    self.bump(ch);
                    Token::Field(self.take_while(is_ident_char).to_owned())
                }
                '-' | '0'..='9' => self.int_literal(offset)?,
                c if c.is_alphabetic() || c == '_' => {
                    Token::Ident(self.take_while(is_ident_char).to_owned())
                }
                other => {
                    return Err(TemplateError::UnexpectedToken {
                        token: other.to_string(),
                        offset,
                    });
                }
            };
            tokens.push((token, offset));
        }
    }

    fn string_literal(&mut self) -> Result<String, TemplateError> {
        let start = self.offset();
        self.bump('"');
        let mut value = String::new();
        loop {
            let Some(ch) = self.rest().chars().next() else {
                return Err(TemplateError::UnterminatedString { offset: start });
            };
            self.bump(ch);
            match ch {
                '"' => return Ok(value),
                '\\' => {
                    let escape_offset = self.offset();
                    let Some(escaped) = self.rest().chars().next() else {
                        return Err(TemplateError::UnterminatedString { offset: start });
                    };
                    self.bump(escaped);
                    value.push(match escaped {
                        '"' => '"',
                        '\\' => '\\',
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => {
                            return Err(TemplateError::UnknownEscape {
                                escape: other,
                                offset: escape_offset,
                            });
                        }
                    });
                }
                other => value.push(other),
            }
        }
    }

    fn int_literal(&mut self, offset: usize) -> Result<Token, TemplateError> {
        let negative = self.rest().starts_with('-');
        if negative {
            self.bump('-');
        }
        let digits = self.take_while(|ch| ch.is_ascii_digit());
        let literal = if negative {
            format!("-{}", digits)
        } else {
            digits.to_owned()
        };
        literal
            .parse::<i64>()
            .map(Token::Int)
            .map_err(|_parse_err| TemplateError::UnexpectedToken {
                token: literal,
                offset,
            })
    }
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

struct TokenStream {
    tokens: Vec<(Token, usize)>,
    index: usize,
}

impl TokenStream {
    fn peek(&self) -> Option<&(Token, usize)> {
        self.tokens.get(self.index)
    }

    fn next(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index = self.index.saturating_add(1);
        }
        token
    }
}

fn parse_action(tokens: Vec<(Token, usize)>, action_offset: usize) -> Result<Expr, TemplateError> {
    if tokens.is_empty() {
        return Err(TemplateError::EmptyAction {
            offset: action_offset,
        });
    }
    let mut stream = TokenStream { tokens, index: 0 };
    let expr = parse_command(&mut stream, action_offset)?;
    match stream.next() {
        None => Ok(expr),
        Some((Token::RParen, offset)) => Err(TemplateError::UnbalancedParens { offset }),
        Some((token, offset)) => Err(unexpected(&token, offset)),
    }
}

/// A function call with its arguments, or a single operand.
fn parse_command(stream: &mut TokenStream, offset: usize) -> Result<Expr, TemplateError> {
    match stream.peek() {
        Some((Token::Ident(_), _)) => {
            let Some((Token::Ident(name), _)) = stream.next() else {
                return Err(TemplateError::EmptyAction { offset });
            };
            let mut args = Vec::new();
            while let Some((token, _)) = stream.peek() {
                if *token == Token::RParen {
                    break;
                }
                args.push(parse_operand(stream, offset)?);
            }
            build_call(&name, args)
        }
        Some(_) => parse_operand(stream, offset),
        None => Err(TemplateError::EmptyAction { offset }),
    }
}

fn parse_operand(stream: &mut TokenStream, offset: usize) -> Result<Expr, TemplateError> {
    let Some((token, token_offset)) = stream.next() else {
        return Err(TemplateError::EmptyAction { offset });
    };
    match token {
        Token::Str(value) => Ok(Expr::Str(value)),
        Token::Int(value) => Ok(Expr::Int(value)),
        Token::Field(name) => Ok(Expr::Field(name)),
        Token::Ident(name) => build_call(&name, Vec::new()),
        Token::LParen => {
            let inner = parse_command(stream, token_offset)?;
            match stream.next() {
                Some((Token::RParen, _)) => Ok(inner),
                Some((other, other_offset)) => Err(unexpected(&other, other_offset)),
                None => Err(TemplateError::UnbalancedParens {
                    offset: token_offset,
                }),
            }
        }
        Token::RParen => Err(TemplateError::UnbalancedParens {
            offset: token_offset,
        }),
    }
}

fn build_call(name: &str, args: Vec<Expr>) -> Result<Expr, TemplateError> {
    let func = Func::lookup(name).ok_or_else(|| TemplateError::UnknownFunction {
        name: name.to_owned(),
    })?;
    let arity = func.arity();
    if !arity.accepts(args.len()) {
        return Err(TemplateError::WrongArity {
            name: func.name(),
            expected: arity.to_string(),
            actual: args.len(),
        });
    }

    if func == Func::RandomRegex {
        let Some(Expr::Str(pattern)) = args.first() else {
            return Err(TemplateError::PatternNotLiteral { name: func.name() });
        };
        let regex = RandRegex::compile(pattern, REGEX_MAX_REPEAT).map_err(|err| {
            TemplateError::InvalidRegex {
                pattern: pattern.clone(),
                source: err,
            }
        })?;
        return Ok(Expr::Regex(Arc::new(regex)));
    }

    Ok(Expr::Call { func, args })
}

fn unexpected(token: &Token, offset: usize) -> TemplateError {
    let token = match token {
        Token::LParen => "(".to_owned(),
        Token::RParen => ")".to_owned(),
        Token::Str(value) => format!("{:?}", value),
        Token::Int(value) => value.to_string(),
        Token::Field(name) => format!(".{}", name),
        Token::Ident(name) => name.clone(),
    };
    TemplateError::UnexpectedToken { token, offset }
}
