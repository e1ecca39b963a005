use crate::ast::{BinaryOp, Expr, ExprKind, FunctionDecl, Stmt, UnaryOp};
use crate::diagnostic::{Diagnostic, Label, Span};
use crate::lexer::{SpannedToken, Token};
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    pub expected: Vec<String>,
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            expected: Vec::new(),
            found: None,
        }
    }

    pub fn with_expected(mut self, expected: Vec<String>) -> Self {
        self.expected = expected;
        self
    }

    pub fn with_found(mut self, found: impl Into<String>) -> Self {
        self.found = Some(found.into());
        self
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut msg = self.message.clone();
        if !self.expected.is_empty() {
            msg = format!("expected {}", self.expected.join(" or "));
            if let Some(found) = &self.found {
                msg.push_str(&format!(", found {}", found));
            }
        }

        let mut diag = Diagnostic::error(msg)
            .with_code("E0101")
            .with_label(Label::primary(self.span, ""));

        if self.expected.len() == 1 {
            diag = diag.with_help(format!("expected {} here", self.expected[0]));
        }

        diag
    }
}

/// What a parse produced: every statement that could be recovered, plus
/// every condition hit along the way. A malformed statement never suppresses
/// the rest of the program.
#[derive(Debug)]
pub struct ParseResult {
    pub statements: Vec<Stmt>,
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

const MAX_ERRORS: usize = 100;

/// Recursive-descent parser over the spanned token stream. One token of
/// lookahead, no backtracking.
pub struct TokenParser {
    tokens: Vec<SpannedToken>,
    current: usize,
    errors: Vec<ParseError>,
}

impl TokenParser {
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            tokens,
            current: 0,
            errors: Vec::new(),
        }
    }

    fn current_token(&self) -> &Token {
        self.tokens
            .get(self.current)
            .map(|st| &st.token)
            .unwrap_or(&Token::Eof)
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.current)
            .or_else(|| self.tokens.last())
            .map(|st| st.span)
            .unwrap_or_default()
    }

    fn at_end(&self) -> bool {
        matches!(self.current_token(), Token::Eof)
    }

    fn advance(&mut self) -> SpannedToken {
        let st = self
            .tokens
            .get(self.current)
            .cloned()
            .unwrap_or(SpannedToken {
                token: Token::Eof,
                span: self.current_span(),
            });
        if self.current < self.tokens.len() {
            self.current += 1;
        }
        st
    }

    fn check(&self, expected: &Token) -> bool {
        std::mem::discriminant(self.current_token()) == std::mem::discriminant(expected)
    }

    fn match_token(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes the expected token or reports its absence. The offending
    /// token is left in place for the caller's recovery.
    fn expect(&mut self, expected: Token) -> Result<Span, ParseError> {
        if self.check(&expected) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(ParseError::new("unexpected token", self.current_span())
                .with_expected(vec![format!("{:?}", expected)])
                .with_found(format!("{:?}", self.current_token())))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<(Rc<str>, Span), ParseError> {
        match self.current_token() {
            Token::Ident(name) => {
                let name: Rc<str> = Rc::from(name.as_str());
                let span = self.current_span();
                self.advance();
                Ok((name, span))
            }
            other => Err(ParseError::new(format!("expected {}", what), self.current_span())
                .with_expected(vec![what.to_string()])
                .with_found(format!("{:?}", other))),
        }
    }

    fn add_error(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    /// Skips to a plausible statement boundary after an error: past the next
    /// semicolon or closing brace, or up to the next statement keyword.
    fn synchronize(&mut self) {
        while !self.at_end() {
            match self.current_token() {
                Token::Semicolon | Token::RBrace => {
                    self.advance();
                    return;
                }
                Token::Var
                | Token::Print
                | Token::If
                | Token::While
                | Token::Fun
                | Token::Return
                | Token::Class
                | Token::LBrace => {
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    pub fn parse(&mut self) -> ParseResult {
        let mut statements = Vec::new();
        while !self.at_end() {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.add_error(err);
                    self.synchronize();
                    if self.errors.len() >= MAX_ERRORS {
                        break;
                    }
                }
            }
        }
        ParseResult {
            statements,
            errors: std::mem::take(&mut self.errors),
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.current_token() {
            Token::Fun => {
                self.advance();
                Ok(Stmt::Function(self.parse_function_declaration()?))
            }
            Token::Return => self.parse_return_statement(),
            Token::Class => self.parse_class_declaration(),
            Token::LBrace => {
                self.advance();
                Ok(Stmt::Block(self.parse_block_body()?))
            }
            Token::Print => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::Semicolon)?;
                Ok(Stmt::Print(expr))
            }
            Token::If => self.parse_if_statement(),
            Token::While => self.parse_while_statement(),
            Token::Var => {
                // `var` carries no declaration semantics of its own: the
                // first assignment to an unbound name creates the binding.
                self.advance();
                self.parse_expression_statement()
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.parse_expression()?;
        self.expect(Token::Semicolon)?;
        Ok(Stmt::Expr(expr))
    }

    /// Parses a function header and body; the `fun` keyword (mandatory for
    /// free functions, optional before methods) is the caller's business.
    fn parse_function_declaration(&mut self) -> Result<FunctionDecl, ParseError> {
        let (name, _) = self.expect_identifier("function name")?;
        self.expect(Token::LParen)?;

        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let (param, _) = self.expect_identifier("parameter name")?;
                params.push(param);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;

        self.expect(Token::LBrace)?;
        let body = self.parse_block_body()?;
        Ok(FunctionDecl { name, params, body })
    }

    fn parse_return_statement(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        let value = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(Token::Semicolon)?;
        Ok(Stmt::Return(value))
    }

    fn parse_class_declaration(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        let (name, _) = self.expect_identifier("class name")?;
        self.expect(Token::LBrace)?;

        let mut methods = Vec::new();
        while !self.check(&Token::RBrace) && !self.at_end() {
            self.match_token(&Token::Fun);
            methods.push(self.parse_function_declaration()?);
        }
        self.expect(Token::RBrace)?;
        Ok(Stmt::Class { name, methods })
    }

    /// Parses statements up to the closing brace. The opening brace has
    /// already been consumed.
    fn parse_block_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        while !self.check(&Token::RBrace) && !self.at_end() {
            statements.push(self.parse_statement()?);
        }
        self.expect(Token::RBrace)?;
        Ok(statements)
    }

    fn parse_if_statement(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect(Token::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(Token::RParen)?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.match_token(&Token::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_while_statement(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect(Token::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(Token::RParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::While { condition, body })
    }

    // Expression grammar, lowest to highest precedence:
    //
    //   expression -> assignment
    //   assignment -> equality ( "=" assignment )?
    //   equality   -> comparison (("!=" | "==") comparison)*
    //   comparison -> term ((">" | ">=" | "<" | "<=") term)*
    //   term       -> factor (("+" | "-") factor)*
    //   factor     -> unary (("*" | "/") unary)*
    //   unary      -> ("!" | "-") unary | call
    //   call       -> primary ("(" arguments? ")")*
    //   primary    -> NUMBER | IDENTIFIER ("." IDENTIFIER)* | "(" expression ")"

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_equality()?;

        if self.match_token(&Token::Assign) {
            let value = self.parse_assignment()?;
            match expr.kind {
                ExprKind::Identifier(_) | ExprKind::Get { .. } => {
                    let span = expr.span.merge(value.span);
                    return Ok(Expr {
                        kind: ExprKind::Assign {
                            target: Box::new(expr),
                            value: Box::new(value),
                        },
                        span,
                    });
                }
                _ => {
                    // Reported, then parsing continues with the unmodified
                    // left expression; the statement is not abandoned.
                    self.add_error(ParseError::new("invalid assignment target", expr.span));
                    return Ok(expr);
                }
            }
        }

        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_comparison()?;
        loop {
            let op = match self.current_token() {
                Token::Eq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_term()?;
        loop {
            let op = match self.current_token() {
                Token::Greater => BinaryOp::Greater,
                Token::GreaterEq => BinaryOp::GreaterEq,
                Token::Less => BinaryOp::Less,
                Token::LessEq => BinaryOp::LessEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_factor()?;
        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.current_token() {
            Token::Bang => Some(UnaryOp::Not),
            Token::Minus => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            let op_span = self.current_span();
            self.advance();
            let operand = self.parse_unary()?;
            let span = op_span.merge(operand.span);
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            });
        }
        self.parse_call()
    }

    fn parse_call(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        while self.match_token(&Token::LParen) {
            expr = self.finish_call(expr)?;
        }
        Ok(expr)
    }

    /// Parses the argument list; the opening paren has been consumed.
    fn finish_call(&mut self, callee: Expr) -> Result<Expr, ParseError> {
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        let close = self.expect(Token::RParen)?;
        let span = callee.span.merge(close);
        Ok(Expr {
            kind: ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            span,
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.current_token().clone() {
            Token::Number(text) => {
                let span = self.current_span();
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Literal(Rc::from(text.as_str())),
                    span,
                })
            }
            Token::Ident(name) => {
                let span = self.current_span();
                self.advance();
                let mut expr = Expr {
                    kind: ExprKind::Identifier(Rc::from(name.as_str())),
                    span,
                };
                // Attribute chains: a.b.c nests left-associatively.
                while self.match_token(&Token::Dot) {
                    let (attr, attr_span) = self.expect_identifier("attribute name")?;
                    let span = expr.span.merge(attr_span);
                    expr = Expr {
                        kind: ExprKind::Get {
                            object: Box::new(expr),
                            name: attr,
                        },
                        span,
                    };
                }
                Ok(expr)
            }
            Token::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Token::Eof => Err(ParseError::new(
                "unexpected end of input",
                self.current_span(),
            )
            .with_expected(vec!["expression".to_string()])),
            other => Err(ParseError::new("expected expression", self.current_span())
                .with_expected(vec!["expression".to_string()])
                .with_found(format!("{:?}", other))),
        }
    }
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    let span = left.span.merge(right.span);
    Expr {
        kind: ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    }
}

/// Convenience for tokenize-then-parse.
pub fn parse_source(source: &str) -> ParseResult {
    let tokens = crate::lexer::tokenize(source);
    TokenParser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Vec<Stmt> {
        let result = parse_source(source);
        assert!(
            result.errors.is_empty(),
            "unexpected parse errors: {:?}",
            result.errors
        );
        result.statements
    }

    #[test]
    fn test_expression_statement() {
        let stmts = parse_ok("1 + 2;");
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::Expr(_)));
    }

    #[test]
    fn test_precedence_nests_factor_under_term() {
        let stmts = parse_ok("print 1 + 2 * 3;");
        let Stmt::Print(expr) = &stmts[0] else {
            panic!("expected print statement");
        };
        let ExprKind::Binary { op, right, .. } = &expr.kind else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            right.kind,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_equality_binds_looser_than_comparison() {
        let stmts = parse_ok("1 < 2 == 3 < 4;");
        let Stmt::Expr(expr) = &stmts[0] else {
            panic!("expected expression statement");
        };
        assert!(matches!(
            expr.kind,
            ExprKind::Binary {
                op: BinaryOp::Eq,
                ..
            }
        ));
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let stmts = parse_ok("a = b = 1;");
        let Stmt::Expr(expr) = &stmts[0] else {
            panic!("expected expression statement");
        };
        let ExprKind::Assign { value, .. } = &expr.kind else {
            panic!("expected assignment");
        };
        assert!(matches!(value.kind, ExprKind::Assign { .. }));
    }

    #[test]
    fn test_attribute_chain_nests_left() {
        let stmts = parse_ok("a.b.c;");
        let Stmt::Expr(expr) = &stmts[0] else {
            panic!("expected expression statement");
        };
        let ExprKind::Get { object, name } = &expr.kind else {
            panic!("expected attribute access");
        };
        assert_eq!(name.as_ref(), "c");
        assert!(matches!(object.kind, ExprKind::Get { .. }));
    }

    #[test]
    fn test_invalid_assignment_target_reports_and_continues() {
        let result = parse_source("1 = 2; print 3;");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("invalid assignment target"));
        // The statement survives as the unmodified left expression.
        assert_eq!(result.statements.len(), 2);
        assert!(matches!(
            result.statements[0],
            Stmt::Expr(Expr {
                kind: ExprKind::Literal(_),
                ..
            })
        ));
    }

    #[test]
    fn test_var_prefix_parses_as_assignment() {
        let stmts = parse_ok("var x = 1;");
        let Stmt::Expr(expr) = &stmts[0] else {
            panic!("expected expression statement");
        };
        assert!(matches!(expr.kind, ExprKind::Assign { .. }));
    }

    #[test]
    fn test_function_declaration() {
        let stmts = parse_ok("fun add(a, b) { return a + b; }");
        let Stmt::Function(decl) = &stmts[0] else {
            panic!("expected function declaration");
        };
        assert_eq!(decl.name.as_ref(), "add");
        assert_eq!(decl.params.len(), 2);
        assert!(matches!(decl.body[0], Stmt::Return(Some(_))));
    }

    #[test]
    fn test_class_with_and_without_fun_prefix() {
        let stmts = parse_ok("class C { fun a() { } b() { } }");
        let Stmt::Class { name, methods } = &stmts[0] else {
            panic!("expected class declaration");
        };
        assert_eq!(name.as_ref(), "C");
        let names: Vec<&str> = methods.iter().map(|m| m.name.as_ref()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_if_with_else_takes_statements_not_blocks() {
        let stmts = parse_ok("if (1) print 1; else print 2;");
        let Stmt::If {
            then_branch,
            else_branch,
            ..
        } = &stmts[0]
        else {
            panic!("expected if statement");
        };
        assert!(matches!(**then_branch, Stmt::Print(_)));
        assert!(matches!(else_branch.as_deref(), Some(Stmt::Print(_))));
    }

    #[test]
    fn test_missing_paren_is_reported_and_parse_continues() {
        let result = parse_source("if 1) print 1; print 2;");
        assert!(!result.errors.is_empty());
        // The trailing statement is still recovered.
        assert!(result
            .statements
            .iter()
            .any(|s| matches!(s, Stmt::Print(_))));
    }

    #[test]
    fn test_missing_semicolon_reported() {
        let result = parse_source("print 1\nprint 2;");
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn test_call_chains() {
        let stmts = parse_ok("f(1)(2);");
        let Stmt::Expr(expr) = &stmts[0] else {
            panic!("expected expression statement");
        };
        let ExprKind::Call { callee, .. } = &expr.kind else {
            panic!("expected call");
        };
        assert!(matches!(callee.kind, ExprKind::Call { .. }));
    }

    #[test]
    fn test_method_call_on_attribute() {
        let stmts = parse_ok("c.get();");
        let Stmt::Expr(expr) = &stmts[0] else {
            panic!("expected expression statement");
        };
        let ExprKind::Call { callee, args } = &expr.kind else {
            panic!("expected call");
        };
        assert!(args.is_empty());
        assert!(matches!(callee.kind, ExprKind::Get { .. }));
    }

    #[test]
    fn test_return_without_value() {
        let stmts = parse_ok("fun f() { return; }");
        let Stmt::Function(decl) = &stmts[0] else {
            panic!("expected function declaration");
        };
        assert!(matches!(decl.body[0], Stmt::Return(None)));
    }

    #[test]
    fn test_unary_nests() {
        let stmts = parse_ok("print --1;");
        let Stmt::Print(expr) = &stmts[0] else {
            panic!("expected print statement");
        };
        let ExprKind::Unary { op, operand } = &expr.kind else {
            panic!("expected unary expression");
        };
        assert_eq!(*op, UnaryOp::Neg);
        assert!(matches!(operand.kind, ExprKind::Unary { .. }));
    }
}
