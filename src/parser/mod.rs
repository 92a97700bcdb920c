use crate::ast::*;
use crate::error::{Error, Result};
use crate::lexer::{lex, Keyword, Token, TokenKind};

pub fn parse_source(input: &str) -> Result<Script> {
    let tokens = lex(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_script()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn parse_script(&mut self) -> Result<Script> {
        let mut items = Vec::new();
        self.consume_newlines();
        while !self.is_eof() {
            if self.check_keyword(Keyword::Fn) {
                items.push(Item::Fn(self.parse_fn()?));
            } else {
                items.push(Item::Stmt(self.parse_stmt()?));
            }
            self.expect_stmt_end()?;
            self.consume_newlines();
        }
        Ok(Script { items })
    }

    fn parse_fn(&mut self) -> Result<FnDecl> {
        let line = self.peek().map(|t| t.line).unwrap_or(0);
        self.expect_keyword(Keyword::Fn)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let pname = self.expect_ident()?;
                let ty = if self.check(TokenKind::Colon) {
                    self.advance();
                    Some(self.expect_ident()?)
                } else {
                    None
                };
                params.push(Param { name: pname, ty });
                if self.check(TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        let return_type = if self.check(TokenKind::Arrow) {
            self.advance();
            Some(self.expect_ident()?)
        } else {
            None
        };
        self.expect(TokenKind::Colon)?;
        self.consume_newlines();
        let (mut body, _) = self.parse_block(&[Keyword::End])?;

        // A leading string-literal statement is the docstring, not body.
        let docstring = if matches!(body.first(), Some(Stmt::Expr(Expr::String(_)))) {
            match body.remove(0) {
                Stmt::Expr(Expr::String(s)) => Some(s),
                _ => unreachable!(),
            }
        } else {
            None
        };

        Ok(FnDecl {
            name,
            params,
            return_type,
            docstring,
            body,
            line,
        })
    }

    /// Parse newline-separated statements until one of `terminators`,
    /// consuming the terminator. Returns which terminator was hit.
    fn parse_block(&mut self, terminators: &[Keyword]) -> Result<(Vec<Stmt>, Keyword)> {
        let mut stmts = Vec::new();
        loop {
            self.consume_newlines();
            for kw in terminators {
                if self.check_keyword(*kw) {
                    self.advance();
                    return Ok((stmts, *kw));
                }
            }
            if self.is_eof() {
                return Err(self.err_here(format!(
                    "Unexpected end of input, expected {:?}",
                    terminators
                )));
            }
            stmts.push(self.parse_stmt()?);
            self.expect_stmt_end()?;
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        if self.check_keyword(Keyword::Return) {
            self.advance();
            if self.at_stmt_end() {
                return Ok(Stmt::Return(None));
            }
            let value = self.parse_expr()?;
            return Ok(Stmt::Return(Some(value)));
        }
        if self.check_keyword(Keyword::Raise) {
            self.advance();
            let value = self.parse_expr()?;
            return Ok(Stmt::Raise(value));
        }
        if self.check_keyword(Keyword::Pass) {
            self.advance();
            return Ok(Stmt::Pass);
        }
        if self.check(TokenKind::Ellipsis) {
            self.advance();
            return Ok(Stmt::Placeholder);
        }
        if self.check_keyword(Keyword::Break) {
            self.advance();
            return Ok(Stmt::Break);
        }
        if self.check_keyword(Keyword::Continue) {
            self.advance();
            return Ok(Stmt::Continue);
        }
        if self.check_keyword(Keyword::If) {
            return self.parse_if();
        }
        if self.check_keyword(Keyword::While) {
            self.advance();
            let cond = self.parse_expr()?;
            self.expect(TokenKind::Colon)?;
            let (body, _) = self.parse_block(&[Keyword::End])?;
            return Ok(Stmt::While { cond, body });
        }
        if self.check_keyword(Keyword::For) {
            self.advance();
            let var = self.expect_ident()?;
            self.expect_keyword(Keyword::In)?;
            let iter = self.parse_expr()?;
            self.expect(TokenKind::Colon)?;
            let (body, _) = self.parse_block(&[Keyword::End])?;
            return Ok(Stmt::For { var, iter, body });
        }
        if self.check_keyword(Keyword::Fn) {
            return Err(self.err_here("Function definitions are only allowed at top level"));
        }

        if let Some(TokenKind::Identifier(name)) = self.peek_kind().cloned() {
            if self.check_n(1, TokenKind::Eq) {
                self.advance();
                self.advance();
                let value = self.parse_expr()?;
                return Ok(Stmt::Assign { target: name, op: AssignOp::Set, value });
            }
            if self.check_n(1, TokenKind::PlusEq) {
                self.advance();
                self.advance();
                let value = self.parse_expr()?;
                return Ok(Stmt::Assign { target: name, op: AssignOp::Add, value });
            }
        }

        let expr = self.parse_expr()?;
        Ok(Stmt::Expr(expr))
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        self.expect_keyword(Keyword::If)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Colon)?;
        let (then_body, terminator) = self.parse_block(&[Keyword::Else, Keyword::End])?;
        let else_body = if terminator == Keyword::Else {
            self.expect(TokenKind::Colon)?;
            let (body, _) = self.parse_block(&[Keyword::End])?;
            body
        } else {
            Vec::new()
        };
        Ok(Stmt::If { cond, then_body, else_body })
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_and_expr()?;
        while self.check_keyword(Keyword::Or) {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: BinaryOp::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_not_expr()?;
        while self.check_keyword(Keyword::And) {
            self.advance();
            let right = self.parse_not_expr()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: BinaryOp::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr> {
        if self.check_keyword(Keyword::Not) {
            self.advance();
            let expr = self.parse_not_expr()?;
            return Ok(Expr::Unary { op: UnaryOp::Not, expr: Box::new(expr) });
        }
        self.parse_comparison_expr()
    }

    fn parse_comparison_expr(&mut self) -> Result<Expr> {
        let left = self.parse_additive_expr()?;
        let op = match self.peek_kind() {
            Some(TokenKind::EqEq) => BinaryOp::Eq,
            Some(TokenKind::Neq) => BinaryOp::Neq,
            Some(TokenKind::Lt) => BinaryOp::Lt,
            Some(TokenKind::Lte) => BinaryOp::Lte,
            Some(TokenKind::Gt) => BinaryOp::Gt,
            Some(TokenKind::Gte) => BinaryOp::Gte,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive_expr()?;
        Ok(Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn parse_additive_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative_expr()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                Some(TokenKind::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary_expr()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr> {
        if self.check(TokenKind::Minus) {
            self.advance();
            let expr = self.parse_unary_expr()?;
            return Ok(Expr::Unary { op: UnaryOp::Neg, expr: Box::new(expr) });
        }
        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        while self.check(TokenKind::LBracket) {
            self.advance();
            let index = self.parse_expr()?;
            self.expect(TokenKind::RBracket)?;
            expr = Expr::Index {
                target: Box::new(expr),
                index: Box::new(index),
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.peek_kind().cloned() {
            Some(TokenKind::Number(n)) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            Some(TokenKind::String(s)) => {
                self.advance();
                Ok(Expr::String(s))
            }
            Some(TokenKind::Keyword(Keyword::True)) => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            Some(TokenKind::Keyword(Keyword::False)) => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            Some(TokenKind::Keyword(Keyword::Null)) => {
                self.advance();
                Ok(Expr::Null)
            }
            Some(TokenKind::Identifier(name)) => {
                self.advance();
                if self.check(TokenKind::LParen) {
                    let args = self.parse_arg_list()?;
                    Ok(Expr::Call(Call { name, args }))
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            Some(TokenKind::LBracket) => {
                self.advance();
                let mut items = Vec::new();
                self.consume_newlines();
                if !self.check(TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        self.consume_newlines();
                        if self.check(TokenKind::Comma) {
                            self.advance();
                            self.consume_newlines();
                            continue;
                        }
                        break;
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::List(items))
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            _ => Err(self.err_here(format!(
                "Unexpected token in expression: {:?}",
                self.peek_kind()
            ))),
        }
    }

    fn parse_arg_list(&mut self) -> Result<Vec<Expr>> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        self.consume_newlines();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                self.consume_newlines();
                if self.check(TokenKind::Comma) {
                    self.advance();
                    self.consume_newlines();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek_kind().cloned() {
            Some(TokenKind::Identifier(name)) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.err_here(format!("Expected identifier, found {:?}", other))),
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<()> {
        match self.peek_kind() {
            Some(TokenKind::Keyword(k)) if *k == kw => {
                self.advance();
                Ok(())
            }
            other => Err(self.err_here(format!("Expected keyword {:?}, found {:?}", kw, other))),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        if self.check(kind.clone()) {
            self.advance();
            Ok(())
        } else {
            Err(self.err_here(format!(
                "Expected {:?}, found {:?}",
                kind,
                self.peek_kind()
            )))
        }
    }

    /// Statements end at a newline, `end`/`else`, or end of input.
    fn at_stmt_end(&self) -> bool {
        self.check(TokenKind::Newline)
            || self.check_keyword(Keyword::End)
            || self.check_keyword(Keyword::Else)
            || self.is_eof()
    }

    fn expect_stmt_end(&mut self) -> Result<()> {
        if self.at_stmt_end() {
            while self.check(TokenKind::Newline) {
                self.advance();
            }
            return Ok(());
        }
        Err(self.err_here(format!(
            "Expected end of statement, found {:?}",
            self.peek_kind()
        )))
    }

    fn check(&self, kind: TokenKind) -> bool {
        matches!(self.peek_kind(), Some(k) if *k == kind)
    }

    fn check_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Keyword(k)) if *k == kw)
    }

    fn check_n(&self, n: usize, kind: TokenKind) -> bool {
        self.tokens.get(self.pos + n).map(|t| t.kind.clone()) == Some(kind)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn consume_newlines(&mut self) {
        while self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Eof))
    }

    fn err_here(&self, message: impl Into<String>) -> Error {
        let (line, col) = self
            .peek()
            .map(|t| (t.line, t.col))
            .unwrap_or((0, 0));
        Error::parse(line, col, message)
    }
}
