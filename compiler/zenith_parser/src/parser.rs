//! Recursive-descent parser for the Zenith language

use crate::ast::*;
use zenith_common::{Diagnostics, Phase, Span, ZenithError, ZenithResult};
use zenith_lexer::{Token, TokenKind};

/// Parser over a token stream produced by the lexer
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    next_id: NodeId,
    diagnostics: Diagnostics,
    /// `Name { … }` is only a struct initializer where a brace cannot open a
    /// block; conditions and scrutinees clear this.
    struct_literals_allowed: bool,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
            next_id: 0,
            diagnostics: Diagnostics::new(),
            struct_literals_allowed: true,
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    /// Parse a whole compilation unit, recovering at declaration boundaries.
    pub fn parse_program(&mut self) -> Program {
        let start_span = self.peek().span;
        let mut decls = Vec::new();

        while !self.at_end() {
            match self.parse_declaration() {
                Ok(decl) => decls.push(decl),
                Err(_) => self.synchronize_top_level(),
            }
        }

        let span = if decls.is_empty() {
            start_span
        } else {
            start_span.merge(self.previous_span())
        };
        Program { decls, span }
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn parse_declaration(&mut self) -> ZenithResult<Decl> {
        if self.check(&TokenKind::KeywordStruct) {
            return self.parse_struct_decl();
        }

        let name_token = self.expect_identifier("declaration name")?;
        let name_span = name_token.span;
        let name = identifier_text(&name_token);
        self.expect(&TokenKind::Colon, "':' after declaration name")?;

        if self.check(&TokenKind::LeftParen) {
            self.parse_function_decl(name, name_span)
        } else {
            let var = self.parse_variable_tail(name, name_span)?;
            let span = name_span.merge(self.previous_span());
            Ok(Decl { kind: DeclKind::Variable(var), span, id: self.next_id() })
        }
    }

    /// The part of a variable declaration after `name:`, either an explicit
    /// type with optional initializer, or `= expr` for inference.
    fn parse_variable_tail(&mut self, name: String, name_span: Span) -> ZenithResult<VariableDecl> {
        if self.match_token(&TokenKind::Equal) {
            let initializer = self.parse_expression()?;
            return Ok(VariableDecl { name, name_span, ty: None, initializer: Some(initializer) });
        }

        let ty = self.parse_type_ref()?;
        let initializer = if self.match_token(&TokenKind::Equal) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(VariableDecl { name, name_span, ty: Some(ty), initializer })
    }

    fn parse_function_decl(&mut self, name: String, name_span: Span) -> ZenithResult<Decl> {
        self.expect(&TokenKind::LeftParen, "'(' before parameter list")?;

        let mut params = Vec::new();
        while !self.check(&TokenKind::RightParen) && !self.at_end() {
            let param_name_token = self.expect_identifier("parameter name")?;
            let param_span = param_name_token.span;
            self.expect(&TokenKind::Colon, "':' after parameter name")?;
            let ty = self.parse_type_ref()?;
            params.push(Parameter {
                name: identifier_text(&param_name_token),
                ty,
                span: param_span.merge(self.previous_span()),
            });

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightParen, "')' after parameter list")?;

        let return_type = if self.check(&TokenKind::LeftBrace) {
            None
        } else {
            Some(self.parse_type_ref()?)
        };

        let body = self.parse_block()?;
        let span = name_span.merge(self.previous_span());
        Ok(Decl {
            kind: DeclKind::Function(FunctionDecl { name, name_span, params, return_type, body }),
            span,
            id: self.next_id(),
        })
    }

    fn parse_struct_decl(&mut self) -> ZenithResult<Decl> {
        let struct_span = self.advance().span; // 'struct'
        let name_token = self.expect_identifier("struct name")?;
        let name_span = name_token.span;
        self.expect(&TokenKind::LeftBrace, "'{' after struct name")?;

        let mut fields = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.at_end() {
            let field_name_token = self.expect_identifier("field name")?;
            let field_span = field_name_token.span;
            self.expect(&TokenKind::Colon, "':' after field name")?;
            let ty = self.parse_type_ref()?;
            fields.push(FieldDecl {
                name: identifier_text(&field_name_token),
                ty,
                span: field_span.merge(self.previous_span()),
            });

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightBrace, "'}' after struct fields")?;

        let span = struct_span.merge(self.previous_span());
        Ok(Decl {
            kind: DeclKind::Struct(StructDecl {
                name: identifier_text(&name_token),
                name_span,
                fields,
            }),
            span,
            id: self.next_id(),
        })
    }

    /// `identifier [n?]? *?`
    fn parse_type_ref(&mut self) -> ZenithResult<TypeRef> {
        let name_token = self.expect_identifier("type name")?;
        let start_span = name_token.span;

        let array = if self.match_token(&TokenKind::LeftBracket) {
            if self.match_token(&TokenKind::RightBracket) {
                ArraySpec::Unsized
            } else {
                let len_token = self.advance();
                let len = match len_token.kind {
                    TokenKind::IntegerLiteral(n) if n >= 0 => n as u64,
                    _ => {
                        return Err(self.error_at(
                            len_token.span,
                            format!("expected array length, found '{}'", len_token.kind),
                        ))
                    }
                };
                self.expect(&TokenKind::RightBracket, "']' after array length")?;
                ArraySpec::Sized(len)
            }
        } else {
            ArraySpec::None
        };

        let pointer = self.match_token(&TokenKind::Star);

        Ok(TypeRef {
            name: identifier_text(&name_token),
            array,
            pointer,
            span: start_span.merge(self.previous_span()),
        })
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_block(&mut self) -> ZenithResult<Block> {
        let open = self.expect(&TokenKind::LeftBrace, "'{' to open block")?;
        let mut statements = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.at_end() {
            // Semicolons may separate statements.
            if self.match_token(&TokenKind::Semicolon) {
                continue;
            }
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(_) => self.synchronize_in_block(),
            }
        }

        let close = self.expect(&TokenKind::RightBrace, "'}' to close block")?;
        Ok(Block { statements, span: open.span.merge(close.span) })
    }

    fn parse_statement(&mut self) -> ZenithResult<Stmt> {
        match self.peek().kind {
            TokenKind::KeywordRet => self.parse_return(),
            TokenKind::KeywordIf => self.parse_if(),
            TokenKind::KeywordFor => self.parse_for(),
            TokenKind::KeywordSelect => self.parse_select(),
            _ => self.parse_simple_statement(),
        }
    }

    fn parse_return(&mut self) -> ZenithResult<Stmt> {
        let ret_span = self.advance().span; // 'ret'
        let value = if self.starts_expression() {
            Some(self.parse_expression()?)
        } else {
            None
        };
        let span = ret_span.merge(self.previous_span());
        Ok(Stmt { kind: StmtKind::Return(value), span, id: self.next_id() })
    }

    fn parse_if(&mut self) -> ZenithResult<Stmt> {
        let if_span = self.advance().span; // 'if'
        let condition = self.parse_condition()?;
        let then_block = self.parse_block()?;

        let mut elsif_clauses = Vec::new();
        let mut else_block = None;

        loop {
            if self.match_token(&TokenKind::KeywordElsif) {
                let clause_start = self.previous_span();
                let condition = self.parse_condition()?;
                let block = self.parse_block()?;
                elsif_clauses.push(ElsifClause {
                    condition,
                    block,
                    span: clause_start.merge(self.previous_span()),
                });
            } else if self.match_token(&TokenKind::KeywordElse) {
                else_block = Some(self.parse_block()?);
                break;
            } else {
                break;
            }
        }

        let span = if_span.merge(self.previous_span());
        Ok(Stmt {
            kind: StmtKind::If(IfStmt { condition, then_block, elsif_clauses, else_block }),
            span,
            id: self.next_id(),
        })
    }

    fn parse_for(&mut self) -> ZenithResult<Stmt> {
        let for_span = self.advance().span; // 'for'

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            let was_allowed = self.struct_literals_allowed;
            self.struct_literals_allowed = false;
            let stmt = self.parse_simple_statement();
            self.struct_literals_allowed = was_allowed;
            Some(Box::new(stmt?))
        };
        self.expect(&TokenKind::Semicolon, "';' after for-loop initializer")?;

        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_condition()?)
        };
        self.expect(&TokenKind::Semicolon, "';' after for-loop condition")?;

        let increment = if self.check(&TokenKind::LeftBrace) {
            None
        } else {
            Some(self.parse_condition()?)
        };

        let body = self.parse_block()?;
        let span = for_span.merge(self.previous_span());
        Ok(Stmt {
            kind: StmtKind::For(ForStmt { init, condition, increment, body }),
            span,
            id: self.next_id(),
        })
    }

    fn parse_select(&mut self) -> ZenithResult<Stmt> {
        let select_span = self.advance().span; // 'select'
        let scrutinee = self.parse_condition()?;
        self.expect(&TokenKind::LeftBrace, "'{' after select scrutinee")?;

        let mut cases = Vec::new();
        let mut else_block = None;

        while !self.check(&TokenKind::RightBrace) && !self.at_end() {
            if self.match_token(&TokenKind::KeywordCase) {
                let case_start = self.previous_span();
                let value = self.parse_condition()?;
                let block = self.parse_block()?;
                cases.push(CaseClause { value, block, span: case_start.merge(self.previous_span()) });
            } else if self.match_token(&TokenKind::KeywordElse) {
                else_block = Some(self.parse_block()?);
            } else {
                let token = self.peek().clone();
                return Err(self.error_at(
                    token.span,
                    format!("expected 'case' or 'else' in select, found '{}'", token.kind),
                ));
            }
        }
        self.expect(&TokenKind::RightBrace, "'}' to close select")?;

        let span = select_span.merge(self.previous_span());
        Ok(Stmt {
            kind: StmtKind::Select(SelectStmt { scrutinee, cases, else_block }),
            span,
            id: self.next_id(),
        })
    }

    /// Variable declaration, assignment or expression statement; also used
    /// for `for` initializers.
    fn parse_simple_statement(&mut self) -> ZenithResult<Stmt> {
        // `name :` introduces a declaration.
        if matches!(self.peek().kind, TokenKind::Identifier(_))
            && matches!(self.peek_kind_at(1), Some(TokenKind::Colon))
        {
            let name_token = self.advance();
            let name_span = name_token.span;
            self.advance(); // ':'
            let var = self.parse_variable_tail(identifier_text(&name_token), name_span)?;
            let span = name_span.merge(self.previous_span());
            return Ok(Stmt { kind: StmtKind::VariableDecl(var), span, id: self.next_id() });
        }

        let start_span = self.peek().span;
        let target = self.parse_postfix_expression()?;

        if self.match_token(&TokenKind::Equal) {
            let value = self.parse_expression()?;
            let span = start_span.merge(self.previous_span());
            return Ok(Stmt { kind: StmtKind::Assignment { target, value }, span, id: self.next_id() });
        }

        // Not an assignment: the parsed operand may continue as a binary chain.
        let expr = self.continue_binary_chain(target)?;
        let span = start_span.merge(self.previous_span());
        Ok(Stmt { kind: StmtKind::Expression(expr), span, id: self.next_id() })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Expression in a position where `{` opens a block, not a struct literal.
    fn parse_condition(&mut self) -> ZenithResult<Expr> {
        let was_allowed = self.struct_literals_allowed;
        self.struct_literals_allowed = false;
        let result = self.parse_expression();
        self.struct_literals_allowed = was_allowed;
        result
    }

    /// All binary operators bind equally and associate left-to-right.
    pub fn parse_expression(&mut self) -> ZenithResult<Expr> {
        let left = self.parse_postfix_expression()?;
        self.continue_binary_chain(left)
    }

    fn continue_binary_chain(&mut self, mut left: Expr) -> ZenithResult<Expr> {
        while let Some(op) = binary_op_for(&self.peek().kind) {
            self.advance();
            let right = self.parse_postfix_expression()?;
            let span = left.span.merge(right.span);
            left = Expr {
                kind: ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) },
                span,
                id: self.next_id(),
            };
        }
        Ok(left)
    }

    fn parse_postfix_expression(&mut self) -> ZenithResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.match_token(&TokenKind::LeftBracket) {
                let index = self.parse_expression()?;
                self.expect(&TokenKind::RightBracket, "']' after subscript index")?;
                let span = expr.span.merge(self.previous_span());
                expr = Expr {
                    kind: ExprKind::Subscript { array: Box::new(expr), index: Box::new(index) },
                    span,
                    id: self.next_id(),
                };
            } else if self.match_token(&TokenKind::Dot) {
                let field_token = self.expect_identifier("member name after '.'")?;
                let span = expr.span.merge(field_token.span);
                expr = Expr {
                    kind: ExprKind::Member {
                        object: Box::new(expr),
                        field: identifier_text(&field_token),
                    },
                    span,
                    id: self.next_id(),
                };
            } else if self.check(&TokenKind::PlusPlus) || self.check(&TokenKind::MinusMinus) {
                let op_token = self.advance();
                let op = if op_token.kind == TokenKind::PlusPlus {
                    UnaryOp::Increment
                } else {
                    UnaryOp::Decrement
                };
                let span = expr.span.merge(op_token.span);
                expr = Expr {
                    kind: ExprKind::Unary { op, operand: Box::new(expr) },
                    span,
                    id: self.next_id(),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> ZenithResult<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::IntegerLiteral(value) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Literal(Literal::Integer(value)),
                    span: token.span,
                    id: self.next_id(),
                })
            }
            TokenKind::BooleanLiteral(value) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Literal(Literal::Boolean(value)),
                    span: token.span,
                    id: self.next_id(),
                })
            }
            TokenKind::StringLiteral(ref value) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Literal(Literal::String {
                        value: value.clone(),
                        text: token.text.clone(),
                    }),
                    span: token.span,
                    id: self.next_id(),
                })
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_postfix_expression()?;
                let span = token.span.merge(operand.span);
                Ok(Expr {
                    kind: ExprKind::Unary { op: UnaryOp::Negate, operand: Box::new(operand) },
                    span,
                    id: self.next_id(),
                })
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RightParen, "')' after parenthesized expression")?;
                Ok(expr)
            }
            TokenKind::LeftBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(&TokenKind::RightBracket) && !self.at_end() {
                    elements.push(self.parse_expression()?);
                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RightBracket, "']' after array initializer")?;
                let span = token.span.merge(self.previous_span());
                Ok(Expr { kind: ExprKind::ArrayInit(elements), span, id: self.next_id() })
            }
            TokenKind::Identifier(ref name) => {
                self.advance();

                if self.check(&TokenKind::LeftParen) {
                    return self.parse_call(name.clone(), token.span);
                }
                if self.check(&TokenKind::LeftBrace) && self.struct_literals_allowed {
                    return self.parse_struct_init(name.clone(), token.span);
                }

                Ok(Expr {
                    kind: ExprKind::Identifier(name.clone()),
                    span: token.span,
                    id: self.next_id(),
                })
            }
            _ => Err(self.error_at(
                token.span,
                format!("expected expression, found '{}'", token.kind),
            )),
        }
    }

    fn parse_call(&mut self, callee: String, start_span: Span) -> ZenithResult<Expr> {
        self.advance(); // '('
        let mut args = Vec::new();
        while !self.check(&TokenKind::RightParen) && !self.at_end() {
            args.push(self.parse_expression()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightParen, "')' after call arguments")?;
        let span = start_span.merge(self.previous_span());
        Ok(Expr { kind: ExprKind::Call { callee, args }, span, id: self.next_id() })
    }

    fn parse_struct_init(&mut self, name: String, start_span: Span) -> ZenithResult<Expr> {
        self.advance(); // '{'
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.at_end() {
            let field_token = self.expect_identifier("field name in initializer")?;
            self.expect(&TokenKind::Equal, "'=' after field name")?;
            let value = self.parse_expression()?;
            fields.push((identifier_text(&field_token), value));
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightBrace, "'}' after struct initializer")?;
        let span = start_span.merge(self.previous_span());
        Ok(Expr { kind: ExprKind::StructInit { name, fields }, span, id: self.next_id() })
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn starts_expression(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::IntegerLiteral(_)
                | TokenKind::StringLiteral(_)
                | TokenKind::BooleanLiteral(_)
                | TokenKind::Identifier(_)
                | TokenKind::Minus
                | TokenKind::LeftParen
                | TokenKind::LeftBracket
        )
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.position + offset).map(|t| &t.kind)
    }

    fn previous_span(&self) -> Span {
        if self.position == 0 {
            self.tokens[0].span
        } else {
            self.tokens[self.position - 1].span
        }
    }

    fn at_end(&self) -> bool {
        self.peek().is_eof()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.at_end() {
            self.position += 1;
        }
        token
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> ZenithResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let token = self.peek().clone();
            Err(self.error_at(token.span, format!("expected {}, found '{}'", what, token.kind)))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> ZenithResult<Token> {
        if matches!(self.peek().kind, TokenKind::Identifier(_)) {
            Ok(self.advance())
        } else {
            let token = self.peek().clone();
            Err(self.error_at(token.span, format!("expected {}, found '{}'", what, token.kind)))
        }
    }

    fn error_at(&mut self, span: Span, message: String) -> ZenithError {
        self.diagnostics.error(Phase::Parser, &message, span);
        ZenithError::parse_error(message)
    }

    fn next_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Skip to a plausible top-level declaration start.
    fn synchronize_top_level(&mut self) {
        while !self.at_end() {
            if self.check(&TokenKind::KeywordStruct) {
                return;
            }
            if matches!(self.peek().kind, TokenKind::Identifier(_))
                && matches!(self.peek_kind_at(1), Some(TokenKind::Colon))
            {
                return;
            }
            self.advance();
        }
    }

    /// Skip to a plausible statement boundary inside a block.
    fn synchronize_in_block(&mut self) {
        while !self.at_end() {
            match self.peek().kind {
                TokenKind::RightBrace
                | TokenKind::KeywordIf
                | TokenKind::KeywordFor
                | TokenKind::KeywordSelect
                | TokenKind::KeywordRet => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

/// Map an operator token to its binary-operator tag.
fn binary_op_for(kind: &TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Subtract,
        TokenKind::Star => BinaryOp::Multiply,
        TokenKind::Slash => BinaryOp::Divide,
        TokenKind::Ampersand => BinaryOp::BitwiseAnd,
        TokenKind::Pipe => BinaryOp::BitwiseOr,
        TokenKind::Caret => BinaryOp::BitwiseXor,
        TokenKind::Equal => BinaryOp::Equal,
        TokenKind::Greater => BinaryOp::Greater,
        TokenKind::Less => BinaryOp::Less,
        TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
        TokenKind::LessEqual => BinaryOp::LessEqual,
        TokenKind::NotEqual => BinaryOp::NotEqual,
        TokenKind::KeywordAnd => BinaryOp::LogicalAnd,
        TokenKind::KeywordOr => BinaryOp::LogicalOr,
        _ => return None,
    };
    Some(op)
}

fn identifier_text(token: &Token) -> String {
    match &token.kind {
        TokenKind::Identifier(name) => name.clone(),
        _ => token.text.clone(),
    }
}
