use crate::{
    sql::{
        ast::*,
        lex::{Lex, Token, TokenKind},
        Position,
    },
    value::Value,
    Error, Result,
};

/// Parse one SQL statement. Syntax errors carry the source position in
/// `(line,col)` form.
pub fn parse(text: &str) -> Result<Statement> {
    let tokens = Lex::new(text).tokenize()?;
    let mut parser = Parser { tokens, cursor: 0 };

    let stmt = parser.statement()?;
    parser.eat(&TokenKind::Semi);
    match parser.peek() {
        Some(token) => {
            let (pos, token) = (token.pos, token.clone());
            err_at!(ParseSQL, msg: "{} trailing input at {}", pos, token)
        }
        None => Ok(stmt),
    }
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.cursor + n)
    }

    fn pos(&self) -> Position {
        match self.peek() {
            Some(token) => token.pos,
            None => match self.tokens.last() {
                Some(token) => token.pos,
                None => Position(1, 1),
            },
        }
    }

    fn next(&mut self) -> Result<Token> {
        match self.tokens.get(self.cursor) {
            Some(token) => {
                self.cursor += 1;
                Ok(token.clone())
            }
            None => err_at!(ParseSQL, msg: "{} unexpected end of input", self.pos()),
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        match self.peek() {
            Some(token) if token.kind == *kind => {
                self.cursor += 1;
                true
            }
            _ => false,
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        self.eat(&TokenKind::Keyword(keyword_str(kw)))
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(token) if token.kind == TokenKind::Keyword(keyword_str(kw)))
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            let got = match self.peek() {
                Some(token) => token.to_string(),
                None => "end of input".to_string(),
            };
            err_at!(ParseSQL, msg: "{} expected {:?}, got {}", self.pos(), kind, got)
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            let got = match self.peek() {
                Some(token) => token.to_string(),
                None => "end of input".to_string(),
            };
            err_at!(ParseSQL, msg: "{} expected {}, got {}", self.pos(), kw, got)
        }
    }

    fn ident(&mut self) -> Result<String> {
        let pos = self.pos();
        match self.next()?.kind {
            TokenKind::Ident(name) => Ok(name),
            kind => err_at!(ParseSQL, msg: "{} expected identifier, got {:?}", pos, kind),
        }
    }

    fn statement(&mut self) -> Result<Statement> {
        if self.is_keyword("INSERT") {
            Ok(Statement::Insert(self.insert()?))
        } else {
            Ok(Statement::Select(Box::new(self.select_with()?)))
        }
    }

    fn insert(&mut self) -> Result<Insert> {
        self.expect_keyword("INSERT")?;
        self.expect_keyword("INTO")?;
        let table = self.ident()?;

        let mut columns = vec![];
        if self.eat(&TokenKind::LParen) {
            loop {
                columns.push(self.ident()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RParen)?;
        }

        self.expect_keyword("VALUES")?;
        let mut values = vec![];
        loop {
            self.expect(&TokenKind::LParen)?;
            let mut row = vec![];
            loop {
                row.push(self.expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RParen)?;
            values.push(row);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        Ok(Insert { table, columns, values })
    }

    // WITH name AS ( select ) [, ...] select
    fn select_with(&mut self) -> Result<Select> {
        let mut with = vec![];
        if self.eat_keyword("WITH") {
            loop {
                let name = self.ident()?;
                self.expect_keyword("AS")?;
                self.expect(&TokenKind::LParen)?;
                let select = self.select_with()?;
                self.expect(&TokenKind::RParen)?;
                with.push((name, select));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }

        let mut select = self.select()?;
        select.with = with;
        Ok(select)
    }

    fn select(&mut self) -> Result<Select> {
        self.expect_keyword("SELECT")?;

        let mut projections = vec![];
        loop {
            if self.eat(&TokenKind::Star) {
                projections.push(Projection::Star);
            } else {
                let expr = self.expr()?;
                let alias = self.alias()?;
                projections.push(Projection::Expr { expr, alias });
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        let from = match self.eat_keyword("FROM") {
            true => Some(self.table_ref()?),
            false => None,
        };

        let mut joins = vec![];
        loop {
            let kind = if self.is_keyword("JOIN") {
                self.eat_keyword("JOIN");
                JoinKind::Inner
            } else if self.is_keyword("INNER") {
                self.eat_keyword("INNER");
                self.expect_keyword("JOIN")?;
                JoinKind::Inner
            } else if self.is_keyword("LEFT") {
                self.eat_keyword("LEFT");
                self.expect_keyword("JOIN")?;
                JoinKind::Left
            } else {
                break;
            };
            let table = self.table_ref()?;
            self.expect_keyword("ON")?;
            let on = self.expr()?;
            joins.push(Join { kind, table, on });
        }

        let where_ = match self.eat_keyword("WHERE") {
            true => Some(self.expr()?),
            false => None,
        };

        let mut group_by = vec![];
        if self.eat_keyword("GROUP") {
            self.expect_keyword("BY")?;
            loop {
                group_by.push(self.expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }

        let having = match self.eat_keyword("HAVING") {
            true => Some(self.expr()?),
            false => None,
        };

        let mut order_by = vec![];
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let expr = self.expr()?;
                let desc = if self.eat_keyword("DESC") {
                    true
                } else {
                    self.eat_keyword("ASC");
                    false
                };
                order_by.push(OrderSpec { expr, desc });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }

        let mut limit = None;
        let mut offset = None;
        if self.eat_keyword("LIMIT") {
            limit = Some(self.unsigned()?);
            if self.eat_keyword("OFFSET") {
                offset = Some(self.unsigned()?);
            }
        } else if self.eat_keyword("OFFSET") {
            offset = Some(self.unsigned()?);
        }

        Ok(Select {
            with: vec![],
            projections,
            from,
            joins,
            where_,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    fn unsigned(&mut self) -> Result<usize> {
        let pos = self.pos();
        match self.next()?.kind {
            TokenKind::Int(v) if v >= 0 => Ok(v as usize),
            kind => err_at!(ParseSQL, msg: "{} expected count, got {:?}", pos, kind),
        }
    }

    fn alias(&mut self) -> Result<Option<String>> {
        if self.eat_keyword("AS") {
            return Ok(Some(self.ident()?));
        }
        match self.peek() {
            Some(Token { kind: TokenKind::Ident(_), .. }) => Ok(Some(self.ident()?)),
            _ => Ok(None),
        }
    }

    fn table_ref(&mut self) -> Result<TableRef> {
        if self.eat(&TokenKind::LParen) {
            let select = self.select_with()?;
            self.expect(&TokenKind::RParen)?;
            let alias = match self.alias()? {
                Some(alias) => alias,
                None => err_at!(ParseSQL, msg: "{} derived table needs an alias", self.pos())?,
            };
            Ok(TableRef::Derived { select: Box::new(select), alias })
        } else {
            let name = self.ident()?;
            let alias = self.alias()?;
            Ok(TableRef::Named { name, alias })
        }
    }

    fn expr(&mut self) -> Result<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("OR") {
            let right = self.and_expr()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("AND") {
            let right = self.not_expr()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.eat_keyword("NOT") {
            let expr = self.not_expr()?;
            Ok(Expr::Unary { op: UnaryOp::Not, expr: Box::new(expr) })
        } else {
            self.comparison()
        }
    }

    fn comparison(&mut self) -> Result<Expr> {
        let left = self.additive()?;

        let op = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Eq) => Some(BinaryOp::Eq),
            Some(TokenKind::Ne) => Some(BinaryOp::Ne),
            Some(TokenKind::Lt) => Some(BinaryOp::Lt),
            Some(TokenKind::Le) => Some(BinaryOp::Le),
            Some(TokenKind::Gt) => Some(BinaryOp::Gt),
            Some(TokenKind::Ge) => Some(BinaryOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.next()?;
            let right = self.additive()?;
            return Ok(Expr::Binary { op, left: Box::new(left), right: Box::new(right) });
        }

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(Expr::IsNull { expr: Box::new(left), negated });
        }

        let negated = self.eat_keyword("NOT");
        if self.eat_keyword("IN") {
            self.expect(&TokenKind::LParen)?;
            let list = self.in_list()?;
            self.expect(&TokenKind::RParen)?;
            let exprs = match left {
                Expr::Tuple(exprs) => exprs,
                expr => vec![expr],
            };
            return Ok(Expr::In { exprs, list, negated });
        }
        if self.eat_keyword("LIKE") {
            let pattern = self.additive()?;
            return Ok(Expr::Like {
                expr: Box::new(left),
                pattern: Box::new(pattern),
                negated,
            });
        }
        if self.eat_keyword("BETWEEN") {
            let lo = self.additive()?;
            self.expect_keyword("AND")?;
            let hi = self.additive()?;
            return Ok(Expr::Between {
                expr: Box::new(left),
                lo: Box::new(lo),
                hi: Box::new(hi),
                negated,
            });
        }
        if negated {
            err_at!(ParseSQL, msg: "{} expected IN, LIKE or BETWEEN after NOT", self.pos())?;
        }

        Ok(left)
    }

    fn in_list(&mut self) -> Result<InList> {
        if self.is_keyword("SELECT") || self.is_keyword("WITH") {
            return Ok(InList::Subquery(Box::new(self.select_with()?)));
        }

        let mut rows = vec![];
        loop {
            if self.eat(&TokenKind::LParen) {
                let mut row = vec![];
                loop {
                    row.push(self.expr()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RParen)?;
                rows.push(row);
            } else {
                rows.push(vec![self.expr()?]);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(InList::Exprs(rows))
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                Some(TokenKind::Concat) => BinaryOp::Concat,
                _ => break,
            };
            self.next()?;
            let right = self.multiplicative()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                Some(TokenKind::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.next()?;
            let right = self.unary()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat(&TokenKind::Minus) {
            let expr = self.unary()?;
            return Ok(match expr {
                Expr::Literal(Value::I64(v)) => Expr::Literal(Value::I64(-v)),
                Expr::Literal(Value::F64(v)) => Expr::Literal(Value::F64(-v)),
                expr => Expr::Unary { op: UnaryOp::Neg, expr: Box::new(expr) },
            });
        }
        if self.eat(&TokenKind::Plus) {
            return self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        let pos = self.pos();

        if self.eat(&TokenKind::LParen) {
            if self.is_keyword("SELECT") || self.is_keyword("WITH") {
                let select = self.select_with()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(Expr::Subquery(Box::new(select)));
            }
            let first = self.expr()?;
            if self.eat(&TokenKind::Comma) {
                let mut exprs = vec![first];
                loop {
                    exprs.push(self.expr()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RParen)?;
                return Ok(Expr::Tuple(exprs));
            }
            self.expect(&TokenKind::RParen)?;
            return Ok(first);
        }

        if self.is_keyword("CASE") {
            return self.case_expr();
        }
        if self.eat_keyword("NULL") {
            return Ok(Expr::Literal(Value::Null));
        }

        match self.next()?.kind {
            TokenKind::Int(v) => Ok(Expr::Literal(Value::I64(v))),
            TokenKind::Float(v) => Ok(Expr::Literal(Value::F64(v))),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            TokenKind::Ident(name) => self.ident_tail(name),
            kind => err_at!(ParseSQL, msg: "{} unexpected {:?}", pos, kind),
        }
    }

    // what follows an identifier: a call, a qualified column, or a bare
    // column.
    fn ident_tail(&mut self, name: String) -> Result<Expr> {
        if self.eat(&TokenKind::LParen) {
            let mut args = vec![];
            let mut star = false;
            if self.eat(&TokenKind::Star) {
                star = true;
            } else if !matches!(self.peek(), Some(t) if t.kind == TokenKind::RParen) {
                if self.is_keyword("DISTINCT") {
                    err_at!(ParseSQL, msg: "{} DISTINCT is not supported", self.pos())?;
                }
                loop {
                    args.push(self.expr()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RParen)?;

            let window = match self.eat_keyword("OVER") {
                true => Some(self.window_spec()?),
                false => None,
            };
            return Ok(Expr::Function { name: name.to_uppercase(), args, star, window });
        }

        if self.eat(&TokenKind::Dot) {
            let column = self.ident()?;
            return Ok(Expr::Column { table: Some(name), name: column });
        }

        Ok(Expr::Column { table: None, name })
    }

    fn window_spec(&mut self) -> Result<WindowSpec> {
        self.expect(&TokenKind::LParen)?;
        let mut spec = WindowSpec::default();

        if self.eat_keyword("PARTITION") {
            self.expect_keyword("BY")?;
            loop {
                spec.partition_by.push(self.expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let expr = self.expr()?;
                let desc = if self.eat_keyword("DESC") {
                    true
                } else {
                    self.eat_keyword("ASC");
                    false
                };
                spec.order_by.push(OrderSpec { expr, desc });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        if self.eat_keyword("ROWS") {
            self.expect_keyword("BETWEEN")?;
            let start = self.frame_bound()?;
            self.expect_keyword("AND")?;
            let end = self.frame_bound()?;
            spec.frame = Some(Frame { start, end });
        }

        self.expect(&TokenKind::RParen)?;
        Ok(spec)
    }

    fn frame_bound(&mut self) -> Result<FrameBound> {
        if self.eat_keyword("UNBOUNDED") {
            if self.eat_keyword("PRECEDING") {
                return Ok(FrameBound::UnboundedPreceding);
            }
            self.expect_keyword("FOLLOWING")?;
            return Ok(FrameBound::UnboundedFollowing);
        }
        if self.eat_keyword("CURRENT") {
            self.expect_keyword("ROW")?;
            return Ok(FrameBound::CurrentRow);
        }

        let pos = self.pos();
        let n = match self.next()?.kind {
            TokenKind::Int(v) if v >= 0 => v as u64,
            kind => err_at!(ParseSQL, msg: "{} expected frame offset, got {:?}", pos, kind)?,
        };
        if self.eat_keyword("PRECEDING") {
            return Ok(FrameBound::Preceding(n));
        }
        self.expect_keyword("FOLLOWING")?;
        Ok(FrameBound::Following(n))
    }

    fn case_expr(&mut self) -> Result<Expr> {
        self.expect_keyword("CASE")?;

        let operand = match self.is_keyword("WHEN") {
            true => None,
            false => Some(Box::new(self.expr()?)),
        };

        let mut branches = vec![];
        while self.eat_keyword("WHEN") {
            let when = self.expr()?;
            self.expect_keyword("THEN")?;
            let then = self.expr()?;
            branches.push((when, then));
        }
        if branches.is_empty() {
            err_at!(ParseSQL, msg: "{} CASE without WHEN", self.pos())?;
        }

        let else_ = match self.eat_keyword("ELSE") {
            true => Some(Box::new(self.expr()?)),
            false => None,
        };
        self.expect_keyword("END")?;

        Ok(Expr::Case { operand, branches, else_ })
    }
}

// keywords are interned as &'static str in the lexer, map back to the
// canonical spelling.
fn keyword_str(kw: &str) -> &'static str {
    match kw {
        "SELECT" => "SELECT",
        "FROM" => "FROM",
        "WHERE" => "WHERE",
        "GROUP" => "GROUP",
        "BY" => "BY",
        "HAVING" => "HAVING",
        "ORDER" => "ORDER",
        "LIMIT" => "LIMIT",
        "OFFSET" => "OFFSET",
        "AS" => "AS",
        "AND" => "AND",
        "OR" => "OR",
        "NOT" => "NOT",
        "IN" => "IN",
        "LIKE" => "LIKE",
        "IS" => "IS",
        "NULL" => "NULL",
        "JOIN" => "JOIN",
        "INNER" => "INNER",
        "LEFT" => "LEFT",
        "ON" => "ON",
        "WITH" => "WITH",
        "CASE" => "CASE",
        "WHEN" => "WHEN",
        "THEN" => "THEN",
        "ELSE" => "ELSE",
        "END" => "END",
        "OVER" => "OVER",
        "PARTITION" => "PARTITION",
        "ROWS" => "ROWS",
        "BETWEEN" => "BETWEEN",
        "PRECEDING" => "PRECEDING",
        "FOLLOWING" => "FOLLOWING",
        "CURRENT" => "CURRENT",
        "ROW" => "ROW",
        "UNBOUNDED" => "UNBOUNDED",
        "ASC" => "ASC",
        "DESC" => "DESC",
        "INSERT" => "INSERT",
        "INTO" => "INTO",
        "VALUES" => "VALUES",
        "DISTINCT" => "DISTINCT",
        _ => unreachable!(),
    }
}

#[cfg(test)]
#[path = "parser_test.rs"]
mod parser_test;
