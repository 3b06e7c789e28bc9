use crate::value::Value;

/// Parsed SQL statement.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Select(Box<Select>),
    Insert(Insert),
}

/// SELECT with optional WITH-bound CTEs.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Select {
    pub with: Vec<(String, Select)>,
    pub projections: Vec<Projection>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub where_: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderSpec>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Projection {
    Star,
    Expr { expr: Expr, alias: Option<String> },
}

#[derive(Clone, Debug, PartialEq)]
pub enum TableRef {
    Named { name: String, alias: Option<String> },
    Derived { select: Box<Select>, alias: String },
}

impl TableRef {
    /// Name columns of this source resolve against.
    pub fn binding(&self) -> &str {
        match self {
            TableRef::Named { name, alias } => alias.as_deref().unwrap_or(name),
            TableRef::Derived { alias, .. } => alias,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderSpec {
    pub expr: Expr,
    pub desc: bool,
}

/// INSERT INTO table (columns) VALUES (..), (..)
#[derive(Clone, Debug, PartialEq)]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Expr>>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Concat,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Right-hand side of an IN predicate. `Set` is not produced by the
/// parser, the executor materializes IN-subqueries into it before
/// evaluation.
#[derive(Clone, Debug, PartialEq)]
pub enum InList {
    /// Rows of tuples; single-column IN has one-element tuples.
    Exprs(Vec<Vec<Expr>>),
    Subquery(Box<Select>),
    Set(usize),
}

/// Window specification attached to a function call.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct WindowSpec {
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderSpec>,
    pub frame: Option<Frame>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub start: FrameBound,
    pub end: FrameBound,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(u64),
    CurrentRow,
    Following(u64),
    UnboundedFollowing,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Value),
    Column {
        table: Option<String>,
        name: String,
    },
    /// Parenthesized expression list, only meaningful as the left side of
    /// a multi-column IN.
    Tuple(Vec<Expr>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    In {
        exprs: Vec<Expr>,
        list: InList,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        lo: Box<Expr>,
        hi: Box<Expr>,
        negated: bool,
    },
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<(Expr, Expr)>,
        else_: Option<Box<Expr>>,
    },
    Function {
        name: String,
        args: Vec<Expr>,
        /// `COUNT(*)` and friends.
        star: bool,
        window: Option<WindowSpec>,
    },
    /// Scalar subquery; the executor materializes it into a literal.
    Subquery(Box<Select>),
}

impl Expr {
    pub fn column(name: &str) -> Expr {
        Expr::Column { table: None, name: name.to_string() }
    }

    /// Split an AND-chain into its factors.
    pub fn and_factors(&self) -> Vec<&Expr> {
        match self {
            Expr::Binary { op: BinaryOp::And, left, right } => {
                let mut factors = left.and_factors();
                factors.extend(right.and_factors());
                factors
            }
            expr => vec![expr],
        }
    }

    /// Pre-order walk over this expression and every nested expression,
    /// not descending into subquery selects.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Literal(_) | Expr::Column { .. } | Expr::Subquery(_) => (),
            Expr::Tuple(exprs) => exprs.iter().for_each(|e| e.walk(visit)),
            Expr::Unary { expr, .. } => expr.walk(visit),
            Expr::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::In { exprs, list, .. } => {
                exprs.iter().for_each(|e| e.walk(visit));
                if let InList::Exprs(rows) = list {
                    rows.iter().flatten().for_each(|e| e.walk(visit));
                }
            }
            Expr::Like { expr, pattern, .. } => {
                expr.walk(visit);
                pattern.walk(visit);
            }
            Expr::IsNull { expr, .. } => expr.walk(visit),
            Expr::Between { expr, lo, hi, .. } => {
                expr.walk(visit);
                lo.walk(visit);
                hi.walk(visit);
            }
            Expr::Case { operand, branches, else_ } => {
                if let Some(operand) = operand {
                    operand.walk(visit);
                }
                for (when, then) in branches {
                    when.walk(visit);
                    then.walk(visit);
                }
                if let Some(else_) = else_ {
                    else_.walk(visit);
                }
            }
            Expr::Function { args, window, .. } => {
                args.iter().for_each(|e| e.walk(visit));
                if let Some(window) = window {
                    window.partition_by.iter().for_each(|e| e.walk(visit));
                    window.order_by.iter().for_each(|o| o.expr.walk(visit));
                }
            }
        }
    }
}
