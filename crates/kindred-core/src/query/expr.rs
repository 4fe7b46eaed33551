//! Parsed query expressions.
//!
//! A [`QueryExpr`] is what a query language front end produces: a candidate
//! entity with an optional alias, a filter expression tree, orderings, a result
//! clause and grouping. Field references are dotted paths and may start with
//! the alias.

use crate::object::FieldValue;
use std::fmt;

/// Operators of the expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `NOT`
    Not,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `LIKE`
    Like,
    /// `||`
    Concat,
    /// Unary `-`
    Neg,
    /// `~`
    Complement,
    /// `IS`
    Is,
    /// `IS NOT`
    IsNot,
    /// `BETWEEN`
    Between,
}

impl Operator {
    /// Symbol used in messages.
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::Like => "LIKE",
            Operator::Concat => "||",
            Operator::Neg => "NEG",
            Operator::Complement => "~",
            Operator::Is => "IS",
            Operator::IsNot => "IS NOT",
            Operator::Between => "BETWEEN",
        }
    }

    /// Check whether this operator compares two operands.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Eq | Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A node of a filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Dotted field path.
    Field(String),
    /// Literal value.
    Literal(FieldValue),
    /// Named parameter bound at execution.
    Parameter(String),
    /// Unary operation.
    Unary { op: Operator, operand: Box<Expr> },
    /// Binary operation.
    Binary {
        op: Operator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Field reference.
    pub fn field(path: impl Into<String>) -> Self {
        Expr::Field(path.into())
    }

    /// Literal.
    pub fn literal(value: impl Into<FieldValue>) -> Self {
        Expr::Literal(value.into())
    }

    /// Null literal.
    pub fn null() -> Self {
        Expr::Literal(FieldValue::Null)
    }

    /// Parameter reference.
    pub fn param(name: impl Into<String>) -> Self {
        Expr::Parameter(name.into())
    }

    /// Binary operation.
    pub fn binary(op: Operator, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Unary operation.
    pub fn unary(op: Operator, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// `self = other`
    pub fn eq(self, other: Expr) -> Self {
        Expr::binary(Operator::Eq, self, other)
    }

    /// `self < other`
    pub fn lt(self, other: Expr) -> Self {
        Expr::binary(Operator::Lt, self, other)
    }

    /// `self <= other`
    pub fn le(self, other: Expr) -> Self {
        Expr::binary(Operator::Le, self, other)
    }

    /// `self > other`
    pub fn gt(self, other: Expr) -> Self {
        Expr::binary(Operator::Gt, self, other)
    }

    /// `self >= other`
    pub fn ge(self, other: Expr) -> Self {
        Expr::binary(Operator::Ge, self, other)
    }

    /// `self AND other`
    pub fn and(self, other: Expr) -> Self {
        Expr::binary(Operator::And, self, other)
    }

    /// `self OR other`
    pub fn or(self, other: Expr) -> Self {
        Expr::binary(Operator::Or, self, other)
    }
}

/// Aggregate functions of the result clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    /// Number of results.
    Count,
    /// Sum of values.
    Sum,
    /// Average of values.
    Avg,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
}

impl AggregateFunction {
    /// Function name used in messages.
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        }
    }
}

/// One item of the result clause.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultExpr {
    /// A field value.
    Field(String),
    /// An aggregate over a field.
    Aggregate {
        function: AggregateFunction,
        field: String,
    },
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// Ascending (default).
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// One ordering of the result.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    /// Dotted field path.
    pub field: String,
    /// Direction.
    pub direction: OrderDirection,
}

impl OrderSpec {
    /// Ascending order on a field.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Descending order on a field.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Desc,
        }
    }
}

/// A parsed query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryExpr {
    /// Candidate entity name.
    pub candidate: String,
    /// Alias of the candidate in field paths.
    pub alias: Option<String>,
    /// Filter.
    pub filter: Option<Expr>,
    /// Orderings, most significant first.
    pub ordering: Vec<OrderSpec>,
    /// Result clause; empty selects candidate objects.
    pub result: Vec<ResultExpr>,
    /// Grouping paths.
    pub grouping: Vec<String>,
    /// Group filter.
    pub having: Option<Expr>,
}

impl QueryExpr {
    /// Query selecting objects of an entity.
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            alias: None,
            filter: None,
            ordering: Vec::new(),
            result: Vec::new(),
            grouping: Vec::new(),
            having: None,
        }
    }

    /// Set the alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Add an ordering.
    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.ordering.push(order);
        self
    }

    /// Add a field to the result clause.
    pub fn select(mut self, field: impl Into<String>) -> Self {
        self.result.push(ResultExpr::Field(field.into()));
        self
    }

    /// Add an aggregate to the result clause.
    pub fn aggregate(mut self, function: AggregateFunction, field: impl Into<String>) -> Self {
        self.result.push(ResultExpr::Aggregate {
            function,
            field: field.into(),
        });
        self
    }

    /// Add a grouping path.
    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.grouping.push(field.into());
        self
    }

    /// Set the group filter.
    pub fn with_having(mut self, having: Expr) -> Self {
        self.having = Some(having);
        self
    }
}
