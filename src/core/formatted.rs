//! Inline SQL with automatic parameter binding
//!
//! A template such as `"insert into T(c) values({})"` plus its arguments is
//! turned into `"insert into T(c) values(@0)"` with `@0` bound to the first
//! argument. Values never get spliced into the SQL text.
//!
//! Holes are `{}` (next argument) or `{N}` (argument `N`); `{{` and `}}` are
//! literal braces. Every argument must be referenced at least once.

use super::error::{DatabaseError, Result};
use super::parameter::Parameter;
use super::value::DatabaseValue;

/// SQL text with its holes replaced by generated parameter names
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedSql {
    sql: String,
    parameters: Vec<Parameter>,
}

impl FormattedSql {
    pub fn new(template: &str, args: Vec<DatabaseValue>) -> Result<Self> {
        let mut sql = String::with_capacity(template.len());
        let mut used = vec![false; args.len()];
        let mut next_auto = 0usize;
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    sql.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    sql.push('}');
                }
                '{' => {
                    let mut spec = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => spec.push(ch),
                            None => {
                                return Err(DatabaseError::template(format!(
                                    "unclosed '{{' in \"{}\"",
                                    template
                                )))
                            }
                        }
                    }

                    let index = if spec.is_empty() {
                        next_auto += 1;
                        next_auto - 1
                    } else {
                        spec.trim().parse::<usize>().map_err(|_| {
                            DatabaseError::template(format!(
                                "unsupported hole '{{{}}}'; use {{}} or {{N}}",
                                spec
                            ))
                        })?
                    };

                    let slot = used.get_mut(index).ok_or_else(|| {
                        DatabaseError::template(format!(
                            "hole {} has no argument ({} supplied)",
                            index,
                            args.len()
                        ))
                    })?;
                    *slot = true;
                    sql.push_str(&parameter_name(index));
                }
                '}' => {
                    return Err(DatabaseError::template(format!(
                        "unmatched '}}' in \"{}\"",
                        template
                    )))
                }
                other => sql.push(other),
            }
        }

        if let Some(unused) = used.iter().position(|u| !u) {
            return Err(DatabaseError::template(format!(
                "argument {} is not referenced by the template",
                unused
            )));
        }

        let parameters = args
            .into_iter()
            .enumerate()
            .map(|(index, value)| Parameter::new(parameter_name(index), value))
            .collect();

        Ok(Self { sql, parameters })
    }

    /// SQL with `@0`, `@1`, ... in place of the holes
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn into_parts(self) -> (String, Vec<Parameter>) {
        (self.sql, self.parameters)
    }
}

/// Generated name of the parameter for argument `index`
pub fn parameter_name(index: usize) -> String {
    format!("@{}", index)
}

/// Build a [`FormattedSql`] from a template literal and its arguments.
///
/// ```
/// use scoped_sql::sql;
///
/// let stmt = sql!("values({}, {})", "a", 42).unwrap();
/// assert_eq!(stmt.sql(), "values(@0, @1)");
/// assert_eq!(stmt.parameters().len(), 2);
/// ```
#[macro_export]
macro_rules! sql {
    ($template:expr $(, $arg:expr)* $(,)?) => {
        $crate::core::formatted::FormattedSql::new(
            $template,
            vec![$($crate::core::value::DatabaseValue::from($arg)),*],
        )
    };
}
