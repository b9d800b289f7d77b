//! Statement parameters

use super::value::{DatabaseValue, ValueType};

/// A named value bound to one statement execution.
///
/// The name is passed to the driver as written (`@id`, `:id`, `$id` or a bare
/// `id`). An empty name binds by position.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    value: DatabaseValue,
    type_hint: Option<ValueType>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            type_hint: None,
        }
    }

    /// Parameter bound by its position in the parameter list
    pub fn positional(value: impl Into<DatabaseValue>) -> Self {
        Self::new(String::new(), value)
    }

    /// Ask the binder to convert the value to `value_type` before binding
    pub fn with_type(mut self, value_type: ValueType) -> Self {
        self.type_hint = Some(value_type);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &DatabaseValue {
        &self.value
    }

    pub fn type_hint(&self) -> Option<ValueType> {
        self.type_hint
    }
}

impl<N, V> From<(N, V)> for Parameter
where
    N: Into<String>,
    V: Into<DatabaseValue>,
{
    fn from((name, value): (N, V)) -> Self {
        Parameter::new(name, value)
    }
}

/// Build a `Vec<Parameter>` from `(name, value)` pairs.
///
/// ```
/// use scoped_sql::params;
///
/// let params = params![("@name", "Alice"), ("@age", 30)];
/// assert_eq!(params.len(), 2);
/// assert_eq!(params[0].name(), "@name");
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::core::parameter::Parameter>::new()
    };
    ($(($name:expr, $value:expr)),+ $(,)?) => {
        vec![$($crate::core::parameter::Parameter::new($name, $value)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_from_tuple() {
        let p: Parameter = ("@v", "abc").into();
        assert_eq!(p.name(), "@v");
        assert_eq!(p.value(), &DatabaseValue::String("abc".to_string()));
        assert_eq!(p.type_hint(), None);
        assert_eq!(Parameter::positional(1).name(), "");
    }

    #[test]
    fn test_parameter_with_type_hint() {
        let p = Parameter::new("@n", "12").with_type(ValueType::Long);
        assert_eq!(p.type_hint(), Some(ValueType::Long));
    }

    #[test]
    fn test_params_macro_preserves_order() {
        let params = params![("@b", 2), ("@a", 1), ("@b", 3)];
        let names: Vec<&str> = params.iter().map(Parameter::name).collect();
        assert_eq!(names, vec!["@b", "@a", "@b"]);

        let empty = params![];
        assert!(empty.is_empty());
    }
}
