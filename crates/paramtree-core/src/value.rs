//! Conversion between config text and typed parameter values

use std::path::PathBuf;

use paramtree_meta::text::{quote, split_nested, unquote};

use crate::slot::Slot;

/// A type that can be stored in a config file.
///
/// `type_name` is what the file declares, e.g. `int` or `list<string>`.
/// Conversion failures are plain messages; the container attaches the
/// parameter name.
pub trait ParamValue: Clone + Send + Sync + 'static {
    fn type_name() -> String;

    fn parse(text: &str) -> Result<Self, String>;

    fn format(&self) -> String;
}

macro_rules! numeric_value {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl ParamValue for $ty {
                fn type_name() -> String {
                    $name.to_string()
                }

                fn parse(text: &str) -> Result<Self, String> {
                    text.trim()
                        .parse::<$ty>()
                        .map_err(|e| format!("'{}' is not a valid {}: {e}", text.trim(), $name))
                }

                fn format(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

numeric_value! {
    i32 => "int",
    i64 => "int64",
    u16 => "uint16",
    u32 => "uint",
    u64 => "uint64",
    f64 => "double",
}

/// A switch given without value on the command line arrives as the empty
/// string and reads as true.
impl ParamValue for bool {
    fn type_name() -> String {
        "bool".to_string()
    }

    fn parse(text: &str) -> Result<Self, String> {
        match text.trim() {
            "true" | "1" | "" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(format!("'{other}' is not a valid bool")),
        }
    }

    fn format(&self) -> String {
        self.to_string()
    }
}

impl ParamValue for String {
    fn type_name() -> String {
        "string".to_string()
    }

    fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        Ok(unquote(text).unwrap_or_else(|| text.to_string()))
    }

    fn format(&self) -> String {
        quote(self)
    }
}

impl ParamValue for PathBuf {
    fn type_name() -> String {
        "path".to_string()
    }

    fn parse(text: &str) -> Result<Self, String> {
        String::parse(text).map(PathBuf::from)
    }

    fn format(&self) -> String {
        quote(&self.to_string_lossy())
    }
}

impl<T: ParamValue> ParamValue for Vec<T> {
    fn type_name() -> String {
        format!("list<{}>", T::type_name())
    }

    fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        let inner = text
            .strip_prefix('[')
            .and_then(|t| t.strip_suffix(']'))
            .ok_or_else(|| format!("'{text}' is not a list, expected [a, b, ...]"))?;
        let items = split_nested(inner, ',').ok_or_else(|| format!("unbalanced brackets or quotes in '{text}'"))?;
        items.iter().map(|item| T::parse(item)).collect()
    }

    fn format(&self) -> String {
        let items: Vec<String> = self.iter().map(ParamValue::format).collect();
        format!("[{}]", items.join(", "))
    }
}

/// A slot with its value type erased, as stored by the container.
pub(crate) trait Binding: Send + Sync {
    /// Convert `text` and store it.
    fn assign(&self, text: &str) -> Result<(), String>;

    /// Whether `text` converts, without storing it.
    fn check(&self, text: &str) -> Result<(), String>;

    /// The stored value in config text form.
    fn current(&self) -> Option<String>;

    fn is_alive(&self) -> bool;

    fn slot_id(&self) -> Option<usize>;
}

pub(crate) struct SlotBinding<T> {
    slot: Box<dyn Slot<T>>,
}

impl<T: ParamValue> SlotBinding<T> {
    pub(crate) fn new(slot: Box<dyn Slot<T>>) -> Self {
        Self { slot }
    }
}

impl<T: ParamValue> Binding for SlotBinding<T> {
    fn assign(&self, text: &str) -> Result<(), String> {
        let value = T::parse(text)?;
        if self.slot.set(value) {
            Ok(())
        } else {
            Err("parameter storage no longer exists".to_string())
        }
    }

    fn check(&self, text: &str) -> Result<(), String> {
        T::parse(text).map(|_| ())
    }

    fn current(&self) -> Option<String> {
        self.slot.get().map(|value| value.format())
    }

    fn is_alive(&self) -> bool {
        self.slot.is_alive()
    }

    fn slot_id(&self) -> Option<usize> {
        self.slot.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::Param;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("123", Ok(123))]
    #[case(" -4 ", Ok(-4))]
    #[case("12x", Err(()))]
    fn test_parse_int(#[case] text: &str, #[case] expected: Result<i32, ()>) {
        assert_eq!(i32::parse(text).map_err(|_| ()), expected);
    }

    #[rstest]
    #[case("true", true)]
    #[case("1", true)]
    #[case("", true)]
    #[case("0", false)]
    #[case("false", false)]
    fn test_parse_bool(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(bool::parse(text), Ok(expected));
    }

    #[test]
    fn test_string_accepts_quoted_and_bare() {
        assert_eq!(String::parse("\"a \\\"b\\\"\""), Ok("a \"b\"".to_string()));
        assert_eq!(String::parse("bare"), Ok("bare".to_string()));
        assert_eq!("x y".to_string().format(), "\"x y\"");
    }

    #[test]
    fn test_lists() {
        assert_eq!(Vec::<u32>::parse("[1, 2, 3]"), Ok(vec![1, 2, 3]));
        assert_eq!(Vec::<u32>::parse("[]"), Ok(vec![]));
        assert!(Vec::<u32>::parse("1, 2").is_err());
        assert_eq!(
            Vec::<String>::parse("[\"a,b\", c]"),
            Ok(vec!["a,b".to_string(), "c".to_string()])
        );
        assert_eq!(vec![1u16, 2].format(), "[1, 2]");
        assert_eq!(Vec::<Vec<i32>>::type_name(), "list<list<int>>");
    }

    #[test]
    fn test_binding_keeps_value_on_conversion_failure() {
        let param = Param::new(3u32);
        let binding = SlotBinding::new(Box::new(param.slot()));
        assert!(binding.assign("abc").is_err());
        assert_eq!(param.get(), 3);
        binding.assign("9").unwrap();
        assert_eq!(param.get(), 9);
        assert_eq!(binding.current(), Some("9".to_string()));
    }
}
