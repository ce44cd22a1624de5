//! Parameter list macro.

/// Build a `[Value; N]` parameter array from plain Rust values.
///
/// Every argument is converted with `Value::from`, so anything with a
/// `From` impl for [`Value`](crate::Value) can be passed, `Option`s included.
///
/// # Example
///
/// ```
/// use async_odbc::{params, Value};
///
/// let params = params![2, "test 2", None::<i64>];
/// assert_eq!(params[0], Value::Int(2));
/// assert_eq!(params[1], Value::from("test 2"));
/// assert!(params[2].is_null());
/// ```
#[macro_export]
macro_rules! params (
    () => {
        [] as [$crate::Value; 0]
    };
    ($($value:expr),+ $(,)?) => {
        [$($crate::Value::from($value)),+]
    };
);
