// This file is part of OpenGMS.
//
// OpenGMS is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// OpenGMS is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with OpenGMS.  If not, see <http://www.gnu.org/licenses/>.
use anyhow::Result;
use std::{cell::RefCell, cmp::Ordering, collections::HashMap, fmt, rc::Rc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoercionError {
    #[error("cannot coerce an array to {target}")]
    ArrayCoercion { target: &'static str },
}

/// A sparse two dimensional array behind a shared handle. Scripts alias
/// arrays freely across scopes; identity is the handle, and cycles are
/// impossible because instances are referenced by id, never by value.
#[derive(Clone, Debug, Default)]
pub struct GmArray(Rc<RefCell<HashMap<i32, HashMap<i32, Value>>>>);

impl GmArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absent cells read as Undefined.
    pub fn get(&self, row: i32, col: i32) -> Value {
        self.0
            .borrow()
            .get(&row)
            .and_then(|r| r.get(&col))
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    /// Writes auto-grow: any (row, col) pair is addressable.
    pub fn set(&self, row: i32, col: i32, value: Value) {
        self.0
            .borrow_mut()
            .entry(row)
            .or_default()
            .insert(col, value);
    }

    /// Number of rows with at least one cell.
    pub fn height(&self) -> usize {
        self.0.borrow().len()
    }

    /// One past the highest column index in `row`, or 0 for an empty row.
    pub fn row_width(&self, row: i32) -> i32 {
        self.0
            .borrow()
            .get(&row)
            .and_then(|r| r.keys().max().copied())
            .map(|m| m + 1)
            .unwrap_or(0)
    }

    pub fn same_identity(&self, other: &GmArray) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Clone, Debug, Default)]
pub enum Value {
    Real(f64),
    Str(Rc<str>),
    Array(GmArray),
    #[default]
    Undefined,
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn bool(b: bool) -> Self {
        Value::Real(if b { 1.0 } else { 0.0 })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Real(_) => "real",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Undefined => "undefined",
        }
    }

    /// Numeric coercion. Strings contribute their leading numeric prefix,
    /// an empty or unparsable string reads as zero, Undefined reads as
    /// zero, and arrays fail.
    pub fn to_real(&self) -> Result<f64> {
        Ok(match self {
            Value::Real(v) => *v,
            Value::Str(s) => parse_real_prefix(s),
            Value::Undefined => 0.0,
            Value::Array(_) => return Err(CoercionError::ArrayCoercion { target: "real" }.into()),
        })
    }

    pub fn to_i32(&self) -> Result<i32> {
        Ok(self.to_real()?.floor() as i32)
    }

    pub fn to_display(&self) -> Result<String> {
        Ok(match self {
            Value::Real(v) => format_real(*v),
            Value::Str(s) => s.to_string(),
            Value::Undefined => "undefined".to_owned(),
            Value::Array(_) => {
                return Err(CoercionError::ArrayCoercion { target: "string" }.into())
            }
        })
    }

    pub fn to_bool(&self) -> Result<bool> {
        Ok(self.to_real()? >= 0.5)
    }

    pub fn as_array(&self) -> Option<&GmArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Equality in the source language's loose sense: numeric between
    /// reals, lexical between strings, numeric after coercion between a
    /// real and a string, identity between arrays, and Undefined equal
    /// only to itself.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Real(a), Value::Str(b)) | (Value::Str(b), Value::Real(a)) => {
                *a == parse_real_prefix(b)
            }
            (Value::Undefined, Value::Undefined) => true,
            (Value::Array(a), Value::Array(b)) => a.same_identity(b),
            _ => false,
        }
    }

    /// Relational ordering for the compare opcodes.
    pub fn loose_cmp(&self, other: &Value) -> Result<Ordering> {
        if let (Value::Str(a), Value::Str(b)) = (self, other) {
            return Ok(a.cmp(b));
        }
        let a = self.to_real()?;
        let b = other.to_real()?;
        Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Real(v) => write!(f, "{}", format_real(*v)),
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(_) => write!(f, "<array>"),
            Value::Undefined => write!(f, "undefined"),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Real(f64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Rc::from(v.as_str()))
    }
}

/// Integers print without a decimal point; other reals print with two
/// places of precision, trailing zeros trimmed.
pub fn format_real(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        let s = format!("{:.2}", v);
        let s = s.trim_end_matches('0').trim_end_matches('.');
        s.to_owned()
    }
}

/// Longest leading numeric prefix; an empty or unparsable string is zero.
pub fn parse_real_prefix(s: &str) -> f64 {
    let s = s.trim_start();
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        match c {
            '+' | '-' if i == 0 => end = i + 1,
            '0'..='9' => end = i + 1,
            '.' if !seen_dot => {
                seen_dot = true;
                end = i + 1;
            }
            _ => break,
        }
    }
    s[..end].parse::<f64>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reals_format_like_the_source() {
        assert_eq!(format_real(3.0), "3");
        assert_eq!(format_real(-12.0), "-12");
        assert_eq!(format_real(0.5), "0.5");
        assert_eq!(format_real(3.14159), "3.14");
    }

    #[test]
    fn strings_coerce_by_prefix() {
        assert_eq!(parse_real_prefix("12.5abc"), 12.5);
        assert_eq!(parse_real_prefix("-3"), -3.0);
        assert_eq!(parse_real_prefix(""), 0.0);
        assert_eq!(parse_real_prefix("abc"), 0.0);
    }

    #[test]
    fn truthiness_uses_the_half_threshold() -> Result<()> {
        assert!(Value::Real(0.5).to_bool()?);
        assert!(!Value::Real(0.49).to_bool()?);
        assert!(!Value::Undefined.to_bool()?);
        Ok(())
    }

    #[test]
    fn arrays_fail_numeric_coercion() {
        assert!(Value::Array(GmArray::new()).to_real().is_err());
    }

    #[test]
    fn arrays_are_sparse_and_shared() {
        let a = GmArray::new();
        a.set(2, 3, Value::Real(5.0));
        assert!(matches!(a.get(1, 1), Value::Undefined));
        assert!(matches!(a.get(2, 3), Value::Real(v) if v == 5.0));

        let alias = a.clone();
        alias.set(0, 0, Value::Real(1.0));
        assert!(matches!(a.get(0, 0), Value::Real(v) if v == 1.0));
        assert!(a.same_identity(&alias));
        assert!(!a.same_identity(&GmArray::new()));
    }

    #[test]
    fn loose_equality_matches_the_rules() {
        assert!(Value::Real(3.0).loose_eq(&Value::string("3cm")));
        assert!(Value::Undefined.loose_eq(&Value::Undefined));
        assert!(!Value::Undefined.loose_eq(&Value::Real(0.0)));
        let a = Value::Array(GmArray::new());
        assert!(a.loose_eq(&a.clone()));
        assert!(!a.loose_eq(&Value::Array(GmArray::new())));
    }
}
