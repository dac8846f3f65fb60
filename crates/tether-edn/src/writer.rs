//! Canonical EDN writer.
//!
//! Serialises a [`Value`] such that reading the output back produces a
//! structurally equal value. Map and set entries are written in insertion
//! order, keeping serialised protocol messages deterministic.

use std::fmt::Write as _;

use crate::value::{Tagged, Value};

/// Serialises a value to canonical EDN text.
#[must_use]
pub fn write(value: &Value) -> String {
    let mut out = String::new();
    write_to(&mut out, value);
    out
}

/// Serialises a value onto the end of `out`.
pub fn write_to(out: &mut String, value: &Value) {
    match value {
        Value::Nil => out.push_str("nil"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Int(number) => {
            let _ = write!(out, "{number}");
        }
        Value::Float(number) => write_float(out, *number),
        Value::Ratio(ratio) => {
            let _ = write!(out, "{ratio}");
        }
        Value::Char(c) => write_char(out, *c),
        Value::String(text) => write_string(out, text),
        Value::Symbol(symbol) => {
            let _ = write!(out, "{symbol}");
        }
        Value::Keyword(keyword) => {
            let _ = write!(out, "{keyword}");
        }
        Value::List(items) => write_seq(out, '(', items, ')'),
        Value::Vector(items) => write_seq(out, '[', items, ']'),
        Value::Map(map) => {
            out.push('{');
            for (index, (key, value)) in map.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                write_to(out, key);
                out.push(' ');
                write_to(out, value);
            }
            out.push('}');
        }
        Value::Set(set) => {
            out.push_str("#{");
            for (index, member) in set.iter().enumerate() {
                if index > 0 {
                    out.push(' ');
                }
                write_to(out, member);
            }
            out.push('}');
        }
        Value::Tagged(Tagged { tag, value }) => {
            let _ = write!(out, "#{tag} ");
            write_to(out, value);
        }
    }
}

fn write_seq(out: &mut String, open: char, items: &[Value], close: char) {
    out.push(open);
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.push(' ');
        }
        write_to(out, item);
    }
    out.push(close);
}

fn write_float(out: &mut String, number: f64) {
    if number.is_nan() {
        out.push_str("##NaN");
    } else if number == f64::INFINITY {
        out.push_str("##Inf");
    } else if number == f64::NEG_INFINITY {
        out.push_str("##-Inf");
    } else {
        // Debug formatting is the shortest representation that parses back
        // to the same bits, and always marks the value as a float.
        let _ = write!(out, "{number:?}");
    }
}

fn write_char(out: &mut String, c: char) {
    match c {
        '\n' => out.push_str("\\newline"),
        ' ' => out.push_str("\\space"),
        '\t' => out.push_str("\\tab"),
        '\r' => out.push_str("\\return"),
        '\u{000C}' => out.push_str("\\formfeed"),
        '\u{0008}' => out.push_str("\\backspace"),
        c if c.is_control() => {
            let _ = write!(out, "\\u{:04x}", u32::from(c));
        }
        c => {
            out.push('\\');
            out.push(c);
        }
    }
}

fn write_string(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{000C}' => out.push_str("\\f"),
            '\u{0008}' => out.push_str("\\b"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
