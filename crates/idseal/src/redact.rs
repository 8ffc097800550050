//! Applies the codec to the record shapes that carry a protected identifier.
//!
//! The set of shapes and their protected paths is an explicit table, not a
//! reflective walk: a value is only ever opened or sealed if its path is
//! listed in [`protected_paths`]. Extend the table when a new shape starts
//! carrying an identifier.
//!
//! Input may be a single record, an array of records of the same shape, or
//! `null`. Fields outside the table pass through unchanged and missing
//! related objects stay missing.

use std::convert::Infallible;

use common::protocol::RecordShape;
use serde_json::Value;

use crate::codec::{CodecError, IdentifierCodec};

/// Dot-notation paths to the protected identifier within each shape.
pub fn protected_paths(shape: RecordShape) -> &'static [&'static str] {
    match shape {
        RecordShape::User => &["icNumber"],
        RecordShape::Application => &["icNumber", "user.icNumber"],
    }
}

/// Return a copy of `record` with every protected field opened.
///
/// Values that cannot be opened become `null`; see [`IdentifierCodec::open`].
pub fn open_record(codec: &IdentifierCodec, shape: RecordShape, record: &Value) -> Value {
    let mut out = record.clone();
    let opened: Result<(), Infallible> = for_each_record(&mut out, |rec| {
        apply_paths(rec, shape, &mut |s| {
            Ok(codec.open(Some(s)).map_or(Value::Null, Value::String))
        })
    });
    match opened {
        Ok(()) => out,
        Err(never) => match never {},
    }
}

/// Return a copy of `record` with every protected field sealed.
///
/// Values that already open as sealed envelopes under this codec are left as
/// they are. Anything else, including plaintext that happens to contain the
/// delimiter, is sealed.
///
/// # Errors
///
/// Returns [`CodecError`] if sealing any field fails.
pub fn seal_record(
    codec: &IdentifierCodec,
    shape: RecordShape,
    record: &Value,
) -> Result<Value, CodecError> {
    let mut out = record.clone();
    for_each_record(&mut out, |rec| {
        apply_paths(rec, shape, &mut |s| {
            if codec.opens_as_sealed(s) {
                return Ok(Value::String(s.to_owned()));
            }
            codec.seal_value(s).map(Value::String)
        })
    })?;
    Ok(out)
}

fn for_each_record<E>(
    value: &mut Value,
    mut f: impl FnMut(&mut Value) -> Result<(), E>,
) -> Result<(), E> {
    match value {
        Value::Array(items) => items.iter_mut().try_for_each(f),
        other => f(other),
    }
}

fn apply_paths<E>(
    record: &mut Value,
    shape: RecordShape,
    f: &mut impl FnMut(&str) -> Result<Value, E>,
) -> Result<(), E> {
    for path in protected_paths(shape) {
        let segments: Vec<&str> = path.split('.').collect();
        transform_at_path(record, &segments, f)?;
    }
    Ok(())
}

/// Navigate `value` along `segments` and replace a string leaf with `f(leaf)`.
///
/// Non-string leaves (including `null`) and missing intermediate objects are
/// left untouched.
fn transform_at_path<E>(
    value: &mut Value,
    segments: &[&str],
    f: &mut impl FnMut(&str) -> Result<Value, E>,
) -> Result<(), E> {
    let Some((head, rest)) = segments.split_first() else {
        if let Value::String(s) = value {
            let replacement = f(s.as_str())?;
            *value = replacement;
        }
        return Ok(());
    };
    if let Value::Object(map) = value {
        if let Some(child) = map.get_mut(*head) {
            transform_at_path(child, rest, f)?;
        }
    }
    Ok(())
}
