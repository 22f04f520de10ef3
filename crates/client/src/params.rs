//! Numbered-member parameter serialization.
//!
//! Query-style APIs expect list-valued parameters flattened into indexed
//! flat keys: `Label.1`, `Label.2`, ... for scalar lists and
//! `Label.1.Field` for lists of named-field tuples. Indexing is 1-based
//! and follows the caller-supplied order.

use std::collections::BTreeMap;

use crate::errors::ClientError;

/// Key for the `index`-th member of a list-valued parameter.
///
/// A `%d` placeholder in the label is substituted with the index;
/// otherwise the index is appended as a new dotted segment.
fn member_key(label: &str, index: usize) -> String {
    if label.contains("%d") {
        label.replacen("%d", &index.to_string(), 1)
    } else {
        format!("{label}.{index}")
    }
}

/// Flatten a scalar list into numbered members, mutating `params` in place.
///
/// `build_list_params(&mut p, ["foo", "bar"], "Name.member")` adds
/// `Name.member.1=foo` and `Name.member.2=bar`. An empty item sequence
/// adds nothing.
pub fn build_list_params<I, S>(params: &mut BTreeMap<String, String>, items: I, label: &str)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for (position, item) in items.into_iter().enumerate() {
        params.insert(member_key(label, position + 1), item.into());
    }
}

/// Flatten a list of named-field tuples into numbered members.
///
/// Each item contributes one entry per field position, keyed
/// `label.{index}.{field_name}`. Every item's arity must equal
/// `field_names.len()`; a mismatch is a caller contract violation and
/// fails fast without emitting partial output.
///
/// # Errors
///
/// Returns [`ClientError::SerializationContract`] on arity mismatch.
pub fn build_complex_list_params(
    params: &mut BTreeMap<String, String>,
    items: &[&[&str]],
    label: &str,
    field_names: &[&str],
) -> Result<(), ClientError> {
    for (position, item) in items.iter().enumerate() {
        if item.len() != field_names.len() {
            return Err(ClientError::SerializationContract(format!(
                "item {} has {} fields, expected {}",
                position + 1,
                item.len(),
                field_names.len()
            )));
        }
    }

    for (position, item) in items.iter().enumerate() {
        let prefix = member_key(label, position + 1);
        for (field, value) in field_names.iter().zip(item.iter()) {
            params.insert(format!("{prefix}.{field}"), (*value).to_string());
        }
    }

    Ok(())
}

/// Form-encode a flat parameter mapping as `k=v&k=v` with percent-encoded
/// keys and values.
///
/// `BTreeMap` iteration is key-ordered, so the output is deterministic for
/// a given mapping regardless of insertion history.
pub fn form_encode(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
