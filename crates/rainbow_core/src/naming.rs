//! Slot names: `prefix`, `prefix.0001`, `prefix.0002`, ...

/// Name of slot `index`. Slot 0 is the bare prefix; other slots get a dot and
/// the index zero-padded to `digits` (wider numbers are printed as is).
pub fn slot_name(prefix: &str, digits: usize, index: usize) -> String {
    if index == 0 {
        return prefix.to_string();
    }
    format!("{prefix}.{index:0digits$}")
}

/// True for `prefix` itself or `prefix.` followed by one or more ASCII digits.
pub fn is_slot_name(prefix: &str, candidate: &str) -> bool {
    match candidate.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix('.')
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())),
        None => false,
    }
}

pub fn count_slot_names<'a, I>(prefix: &str, names: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .filter(|name| is_slot_name(prefix, name))
        .count()
}
