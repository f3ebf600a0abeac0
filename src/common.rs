pub(crate) mod constants;

/// Formats the `[name] ` prefix of log lines for a named table.
#[cfg(feature = "logging")]
pub(crate) fn name_prefix(name: Option<&str>) -> String {
    name.map(|name| format!("[{name}] ")).unwrap_or_default()
}

/// Returns `true` if `n` is a power of two no smaller than 2.
pub(crate) fn is_valid_array_len(n: usize) -> bool {
    n >= 2 && n.is_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::is_valid_array_len;

    #[test]
    fn array_lengths() {
        assert!(is_valid_array_len(2));
        assert!(is_valid_array_len(32));
        assert!(!is_valid_array_len(0));
        assert!(!is_valid_array_len(1));
        assert!(!is_valid_array_len(48));
    }
}
