use crate::types::CanonicalPlate;

/// Keeps ASCII letters and digits, uppercased, in their original order.
/// Total over all inputs; the empty string maps to the empty plate.
pub fn canonicalize(text: &str) -> CanonicalPlate {
    CanonicalPlate(
        text.chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect(),
    )
}
