/// Normalizes a name by stripping surrounding whitespace and composing
/// it into Unicode Normalization Form C, so that decomposed input (e.g.
/// `a` followed by a combining ring) compares equal to precomposed input.
///
/// ```
/// use genealogy::normalization::normalize_name;
/// assert_eq!(normalize_name(" A\u{030a}sa "), "\u{00c5}sa");
/// ```
pub fn normalize_name(name: impl AsRef<str>) -> String {
    use unicode_normalization::UnicodeNormalization;

    name.as_ref().trim().nfc().collect()
}
