/// Formats a USD amount in millions with two decimals: `1_234_567.0` -> `"$1.23M"`.
pub fn format_millions(value: f64) -> String {
    format!("${:.2}M", value / 1_000_000.0)
}

/// Rounds to whole units and groups thousands: `-1234567.8` -> `"-1,234,568"`.
pub fn format_thousands(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Capitalizes the first letter and lowercases the rest: `"JUNE"` -> `"June"`.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
