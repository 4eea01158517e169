//! Rupee amount parsing for price comparisons.

/// Parse a displayed rupee amount such as `₹1,29,999.00` into whole rupees.
///
/// Only text that starts with `₹` is considered a price.
pub fn parse_rupees(text: &str) -> Option<u64> {
    let amount = text.trim().strip_prefix('₹')?;
    let whole = amount.split('.').next()?.replace(',', "");
    whole.trim().parse().ok()
}

/// Original text of the largest rupee amount among `texts`.
pub fn largest_price<I, S>(texts: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    texts
        .into_iter()
        .filter_map(|t| {
            let text = t.as_ref().trim().to_string();
            parse_rupees(&text).map(|value| (value, text))
        })
        .max_by_key(|(value, _)| *value)
        .map(|(_, text)| text)
}

/// Amount in a loosely formatted price, keeping only digits and the
/// decimal point (`₹1,299.00`, `Rs. 499`, `1,299`).
fn parse_amount(text: &str) -> Option<f64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    digits.trim_matches('.').parse().ok()
}

/// Discount label such as `-48%`, truncated to whole percent. `None`
/// unless both amounts parse and `mrp` is above `price`.
pub fn discount_label(price: &str, mrp: &str) -> Option<String> {
    let price = parse_amount(price)?;
    let mrp = parse_amount(mrp)?;
    if mrp <= price {
        return None;
    }
    let pct = ((mrp - price) / mrp * 100.0) as u32;
    Some(format!("-{pct}%"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rupees() {
        assert_eq!(parse_rupees("₹1,29,999.00"), Some(129_999));
        assert_eq!(parse_rupees(" ₹499 "), Some(499));
        assert_eq!(parse_rupees("$499"), None);
        assert_eq!(parse_rupees("₹"), None);
    }

    #[test]
    fn test_largest_price_keeps_original_text() {
        let got = largest_price(["₹1,499.00", "-25%", "₹1,999.00", "₹999"]);
        assert_eq!(got.as_deref(), Some("₹1,999.00"));
    }

    #[test]
    fn test_largest_price_none_without_rupee_amounts() {
        assert_eq!(largest_price(["Currently unavailable", ""]), None);
    }

    #[test]
    fn test_discount_label() {
        assert_eq!(discount_label("₹1,299.00", "₹2,499.00").as_deref(), Some("-48%"));
        assert_eq!(discount_label("Rs. 750", "1,000").as_deref(), Some("-25%"));
        assert_eq!(discount_label("₹999", "₹999"), None);
        assert_eq!(discount_label("₹1,099", "₹999"), None);
        assert_eq!(discount_label("Price Not Found", "₹999"), None);
    }
}
