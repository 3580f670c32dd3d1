//! Business-purpose inference.
//!
//! Keyword heuristics over finding text. Table order is the tie-break, so
//! the inferred domain is stable across runs.

const DOMAINS: &[(&str, &[&str])] = &[
    ("payments", &["payment", "billing", "invoice", "charge", "refund"]),
    ("ordering", &["order", "cart", "checkout", "shipment", "purchase"]),
    ("customer management", &["customer", "account", "profile", "address"]),
    ("authentication", &["login", "logout", "auth", "password", "credential"]),
    ("inventory", &["inventory", "stock", "warehouse", "sku"]),
    ("reporting", &["report", "export", "summary", "statement"]),
    ("validation", &["validate", "validation", "verify", "check"]),
];

/// Pick the domain with the most keyword hits; `None` when nothing matches.
pub fn infer_business_purpose(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let mut best: Option<(&str, usize)> = None;
    for (domain, keywords) in DOMAINS {
        let hits: usize = keywords.iter().map(|k| lower.matches(k).count()).sum();
        if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
            best = Some((domain, hits));
        }
    }
    best.map(|(domain, _)| domain.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_dominant_domain() {
        let text = "OrderService submits the order and the cart to checkout";
        assert_eq!(infer_business_purpose(text), Some("ordering".to_string()));
    }

    #[test]
    fn silent_on_neutral_text() {
        assert_eq!(infer_business_purpose("int add(int a, int b)"), None);
    }

    #[test]
    fn inference_is_deterministic() {
        let text = "validate the payment amount before charge";
        assert_eq!(infer_business_purpose(text), infer_business_purpose(text));
    }
}
