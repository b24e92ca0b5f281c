//! Prompt assembly for one conversational turn.

use crate::lookup::ProductHit;

/// The reply that replaces the in-flight message when the primary
/// channel fails. Fixed text, no partial content is preserved.
pub const APOLOGY: &str = "Xin lỗi, tôi đang gặp chút trục trặc và chưa thể \
trả lời ngay. Bạn vui lòng thử lại sau ít phút nhé!";

/// The assistant greeting seeded into a fresh transcript.
pub const DEFAULT_GREETING: &str = "Xin chào! Mình là trợ lý của nhà hàng. \
Bạn cần tư vấn gì về thực đơn hay dịch vụ tiệc không?";

/// Builds the product introduction block: one line per hit, terminated
/// by a newline, or an empty string for zero hits. The block prefixes
/// the reply message before any streamed text.
pub fn product_intro(hits: &[ProductHit]) -> String {
    let mut intro = String::new();
    for hit in hits {
        intro.push_str("• ");
        intro.push_str(&hit.name);
        intro.push_str(" — ");
        intro.push_str(&format_price(hit.price));
        intro.push_str("đ\n");
    }
    intro
}

/// Builds the final user turn sent upstream.
///
/// With no hits this is the raw user text, unmodified. With hits, the
/// raw text is discarded for this turn and replaced by a prompt asking
/// the model to elaborate on every matched product name.
pub fn augmented_prompt(raw: &str, hits: &[ProductHit]) -> String {
    if hits.is_empty() {
        return raw.to_owned();
    }
    let names = hits
        .iter()
        .map(|hit| hit.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Hãy giới thiệu chi tiết về các món sau trong thực đơn của nhà \
         hàng: {names}."
    )
}

/// Formats a price with dot thousand separators, the way the storefront
/// displays amounts.
fn format_price(price: u64) -> String {
    let digits = price.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(name: &str, price: u64) -> ProductHit {
        ProductHit {
            id: 1,
            name: name.to_owned(),
            price,
        }
    }

    #[test]
    fn test_prompt_without_hits_is_raw_text() {
        assert_eq!(augmented_prompt("giờ mở cửa", &[]), "giờ mở cửa");
    }

    #[test]
    fn test_prompt_with_hits_references_every_name() {
        let hits = [hit("Phở", 45000), hit("Bún", 40000)];
        let prompt = augmented_prompt("phở hay bún?", &hits);
        assert!(prompt.contains("Phở"));
        assert!(prompt.contains("Bún"));
        // The raw text is discarded for this turn.
        assert!(!prompt.contains("phở hay bún?"));
    }

    #[test]
    fn test_intro_is_one_line_per_hit() {
        let hits = [hit("Phở", 45000), hit("Bún", 40000)];
        let intro = product_intro(&hits);
        assert_eq!(intro.lines().count(), 2);
        assert!(intro.starts_with("• Phở — 45.000đ\n"));
        assert!(intro.ends_with("• Bún — 40.000đ\n"));
    }

    #[test]
    fn test_intro_empty_without_hits() {
        assert_eq!(product_intro(&[]), "");
    }

    #[test]
    fn test_price_grouping() {
        assert_eq!(format_price(0), "0");
        assert_eq!(format_price(999), "999");
        assert_eq!(format_price(45000), "45.000");
        assert_eq!(format_price(1250000), "1.250.000");
    }
}
