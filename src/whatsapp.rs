//! WhatsApp inquiry deep links for the public storefront.
//!
//! Checkout is a conversation, not a cart: every catalog entry links to a
//! pre-filled `wa.me` chat so the buyer lands in WhatsApp with the product
//! already named.

/// Build the `https://wa.me/<number>?text=...` inquiry link for a product.
/// The message body is percent-encoded; the number is used as-is (digits,
/// country code first, no leading `+`).
pub fn inquiry_link(number: &str, product_name: &str) -> String {
    let message = format!("Hola VHF Decants, me interesa: {}", product_name);
    format!("https://wa.me/{}?text={}", number, urlencoding::encode(&message))
}
