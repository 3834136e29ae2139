//! Every text the customer can receive, in one place. Roman Hinglish
//! throughout, matching how the orders arrive.

use rust_decimal::Decimal;

use parchi_core::domain::business::Business;
use parchi_core::domain::draft::DraftAction;
use parchi_core::domain::inventory::InventoryItem;
use parchi_core::resolve::ProductMatch;

pub fn welcome(business: &Business) -> String {
    format!(
        "Namaste! Ye {} ka order assistant hai.\n\
         Medicine ka naam bhejo, stock pucho, ya seedha order likho \
         (jaise: Rahul ko 10 Dolo 650). 'help' se poori list milegi.",
        business.name
    )
}

pub fn help() -> String {
    "Aap ye sab likh sakte ho:\n\
     - Stock: 'Dolo 650 hai kya'\n\
     - Price: 'Dolo 650 kitne ka'\n\
     - Symptom: 'bukhar ki dawai'\n\
     - Order: 'Rahul ko 10 Dolo 650' ya sirf 'dolo chahiye'\n\
     - Order rokna: 'cancel'\n\
     Order confirm hone par draft banta hai; bill owner ki approval ke baad hi banega."
        .to_string()
}

pub fn unknown() -> String {
    "Samajh nahi aaya. 'help' bhejo, main batata hoon kya kya kar sakta hoon.".to_string()
}

pub fn unknown_command(verb: &str) -> String {
    format!("'{verb}' command nahi samjha. '/help' try karo.")
}

pub fn cancelled() -> String {
    "Theek hai, order cancel kar diya.".to_string()
}

pub fn ask_product() -> String {
    "Kaun si medicine chahiye?".to_string()
}

pub fn ask_quantity(product_name: &str) -> String {
    format!("{product_name} kitne chahiye? Number bhejo (jaise 2 ya 10).")
}

pub fn ask_customer() -> String {
    "Kiske naam pe order likhun? Apne liye ho to 'mere liye' likho.".to_string()
}

/// The full confirmation card. Price lines come from the live inventory
/// row fetched just before this is shown, never from extraction time.
pub fn confirmation(seller: &str, buyer: &str, item: &InventoryItem, quantity: i64) -> String {
    let total = (item.unit_price * Decimal::from(quantity)).round_dp(2);
    let mut text = format!(
        "Order confirm karo:\n\
         Seller: {seller}\n\
         Buyer: {buyer}\n\
         Product: {}\n\
         Quantity: {quantity}\n\
         Price: \u{20b9}{} x {quantity} = \u{20b9}{total}",
        item.name,
        item.unit_price.round_dp(2),
    );
    if item.requires_prescription {
        text.push_str("\nNote: iske liye doctor ka prescription dikhana hoga.");
    }
    text.push_str("\n'confirm' bhejo to order draft ban jayega, 'cancel' se roko.");
    text
}

pub fn draft_created(action: &DraftAction) -> String {
    format!(
        "Order draft #{} ban gaya!\n{}\nOwner approve karega tab bill banega.",
        action.id.0, action.explanation
    )
}

pub fn draft_failed() -> String {
    "Order draft nahi ban paya. Phir se shuru karte hain - medicine ka naam bhejo.".to_string()
}

pub fn product_vanished() -> String {
    "Ye medicine ab catalog mein nahi hai, order aage nahi badh paya. Phir se try karo."
        .to_string()
}

pub fn stock_reply(found: &ProductMatch) -> String {
    if found.stock_quantity <= 0 {
        return format!("{} abhi stock mein nahi hai.", found.canonical_name);
    }
    let mut text = format!(
        "{} available hai - \u{20b9}{} per unit, {} stock mein.",
        found.canonical_name,
        found.unit_price.round_dp(2),
        found.stock_quantity
    );
    if found.requires_prescription {
        text.push_str("\nNote: iske liye doctor ka prescription lagega.");
    }
    text
}

pub fn price_reply(found: &ProductMatch) -> String {
    format!("{}: \u{20b9}{} per unit.", found.canonical_name, found.unit_price.round_dp(2))
}

pub fn symptom_reply(matches: &[&InventoryItem]) -> String {
    if matches.is_empty() {
        return "Is takleef ke liye dukaan mein koi dawai nahi mili. \
                Doctor se salah lena theek rahega."
            .to_string();
    }
    let mut text = String::from("Ye dawaiyan kaam aa sakti hain:");
    for item in matches {
        text.push_str(&format!("\n- {} (\u{20b9}{})", item.name, item.unit_price.round_dp(2)));
        if item.requires_prescription {
            text.push_str(" [prescription]");
        }
    }
    text
}

pub fn did_you_mean(phrase: &str, suggestions: &[ProductMatch]) -> String {
    if suggestions.is_empty() {
        return format!("'{phrase}' humare paas nahi hai. Naam check karke phir se bhejo.");
    }
    let mut text = format!("'{phrase}' exact nahi mila. Kya aapka matlab tha:");
    for suggestion in suggestions {
        text.push_str(&format!("\n- {}", suggestion.canonical_name));
    }
    text
}
