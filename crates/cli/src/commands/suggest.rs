//! Suggestion command.
//!
//! Types `text` into the suggestion box one character at a time, the way a
//! user would, so only the final prefix reaches the server.

use std::time::Duration;

use bazaar_client::Storefront;

use super::product_line;

const KEYSTROKE_INTERVAL: Duration = Duration::from_millis(40);
const MAX_WAIT: Duration = Duration::from_secs(35);

/// Show suggestions for `text`.
#[allow(clippy::print_stdout)]
pub async fn run(storefront: &Storefront, text: &str) {
    let suggestions = storefront.suggestions();
    let mut updates = suggestions.subscribe();

    let mut typed = String::new();
    for ch in text.chars() {
        typed.push(ch);
        suggestions.input(&typed);
        tokio::time::sleep(KEYSTROKE_INTERVAL).await;
    }

    let wanted = text.trim().to_string();
    let min_chars = storefront.config().suggest.min_chars;
    if wanted.chars().count() < min_chars {
        println!("Type at least {min_chars} characters");
        return;
    }

    let arrived = tokio::time::timeout(MAX_WAIT, updates.wait_for(|s| s.query == wanted)).await;
    match arrived {
        Ok(Ok(current)) if current.products.is_empty() => println!("No matches for \"{wanted}\""),
        Ok(Ok(current)) => {
            for product in &current.products {
                println!("{}", product_line(product));
            }
        }
        _ => println!("No suggestions (see log for details)"),
    }
}
