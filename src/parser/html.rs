//! Text and control extraction from booking page HTML

use scraper::{ElementRef, Html};

use crate::parser::selectors::{CONTROLS, HIDDEN_TAGS, TITLE};
use crate::utils::normalize_whitespace;

/// A clickable element found on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    /// Normalized element text
    pub text: String,
    /// False when the element is marked disabled in any way
    pub enabled: bool,
}

/// Extract the page title using the first matching title selector
pub fn extract_title(document: &Html) -> Option<String> {
    TITLE.iter().find_map(|selector| {
        document
            .select(selector)
            .map(|el| element_text(&el))
            .find(|text| !text.is_empty())
    })
}

/// Collect the rendered text of the document
///
/// Text inside `script`, `style` and similar non-rendered elements is skipped,
/// as is the text of disabled controls.
pub fn visible_text(document: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().filter_map(ElementRef::wrap).any(|el| {
            HIDDEN_TAGS.contains(&el.value().name()) || (CONTROLS.matches(&el) && is_disabled(&el))
        });

        if !hidden {
            parts.push(&**text);
        }
    }

    normalize_whitespace(&parts.join(" "))
}

/// Collect buttons, links and `role="button"` elements with their state
pub fn controls(document: &Html) -> Vec<Control> {
    document
        .select(&CONTROLS)
        .map(|el| Control {
            text: element_text(&el),
            enabled: !is_disabled(&el),
        })
        .filter(|control| !control.text.is_empty())
        .collect()
}

fn element_text(el: &ElementRef<'_>) -> String {
    normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

fn is_disabled(el: &ElementRef<'_>) -> bool {
    let value = el.value();

    value.attr("disabled").is_some()
        || value
            .attr("aria-disabled")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
        || value
            .classes()
            .any(|class| class.eq_ignore_ascii_case("disabled"))
}
