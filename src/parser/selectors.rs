//! CSS selectors for booking pages
//!
//! Title selectors are tried in order; the first non-empty match wins.

use lazy_static::lazy_static;
use scraper::Selector;

// Helper macro to parse selectors safely at compile time
macro_rules! parse_selector {
    ($s:expr) => {
        Selector::parse($s).expect(concat!("Invalid CSS selector: ", $s))
    };
}

lazy_static! {
    /// Page title candidates, most specific first
    pub static ref TITLE: Vec<Selector> = vec![
        parse_selector!("h1[data-testid=\"movie-title\"]"),
        parse_selector!("h1.movie-title"),
        parse_selector!(".movie-name h1"),
        parse_selector!("h1"),
        parse_selector!(".title"),
        parse_selector!("title"),
    ];

    /// Elements that can act as a booking control
    pub static ref CONTROLS: Selector = parse_selector!("button, a, [role=\"button\"]");
}

/// Elements whose text is never rendered
pub const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];
