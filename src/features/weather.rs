//! Weather text normalization
//!
//! Race-day weather arrives as scraped free text (HTML fragments, icon glyphs,
//! glued words, footnote markers, temperature ranges). `WeatherNormalizer`
//! turns it into a short lower-case phrase by folding an ordered list of
//! rewrite rules over the text. Each rule sees the output of the previous one.

use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::sync::OnceLock;

static NORMALIZER: OnceLock<WeatherNormalizer> = OnceLock::new();

/// Literal substitutions, applied first
const CHARACTER_REPLACEMENTS: &[(&str, &str)] = &[
    ("\u{a0}", " "),
    ("º", "°"),
    ("&amp;", ""),
    (",", " "),
    ("/>", ""),
    ("/p>", ""),
    ("p>", ""),
    ("/a>", ""),
    ("<p>", ""),
    ("</p>", ""),
    ("<br>", " "),
    ("<br/>", " "),
    ("☁", "clouds"),
    ("☂", "rain"),
    ("<", ""),
    (">", ""),
    ("weather:", ""),
    ("/", " "),
    (";", " "),
    (":", " "),
    ("(", " "),
    (")", " "),
];

/// Glued-word repairs, applied after the character pass
const SPACING_FIXES: &[(&str, &str)] = &[
    ("dryovercast", "dry overcast"),
    ("dryclouded", "dry clouded"),
    ("drysunny", "dry sunny"),
    ("dryclear", "dry clear"),
    ("clear26°c", "clear 26°c"),
    ("overcast22°c", "overcast 22°c"),
    ("sunny", "sunny "),
    ("temperature", "temperature "),
    ("cloudy", "cloudy "),
    ("clear", "clear "),
    ("later", "later "),
    ("dry", "dry "),
    ("times", "times "),
];

pub const CONDITION_KEYWORDS: &[&str] = &[
    "sunny",
    "cloudy",
    "overcast",
    "rain",
    "wet",
    "dry",
    "clear",
    "warm",
    "hot",
    "cold",
    "cool",
    "humid",
    "windy",
    "partly",
    "scattered",
    "showers",
];

enum Rule {
    Literal {
        from: &'static str,
        to: &'static str,
    },
    Pattern {
        regex: Regex,
        to: &'static str,
    },
    /// `<a><sep><b>` becomes the mean of a and b
    RangeAverage(Regex),
}

impl Rule {
    fn apply(&self, text: String) -> String {
        match self {
            Rule::Literal { from, to } => text.replace(from, to),
            Rule::Pattern { regex, to } => regex.replace_all(&text, *to).into_owned(),
            Rule::RangeAverage(regex) => regex
                .replace_all(&text, |caps: &Captures| average_range(caps))
                .into_owned(),
        }
    }
}

fn average_range(caps: &Captures) -> String {
    let low = caps[1].parse::<f64>();
    let high = caps[2].parse::<f64>();
    match (low, high) {
        (Ok(low), Ok(high)) => format_decimal((low + high) / 2.0),
        _ => caps[0].to_string(),
    }
}

/// Render with at least one decimal place: 25.0, 22.5
fn format_decimal(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Ordered weather rewrite pipeline
pub struct WeatherNormalizer {
    rules: Vec<Rule>,
    whitespace: Regex,
    temperature_patterns: Vec<Regex>,
}

impl Default for WeatherNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherNormalizer {
    pub fn new() -> Self {
        let mut rules: Vec<Rule> = Vec::new();

        for &(from, to) in CHARACTER_REPLACEMENTS.iter().chain(SPACING_FIXES) {
            rules.push(Rule::Literal { from, to });
        }

        // Footnote markers such as [12]
        rules.push(Rule::Pattern {
            regex: Regex::new(r"\[\d+\]").unwrap(),
            to: "",
        });

        rules.push(Rule::RangeAverage(
            Regex::new(r"(\d+\.?\d*)\s*-\s*(\d+\.?\d*)").unwrap(),
        ));
        rules.push(Rule::RangeAverage(
            Regex::new(r"(\d+\.?\d*)–(\d+\.?\d*)").unwrap(),
        ));
        rules.push(Rule::RangeAverage(
            Regex::new(r"(\d+\.?\d*)\s+to\s+(\d+\.?\d*)").unwrap(),
        ));

        rules.push(Rule::Pattern {
            regex: Regex::new(r"temperature\s+s\b").unwrap(),
            to: "temperatures",
        });
        rules.push(Rule::Pattern {
            regex: Regex::new(r"\s+ing[\s.,:;]+").unwrap(),
            to: "ing ",
        });

        Self {
            rules,
            whitespace: Regex::new(r"\s+").unwrap(),
            temperature_patterns: vec![
                Regex::new(r"(\d+\.?\d*)\s*°\s*c").unwrap(),
                Regex::new(r"(\d+\.?\d*)\s*degrees?\s*c").unwrap(),
                Regex::new(r"(\d+\.?\d*)c\b").unwrap(),
            ],
        }
    }

    /// Shared instance with compiled patterns
    pub fn global() -> &'static WeatherNormalizer {
        NORMALIZER.get_or_init(WeatherNormalizer::new)
    }

    /// Normalize raw weather text. Never fails; sentinels become "".
    pub fn clean(&self, raw: Option<&str>) -> String {
        let text = match raw {
            Some(text) => text.to_lowercase(),
            None => return String::new(),
        };
        if matches!(text.trim(), "" | "none" | "nan") {
            return String::new();
        }

        let text = self.rules.iter().fold(text, |acc, rule| rule.apply(acc));
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }

    /// First temperature reading in cleaned text, in Celsius
    pub fn extract_temperature(&self, clean_text: &str) -> Option<f64> {
        if clean_text.is_empty() {
            return None;
        }
        self.temperature_patterns.iter().find_map(|pattern| {
            pattern
                .captures(clean_text)
                .and_then(|caps| caps[1].parse::<f64>().ok())
        })
    }

    pub fn extract_conditions(&self, clean_text: &str) -> BTreeSet<&'static str> {
        CONDITION_KEYWORDS
            .iter()
            .copied()
            .filter(|keyword| clean_text.contains(keyword))
            .collect()
    }
}

pub fn clean_weather(raw: Option<&str>) -> String {
    WeatherNormalizer::global().clean(raw)
}

pub fn extract_temperature(clean_text: &str) -> Option<f64> {
    WeatherNormalizer::global().extract_temperature(clean_text)
}

pub fn extract_conditions(clean_text: &str) -> BTreeSet<&'static str> {
    WeatherNormalizer::global().extract_conditions(clean_text)
}
