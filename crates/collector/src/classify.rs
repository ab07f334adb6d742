//! Keyword classification and the data-center "hunter" score.

use power_models::{ProjectRecord, ProjectType};

/// Keywords that would otherwise fire inside unrelated words ("ct" in "project",
/// "colo" in "colorado", "meta" in "metal").
const WHOLE_WORD_KEYWORDS: &[&str] = &["ct", "pv", "aws", "qts", "colo", "meta"];

const CATEGORIES: &[(ProjectType, &[&str])] = &[
    (
        ProjectType::Datacenter,
        &[
            "data center",
            "datacenter",
            "cloud",
            "hyperscale",
            "colocation",
            "microsoft",
            "amazon",
            "google",
            "meta",
            "aws",
        ],
    ),
    (ProjectType::Storage, &["battery", "storage", "bess"]),
    (ProjectType::Solar, &["solar", "photovoltaic", "pv"]),
    (ProjectType::Wind, &["wind", "offshore"]),
    (
        ProjectType::Gas,
        &["natural gas", "gas turbine", "combined cycle", "peaker", "ct", "ccgt"],
    ),
    (ProjectType::Nuclear, &["nuclear"]),
    (ProjectType::Hydro, &["hydro"]),
];

const DC_KEYWORDS: &[&str] = &[
    "data center",
    "datacenter",
    "hyperscale",
    "cloud",
    "colocation",
    "colo",
];

const TECH_COMPANIES: &[&str] = &[
    "amazon",
    "aws",
    "microsoft",
    "azure",
    "google",
    "meta",
    "facebook",
    "digitalrealty",
    "equinix",
    "cyrusone",
    "qts",
];

const LOAD_INDICATORS: &[&str] = &["load", "demand", "behind-meter"];

const HOTSPOTS: &[(&str, i64)] = &[
    ("loudoun", 20),
    ("ashburn", 20),
    ("fairfax", 18),
    ("santa clara", 17),
];

const NOT_DC: &[&str] = &["solar", "wind", "battery"];

/// Score at or above which a project is treated as a data center regardless of keywords.
pub const DATACENTER_SCORE_THRESHOLD: i64 = 60;

/// Lowercased text plus its alphanumeric words, for keyword lookups.
struct Haystack {
    text: String,
    words: Vec<String>,
}

impl Haystack {
    fn new(parts: &[&str]) -> Self {
        let text = parts.join(" ").to_lowercase();
        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        Self { text, words }
    }

    fn contains(&self, keyword: &str) -> bool {
        if WHOLE_WORD_KEYWORDS.contains(&keyword) {
            self.words.iter().any(|w| w == keyword)
        } else {
            self.text.contains(keyword)
        }
    }

    fn contains_any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.contains(k))
    }
}

pub fn classify_project(name: &str, customer: &str, fuel_type: &str) -> ProjectType {
    let haystack = Haystack::new(&[name, customer, fuel_type]);
    CATEGORIES
        .iter()
        .find(|(_, keywords)| haystack.contains_any(keywords))
        .map(|(kind, _)| *kind)
        .unwrap_or(ProjectType::Other)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunterScore {
    pub score: i64,
    pub notes: String,
}

/// Scores how likely a queue entry is a data-center load, from 0 to 100.
pub fn hunter_score(record: &ProjectRecord) -> HunterScore {
    let combined = Haystack::new(&[&record.project_name, &record.customer, &record.fuel_type]);
    let fuel = record.fuel_type.to_lowercase();
    let location = format!("{} {}", record.county, record.state).to_lowercase();

    let mut score: i64 = 0;
    let mut signals: Vec<String> = Vec::new();

    if combined.contains_any(DC_KEYWORDS) {
        score += 40;
        signals.push("DC keyword".to_string());
    }

    if combined.contains_any(TECH_COMPANIES) {
        score += 25;
        signals.push("Tech company".to_string());
    }

    let cap = record.capacity_mw;
    if cap >= 500.0 {
        score += 15;
        signals.push(format!("{cap:.1}MW"));
    } else if cap >= 300.0 {
        score += 10;
    } else if cap >= 200.0 {
        score += 5;
    }

    if LOAD_INDICATORS.iter().any(|w| fuel.contains(w)) {
        score += 10;
        signals.push("Load-only".to_string());
    }

    if let Some((place, points)) = HOTSPOTS.iter().find(|(place, _)| location.contains(place)) {
        score += points;
        signals.push(format!("Hotspot: {}", title_case(place)));
    }

    if combined.contains_any(NOT_DC) {
        score = (score - 25).max(0);
        signals.push("Not DC".to_string());
    }

    let notes = if signals.is_empty() {
        "No signals".to_string()
    } else {
        signals.into_iter().take(3).collect::<Vec<_>>().join(" | ")
    };

    HunterScore {
        score: score.clamp(0, 100),
        notes,
    }
}

fn title_case(value: &str) -> String {
    value
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
