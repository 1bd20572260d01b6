use std::sync::LazyLock;

use regex::Regex;

/// Boolean operators that mark a query as already written in filter syntax.
static STRUCTURED_OPERATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(AND|OR)\b").expect("static regex"));

const SERVICE_WORDS: &[&str] = &["service", "api", "server"];
const SERVICE_STOP_WORDS: &[&str] = &[
    "logs", "log", "from", "for", "in", "the", "check", "show", "find",
];
const GENERIC_STOP_WORDS: &[&str] = &[
    "logs", "from", "for", "in", "the", "and", "or", "with", "check", "show", "find", "get",
];

/// Result of normalisation together with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub query: String,
    pub rule: &'static str,
}

struct Input<'a> {
    original: &'a str,
    lower: String,
}

impl Input<'_> {
    fn contains_any(&self, needles: &[&str]) -> bool {
        needles.iter().any(|n| self.lower.contains(n))
    }

    fn has_word(&self, words: &[&str]) -> bool {
        self.lower.split_whitespace().any(|t| words.contains(&t))
    }
}

type Rewrite = fn(&Input<'_>) -> Option<String>;

/// Rewrite rules, evaluated top to bottom; the first `Some` wins.
/// Order is significant and must not change.
const RULES: &[(&str, Rewrite)] = &[
    ("service", service_terms),
    ("error", |q| fixed(q, &["error"], "status:error OR *error*")),
    ("warn", |q| fixed(q, &["warn"], "status:warn OR *warn*")),
    ("auth", |q| {
        fixed(q, &["auth", "login", "token"], "*auth* OR *login* OR *token*")
    }),
    ("database", |q| {
        fixed(q, &["database", "db", "sql"], "*database* OR *db* OR *sql*")
    }),
    ("payment", |q| {
        fixed(q, &["payment", "transaction"], "*payment* OR *transaction*")
    }),
    ("keywords", keyword_terms),
];

/// 查询归一化器：把自由文本改写为后端过滤语法。
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryNormalizer;

impl QueryNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, query: &str) -> String {
        self.classify(query).query
    }

    pub fn classify(&self, query: &str) -> Normalized {
        if is_structured(query) {
            return Normalized {
                query: query.to_string(),
                rule: "structured",
            };
        }

        let input = Input {
            original: query,
            lower: query.to_lowercase(),
        };
        for (name, rewrite) in RULES {
            if let Some(out) = rewrite(&input) {
                return Normalized {
                    query: out,
                    rule: *name,
                };
            }
        }

        Normalized {
            query: format!("*{}*", input.original),
            rule: "wildcard",
        }
    }
}

/// Shorthand for `QueryNormalizer::new().normalize(query)`.
pub fn normalize(query: &str) -> String {
    QueryNormalizer::new().normalize(query)
}

/// A colon or a standalone `AND`/`OR` means the caller already wrote filter syntax.
pub fn is_structured(query: &str) -> bool {
    query.contains(':') || STRUCTURED_OPERATOR.is_match(query)
}

fn fixed(input: &Input<'_>, needles: &[&str], clause: &str) -> Option<String> {
    input.contains_any(needles).then(|| clause.to_string())
}

fn service_terms(input: &Input<'_>) -> Option<String> {
    // Whole words only, matching what gets stripped below.
    if !input.has_word(SERVICE_WORDS) {
        return None;
    }
    let terms: Vec<&str> = input
        .lower
        .split_whitespace()
        .filter(|t| !SERVICE_WORDS.contains(t) && !SERVICE_STOP_WORDS.contains(t))
        .collect();
    // Nothing left to name a service with; let the later rules have it.
    if terms.is_empty() {
        return None;
    }

    let clause = terms
        .iter()
        .map(|t| format!("service:*{t}*"))
        .collect::<Vec<_>>()
        .join(" OR ");

    if input.contains_any(&["error", "fail"]) {
        Some(format!("({clause}) AND status:error"))
    } else {
        Some(clause)
    }
}

fn keyword_terms(input: &Input<'_>) -> Option<String> {
    let terms: Vec<&str> = input
        .lower
        .split_whitespace()
        .filter(|t| t.chars().count() > 2 && !GENERIC_STOP_WORDS.contains(t))
        .collect();

    match terms.as_slice() {
        [] => None,
        [single] => Some(format!("service:*{single}* OR *{single}*")),
        many => {
            let services = many
                .iter()
                .map(|t| format!("service:*{t}*"))
                .collect::<Vec<_>>()
                .join(" OR ");
            let all_terms = many
                .iter()
                .map(|t| format!("*{t}*"))
                .collect::<Vec<_>>()
                .join(" AND ");
            Some(format!("({services}) OR ({all_terms})"))
        }
    }
}
