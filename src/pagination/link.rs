//! `Link` header parsing (RFC 8288 subset).

use reqwest::header::{HeaderMap, LINK};
use url::Url;

/// Link relations used for navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// `rel="next"`
    Next,
    /// `rel="prev"` or `rel="previous"`
    Prev,
    /// `rel="first"`
    First,
    /// `rel="last"`
    Last,
}

impl Relation {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "next" => Some(Self::Next),
            "prev" | "previous" => Some(Self::Prev),
            "first" => Some(Self::First),
            "last" => Some(Self::Last),
            _ => None,
        }
    }
}

/// Navigation targets advertised by a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLinks {
    /// Page after this one; absent on the last page
    pub next: Option<Url>,
    /// Page before this one
    pub prev: Option<Url>,
    /// First page of the collection
    pub first: Option<Url>,
    /// Last page, when the server can compute it
    pub last: Option<Url>,
}

impl PageLinks {
    /// Collect links from every `Link` header, resolving relative targets
    /// against `base`. The first target seen for a relation wins.
    pub fn from_headers(headers: &HeaderMap, base: &Url) -> Self {
        let mut links = Self::default();
        for value in headers.get_all(LINK) {
            if let Ok(value) = value.to_str() {
                links.merge(value, base);
            }
        }
        links
    }

    /// Parse a single `Link` header value.
    pub fn parse(header: &str, base: &Url) -> Self {
        let mut links = Self::default();
        links.merge(header, base);
        links
    }

    /// Target for a relation.
    pub fn get(&self, relation: Relation) -> Option<&Url> {
        match relation {
            Relation::Next => self.next.as_ref(),
            Relation::Prev => self.prev.as_ref(),
            Relation::First => self.first.as_ref(),
            Relation::Last => self.last.as_ref(),
        }
    }

    fn slot(&mut self, relation: Relation) -> &mut Option<Url> {
        match relation {
            Relation::Next => &mut self.next,
            Relation::Prev => &mut self.prev,
            Relation::First => &mut self.first,
            Relation::Last => &mut self.last,
        }
    }

    fn merge(&mut self, header: &str, base: &Url) {
        for (target, params) in entries(header) {
            let Ok(url) = base.join(target) else {
                tracing::debug!(link = target, "ignoring unparsable link target");
                continue;
            };
            for relation in relations(params) {
                let slot = self.slot(relation);
                if slot.is_none() {
                    *slot = Some(url.clone());
                }
            }
        }
    }
}

/// Split a header into `(target, params)` pairs. Anything outside `<...>`
/// that is not a parameter list is skipped.
fn entries(header: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let mut rest = header;

    while let Some(start) = rest.find('<') {
        let after_open = &rest[start + 1..];
        let Some(end) = after_open.find('>') else {
            break;
        };
        let target = after_open[..end].trim();
        let after = &after_open[end + 1..];

        let mut in_quotes = false;
        let mut cut = after.len();
        for (i, c) in after.char_indices() {
            match c {
                '"' => in_quotes = !in_quotes,
                ',' if !in_quotes => {
                    cut = i;
                    break;
                }
                _ => {}
            }
        }

        out.push((target, &after[..cut]));
        rest = &after[cut..];
    }

    out
}

/// Relations named by the `rel` parameter. A value may list several.
fn relations(params: &str) -> Vec<Relation> {
    params
        .split(';')
        .filter_map(|param| {
            let (name, value) = param.split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("rel")
                .then(|| value.trim().trim_matches('"'))
        })
        .flat_map(str::split_whitespace)
        .filter_map(Relation::parse)
        .collect()
}
