use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AnalyzeError;
use crate::model::{PcLookupResult, SymbolInfo};
use crate::resolver::parse_pc_address;
use crate::session::AnalysisSession;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolQuery {
    pub query: Option<String>,
    pub page: usize,
    pub page_size: usize,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub section: Option<String>,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedSymbols {
    pub total: usize,
    pub items: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetItem {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolFacets {
    pub sections: Vec<FacetItem>,
    pub kinds: Vec<FacetItem>,
}

/// Page through the current analysis's symbol list with filtering and
/// sorting. Requires a successful analysis in the session.
pub fn list_symbols(
    session: &AnalysisSession,
    query: &SymbolQuery,
) -> Result<PagedSymbols, AnalyzeError> {
    let result = session.current()?;
    let name_filter = name_matcher(query.query.as_deref());

    let mut items: Vec<SymbolInfo> = result
        .symbols
        .iter()
        .filter(|symbol| name_filter(&symbol.name))
        .filter(|symbol| {
            query
                .section
                .as_deref()
                .map(|section| symbol.section_guess == section)
                .unwrap_or(true)
        })
        .filter(|symbol| {
            query
                .kind
                .as_deref()
                .map(|kind| symbol.kind == kind)
                .unwrap_or(true)
        })
        .cloned()
        .collect();

    sort_symbols(&mut items, query.sort.as_deref(), query.order.as_deref());

    let page = query.page.max(1);
    let page_size = query.page_size.max(1);
    let start = (page - 1) * page_size;
    let total = items.len();
    let paged = if start >= total {
        Vec::new()
    } else {
        items[start..(start + page_size).min(total)].to_vec()
    };

    Ok(PagedSymbols {
        total,
        items: paged,
    })
}

/// Distinct-value counts over the current symbol list, count-descending.
pub fn list_symbol_facets(session: &AnalysisSession) -> Result<SymbolFacets, AnalyzeError> {
    let result = session.current()?;
    Ok(SymbolFacets {
        sections: facet_counts(&result.symbols, |s| s.section_guess.as_str()),
        kinds: facet_counts(&result.symbols, |s| s.kind.as_str()),
    })
}

pub fn lookup_pc(session: &AnalysisSession, address: &str) -> Result<PcLookupResult, AnalyzeError> {
    let addr_value = parse_pc_address(address)?;
    let index = session.pc_index()?;
    Ok(PcLookupResult {
        address: address.to_string(),
        symbol: index.lookup(addr_value),
    })
}

/// A query is treated as a regex only when it compiles and actually uses
/// regex syntax; otherwise it is a case-insensitive substring match.
fn name_matcher(query: Option<&str>) -> Box<dyn Fn(&str) -> bool> {
    let Some(raw) = query.map(str::trim).filter(|q| !q.is_empty()) else {
        return Box::new(|_| true);
    };
    let has_meta = raw
        .chars()
        .any(|c| matches!(c, '.' | '*' | '+' | '?' | '[' | ']' | '(' | ')' | '^' | '$' | '|' | '\\'));
    if has_meta {
        if let Ok(regex) = Regex::new(raw) {
            return Box::new(move |name| regex.is_match(name));
        }
    }
    let needle = raw.to_ascii_lowercase();
    Box::new(move |name| name.to_ascii_lowercase().contains(&needle))
}

fn sort_symbols(items: &mut [SymbolInfo], sort: Option<&str>, order: Option<&str>) {
    match sort {
        Some("name") => items.sort_by(|a, b| a.name.cmp(&b.name)),
        Some("kind") => items.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name))),
        Some("section") | Some("section_guess") => items.sort_by(|a, b| {
            a.section_guess
                .cmp(&b.section_guess)
                .then_with(|| a.name.cmp(&b.name))
        }),
        _ => items.sort_by(|a, b| a.size.cmp(&b.size).then_with(|| a.name.cmp(&b.name))),
    }
    if order.unwrap_or("desc") == "desc" {
        items.reverse();
    }
}

fn facet_counts(symbols: &[SymbolInfo], value: impl Fn(&SymbolInfo) -> &str) -> Vec<FacetItem> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for symbol in symbols {
        *counts.entry(value(symbol).to_string()).or_insert(0) += 1;
    }
    let mut facets: Vec<FacetItem> = counts
        .into_iter()
        .map(|(value, count)| FacetItem { value, count })
        .collect();
    facets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    facets
}
