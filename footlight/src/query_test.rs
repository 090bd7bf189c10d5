use crate::error::AnalyzeError;
use crate::findings::FindingsConfig;
use crate::model::{
    AnalysisMeta, AnalysisResult, AnalysisSummary, CacheMeta, SectionTotals, SymbolInfo,
};
use crate::query::{list_symbol_facets, list_symbols, lookup_pc, SymbolQuery};
use crate::session::AnalysisSession;
use crate::toolchain::ToolchainPaths;

fn symbol(name: &str, addr: &str, size: u64, kind: &str) -> SymbolInfo {
    SymbolInfo {
        name: name.to_string(),
        size,
        addr: Some(addr.to_string()),
        kind: kind.to_string(),
        section_guess: crate::symbols::guess_section(kind),
        size_note: None,
    }
}

fn session_with_symbols(symbols: Vec<SymbolInfo>) -> AnalysisSession {
    let session = AnalysisSession::new(FindingsConfig::default());
    session.install(AnalysisResult {
        meta: AnalysisMeta {
            elf_path: "firmware.elf".to_string(),
            map_path: None,
            toolchain: ToolchainPaths {
                nm_path: "arm-none-eabi-nm".to_string(),
                objdump_path: None,
                strings_path: None,
            },
            cache: CacheMeta {
                hit: false,
                key: "test".to_string(),
            },
        },
        summary: AnalysisSummary {
            sections_totals: SectionTotals::default(),
            top_symbols: vec![],
            top_objects: vec![],
            top_libraries: vec![],
            top_sections: vec![],
            map_tree: vec![],
            memory_regions: vec![],
            findings: vec![],
        },
        sections: vec![],
        symbols,
        warnings: vec![],
    });
    session
}

fn fixture_session() -> AnalysisSession {
    session_with_symbols(vec![
        symbol("main", "08000100", 0x200, "T"),
        symbol("uart_isr", "08000300", 0x80, "t"),
        symbol("lookup_table", "08000400", 0x100, "r"),
        symbol("state", "20000000", 0x40, "d"),
        symbol("rx_buffer", "20000040", 0x400, "B"),
        symbol("tx_buffer", "20000440", 0x200, "B"),
    ])
}

fn page(query: SymbolQuery) -> SymbolQuery {
    SymbolQuery {
        page: 1,
        page_size: 20,
        ..query
    }
}

#[test]
fn queries_before_any_analysis_are_rejected() {
    let session = AnalysisSession::new(FindingsConfig::default());
    let err = list_symbols(&session, &page(SymbolQuery::default())).unwrap_err();
    assert!(matches!(err, AnalyzeError::Query { .. }));
    assert!(err.to_string().contains("Run analysis first"));
    assert!(lookup_pc(&session, "0x08000100").is_err());
    assert!(list_symbol_facets(&session).is_err());
}

#[test]
fn default_sort_is_size_descending() {
    let paged = list_symbols(&fixture_session(), &page(SymbolQuery::default())).unwrap();
    assert_eq!(paged.total, 6);
    assert_eq!(paged.items[0].name, "rx_buffer");
    let sizes: Vec<u64> = paged.items.iter().map(|s| s.size).collect();
    assert!(sizes.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn substring_filter_is_case_insensitive() {
    let query = page(SymbolQuery {
        query: Some("BUFFER".to_string()),
        ..SymbolQuery::default()
    });
    let paged = list_symbols(&fixture_session(), &query).unwrap();
    assert_eq!(paged.total, 2);
    assert!(paged.items.iter().all(|s| s.name.contains("buffer")));
}

#[test]
fn regex_queries_are_honored() {
    let query = page(SymbolQuery {
        query: Some("^(rx|tx)_".to_string()),
        ..SymbolQuery::default()
    });
    let paged = list_symbols(&fixture_session(), &query).unwrap();
    assert_eq!(paged.total, 2);

    // An invalid pattern falls back to substring matching (and misses).
    let query = page(SymbolQuery {
        query: Some("rx_buffer(".to_string()),
        ..SymbolQuery::default()
    });
    let paged = list_symbols(&fixture_session(), &query).unwrap();
    assert_eq!(paged.total, 0);
}

#[test]
fn section_and_kind_filters_are_exact() {
    let query = page(SymbolQuery {
        section: Some("bss".to_string()),
        ..SymbolQuery::default()
    });
    let paged = list_symbols(&fixture_session(), &query).unwrap();
    assert_eq!(paged.total, 2);

    let query = page(SymbolQuery {
        kind: Some("T".to_string()),
        ..SymbolQuery::default()
    });
    let paged = list_symbols(&fixture_session(), &query).unwrap();
    assert_eq!(paged.total, 1);
    assert_eq!(paged.items[0].name, "main");
}

#[test]
fn name_sort_ascending_pages_correctly() {
    let query = SymbolQuery {
        sort: Some("name".to_string()),
        order: Some("asc".to_string()),
        page: 2,
        page_size: 2,
        ..SymbolQuery::default()
    };
    let paged = list_symbols(&fixture_session(), &query).unwrap();
    assert_eq!(paged.total, 6);
    assert_eq!(paged.items.len(), 2);
    assert_eq!(paged.items[0].name, "rx_buffer");
    assert_eq!(paged.items[1].name, "state");
}

#[test]
fn out_of_range_page_is_empty_with_total_intact() {
    let query = SymbolQuery {
        page: 10,
        page_size: 20,
        ..SymbolQuery::default()
    };
    let paged = list_symbols(&fixture_session(), &query).unwrap();
    assert_eq!(paged.total, 6);
    assert!(paged.items.is_empty());
}

#[test]
fn facets_count_distinct_sections_and_kinds() {
    let facets = list_symbol_facets(&fixture_session()).unwrap();
    let bss = facets.sections.iter().find(|f| f.value == "bss").unwrap();
    assert_eq!(bss.count, 2);
    let total: usize = facets.sections.iter().map(|f| f.count).sum();
    assert_eq!(total, 6);

    let kind_b = facets.kinds.iter().find(|f| f.value == "B").unwrap();
    assert_eq!(kind_b.count, 2);
    // Count-descending order.
    assert!(facets.kinds.windows(2).all(|w| w[0].count >= w[1].count));
}

#[test]
fn lookup_pc_resolves_through_the_session_index() {
    let session = fixture_session();
    let result = lookup_pc(&session, "0x08000310").unwrap();
    let hit = result.symbol.unwrap();
    assert_eq!(hit.name, "uart_isr");
    assert_eq!(hit.offset, 0x10);
    assert_eq!(result.address, "0x08000310");

    let miss = lookup_pc(&session, "0x09000000").unwrap();
    assert!(miss.symbol.is_none());

    assert!(lookup_pc(&session, "not an address").is_err());
}

#[test]
fn new_analysis_supersedes_the_previous_one() {
    let session = fixture_session();
    session.install(AnalysisResult {
        symbols: vec![symbol("only_one", "08000000", 0x10, "T")],
        ..(*session.current().unwrap()).clone()
    });
    let paged = list_symbols(&session, &page(SymbolQuery::default())).unwrap();
    assert_eq!(paged.total, 1);
    assert_eq!(paged.items[0].name, "only_one");
}
