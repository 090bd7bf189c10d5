use crate::error::AnalyzeError;
use crate::model::{parse_hex_str, PcLookupSymbol, SymbolInfo};
use crate::symbols::is_pc_indexable_kind;

/// Sorted address index over code-like and absolute symbols. Built once per
/// analysis result, read-only afterwards, safe for concurrent lookups.
#[derive(Debug, Clone, Default)]
pub struct PcIndex {
    entries: Vec<PcEntry>,
}

#[derive(Debug, Clone)]
struct PcEntry {
    addr: u64,
    size: u64,
    name: String,
    kind: String,
    section_guess: String,
    addr_text: String,
}

impl PcIndex {
    pub fn build(symbols: &[SymbolInfo]) -> Self {
        let mut entries: Vec<PcEntry> = symbols
            .iter()
            .filter(|s| is_pc_indexable_kind(&s.kind))
            .filter_map(|s| {
                let addr_text = s.addr.clone()?;
                let addr = parse_hex_str(&addr_text)?;
                Some(PcEntry {
                    addr,
                    size: s.size,
                    name: s.name.clone(),
                    kind: s.kind.clone(),
                    section_guess: s.section_guess.clone(),
                    addr_text,
                })
            })
            .collect();
        // Alias policy: at equal addresses, sized symbols win over
        // zero-size ones, then lexicographic name.
        entries.sort_by(|a, b| {
            a.addr
                .cmp(&b.addr)
                .then_with(|| (a.size == 0).cmp(&(b.size == 0)))
                .then_with(|| a.name.cmp(&b.name))
        });
        PcIndex { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Binary search for the greatest symbol address <= `addr`, then verify
    /// containment: `addr < base + size`, or `addr == base` when the symbol
    /// has no size. Anything else is a miss.
    pub fn lookup(&self, addr: u64) -> Option<PcLookupSymbol> {
        let upper = self.entries.partition_point(|entry| entry.addr <= addr);
        if upper == 0 {
            return None;
        }
        let candidate_addr = self.entries[upper - 1].addr;
        let group_start = self
            .entries
            .partition_point(|entry| entry.addr < candidate_addr);
        self.entries[group_start..upper]
            .iter()
            .find(|entry| entry.contains(addr))
            .map(|entry| entry.to_lookup_symbol(addr))
    }
}

impl PcEntry {
    fn contains(&self, addr: u64) -> bool {
        if self.size == 0 {
            addr == self.addr
        } else {
            addr >= self.addr && addr - self.addr < self.size
        }
    }

    fn to_lookup_symbol(&self, addr: u64) -> PcLookupSymbol {
        PcLookupSymbol {
            name: self.name.clone(),
            addr: self.addr_text.clone(),
            size: self.size,
            kind: self.kind.clone(),
            section_guess: self.section_guess.clone(),
            offset: addr - self.addr,
        }
    }
}

/// Accepts `0x`-prefixed hex, bare hex (when it contains a-f), or decimal.
pub fn parse_pc_address(value: &str) -> Result<u64, AnalyzeError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AnalyzeError::input("Address is required."));
    }
    let lowered = trimmed.to_ascii_lowercase();
    let (radix, digits) = if let Some(rest) = lowered.strip_prefix("0x") {
        (16, rest.to_string())
    } else if lowered.chars().any(|c| matches!(c, 'a'..='f')) {
        (16, lowered.clone())
    } else {
        (10, lowered.clone())
    };
    if digits.is_empty() {
        return Err(AnalyzeError::input("Invalid address."));
    }
    u64::from_str_radix(&digits, radix).map_err(|_| AnalyzeError::input("Invalid address."))
}
