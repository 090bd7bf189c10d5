use crate::model::{parse_hex_str, MemoryRegion, RegionSource, SectionInfo, SectionTotals};

/// The synthetic bucket for sections the linker script left unassigned.
/// Its presence is expected, not an error state.
pub const DEFAULT_REGION_NAME: &str = "default";

/// Aggregated region usage plus the dual-basis totals. Regions are the
/// declared ones enriched with estimates, followed by the synthetic default
/// bucket when anything fell through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub totals: SectionTotals,
    pub regions: Vec<MemoryRegion>,
}

/// One canonical placement tuple. Both accounting bases are pure
/// projections over a list of these; neither basis is cached or mutated.
#[derive(Debug, Clone, Copy)]
struct PlacedSection<'a> {
    name: &'a str,
    size: u64,
    vma: Option<u64>,
    lma: Option<u64>,
}

const NON_ALLOC_PREFIXES: [&str; 8] = [
    ".debug",
    ".comment",
    ".ARM.attributes",
    ".symtab",
    ".strtab",
    ".shstrtab",
    ".note",
    ".stab",
];

pub fn aggregate(sections: &[SectionInfo], map_regions: &[MemoryRegion]) -> Aggregation {
    let placed = placements(sections);
    let mut totals = class_totals(sections);

    if map_regions.is_empty() {
        // ELF-only fallback: flash counts the stored image (so `.data` is
        // in), ram counts the runtime image.
        totals.flash_bytes = totals.text_bytes + totals.rodata_bytes + totals.data_bytes;
        totals.ram_bytes = totals.data_bytes + totals.bss_bytes;
        totals.ld_flash_bytes = totals.flash_bytes;
        totals.ld_ram_bytes = totals.ram_bytes;
        return Aggregation {
            totals,
            regions: vec![],
        };
    }

    let mut regions: Vec<MemoryRegion> = Vec::with_capacity(map_regions.len() + 1);
    let mut flash_vma_total = 0u64;
    let mut ram_vma_total = 0u64;
    let mut flash_ld_total = 0u64;
    let mut ram_ld_total = 0u64;
    let mut flash_capacity: Option<u64> = None;
    let mut ram_capacity: Option<u64> = None;

    for declared in map_regions {
        let Some(origin) = parse_hex_str(&declared.origin) else {
            // Unparsable origin: keep the declared row as-is, it just
            // cannot participate in placement math.
            regions.push(declared.clone());
            continue;
        };
        let span = RegionSpan {
            origin,
            length: declared.length,
        };
        let vma_used: u64 = placed
            .iter()
            .filter(|s| s.vma.map(|a| span.contains(a)).unwrap_or(false))
            .map(|s| s.size)
            .sum();
        let (ld_used, padding) = load_layout_total(&placed, &span);

        if is_flash_region(&declared.name) {
            flash_vma_total += vma_used;
            flash_ld_total += ld_used;
            *flash_capacity.get_or_insert(0) += declared.length;
        }
        if is_ram_region(&declared.name) {
            ram_vma_total += vma_used;
            ram_ld_total += ld_used;
            *ram_capacity.get_or_insert(0) += declared.length;
        }

        let mut region = declared.clone();
        region.padding_bytes = Some(padding);
        if region.used.is_none() {
            region.used = Some(vma_used);
            region.used_is_estimate = true;
        }
        regions.push(region);
    }

    if let Some(default_region) = synthesize_default_region(&placed, map_regions) {
        regions.push(default_region);
    }

    totals.flash_bytes = flash_vma_total;
    totals.ram_bytes = ram_vma_total;
    totals.ld_flash_bytes = flash_ld_total;
    totals.ld_ram_bytes = ram_ld_total;
    if flash_capacity.is_none() && ram_capacity.is_none() {
        // Regions exist but none classify as flash/ram (exotic naming):
        // fall back to the class-based estimate rather than reporting zero.
        totals.flash_bytes = totals.text_bytes + totals.rodata_bytes + totals.data_bytes;
        totals.ram_bytes = totals.data_bytes + totals.bss_bytes;
        totals.ld_flash_bytes = totals.flash_bytes;
        totals.ld_ram_bytes = totals.ram_bytes;
    }
    totals.flash_region_bytes = flash_capacity;
    totals.ram_region_bytes = ram_capacity;

    Aggregation { totals, regions }
}

fn class_totals(sections: &[SectionInfo]) -> SectionTotals {
    let mut totals = SectionTotals::default();
    for section in sections {
        match section.name.as_str() {
            ".text" => totals.text_bytes += section.size,
            ".rodata" => totals.rodata_bytes += section.size,
            ".data" => totals.data_bytes += section.size,
            ".bss" => totals.bss_bytes += section.size,
            _ => {}
        }
    }
    totals
}

fn placements(sections: &[SectionInfo]) -> Vec<PlacedSection<'_>> {
    sections
        .iter()
        .filter(|s| s.size > 0 && is_allocatable(&s.name))
        .map(|s| PlacedSection {
            name: &s.name,
            size: s.size,
            vma: s.vma.as_deref().and_then(parse_hex_str),
            lma: s.lma.as_deref().and_then(parse_hex_str),
        })
        .collect()
}

fn is_allocatable(name: &str) -> bool {
    !NON_ALLOC_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

#[derive(Debug, Clone, Copy)]
struct RegionSpan {
    origin: u64,
    length: u64,
}

impl RegionSpan {
    fn contains(&self, addr: u64) -> bool {
        addr >= self.origin && addr - self.origin < self.length
    }
}

/// LD-basis accounting for one region: every image stored in the region
/// (VMA placements, plus LMA shadow copies whose runtime home is elsewhere)
/// packed by address, alignment gaps included. Returns (total, padding).
fn load_layout_total(placed: &[PlacedSection<'_>], span: &RegionSpan) -> (u64, u64) {
    let mut images: Vec<(u64, u64)> = vec![];
    for section in placed {
        if let Some(vma) = section.vma {
            if span.contains(vma) {
                images.push((vma, section.size));
                continue;
            }
        }
        if let Some(lma) = section.lma {
            let is_shadow_copy = section.vma.map(|vma| vma != lma).unwrap_or(false);
            if is_shadow_copy && span.contains(lma) {
                images.push((lma, section.size));
            }
        }
    }
    images.sort_unstable();

    let mut total = 0u64;
    let mut padding = 0u64;
    let mut previous_end: Option<u64> = None;
    for (addr, size) in images {
        if let Some(end) = previous_end {
            if addr > end {
                padding += addr - end;
            }
        }
        total += size;
        previous_end = Some(addr.saturating_add(size).max(previous_end.unwrap_or(0)));
    }
    (total + padding, padding)
}

fn synthesize_default_region(
    placed: &[PlacedSection<'_>],
    declared: &[MemoryRegion],
) -> Option<MemoryRegion> {
    let spans: Vec<RegionSpan> = declared
        .iter()
        .filter_map(|r| {
            parse_hex_str(&r.origin).map(|origin| RegionSpan {
                origin,
                length: r.length,
            })
        })
        .collect();

    let mut sources: Vec<RegionSource> = vec![];
    let mut lowest_vma: Option<u64> = None;
    for section in placed {
        let Some(vma) = section.vma else {
            continue;
        };
        if spans.iter().any(|span| span.contains(vma)) {
            continue;
        }
        sources.push(RegionSource {
            name: section.name.to_string(),
            size: section.size,
        });
        lowest_vma = Some(lowest_vma.map_or(vma, |low: u64| low.min(vma)));
    }
    if sources.is_empty() {
        return None;
    }

    let used: u64 = sources.iter().map(|s| s.size).sum();
    Some(MemoryRegion {
        name: DEFAULT_REGION_NAME.to_string(),
        origin: format!("0x{:08x}", lowest_vma.unwrap_or(0)),
        length: 0,
        used: Some(used),
        used_is_estimate: true,
        padding_bytes: None,
        sources,
    })
}

fn is_flash_region(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("flash") || lower.contains("rom")
}

fn is_ram_region(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("ram")
}
