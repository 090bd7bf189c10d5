use similar_asserts::assert_eq;

use crate::aggregate::{aggregate, DEFAULT_REGION_NAME};
use crate::model::{MemoryRegion, SectionInfo};

fn section(name: &str, size: u64, vma: &str, lma: &str) -> SectionInfo {
    SectionInfo {
        name: name.to_string(),
        size,
        vma: Some(vma.to_string()),
        lma: Some(lma.to_string()),
    }
}

fn region(name: &str, origin: &str, length: u64) -> MemoryRegion {
    MemoryRegion {
        name: name.to_string(),
        origin: origin.to_string(),
        length,
        used: None,
        used_is_estimate: false,
        padding_bytes: None,
        sources: vec![],
    }
}

/// The worked example from the accounting contract: `.text` = 20000 bytes in
/// FLASH, `.data` = 100 bytes with its VMA in RAM and its load image in
/// FLASH behind 4 bytes of alignment padding.
fn example_sections() -> Vec<SectionInfo> {
    vec![
        // 20000 = 0x4e20; .data LMA = 0x08004e24 leaves a 4-byte gap.
        section(".text", 20000, "08000000", "08000000"),
        section(".data", 100, "20000000", "08004e24"),
    ]
}

fn example_regions() -> Vec<MemoryRegion> {
    vec![
        region("FLASH", "0x08000000", 65536),
        region("RAM", "0x20000000", 16384),
    ]
}

#[test]
fn dual_basis_flash_totals_match_the_worked_example() {
    let out = aggregate(&example_sections(), &example_regions());
    assert_eq!(out.totals.flash_bytes, 20000);
    assert_eq!(out.totals.ld_flash_bytes, 20104);
    assert_eq!(out.totals.ram_bytes, 100);
    assert_eq!(out.totals.flash_region_bytes, Some(65536));
    assert_eq!(out.totals.ram_region_bytes, Some(16384));
}

#[test]
fn vma_basis_never_exceeds_ld_basis() {
    let out = aggregate(&example_sections(), &example_regions());
    assert!(out.totals.flash_bytes <= out.totals.ld_flash_bytes);
    assert!(out.totals.ram_bytes <= out.totals.ld_ram_bytes);
}

#[test]
fn region_usage_is_estimated_when_the_map_had_none() {
    let out = aggregate(&example_sections(), &example_regions());
    let flash = out.regions.iter().find(|r| r.name == "FLASH").unwrap();
    assert_eq!(flash.used, Some(20000));
    assert!(flash.used_is_estimate);
    assert_eq!(flash.padding_bytes, Some(4));

    let ram = out.regions.iter().find(|r| r.name == "RAM").unwrap();
    assert_eq!(ram.used, Some(100));
    assert!(ram.used_is_estimate);
}

#[test]
fn explicit_map_usage_is_not_overwritten() {
    let mut regions = example_regions();
    regions[0].used = Some(123);
    let out = aggregate(&example_sections(), &regions);
    let flash = out.regions.iter().find(|r| r.name == "FLASH").unwrap();
    assert_eq!(flash.used, Some(123));
    assert!(!flash.used_is_estimate);
}

#[test]
fn unassigned_sections_fall_into_the_default_region() {
    let mut sections = example_sections();
    sections.push(section(".ccmram", 32, "10000000", "10000000"));
    sections.push(section(".backup", 16, "40024000", "40024000"));
    let out = aggregate(&sections, &example_regions());

    let default_region = out
        .regions
        .iter()
        .find(|r| r.name == DEFAULT_REGION_NAME)
        .expect("default region synthesized");
    assert_eq!(default_region.sources.len(), 2);
    let source_sum: u64 = default_region.sources.iter().map(|s| s.size).sum();
    assert_eq!(default_region.used, Some(source_sum));
    assert!(default_region.used_is_estimate);
    assert_eq!(default_region.origin, "0x10000000");
    assert_eq!(default_region.length, 0);
}

#[test]
fn no_default_region_when_everything_is_placed() {
    let out = aggregate(&example_sections(), &example_regions());
    assert!(out.regions.iter().all(|r| r.name != DEFAULT_REGION_NAME));
}

#[test]
fn debug_sections_do_not_pollute_the_default_region() {
    let mut sections = example_sections();
    sections.push(section(".debug_info", 40000, "00000000", "00000000"));
    sections.push(section(".comment", 64, "00000000", "00000000"));
    let out = aggregate(&sections, &example_regions());
    assert!(out.regions.iter().all(|r| r.name != DEFAULT_REGION_NAME));
}

#[test]
fn elf_only_fallback_uses_class_totals() {
    let sections = vec![
        section(".text", 1000, "08000000", "08000000"),
        section(".rodata", 200, "08000400", "08000400"),
        section(".data", 100, "20000000", "08000500"),
        section(".bss", 300, "20000064", "20000064"),
    ];
    let out = aggregate(&sections, &[]);
    assert_eq!(out.totals.text_bytes, 1000);
    assert_eq!(out.totals.flash_bytes, 1300);
    assert_eq!(out.totals.ram_bytes, 400);
    assert_eq!(out.totals.ld_flash_bytes, 1300);
    assert_eq!(out.totals.flash_region_bytes, None);
    assert_eq!(out.totals.ram_region_bytes, None);
    assert!(out.regions.is_empty());
}

#[test]
fn ram_ld_basis_counts_runtime_layout_with_padding() {
    let sections = vec![
        section(".data", 100, "20000000", "08001000"),
        // 28-byte alignment gap before .bss in RAM.
        section(".bss", 200, "20000080", "20000080"),
    ];
    let regions = vec![
        region("FLASH", "0x08000000", 65536),
        region("RAM", "0x20000000", 16384),
    ];
    let out = aggregate(&sections, &regions);
    assert_eq!(out.totals.ram_bytes, 300);
    assert_eq!(out.totals.ld_ram_bytes, 300 + 28);
    let ram = out.regions.iter().find(|r| r.name == "RAM").unwrap();
    assert_eq!(ram.padding_bytes, Some(28));
}
