use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{MemoryRegion, ObjectContribution, TreeNode};

pub const TREE_LIBRARY_LIMIT: usize = 20;
pub const TREE_OBJECT_LIMIT: usize = 40;

/// Everything recovered from one linker MAP file. Rebuilt fully per parse;
/// nothing here is mutated incrementally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapData {
    pub regions: Vec<MemoryRegion>,
    pub objects: Vec<ObjectContribution>,
    pub libraries: Vec<ObjectContribution>,
    pub sections: Vec<ObjectContribution>,
    pub tree: Vec<TreeNode>,
    pub warnings: Vec<String>,
}

impl MapData {
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty() && self.objects.is_empty()
    }
}

static REGION_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>\S+)\s+(?P<origin>0x[0-9A-Fa-f]+)\s+(?P<length>0x[0-9A-Fa-f]+|\d+)(?P<rest>.*)$")
        .unwrap()
});

/// Parse a GNU-ld style MAP text. Malformed constructs are skipped with a
/// recorded warning; this function itself never fails.
pub fn parse_map_str(contents: &str) -> MapData {
    let mut warnings: Vec<String> = vec![];
    let regions = parse_memory_configuration(contents, &mut warnings);
    let contributions = parse_contributions(contents, &mut warnings);

    MapData {
        regions,
        objects: sorted_contributions(contributions.objects),
        libraries: sorted_contributions(contributions.libraries),
        sections: sorted_contributions(contributions.sections),
        tree: build_tree(contributions.tree),
        warnings,
    }
}

/// The `Memory Configuration` block: a `Name Origin Length [Attributes]`
/// header followed by one row per declared region, terminated by a blank
/// line. Some linkers append a `Used` column; it is honored when present.
fn parse_memory_configuration(contents: &str, warnings: &mut Vec<String>) -> Vec<MemoryRegion> {
    let mut regions = Vec::new();
    let mut in_block = false;
    let mut header_seen = false;
    let mut has_used_column = false;

    for (line_index, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("Memory Configuration") {
            in_block = true;
            continue;
        }
        if !in_block {
            continue;
        }
        if !header_seen {
            if trimmed.starts_with("Name") {
                header_seen = true;
                has_used_column = trimmed.to_ascii_lowercase().contains("used");
            }
            continue;
        }
        if trimmed.is_empty() {
            break;
        }

        let Some(captures) = REGION_ROW.captures(trimmed) else {
            warnings.push(format!(
                "map line {}: unrecognized memory region row: {}",
                line_index + 1,
                trimmed
            ));
            continue;
        };
        let name = captures["name"].to_string();
        // The linker's own catch-all row spans the whole address space and
        // is not a declared region; the aggregator synthesizes its own
        // default bucket with explainable sources instead.
        if name == "*default*" || name.eq_ignore_ascii_case("default") {
            continue;
        }
        let origin = captures["origin"].to_string();
        let Some(length) = parse_hex_or_dec(&captures["length"]) else {
            warnings.push(format!(
                "map line {}: unparsable region length for {}",
                line_index + 1,
                name
            ));
            continue;
        };
        let used = if has_used_column {
            trailing_number(&captures["rest"])
        } else {
            None
        };
        regions.push(MemoryRegion {
            name,
            origin,
            length,
            used,
            used_is_estimate: false,
            padding_bytes: None,
            sources: vec![],
        });
    }

    regions
}

#[derive(Default)]
struct Contributions {
    objects: HashMap<String, u64>,
    libraries: HashMap<String, u64>,
    sections: HashMap<String, u64>,
    tree: HashMap<String, HashMap<String, u64>>,
}

/// Input-section contribution lines:
/// ` .text.main  0x08000100  0x120  build/main.o`
/// ` .text.sin   0x08000220   0x80  /opt/lib/libm.a(sin.o)`
fn parse_contributions(contents: &str, warnings: &mut Vec<String>) -> Contributions {
    let mut out = Contributions::default();

    for (line_index, line) in contents.lines().enumerate() {
        let trimmed = line.trim_start();
        if !trimmed.starts_with('.') {
            continue;
        }
        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        if parts.len() < 4 {
            continue;
        }
        let section_name = parts[0];
        let size_token = parts[2];
        let Some(size) = parse_hex_or_dec(size_token) else {
            warnings.push(format!(
                "map line {}: unparsable contribution size `{}` in {}",
                line_index + 1,
                size_token,
                section_name
            ));
            continue;
        };
        if size == 0 {
            continue;
        }
        let file = *parts.last().unwrap_or(&"");
        if file.starts_with('*') {
            continue;
        }
        if !file.contains(".o") && !file.contains(".a") {
            continue;
        }

        *out.objects.entry(file.to_string()).or_insert(0) += size;
        *out.sections.entry(section_name.to_string()).or_insert(0) += size;

        let (library, object) = split_archive_member(file);
        if let Some(library_name) = library.as_ref() {
            *out.libraries.entry(library_name.clone()).or_insert(0) += size;
        }
        let tree_label = library.unwrap_or_else(|| "Objects".to_string());
        *out
            .tree
            .entry(tree_label)
            .or_default()
            .entry(object)
            .or_insert(0) += size;
    }

    out
}

/// Split `path/libfoo.a(bar.o)` into (`libfoo.a`, `bar.o`). A bare object
/// path yields no library and its basename as the object name.
pub fn split_archive_member(path: &str) -> (Option<String>, String) {
    if let Some(open) = path.find('(') {
        if let Some(close_offset) = path[open + 1..].find(')') {
            let library_path = &path[..open];
            let member = &path[open + 1..open + 1 + close_offset];
            let library_name = basename(library_path).to_string();
            return (Some(library_name), member.to_string());
        }
    }
    if path.contains(".a") && path.contains('/') {
        return (Some(basename(path).to_string()), basename(path).to_string());
    }
    (None, basename(path).to_string())
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn sorted_contributions(map: HashMap<String, u64>) -> Vec<ObjectContribution> {
    let mut result: Vec<ObjectContribution> = map
        .into_iter()
        .map(|(name, size)| ObjectContribution { name, size })
        .collect();
    result.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.name.cmp(&b.name)));
    result
}

fn build_tree(tree: HashMap<String, HashMap<String, u64>>) -> Vec<TreeNode> {
    let mut libraries: Vec<TreeNode> = tree
        .into_iter()
        .map(|(library, objects)| {
            let mut children: Vec<TreeNode> = objects
                .into_iter()
                .map(|(name, size)| TreeNode {
                    name,
                    size,
                    children: Vec::new(),
                })
                .collect();
            children.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.name.cmp(&b.name)));
            children.truncate(TREE_OBJECT_LIMIT);
            let size = children.iter().map(|child| child.size).sum();
            TreeNode {
                name: library,
                size,
                children,
            }
        })
        .collect();
    libraries.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.name.cmp(&b.name)));
    libraries.truncate(TREE_LIBRARY_LIMIT);
    libraries
}

fn parse_hex_or_dec(value: &str) -> Option<u64> {
    if let Some(hex) = value.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else {
        value.parse::<u64>().ok()
    }
}

fn trailing_number(rest: &str) -> Option<u64> {
    rest.split_whitespace()
        .rev()
        .find_map(parse_hex_or_dec)
}
