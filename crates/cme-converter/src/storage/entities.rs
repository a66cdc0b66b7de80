//! Named HTML entities in storage XML.
//!
//! Storage format is XHTML but uses HTML entities (`&nbsp;`, `&rarr;`) that an
//! XML reader rejects. They are replaced with their characters before parsing;
//! the five XML entities are left for the reader.

use std::sync::LazyLock;

use regex::Regex;

static NAMED_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&([a-zA-Z][a-zA-Z0-9]*);").expect("invalid entity regex"));

/// Entity names and characters, sorted by name for binary search.
const ENTITIES: &[(&str, char)] = &[
    ("Dagger", '\u{2021}'),
    ("bull", '\u{2022}'),
    ("cent", '\u{00a2}'),
    ("copy", '\u{00a9}'),
    ("dagger", '\u{2020}'),
    ("darr", '\u{2193}'),
    ("deg", '\u{00b0}'),
    ("divide", '\u{00f7}'),
    ("euro", '\u{20ac}'),
    ("frac12", '\u{00bd}'),
    ("frac14", '\u{00bc}'),
    ("frac34", '\u{00be}'),
    ("ge", '\u{2265}'),
    ("harr", '\u{2194}'),
    ("hellip", '\u{2026}'),
    ("iexcl", '\u{00a1}'),
    ("iquest", '\u{00bf}'),
    ("laquo", '\u{00ab}'),
    ("larr", '\u{2190}'),
    ("ldquo", '\u{201c}'),
    ("le", '\u{2264}'),
    ("lsquo", '\u{2018}'),
    ("mdash", '\u{2014}'),
    ("micro", '\u{00b5}'),
    ("middot", '\u{00b7}'),
    ("nbsp", '\u{00a0}'),
    ("ndash", '\u{2013}'),
    ("ne", '\u{2260}'),
    ("para", '\u{00b6}'),
    ("plusmn", '\u{00b1}'),
    ("pound", '\u{00a3}'),
    ("raquo", '\u{00bb}'),
    ("rarr", '\u{2192}'),
    ("rdquo", '\u{201d}'),
    ("reg", '\u{00ae}'),
    ("rsquo", '\u{2019}'),
    ("sect", '\u{00a7}'),
    ("shy", '\u{00ad}'),
    ("sup1", '\u{00b9}'),
    ("sup2", '\u{00b2}'),
    ("sup3", '\u{00b3}'),
    ("times", '\u{00d7}'),
    ("trade", '\u{2122}'),
    ("uarr", '\u{2191}'),
    ("yen", '\u{00a5}'),
    ("zwj", '\u{200d}'),
    ("zwnj", '\u{200c}'),
];

/// Replace named HTML entities with their characters.
///
/// Unknown names and the XML entities (`amp`, `lt`, `gt`, `quot`, `apos`)
/// are kept as written.
pub(crate) fn decode_named_entities(xml: &str) -> String {
    NAMED_ENTITY
        .replace_all(xml, |caps: &regex::Captures| {
            lookup(&caps[1]).map_or_else(|| caps[0].to_owned(), String::from)
        })
        .into_owned()
}

fn lookup(name: &str) -> Option<char> {
    ENTITIES
        .binary_search_by(|(entity, _)| (*entity).cmp(name))
        .ok()
        .map(|index| ENTITIES[index].1)
}

/// Character for an entity reference reported by the XML reader
/// (`amp`, `#8594`, `#x2192`).
pub(crate) fn decode_reference(reference: &str) -> String {
    let resolved = match reference {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => reference.strip_prefix('#').and_then(|code| {
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => code.parse::<u32>().ok(),
            };
            value.and_then(char::from_u32)
        }),
    };
    resolved.map_or_else(|| format!("&{reference};"), String::from)
}
