//! Project slug derivation
//!
//! Slugs are derived from a project name: the name is decomposed (NFD),
//! combining marks are dropped, the result is lowercased, spaces become
//! dashes, everything outside `[a-z0-9-]` is removed, and runs of dashes are
//! collapsed and trimmed. "Crédit Agricole" becomes `credit-agricole`.

use rand::Rng;
use unicode_normalization::UnicodeNormalization;

/// Length of the random suffix appended on slug collision
pub const SUFFIX_LEN: usize = 4;

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Slug used when a name contains no slug-able characters at all
const FALLBACK_SLUG: &str = "organization";

/// Derive a slug from a display name
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true; // suppresses leading dashes

    for c in name.nfd() {
        if ('\u{0300}'..='\u{036f}').contains(&c) {
            continue;
        }
        for lower in c.to_lowercase() {
            let mapped = match lower {
                ' ' | '-' => '-',
                'a'..='z' | '0'..='9' => lower,
                _ => continue,
            };
            if mapped == '-' {
                if !last_dash {
                    slug.push('-');
                }
                last_dash = true;
            } else {
                slug.push(mapped);
                last_dash = false;
            }
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Random `[a-z0-9]` suffix for collision handling
pub fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// `base` with a fresh random suffix, e.g. `acme-bank-x7k2`
pub fn with_suffix(base: &str) -> String {
    format!("{}-{}", base, random_suffix())
}
