use crate::error::TechniqueError;
use crate::models::Technique;

/// Seeded into a user's catalogue the first time it is listed.
pub const DEFAULT_TECHNIQUES: [&str; 9] = [
    "MILD",
    "WILD",
    "SSILD",
    "Wake Back To Bed (WBTB)",
    "Reality Checks (RC)",
    "Dream Journal (DJ)",
    "Visualization",
    "Meditation",
    "Sleep Hygiene",
];

pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

pub fn default_catalogue() -> Vec<Technique> {
    DEFAULT_TECHNIQUES
        .iter()
        .map(|name| Technique {
            name: name.to_string(),
            slug: slugify(name),
            is_default: true,
        })
        .collect()
}

/// Builds a new custom technique, refusing blank names and duplicates of an
/// existing name or slug.
pub fn new_technique(name: &str, existing: &[Technique]) -> Result<Technique, TechniqueError> {
    let name = name.trim();
    let slug = slugify(name);
    if name.is_empty() || slug.is_empty() {
        return Err(TechniqueError::EmptyName);
    }
    if existing.iter().any(|t| t.name == name || t.slug == slug) {
        return Err(TechniqueError::AlreadyExists(name.to_string()));
    }

    Ok(Technique {
        name: name.to_string(),
        slug,
        is_default: false,
    })
}

/// Defaults first, then alphabetical.
pub fn sort_catalogue(techniques: &mut [Technique]) {
    techniques.sort_by(|a, b| b.is_default.cmp(&a.is_default).then_with(|| a.name.cmp(&b.name)));
}
