//! Risk lexicons and the substring matcher shared by all entry points.
//!
//! Matching is intentionally simple: lowercase + whitespace-condensed text,
//! plain substring search, no stemming. High precision on short phrases,
//! known to over-match on prefixes (e.g. "seul" inside "seulement"); that
//! trade-off is accepted and documented rather than patched around.

use crate::assessment::RiskCategory;

/// Low-mood / depressive language.
const DEPRIME: &[&str] = &[
    "triste",
    "deprime",
    "déprime",
    "abattu",
    "je vais mal",
    "plus envie de rien",
    "plus de gout a rien",
];

/// Harassment, mockery, threats from peers.
const HARCELEMENT: &[&str] = &[
    "harcele",
    "harcèle",
    "se moquent de moi",
    "moque de moi",
    "insulte",
    "menace",
    "rejete par les autres",
];

/// Loneliness and social isolation.
const ISOLEMENT: &[&str] = &[
    "seul",
    "seule",
    "isole",
    "isolé",
    "personne ne m'aime",
    "personne a qui parler",
    "personne à qui parler",
];

/// Acute danger / self-harm ideation. Carries the highest weight.
const DANGER: &[&str] = &[
    "disparaitre",
    "disparaître",
    "mourir",
    "me tuer",
    "suicide",
    "en finir",
    "me faire du mal",
    "plus envie de vivre",
];

/// Substance and behavioral addiction signals.
const ADDICTION: &[&str] = &[
    "alcool",
    "drogue",
    "cannabis",
    "addiction",
    "je rejoue",
    "paris en ligne",
];

/// Lexicon for one risk category.
pub fn terms(category: RiskCategory) -> &'static [&'static str] {
    match category {
        RiskCategory::Deprime => DEPRIME,
        RiskCategory::Harcelement => HARCELEMENT,
        RiskCategory::Isolement => ISOLEMENT,
        RiskCategory::Danger => DANGER,
        RiskCategory::Addiction => ADDICTION,
    }
}

/// Lowercase and condense whitespace so matching is layout-insensitive.
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space && !out.is_empty() {
                out.push(' ');
                last_space = true;
            }
        } else {
            for lc in ch.to_lowercase() {
                out.push(lc);
            }
            last_space = false;
        }
    }
    out.trim_end().to_string()
}

/// True if any term of `lexicon` occurs as a substring of the normalized text.
/// Total over any input; the empty string matches nothing.
pub fn matches_any(normalized: &str, lexicon: &[&str]) -> bool {
    if normalized.is_empty() {
        return false;
    }
    lexicon.iter().any(|term| normalized.contains(term))
}

/// Categories whose lexicon matches `normalized`, in category order,
/// without duplicates.
pub fn matched_categories(normalized: &str) -> Vec<RiskCategory> {
    RiskCategory::all()
        .iter()
        .copied()
        .filter(|c| matches_any(normalized, terms(*c)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_condenses() {
        assert_eq!(normalize("  Je  me SENS\ttriste "), "je me sens triste");
    }

    #[test]
    fn empty_text_matches_nothing() {
        assert!(!matches_any("", DANGER));
        assert!(matched_categories("").is_empty());
    }

    #[test]
    fn sad_and_lonely_hits_two_lexicons() {
        let n = normalize("je me sens triste et seul");
        let cats = matched_categories(&n);
        assert_eq!(
            cats,
            vec![RiskCategory::Deprime, RiskCategory::Isolement]
        );
    }

    #[test]
    fn danger_terms_hit() {
        let n = normalize("Je veux DISPARAITRE");
        assert!(matches_any(&n, DANGER));
    }

    #[test]
    fn no_duplicate_categories() {
        // Two deprime terms in one text still yield one category.
        let n = normalize("triste et deprime");
        let cats = matched_categories(&n);
        assert_eq!(cats, vec![RiskCategory::Deprime]);
    }
}
