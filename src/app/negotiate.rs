use std::cmp::Ordering;

use mime::Mime;

struct AcceptEntry {
    mime: Mime,
    quality: f32,
    order: usize,
}

struct Candidate {
    quality: f32,
    specificity: u8,
    order: usize,
    offer: usize,
}

fn parse_accept(accept: &str) -> Vec<AcceptEntry> {
    accept
        .split(',')
        .enumerate()
        .filter_map(|(order, item)| {
            let mime = item
                .trim()
                .parse::<Mime>()
                .ok()?;
            let quality = mime
                .get_param("q")
                .and_then(|q| {
                    q.as_str()
                        .parse::<f32>()
                        .ok()
                })
                .unwrap_or(1.0)
                .clamp(0.0, 1.0);
            Some(AcceptEntry { mime, quality, order })
        })
        .collect()
}

fn specificity(entry: &Mime, offer: &Mime) -> Option<u8> {
    let mut specificity = 0;

    if entry.type_() == offer.type_() {
        specificity |= 4;
    } else if entry.type_() != mime::STAR {
        return None;
    }

    if entry.subtype() == offer.subtype() {
        specificity |= 2;
    } else if entry.subtype() != mime::STAR {
        return None;
    }

    Some(specificity)
}

/// Picks the offer that best satisfies an `Accept` header.
///
/// Returns the index into `offers`. Without a header, or with an empty one,
/// the first offer wins. Ranking follows quality, then how specifically the
/// header names the type, then header order, then offer order. Offers only
/// matched with `q=0` are never chosen.
pub fn negotiate(accept: Option<&str>, offers: &[Mime]) -> Option<usize> {
    if offers.is_empty() {
        return None;
    }

    let accept = match accept {
        Some(accept) if !accept
            .trim()
            .is_empty() =>
        {
            accept
        }
        _ => return Some(0),
    };

    let entries = parse_accept(accept);
    if entries.is_empty() {
        return Some(0);
    }

    let mut best: Option<Candidate> = None;

    for (offer_index, offer) in offers
        .iter()
        .enumerate()
    {
        let mut matched: Option<Candidate> = None;
        for entry in &entries {
            let Some(specificity) = specificity(&entry.mime, offer) else {
                continue;
            };
            let candidate = Candidate {
                quality: entry.quality,
                specificity,
                order: entry.order,
                offer: offer_index,
            };
            let better = match &matched {
                None => true,
                Some(current) => {
                    candidate.specificity > current.specificity
                        || (candidate.specificity == current.specificity
                            && (candidate.quality > current.quality
                                || (candidate.quality == current.quality
                                    && candidate.order < current.order)))
                }
            };
            if better {
                matched = Some(candidate);
            }
        }

        let Some(candidate) = matched else {
            continue;
        };
        if candidate.quality <= 0.0 {
            continue;
        }

        let replace = match &best {
            None => true,
            Some(current) => rank(&candidate, current) == Ordering::Greater,
        };
        if replace {
            best = Some(candidate);
        }
    }

    best.map(|candidate| candidate.offer)
}

fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    a.quality
        .partial_cmp(&b.quality)
        .unwrap_or(Ordering::Equal)
        .then(
            a.specificity
                .cmp(&b.specificity),
        )
        .then(
            b.order
                .cmp(&a.order),
        )
        .then(
            b.offer
                .cmp(&a.offer),
        )
}
