use crate::phylo::{Rooting, TreeFloat};

/// Meaning of a comment that precedes a tree description.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TreeHint {
    Rooting(Rooting),
    Weight(TreeFloat),
    None,
}

/// Recognizes `[&R]`, `[&U]` and `[&W weight]`; a weight may be written as
/// a fraction (`[&W 1/3]`). Anything else is an ordinary comment.
pub(crate) fn interpret(comment: &str) -> TreeHint {
    let comment = comment.trim();
    let Some(body) = comment.strip_prefix('&') else {
        return TreeHint::None;
    };
    let body = body.trim_start();

    match body {
        "R" | "r" => TreeHint::Rooting(Rooting::Rooted),
        "U" | "u" => TreeHint::Rooting(Rooting::Unrooted),
        _ => match body.strip_prefix(['W', 'w']) {
            Some(value) => parse_weight(value.trim()).map_or(TreeHint::None, TreeHint::Weight),
            None => TreeHint::None,
        },
    }
}

fn parse_weight(value: &str) -> Option<TreeFloat> {
    match value.split_once('/') {
        Some((numerator, denominator)) => {
            let numerator: TreeFloat = numerator.trim().parse().ok()?;
            let denominator: TreeFloat = denominator.trim().parse().ok()?;
            (denominator != 0e0).then(|| numerator / denominator)
        }
        None => value.parse().ok(),
    }
}
