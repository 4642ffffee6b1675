//! Content negotiation over uploaded tabs.
//!
//! Four specialist agents -- plan, entity, target, transaction -- score
//! each tab independently from structural signals (header patterns, row
//! shape). A separate arbitration step then either awards the whole tab to
//! the top scorer (FULL claim) or, when the tab structurally holds two
//! overlapping column groups, splits it into two partial content units
//! with disjoint owned fields.
//!
//! Scoring and arbitration are deliberately independent functions so each
//! can be unit-tested on its own.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Content domain a tab can belong to.
///
/// Declaration order is domain priority: plan structure must be known
/// before entity/target/transaction bindings can be validated against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Plan,
    Entity,
    Target,
    Transaction,
}

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::Plan,
        Domain::Entity,
        Domain::Target,
        Domain::Transaction,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Domain::Plan => "plan",
            Domain::Entity => "entity",
            Domain::Target => "target",
            Domain::Transaction => "transaction",
        }
    }
}

/// One uploaded tab, profiled for classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabProfile {
    pub name: String,
    pub headers: Vec<String>,
    pub row_count: usize,
    /// A small sample of rows for shape signals; may be empty.
    #[serde(default)]
    pub sample_rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// One agent's confidence that a tab belongs to its domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentScore {
    pub domain: Domain,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub signals: Vec<String>,
}

/// How a content unit claims its tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "claim", rename_all = "snake_case")]
pub enum Claim {
    Full,
    Partial {
        owned_fields: Vec<String>,
        shared_fields: Vec<String>,
        /// Id of the sibling unit claiming the other column group.
        partner: String,
    },
}

/// One classified unit of content (a whole tab, or one side of a split).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentUnit {
    pub id: String,
    pub tab_name: String,
    pub domain: Domain,
    pub confidence: f64,
    pub claim: Claim,
    /// Full ranked scores from the negotiation round, for audit.
    pub round2_scores: Vec<AgentScore>,
}

/// The negotiation proposal for a whole upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SciProposal {
    pub content_units: Vec<ContentUnit>,
    /// Unit ids in processing order (plan before entity before target
    /// before transaction).
    pub processing_order: Vec<String>,
    pub overall_confidence: f64,
    pub requires_human_review: bool,
}

// ──────────────────────────────────────────────
// Agent scoring
// ──────────────────────────────────────────────

static PLAN_HEADERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"component|tier|rate|payout|threshold|matrix|plan|formula").unwrap());
static ENTITY_HEADERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"employee|name|email|manager|territory|role|title|hire|store|region").unwrap()
});
static TARGET_HEADERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"quota|goal|target|objective|budget").unwrap());
static TRANSACTION_HEADERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"amount|date|order|invoice|transaction|deal|revenue|sale|qty|units").unwrap()
});

fn header_pattern(domain: Domain) -> &'static Regex {
    match domain {
        Domain::Plan => &PLAN_HEADERS,
        Domain::Entity => &ENTITY_HEADERS,
        Domain::Target => &TARGET_HEADERS,
        Domain::Transaction => &TRANSACTION_HEADERS,
    }
}

/// Score one tab for one domain. Pure: structural signals only.
pub fn score_tab(domain: Domain, profile: &TabProfile) -> AgentScore {
    let mut signals = Vec::new();
    let pattern = header_pattern(domain);

    let matched: Vec<&String> = profile
        .headers
        .iter()
        .filter(|h| pattern.is_match(&h.to_ascii_lowercase()))
        .collect();
    let header_share = if profile.headers.is_empty() {
        0.0
    } else {
        matched.len() as f64 / profile.headers.len() as f64
    };
    for h in &matched {
        signals.push(format!("header:{}", h));
    }

    // Row-shape signal: transaction tabs are long, plan tabs are short.
    let shape_bonus = match domain {
        Domain::Transaction if profile.row_count >= 50 => 0.15,
        Domain::Plan if profile.row_count > 0 && profile.row_count <= 25 => 0.10,
        Domain::Entity if numeric_column_share(profile) < 0.5 => 0.10,
        _ => 0.0,
    };
    if shape_bonus > 0.0 {
        signals.push(format!("shape:{}", domain.slug()));
    }

    let confidence = (header_share * 0.9 + shape_bonus).min(1.0);
    AgentScore {
        domain,
        confidence,
        signals,
    }
}

/// Share of sampled cells that are numeric. Rosters are mostly text.
fn numeric_column_share(profile: &TabProfile) -> f64 {
    let mut total = 0usize;
    let mut numeric = 0usize;
    for row in &profile.sample_rows {
        for value in row.values() {
            total += 1;
            if value.is_number() {
                numeric += 1;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        numeric as f64 / total as f64
    }
}

/// Run all four agents and rank descending by confidence.
pub fn score_all(profile: &TabProfile) -> Vec<AgentScore> {
    let mut scores: Vec<AgentScore> = Domain::ALL
        .iter()
        .map(|d| score_tab(*d, profile))
        .collect();
    scores.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
    scores
}

// ──────────────────────────────────────────────
// Arbitration
// ──────────────────────────────────────────────

/// Minimum winning confidence before a tab is flagged for human review.
const REVIEW_CONFIDENCE_FLOOR: f64 = 0.50;
/// Minimum lead over the runner-up before a tab is flagged for review.
const REVIEW_MARGIN_FLOOR: f64 = 0.10;
/// A domain needs this many exclusively-matched headers to claim a split.
const SPLIT_MIN_OWNED: usize = 2;

/// A tab needs human review when the winner is weak or the race is close.
pub fn requires_human_review(scores: &[AgentScore]) -> bool {
    match scores {
        [] => true,
        [top] => top.confidence < REVIEW_CONFIDENCE_FLOOR,
        [top, second, ..] => {
            top.confidence < REVIEW_CONFIDENCE_FLOOR
                || top.confidence - second.confidence < REVIEW_MARGIN_FLOOR
        }
    }
}

/// Negotiate an entire upload into a proposal.
pub fn negotiate(profiles: &[TabProfile]) -> SciProposal {
    let mut content_units = Vec::new();
    let mut any_review = false;

    for (index, profile) in profiles.iter().enumerate() {
        let scores = score_all(profile);
        let review = requires_human_review(&scores);
        any_review |= review;

        if let Some((left, right)) = split_claims(profile, &scores) {
            content_units.push(split_unit(index, profile, &scores, &left, &right));
            content_units.push(split_unit(index, profile, &scores, &right, &left));
        } else {
            let winner = &scores[0];
            content_units.push(ContentUnit {
                id: unit_id(index, winner.domain),
                tab_name: profile.name.clone(),
                domain: winner.domain,
                confidence: winner.confidence,
                claim: Claim::Full,
                round2_scores: scores.clone(),
            });
        }
    }

    let overall_confidence = if content_units.is_empty() {
        0.0
    } else {
        content_units.iter().map(|u| u.confidence).sum::<f64>() / content_units.len() as f64
    };

    let mut order: Vec<(Domain, usize, String)> = content_units
        .iter()
        .enumerate()
        .map(|(i, u)| (u.domain, i, u.id.clone()))
        .collect();
    order.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    // Nothing classifiable is itself a reason for review.
    let requires_human_review = any_review || content_units.is_empty();

    SciProposal {
        processing_order: order.into_iter().map(|(_, _, id)| id).collect(),
        content_units,
        overall_confidence,
        requires_human_review,
    }
}

/// One side of a structural split: the domain plus the headers it
/// exclusively matches.
#[derive(Debug, Clone)]
struct SplitSide {
    domain: Domain,
    confidence: f64,
    owned: Vec<String>,
}

/// Detect a structural split: two domains that each exclusively own
/// enough columns of the same tab.
fn split_claims(profile: &TabProfile, scores: &[AgentScore]) -> Option<(SplitSide, SplitSide)> {
    let mut sides: Vec<SplitSide> = Vec::new();
    for score in scores {
        let owned = exclusive_headers(profile, score.domain);
        if owned.len() >= SPLIT_MIN_OWNED {
            sides.push(SplitSide {
                domain: score.domain,
                confidence: score.confidence,
                owned,
            });
        }
    }
    if sides.len() >= 2 {
        let right = sides.swap_remove(1);
        let left = sides.swap_remove(0);
        Some((left, right))
    } else {
        None
    }
}

/// Headers matched by exactly one domain's pattern -- this one's.
fn exclusive_headers(profile: &TabProfile, domain: Domain) -> Vec<String> {
    profile
        .headers
        .iter()
        .filter(|h| {
            let lowered = h.to_ascii_lowercase();
            let matching: Vec<Domain> = Domain::ALL
                .iter()
                .copied()
                .filter(|d| header_pattern(*d).is_match(&lowered))
                .collect();
            matching == [domain]
        })
        .cloned()
        .collect()
}

/// Headers matched by more than one domain pattern.
fn shared_headers(profile: &TabProfile) -> Vec<String> {
    profile
        .headers
        .iter()
        .filter(|h| {
            let lowered = h.to_ascii_lowercase();
            Domain::ALL
                .iter()
                .filter(|d| header_pattern(**d).is_match(&lowered))
                .count()
                > 1
        })
        .cloned()
        .collect()
}

fn split_unit(
    index: usize,
    profile: &TabProfile,
    scores: &[AgentScore],
    side: &SplitSide,
    partner: &SplitSide,
) -> ContentUnit {
    ContentUnit {
        id: unit_id(index, side.domain),
        tab_name: profile.name.clone(),
        domain: side.domain,
        confidence: side.confidence,
        claim: Claim::Partial {
            owned_fields: side.owned.clone(),
            shared_fields: shared_headers(profile),
            partner: unit_id(index, partner.domain),
        },
        round2_scores: scores.to_vec(),
    }
}

fn unit_id(tab_index: usize, domain: Domain) -> String {
    format!("cu{}_{}", tab_index, domain.slug())
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
