//! Tree-plan construction
//!
//! Seeding is planned entirely in memory before anything touches a
//! database: roots are drafted, children are drafted against a parent
//! *slot*, and an explicit resolve step turns each slot into the parent's
//! already-minted identifier, depth by depth. Insertion then consumes the
//! resolved batches in order, so a record's parent always exists (and has
//! its id) strictly before the record itself.

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::rngs::ThreadRng;
use rand::Rng;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Fan-out policy: how many children each seeded root receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOut {
    /// Roots only
    None,
    /// Exactly `k` direct children per root
    PerRoot(u32),
    /// Only every k-th root (by insertion order) receives one child
    EveryKth(u32),
}

impl FanOut {
    /// Interpret a numeric fan-out the way callers have always written it:
    /// `0` for none, an integer `k >= 1` for `k` children per root, a
    /// fraction `1/k` for sparse children. Fractions that do not reduce to
    /// an exact `1/k` are rejected rather than silently mis-seeding.
    ///
    /// # Errors
    ///
    /// Returns a validation error for negative, non-integer (> 1) or
    /// non-reducible fractional counts.
    pub fn from_count(count: f64) -> Result<Self> {
        if count == 0.0 {
            return Ok(Self::None);
        }
        if count < 0.0 {
            return Err(Error::Validation(format!("negative fan-out: {count}")));
        }
        if count >= 1.0 {
            if count.fract() != 0.0 {
                return Err(Error::Validation(format!(
                    "fan-out above one must be a whole number, got {count}"
                )));
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            return Ok(Self::PerRoot(count as u32));
        }

        // 0.333 is accepted as shorthand for one child per third root.
        let inverse = if (count - 0.333).abs() < 1e-9 {
            3.0
        } else {
            1.0 / count
        };
        if inverse.fract() != 0.0 {
            return Err(Error::Validation(format!(
                "fan-out fraction {count} does not reduce to 1/k"
            )));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(Self::EveryKth(inverse as u32))
    }
}

/// One seeding round: a forest of `roots` roots with children per the
/// fan-out policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRound {
    /// Number of root records
    pub roots: u64,
    /// Children per root
    pub fan_out: FanOut,
    /// Chain generated children as a one-deep-per-step linked list under
    /// the previous sibling instead of attaching them as flat siblings
    pub nested: bool,
    /// Mark every generated row soft-deleted
    pub soft_deleted: bool,
    /// Drop and recreate the schema before this round
    pub clean_first: bool,
}

impl SeedRound {
    /// A plain round of `roots` roots with `fan_out` children, cleaning
    /// first.
    #[must_use]
    pub const fn new(roots: u64, fan_out: FanOut) -> Self {
        Self {
            roots,
            fan_out,
            nested: false,
            soft_deleted: false,
            clean_first: true,
        }
    }
}

/// An ordered list of seeding rounds; the prepare side of an experiment
/// definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedPlan {
    /// Rounds, applied in order
    pub rounds: Vec<SeedRound>,
}

/// A fully resolved row, ready for literal rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRow {
    /// Client-minted identifier
    pub id: String,
    /// Randomized display name
    pub name: String,
    /// Randomized upstream identifier
    pub external_id: String,
    /// Resolved parent identifier; `None` for roots
    pub parent_id: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Resolved batches, one per depth. Depth 0 holds the roots.
#[derive(Debug, Clone)]
pub struct TreePlan {
    depths: Vec<Vec<PlannedRow>>,
}

impl TreePlan {
    /// Batches by depth, shallowest first.
    #[must_use]
    pub fn depths(&self) -> &[Vec<PlannedRow>] {
        &self.depths
    }

    /// Total number of rows across all depths.
    #[must_use]
    pub fn total_rows(&self) -> u64 {
        self.depths.iter().map(|d| d.len() as u64).sum()
    }

    /// Number of roots.
    #[must_use]
    pub fn roots(&self) -> u64 {
        self.depths.first().map_or(0, |d| d.len() as u64)
    }
}

/// Parent linkage of a drafted child before identifier resolution: an
/// index into the previous depth's batch.
#[derive(Debug, Clone, Copy)]
struct Draft {
    parent_index: usize,
}

/// Build the resolved depth batches for one round.
///
/// # Errors
///
/// Currently infallible for a well-formed [`SeedRound`]; kept fallible so
/// numeric fan-out validation composes at the call site.
pub fn build_plan(round: &SeedRound) -> Result<TreePlan> {
    let mut rng = rand::thread_rng();
    let roots: Vec<PlannedRow> = (0..round.roots)
        .map(|_| mint_row(&mut rng, None, round.soft_deleted))
        .collect();

    let drafts_by_depth = draft_children(round);

    let mut depths = vec![roots];
    for drafts in drafts_by_depth {
        let resolved = resolve_depth(&mut rng, &drafts, &depths[depths.len() - 1], round.soft_deleted);
        depths.push(resolved);
    }

    Ok(TreePlan { depths })
}

/// Draft the child structure: for each depth below the roots, which
/// parent (by index into the previous depth) every child hangs off.
fn draft_children(round: &SeedRound) -> Vec<Vec<Draft>> {
    #[allow(clippy::cast_possible_truncation)]
    let root_count = round.roots as usize;
    match round.fan_out {
        FanOut::None => Vec::new(),
        FanOut::PerRoot(k) if round.nested => {
            // One chain per root: every level holds one child per root,
            // hanging off the same position in the level above.
            (0..k)
                .map(|_| (0..root_count).map(|i| Draft { parent_index: i }).collect())
                .collect()
        }
        FanOut::PerRoot(k) => {
            let mut depth_one = Vec::with_capacity(root_count * k as usize);
            for parent_index in 0..root_count {
                for _ in 0..k {
                    depth_one.push(Draft { parent_index });
                }
            }
            vec![depth_one]
        }
        FanOut::EveryKth(k) => {
            let k = k as usize;
            let depth_one: Vec<Draft> = (0..root_count)
                .filter(|i| (i + 1) % k == 0)
                .map(|parent_index| Draft { parent_index })
                .collect();
            if depth_one.is_empty() {
                Vec::new()
            } else {
                vec![depth_one]
            }
        }
    }
}

/// Resolve one depth: replace every parent slot with the parent's minted
/// identifier and mint the row itself.
fn resolve_depth(
    rng: &mut ThreadRng,
    drafts: &[Draft],
    parents: &[PlannedRow],
    soft_deleted: bool,
) -> Vec<PlannedRow> {
    drafts
        .iter()
        .map(|draft| {
            let parent_id = parents[draft.parent_index].id.clone();
            mint_row(rng, Some(parent_id), soft_deleted)
        })
        .collect()
}

const ROLES: [&str; 12] = [
    "Accounts Engineer",
    "Brand Strategist",
    "Data Supervisor",
    "Delivery Manager",
    "Integration Analyst",
    "Markets Consultant",
    "Operations Officer",
    "Platform Architect",
    "Quality Coordinator",
    "Research Liaison",
    "Security Facilitator",
    "Solutions Director",
];

const SCOPES: [&str; 8] = [
    "Global", "Regional", "District", "Central", "Dynamic", "Internal", "Corporate", "Forward",
];

const YEAR_SECONDS: i64 = 365 * 24 * 60 * 60;

fn mint_row(rng: &mut ThreadRng, parent_id: Option<String>, soft_deleted: bool) -> PlannedRow {
    let id = Uuid::new_v4().to_string();
    let tag_source = Uuid::new_v4().to_string();
    let name_tag = &tag_source[..10];
    let scope = SCOPES[rng.gen_range(0..SCOPES.len())];
    let role = ROLES[rng.gen_range(0..ROLES.len())];
    let external_id: String = (0..18).map(|_| char::from(rng.sample(Alphanumeric))).collect();
    let now = Utc::now();
    let created_at = now - Duration::seconds(rng.gen_range(0..YEAR_SECONDS));
    let updated_at = now - Duration::seconds(rng.gen_range(0..YEAR_SECONDS));

    PlannedRow {
        id,
        name: format!("{scope} {role}-{name_tag}"),
        external_id,
        parent_id,
        created_at,
        updated_at,
        deleted_at: soft_deleted.then_some(now),
    }
}
