//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;

use derive_new::new;
use serde::{Deserialize, Serialize};

// Multi-criteria preference attached to BGP-like prefix advertisements.
//
// Entities are expected in non-increasing priority order. Two vectors are
// compared entity by entity, and the first decisive entity settles the
// comparison.
#[derive(Clone, Debug, Default, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct MetricVector {
    pub version: u32,
    pub metrics: Vec<MetricEntity>,
}

#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct MetricEntity {
    pub entity_type: i64,
    pub priority: i64,
    pub op: CompareType,
    // Whether a decision reached through this entity is only a tie-break.
    pub tie_breaker: bool,
    // Higher payloads are preferred. Payloads are compared lexicographically.
    pub metric: Vec<i64>,
}

// How to treat an entity present in only one of the compared vectors.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum CompareType {
    WinIfPresent,
    WinIfNotPresent,
    IgnoreIfNotPresent,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum CompareResult {
    Winner,
    TieWinner,
    Tie,
    TieLoser,
    Loser,
    Error,
}

// ===== impl MetricVector =====

impl MetricVector {
    // Entity type reserved for the IGP distance added during best path
    // selection.
    pub const IGP_COST_TYPE: i64 = 9;
    pub const IGP_COST_PRIORITY: i64 = 0;

    pub fn is_sorted(&self) -> bool {
        self.metrics
            .windows(2)
            .all(|pair| pair[0].priority >= pair[1].priority)
    }

    pub fn has_entity_type(&self, entity_type: i64) -> bool {
        self.metrics
            .iter()
            .any(|entity| entity.entity_type == entity_type)
    }

    // Returns a copy of this vector extended with the IGP distance entity.
    //
    // Lower IGP distances must win, so the payload is negated.
    pub fn with_igp_cost(&self, igp_metric: i64) -> MetricVector {
        let mut mv = self.clone();
        mv.metrics.push(MetricEntity::new(
            Self::IGP_COST_TYPE,
            Self::IGP_COST_PRIORITY,
            CompareType::WinIfNotPresent,
            false,
            vec![-igp_metric],
        ));
        mv
    }

    // Compares this vector against another one, from this vector's point of
    // view.
    pub fn compare(&self, other: &MetricVector) -> CompareResult {
        if self.version != other.version {
            return CompareResult::Error;
        }
        if !self.is_sorted() || !other.is_sorted() {
            return CompareResult::Error;
        }

        let mut result = CompareResult::Tie;
        let mut lhs = self.metrics.iter().peekable();
        let mut rhs = other.metrics.iter().peekable();
        loop {
            if result.is_decisive() {
                return result;
            }

            match (lhs.peek(), rhs.peek()) {
                (Some(l), Some(r)) if l.entity_type == r.entity_type => {
                    if l.priority != r.priority {
                        // Priorities are per entity type.
                        return CompareResult::Error;
                    }
                    result.maybe_update(l.compare(r));
                    lhs.next();
                    rhs.next();
                }
                (Some(l), Some(r)) if l.priority == r.priority => {
                    // Same priority, different types.
                    return CompareResult::Error;
                }
                (Some(l), Some(r)) if l.priority > r.priority => {
                    result.maybe_update(l.loner_result());
                    lhs.next();
                }
                (Some(_), Some(r)) => {
                    result.maybe_update(r.loner_result().negate());
                    rhs.next();
                }
                (Some(l), None) => {
                    result.maybe_update(l.loner_result());
                    lhs.next();
                }
                (None, Some(r)) => {
                    result.maybe_update(r.loner_result().negate());
                    rhs.next();
                }
                (None, None) => return result,
            }
        }
    }
}

// ===== impl MetricEntity =====

impl MetricEntity {
    fn compare(&self, other: &MetricEntity) -> CompareResult {
        if self.metric.len() != other.metric.len() {
            return CompareResult::Error;
        }
        match self.metric.cmp(&other.metric) {
            Ordering::Greater if self.tie_breaker => CompareResult::TieWinner,
            Ordering::Greater => CompareResult::Winner,
            Ordering::Less if self.tie_breaker => CompareResult::TieLoser,
            Ordering::Less => CompareResult::Loser,
            Ordering::Equal => CompareResult::Tie,
        }
    }

    // Result of comparing a vector holding this entity against one that
    // lacks it.
    fn loner_result(&self) -> CompareResult {
        match (self.op, self.tie_breaker) {
            (CompareType::WinIfPresent, true) => CompareResult::TieWinner,
            (CompareType::WinIfPresent, false) => CompareResult::Winner,
            (CompareType::WinIfNotPresent, true) => CompareResult::TieLoser,
            (CompareType::WinIfNotPresent, false) => CompareResult::Loser,
            (CompareType::IgnoreIfNotPresent, _) => CompareResult::Tie,
        }
    }
}

// ===== impl CompareResult =====

impl CompareResult {
    pub fn is_decisive(&self) -> bool {
        matches!(
            self,
            CompareResult::Winner | CompareResult::Loser | CompareResult::Error
        )
    }

    pub fn negate(self) -> CompareResult {
        match self {
            CompareResult::Winner => CompareResult::Loser,
            CompareResult::TieWinner => CompareResult::TieLoser,
            CompareResult::TieLoser => CompareResult::TieWinner,
            CompareResult::Loser => CompareResult::Winner,
            CompareResult::Tie | CompareResult::Error => self,
        }
    }

    // A tie-break result sticks unless a later entity is decisive.
    fn maybe_update(&mut self, update: CompareResult) {
        if update.is_decisive() || *self == CompareResult::Tie {
            *self = update;
        }
    }
}

// ===== unit tests =====
