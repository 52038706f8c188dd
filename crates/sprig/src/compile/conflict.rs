//! Tie-break policy for table conflicts.
//!
//! Each function compares explicit priority tuples and nothing else, so the
//! policy can be read (and tested) apart from automaton construction:
//!
//! 1. precedence levels, then associativity when the levels are equal
//! 2. for reduce/reduce within one rule, the earlier alternative
//! 3. for shift/reduce, shift
//!
//! Two reduces of different rules with equal priority are a compile error.

use crate::grammar::{Associativity, RuleId};
use crate::tables::ResolutionReason;

/// Priority of the items that would shift the conflicting token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ShiftPriority {
    pub(crate) min: i32,
    pub(crate) max: i32,
    /// Some shifting item carries an explicit annotation
    pub(crate) explicit: bool,
}

/// Priority of a production that could be reduced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReducePriority {
    pub(crate) level: i32,
    pub(crate) assoc: Option<Associativity>,
    pub(crate) explicit: bool,
    pub(crate) origin: RuleId,
    /// Production index; lower means declared earlier
    pub(crate) position: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Shift,
    Reduce,
    /// Neither: the token is a syntax error here
    Error,
}

pub(crate) fn resolve_shift_reduce(
    shift: ShiftPriority,
    reduce: ReducePriority,
) -> (Decision, ResolutionReason) {
    if shift.explicit || reduce.explicit {
        if reduce.level > shift.max {
            return (Decision::Reduce, ResolutionReason::Precedence);
        }
        if reduce.level < shift.min {
            return (Decision::Shift, ResolutionReason::Precedence);
        }
        if shift.min == shift.max {
            match reduce.assoc {
                Some(Associativity::Left) => {
                    return (Decision::Reduce, ResolutionReason::Associativity)
                }
                Some(Associativity::Right) => {
                    return (Decision::Shift, ResolutionReason::Associativity)
                }
                Some(Associativity::NonAssoc) => {
                    return (Decision::Error, ResolutionReason::Associativity)
                }
                None => {}
            }
        }
    }
    (Decision::Shift, ResolutionReason::PreferShift)
}

/// `Some(true)` when `first` wins, `None` when the conflict is unresolvable.
pub(crate) fn resolve_reduce_reduce(
    first: ReducePriority,
    second: ReducePriority,
) -> Option<(bool, ResolutionReason)> {
    if (first.explicit || second.explicit) && first.level != second.level {
        return Some((first.level > second.level, ResolutionReason::Precedence));
    }
    if first.origin == second.origin {
        return Some((
            first.position < second.position,
            ResolutionReason::DeclarationOrder,
        ));
    }
    None
}
