//! Pure gateway-rotation decision logic.
//!
//! Callers pass the client's *eligible* assignment set: active rows whose
//! daily limit is not exhausted and whose gateway accepts the amount and
//! currency. The functions here never touch the store; position updates
//! and usage increments happen in the repos afterwards.

use uuid::Uuid;

use crate::domain::client::RotationMode;
use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct EligibleAssignment {
    pub assignment_id: Uuid,
    pub gateway_id: Uuid,
    pub rotation_order: i32,
    pub weight: i32,
    pub daily_limit: i64,
    pub daily_used: i64,
}

impl EligibleAssignment {
    /// Relative utilization of the daily budget; a zero limit means
    /// unlimited and counts as no utilization.
    fn utilization(&self) -> f64 {
        if self.daily_limit <= 0 {
            0.0
        } else {
            self.daily_used as f64 / self.daily_limit as f64
        }
    }

    pub fn limit_exhausted(&self) -> bool {
        self.daily_limit > 0 && self.daily_used >= self.daily_limit
    }
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub assignment: EligibleAssignment,
    pub new_position: i32,
}

pub fn select_next(
    mode: RotationMode,
    current_position: i32,
    eligible: &[EligibleAssignment],
) -> Result<Selection, CoreError> {
    let mut candidates: Vec<&EligibleAssignment> =
        eligible.iter().filter(|a| !a.limit_exhausted()).collect();
    if candidates.is_empty() {
        return Err(CoreError::NoEligibleGateway);
    }
    candidates.sort_by_key(|a| a.rotation_order);

    let selected = match mode {
        RotationMode::RoundRobin => {
            // a row may drop out mid-day (daily limit), leaving gaps in the
            // order sequence; take the next order past the position, wrapping
            // to the lowest
            candidates
                .iter()
                .find(|a| a.rotation_order > current_position)
                .copied()
                .unwrap_or(candidates[0])
        }
        RotationMode::Priority => candidates[0],
        RotationMode::Smart => candidates
            .iter()
            .min_by(|a, b| {
                let score_a = smart_score(a);
                let score_b = smart_score(b);
                score_a
                    .partial_cmp(&score_b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.rotation_order.cmp(&b.rotation_order))
            })
            .copied()
            .unwrap_or(candidates[0]),
    };

    Ok(Selection {
        assignment: selected.clone(),
        new_position: selected.rotation_order,
    })
}

/// Lower is better: favor low relative utilization and higher weight.
fn smart_score(a: &EligibleAssignment) -> f64 {
    a.utilization() / a.weight.max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(order: i32, weight: i32, limit: i64, used: i64) -> EligibleAssignment {
        EligibleAssignment {
            assignment_id: Uuid::new_v4(),
            gateway_id: Uuid::new_v4(),
            rotation_order: order,
            weight,
            daily_limit: limit,
            daily_used: used,
        }
    }

    #[test]
    fn round_robin_cycles_through_all_orders() {
        let eligible = vec![
            assignment(1, 1, 0, 0),
            assignment(2, 1, 0, 0),
            assignment(3, 1, 0, 0),
        ];

        let mut position = 0;
        let mut seen = Vec::new();
        for _ in 0..3 {
            let sel = select_next(RotationMode::RoundRobin, position, &eligible).unwrap();
            position = sel.new_position;
            seen.push(sel.assignment.rotation_order);
        }
        assert_eq!(seen, vec![1, 2, 3]);

        // wraps back to the first order
        let sel = select_next(RotationMode::RoundRobin, position, &eligible).unwrap();
        assert_eq!(sel.assignment.rotation_order, 1);
    }

    #[test]
    fn round_robin_skips_exhausted_order() {
        let eligible = vec![
            assignment(1, 1, 0, 0),
            assignment(2, 1, 10, 10),
            assignment(3, 1, 0, 0),
        ];
        let sel = select_next(RotationMode::RoundRobin, 1, &eligible).unwrap();
        assert_eq!(sel.assignment.rotation_order, 3);
    }

    #[test]
    fn no_eligible_gateway_fails() {
        assert!(matches!(
            select_next(RotationMode::RoundRobin, 0, &[]),
            Err(CoreError::NoEligibleGateway)
        ));
        let all_exhausted = vec![assignment(1, 1, 5, 5)];
        assert!(matches!(
            select_next(RotationMode::Smart, 0, &all_exhausted),
            Err(CoreError::NoEligibleGateway)
        ));
    }

    #[test]
    fn priority_always_picks_lowest_order() {
        let eligible = vec![assignment(3, 1, 0, 0), assignment(1, 1, 0, 0), assignment(2, 1, 0, 0)];
        for position in [0, 1, 2, 7] {
            let sel = select_next(RotationMode::Priority, position, &eligible).unwrap();
            assert_eq!(sel.assignment.rotation_order, 1);
            assert_eq!(sel.new_position, 1);
        }
    }

    #[test]
    fn smart_prefers_low_utilization() {
        let eligible = vec![
            assignment(1, 1, 100, 90),
            assignment(2, 1, 100, 10),
        ];
        let sel = select_next(RotationMode::Smart, 0, &eligible).unwrap();
        assert_eq!(sel.assignment.rotation_order, 2);
    }

    #[test]
    fn smart_weight_breaks_equal_utilization() {
        let eligible = vec![
            assignment(1, 1, 100, 50),
            assignment(2, 5, 100, 50),
        ];
        let sel = select_next(RotationMode::Smart, 0, &eligible).unwrap();
        assert_eq!(sel.assignment.rotation_order, 2);
    }

    #[test]
    fn smart_never_selects_exhausted_while_alternative_exists() {
        let eligible = vec![
            assignment(1, 10, 10, 10),
            assignment(2, 1, 100, 99),
        ];
        let sel = select_next(RotationMode::Smart, 0, &eligible).unwrap();
        assert_eq!(sel.assignment.rotation_order, 2);
    }

    #[test]
    fn smart_ties_break_by_lowest_order() {
        let eligible = vec![assignment(2, 1, 0, 0), assignment(1, 1, 0, 0)];
        let sel = select_next(RotationMode::Smart, 0, &eligible).unwrap();
        assert_eq!(sel.assignment.rotation_order, 1);
    }
}
